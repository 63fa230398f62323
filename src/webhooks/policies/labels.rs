//! Required label policy.
//!
//! Validated objects must carry the recommended `app.kubernetes.io` labels.
//! Only presence is checked, not values.

use std::collections::BTreeMap;

use super::ValidationResult;

/// Labels every validated object must carry, checked in order
pub const REQUIRED_LABELS: [&str; 6] = [
    "app.kubernetes.io/name",
    "app.kubernetes.io/instance",
    "app.kubernetes.io/version",
    "app.kubernetes.io/component",
    "app.kubernetes.io/part-of",
    "app.kubernetes.io/managed-by",
];

/// Denial reason when a required label is absent
pub const REASON_MISSING_LABELS: &str = "required labels are not set";

/// Validate that all [`REQUIRED_LABELS`] are present.
pub fn validate(labels: Option<&BTreeMap<String, String>>) -> ValidationResult {
    let missing = REQUIRED_LABELS
        .iter()
        .find(|key| !labels.is_some_and(|labels| labels.contains_key(**key)));

    match missing {
        Some(key) => ValidationResult::denied(
            REASON_MISSING_LABELS,
            &format!("missing required label {key}"),
        ),
        None => ValidationResult::allowed(),
    }
}
