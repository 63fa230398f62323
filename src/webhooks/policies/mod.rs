//! Admission policies.
//!
//! The policy gate decides from object metadata alone whether mutation or
//! validation applies:
//! - Objects in reserved system namespaces are never touched
//! - Owners opt out through the mutate/validate annotations
//! - Objects already carrying the `mutated` status marker are not mutated again
//!
//! The label policy in [`labels`] produces the validation verdict.

pub mod labels;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use tracing::debug;

/// Annotation through which owners opt in or out of mutation
pub const ANNOTATION_MUTATE: &str = "admission-webhook-example.qikqiak.com/mutate";
/// Annotation through which owners opt out of validation
pub const ANNOTATION_VALIDATE: &str = "admission-webhook-example.qikqiak.com/validate";
/// Annotation recording that the webhook already mutated the object
pub const ANNOTATION_STATUS: &str = "admission-webhook-example.qikqiak.com/status";
/// Value of [`ANNOTATION_STATUS`] after mutation
pub const STATUS_MUTATED: &str = "mutated";

/// Namespaces that bypass both validation and mutation
pub const EXEMPT_NAMESPACES: [&str; 2] = ["kube-system", "kube-public"];

const OPT_OUT_VALUES: [&str; 4] = ["n", "no", "false", "off"];

/// Result of a validation check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    /// Whether the validation passed
    pub allowed: bool,
    /// Reason for denial (if not allowed)
    pub reason: Option<String>,
    /// Detailed message (if not allowed)
    pub message: Option<String>,
}

impl ValidationResult {
    /// Create an allowed result
    pub fn allowed() -> Self {
        Self {
            allowed: true,
            reason: None,
            message: None,
        }
    }

    /// Create a denied result
    pub fn denied(reason: &str, message: &str) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.to_string()),
            message: Some(message.to_string()),
        }
    }
}

/// Whether `namespace` is reserved for the cluster itself
pub fn is_exempt(namespace: &str) -> bool {
    EXEMPT_NAMESPACES.contains(&namespace)
}

fn is_exempt_object(metadata: &ObjectMeta) -> bool {
    let namespace = metadata.namespace.as_deref().unwrap_or_default();
    if is_exempt(namespace) {
        debug!(
            namespace = %namespace,
            name = ?metadata.name,
            "Skipping object in exempt namespace"
        );
        return true;
    }
    false
}

fn annotation<'a>(metadata: &'a ObjectMeta, key: &str) -> &'a str {
    metadata
        .annotations
        .as_ref()
        .and_then(|annotations| annotations.get(key))
        .map_or("", String::as_str)
}

/// Read the opt-in/opt-out annotation `annotation_key`.
///
/// "n", "no", "false" and "off" (any case) mean not required; an empty or
/// absent value means `when_unset`; anything else means required.
pub fn decide(metadata: &ObjectMeta, annotation_key: &str, when_unset: bool) -> bool {
    let value = annotation(metadata, annotation_key).to_lowercase();
    if value.is_empty() {
        when_unset
    } else {
        !OPT_OUT_VALUES.contains(&value.as_str())
    }
}

/// Whether the object has to be mutated.
///
/// Mutation is opt-in and runs at most once: the status marker written by a
/// previous mutation turns it off.
pub fn mutation_required(metadata: &ObjectMeta) -> bool {
    if is_exempt_object(metadata) {
        return false;
    }

    let required = if annotation(metadata, ANNOTATION_STATUS).eq_ignore_ascii_case(STATUS_MUTATED)
    {
        false
    } else {
        decide(metadata, ANNOTATION_MUTATE, false)
    };

    debug!(
        namespace = ?metadata.namespace,
        name = ?metadata.name,
        required,
        "Mutation policy evaluated"
    );
    required
}

/// Whether the object has to be validated. Validation is opt-out.
pub fn validation_required(metadata: &ObjectMeta) -> bool {
    if is_exempt_object(metadata) {
        return false;
    }

    let required = decide(metadata, ANNOTATION_VALIDATE, true);

    debug!(
        namespace = ?metadata.namespace,
        name = ?metadata.name,
        required,
        "Validation policy evaluated"
    );
    required
}
