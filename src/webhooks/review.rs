//! AdmissionReview parsing and response assembly.
//!
//! The envelope types come from `kube::core::admission`. A response built
//! from a request inherits its `apiVersion`, so `admission.k8s.io/v1beta1`
//! reviews are answered as `v1beta1`.

use json_patch::Patch;
use kube::core::admission::{AdmissionRequest, AdmissionResponse, AdmissionReview};
use kube::core::{DynamicObject, TypeMeta};
use tracing::{debug, warn};

use super::error::AdmissionError;
use super::policies::ValidationResult;

/// Current admission API version
pub const ADMISSION_V1: &str = "admission.k8s.io/v1";
/// Legacy admission API version, still sent by older API servers
pub const ADMISSION_V1BETA1: &str = "admission.k8s.io/v1beta1";
/// Kind of the review envelope
pub const REVIEW_KIND: &str = "AdmissionReview";

/// Status code reported on policy denials
pub const DENIED_CODE: u16 = 403;

/// Parse a review from a request body.
pub fn parse(body: &[u8]) -> Result<AdmissionReview<DynamicObject>, AdmissionError> {
    serde_json::from_slice(body).map_err(AdmissionError::InvalidReview)
}

/// Outcome of a handled request before it is put on the wire
#[derive(Clone, Debug)]
pub enum Verdict {
    /// Admit unchanged
    Allowed,
    /// Reject with a policy reason
    Denied { reason: String, message: String },
    /// Admit with a mutation
    Patched(Patch),
}

impl From<ValidationResult> for Verdict {
    fn from(result: ValidationResult) -> Self {
        if result.allowed {
            Verdict::Allowed
        } else {
            Verdict::Denied {
                reason: result
                    .reason
                    .unwrap_or_else(|| "ValidationFailed".to_string()),
                message: result
                    .message
                    .unwrap_or_else(|| "Validation failed".to_string()),
            }
        }
    }
}

/// Deny `response`, classifying the status by `error`.
fn rejected(response: AdmissionResponse, error: &AdmissionError) -> AdmissionResponse {
    let mut response = response.deny(error);
    response.result.reason = error.reason().to_string();
    response.result.code = error.code();
    response
}

/// Response for a review whose request could not be read.
///
/// Carries no uid. Answered as `types` when the envelope parsed, else as
/// `admission.k8s.io/v1`.
pub fn invalid(types: Option<TypeMeta>, error: &AdmissionError) -> AdmissionResponse {
    let mut response = AdmissionResponse::invalid(error);
    response.result.reason = error.reason().to_string();
    response.result.code = error.code();
    response.types = types.unwrap_or_else(|| TypeMeta {
        api_version: ADMISSION_V1.to_string(),
        kind: REVIEW_KIND.to_string(),
    });
    response
}

/// Build the response to `request` for `outcome`.
///
/// An empty patch admits without a patch; a patch that cannot be serialized
/// rejects the request.
pub fn assemble(
    request: &AdmissionRequest<DynamicObject>,
    outcome: Result<Verdict, AdmissionError>,
) -> AdmissionResponse {
    let response = AdmissionResponse::from(request);
    match outcome {
        Ok(Verdict::Allowed) => response,
        Ok(Verdict::Patched(patch)) if patch.0.is_empty() => response,
        Ok(Verdict::Patched(patch)) => {
            debug!(uid = %request.uid, operations = patch.0.len(), "Returning patch");
            match response.with_patch(patch) {
                Ok(response) => response,
                Err(e) => {
                    let error = AdmissionError::PatchComputation(e.to_string());
                    warn!(uid = %request.uid, error = %error, "Failed to serialize patch");
                    rejected(AdmissionResponse::from(request), &error)
                }
            }
        }
        Ok(Verdict::Denied { reason, message }) => {
            let mut response = response.deny(message);
            response.result.reason = reason;
            response.result.code = DENIED_CODE;
            response
        }
        Err(error) => rejected(response, &error),
    }
}

/// Short label for logs and metrics: allowed, patched, denied or error
pub fn outcome(response: &AdmissionResponse) -> &'static str {
    if response.allowed && response.patch.is_some() {
        "patched"
    } else if response.allowed {
        "allowed"
    } else if response.result.code == DENIED_CODE {
        "denied"
    } else {
        "error"
    }
}
