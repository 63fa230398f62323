//! Error types for admission processing.
//!
//! Every variant ends up as a rejected admission response; none is fatal to
//! the process and none is retried within a request.

use kube::core::admission::Operation;
use thiserror::Error;

use crate::mutation::quantity::QuantityError;

/// Error type for admission request handling
#[derive(Error, Debug)]
pub enum AdmissionError {
    /// The request body is not an AdmissionReview
    #[error("invalid AdmissionReview: {0}")]
    InvalidReview(#[source] serde_json::Error),

    /// The AdmissionReview carries no request
    #[error("AdmissionReview has no request")]
    MissingRequest,

    /// The request has no object for the operation
    #[error("missing object in {operation:?} request")]
    MissingObject { operation: Operation },

    /// The object does not decode as its declared kind
    #[error("could not decode {kind} object: {source}")]
    Malformed {
        kind: String,
        #[source]
        source: serde_json::Error,
    },

    /// The declared kind is not handled by this webhook
    #[error("unsupported kind: {0}")]
    UnsupportedKind(String),

    /// Quantity arithmetic, diffing or patch serialization failed
    #[error("patch computation failed: {0}")]
    PatchComputation(String),
}

impl AdmissionError {
    /// Machine-readable reason reported in the response status
    pub fn reason(&self) -> &'static str {
        match self {
            AdmissionError::InvalidReview(_) | AdmissionError::MissingRequest => "InvalidRequest",
            AdmissionError::MissingObject { .. } => "MissingObject",
            AdmissionError::Malformed { .. } => "Malformed",
            AdmissionError::UnsupportedKind(_) => "UnsupportedKind",
            AdmissionError::PatchComputation(_) => "PatchComputationError",
        }
    }

    /// HTTP-style status code reported in the response status
    pub fn code(&self) -> u16 {
        match self {
            AdmissionError::PatchComputation(_) => 500,
            _ => 400,
        }
    }
}

impl From<QuantityError> for AdmissionError {
    fn from(e: QuantityError) -> Self {
        AdmissionError::PatchComputation(e.to_string())
    }
}

/// Result type alias for admission operations
pub type Result<T> = std::result::Result<T, AdmissionError>;
