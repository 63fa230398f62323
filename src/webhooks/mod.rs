//! Admission webhook: mutating and validating endpoints.
//!
//! A review flows through the [`dispatch`] decoder, the [`policies`] gate,
//! then either the label policy or the patch builder, and is answered by
//! the [`review`] assembler.

pub mod dispatch;
pub mod error;
pub mod handler;
pub mod policies;
pub mod review;
mod server;

pub use dispatch::AdmissionObject;
pub use error::AdmissionError;
pub use handler::{AdmissionHandler, Endpoint};
pub use policies::ValidationResult;
pub use review::{Verdict, assemble};
pub use server::{WebhookError, create_webhook_router, run_webhook_server};

// Re-export kube-rs admission types for tests driving whole reviews
pub use kube::core::admission::{AdmissionRequest, AdmissionResponse, AdmissionReview, Operation};
