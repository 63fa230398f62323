//! qos-admission-webhook library crate
//!
//! Exports the admission core (policy gate, dispatcher, patch builder,
//! response assembly), the QoS CRD and store, and the HTTP servers.

pub mod config;
pub mod crd;
pub mod health;
pub mod mutation;
pub mod store;
pub mod webhooks;

pub use config::WebhookConfig;
pub use health::HealthState;
pub use mutation::{PatchBuilder, PatchStrategy};
pub use store::QosStore;
pub use webhooks::{AdmissionHandler, WebhookError, run_webhook_server};
