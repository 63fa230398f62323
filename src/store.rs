//! Shared QoS configuration store.
//!
//! Holds the QoS spec installed by the most recently admitted QoS object.
//! The store is created once in `main` and shared with request handlers
//! through an `Arc`; every read and write goes through a lock around a
//! `Copy` value, so a reader always observes a whole spec.

use std::sync::{PoisonError, RwLock};

use tracing::info;

use crate::crd::QoSSpec;

/// Process-wide QoS defaults for injected init containers.
#[derive(Debug, Default)]
pub struct QosStore {
    current: RwLock<QoSSpec>,
}

impl QosStore {
    /// Create an empty store (reads return [`QoSSpec::DEFAULT`]).
    pub fn new() -> Self {
        Self::default()
    }

    /// The spec in effect: the stored spec, or the default when unset.
    pub fn get(&self) -> QoSSpec {
        let current = *self.current.read().unwrap_or_else(PoisonError::into_inner);
        if current.is_unset() {
            QoSSpec::DEFAULT
        } else {
            current
        }
    }

    /// Replace the stored spec.
    pub fn set(&self, spec: QoSSpec) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = spec;
        info!(cpu = spec.cpu, memory = spec.memory, "QoS spec updated");
    }

    /// Clear the stored spec, reverting reads to the default.
    pub fn reset(&self) {
        self.set(QoSSpec::default());
    }
}
