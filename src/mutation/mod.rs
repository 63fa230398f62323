//! Patch builder.
//!
//! Computes the JSON Patch that mutates an admitted object:
//! - install the `status: mutated` annotation
//! - reduce every container request to 90% (workloads only)
//! - inject an init container sized from the QoS store (workloads only)
//!
//! Two strategies produce the patch. [`PatchStrategy::Construct`] emits the
//! operations directly from the typed view; [`PatchStrategy::Diff`] applies
//! the mutations to a copy and diffs the two documents. Applying either patch
//! to the original object yields the same document.

pub mod annotations;
pub mod containers;
pub mod quantity;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use json_patch::jsonptr::PointerBuf;
use json_patch::{Patch, PatchOperation};
use tracing::debug;

use crate::crd::QoSSpec;
use crate::webhooks::dispatch::AdmissionObject;
use crate::webhooks::error::{AdmissionError, Result};
use crate::webhooks::policies::{ANNOTATION_STATUS, STATUS_MUTATED};

/// JSON Pointer from unescaped tokens.
pub(crate) fn pointer<'a>(tokens: impl IntoIterator<Item = &'a str>) -> PointerBuf {
    PointerBuf::from_tokens(tokens)
}

/// How the patch is computed
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PatchStrategy {
    /// Emit operations directly
    #[default]
    Construct,
    /// Mutate a copy and diff it against the original
    Diff,
}

impl FromStr for PatchStrategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "construct" => Ok(Self::Construct),
            "diff" => Ok(Self::Diff),
            other => Err(format!("unknown patch strategy: {other}")),
        }
    }
}

impl fmt::Display for PatchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Construct => write!(f, "construct"),
            Self::Diff => write!(f, "diff"),
        }
    }
}

/// Annotations installed on every mutated object
pub fn status_annotations() -> BTreeMap<String, String> {
    BTreeMap::from([(ANNOTATION_STATUS.to_string(), STATUS_MUTATED.to_string())])
}

/// Apply every mutation to `object` in place.
pub fn apply(object: &mut AdmissionObject, qos: QoSSpec) -> Result<()> {
    annotations::merge(
        &mut object.metadata_mut().annotations,
        &status_annotations(),
    );
    if let Some(pod) = object.pod_spec_mut() {
        containers::reduce_requests(&mut pod.containers)?;
        containers::inject_init_container(pod, qos)?;
    }
    Ok(())
}

/// Builds mutation patches with the configured strategy
#[derive(Clone, Copy, Debug, Default)]
pub struct PatchBuilder {
    strategy: PatchStrategy,
}

impl PatchBuilder {
    pub fn new(strategy: PatchStrategy) -> Self {
        Self { strategy }
    }

    pub fn strategy(&self) -> PatchStrategy {
        self.strategy
    }

    /// The patch mutating `object` with init container sizes from `qos`.
    pub fn build(&self, object: &AdmissionObject, qos: QoSSpec) -> Result<Patch> {
        let ops = match self.strategy {
            PatchStrategy::Construct => construct(object, qos)?,
            PatchStrategy::Diff => diff(object, qos)?,
        };
        debug!(
            strategy = %self.strategy,
            kind = object.kind(),
            operations = ops.len(),
            "Patch computed"
        );
        Ok(Patch(ops))
    }
}

fn construct(object: &AdmissionObject, qos: QoSSpec) -> Result<Vec<PatchOperation>> {
    let mut ops = annotations::merge_patch(
        object.metadata().annotations.as_ref(),
        &status_annotations(),
    );
    if let Some(pod) = object.pod_spec() {
        ops.extend(containers::reduction_patch(&pod.containers)?);
        ops.extend(containers::init_container_patch(pod, qos)?);
    }
    Ok(ops)
}

fn diff(object: &AdmissionObject, qos: QoSSpec) -> Result<Vec<PatchOperation>> {
    let mut mutated = object.clone();
    apply(&mut mutated, qos)?;

    let original = object.to_value().map_err(patch_error)?;
    let mutated = mutated.to_value().map_err(patch_error)?;
    Ok(json_patch::diff(&original, &mutated).0)
}

fn patch_error(e: serde_json::Error) -> AdmissionError {
    AdmissionError::PatchComputation(e.to_string())
}
