//! QoS Custom Resource Definition.
//!
//! A QoS object carries the CPU and memory requests given to the init
//! container the webhook injects into workloads. The webhook does not
//! reconcile it; admitting a QoS object updates the in-process
//! [`QosStore`](crate::store::QosStore).

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// QoS configures the resources of injected init containers.
///
/// Example:
/// ```yaml
/// apiVersion: admission-webhook-example.qikqiak.com/v1
/// kind: QoS
/// metadata:
///   name: default
/// spec:
///   cpu: 500      # milli-cores
///   memory: 800   # MiB
/// ```
#[derive(
    CustomResource, Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq,
)]
#[kube(
    group = "admission-webhook-example.qikqiak.com",
    version = "v1",
    kind = "QoS",
    plural = "qoses",
    printcolumn = r#"{"name":"CPU", "type":"integer", "jsonPath":".spec.cpu"}"#,
    printcolumn = r#"{"name":"Memory", "type":"integer", "jsonPath":".spec.memory"}"#,
    printcolumn = r#"{"name":"Age", "type":"date", "jsonPath":".metadata.creationTimestamp"}"#
)]
pub struct QoSSpec {
    /// CPU request in milli-cores.
    #[serde(default)]
    pub cpu: i64,

    /// Memory request in MiB.
    #[serde(default)]
    pub memory: i64,
}

impl QoSSpec {
    /// Requests used while no QoS object has been admitted.
    pub const DEFAULT: QoSSpec = QoSSpec {
        cpu: 200,
        memory: 400,
    };

    /// Create a spec from milli-cores and MiB.
    pub const fn new(cpu: i64, memory: i64) -> Self {
        Self { cpu, memory }
    }

    /// Whether this is the all-zero "unset" value.
    pub fn is_unset(&self) -> bool {
        *self == Self::default()
    }
}
