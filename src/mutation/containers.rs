//! Pod template mutations: request reduction and init-container injection.

use std::collections::BTreeMap;

use json_patch::jsonptr::PointerBuf;
use json_patch::{AddOperation, PatchOperation, RemoveOperation, ReplaceOperation};
use k8s_openapi::api::core::v1::{Container, PodSpec, ResourceRequirements};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use serde_json::Value;

use super::pointer;
use super::quantity::{MilliQuantity, QuantityError, QuantityFormat};
use crate::crd::QoSSpec;
use crate::webhooks::error::{AdmissionError, Result};

/// Name of the injected init container
pub const INIT_CONTAINER_NAME: &str = "init";
/// Image of the injected init container
pub const INIT_CONTAINER_IMAGE: &str = "busybox";
/// Command of the injected init container
pub const INIT_CONTAINER_COMMAND: [&str; 3] = ["/bin/sh", "-c", " echo 'init' && sleep 100 "];
/// Share of each container request kept after reduction
pub const REDUCTION_PERCENT: i64 = 90;

const BYTES_PER_MIB: i64 = 1024 * 1024;

/// A request quantity reduced to [`REDUCTION_PERCENT`], in its original format.
pub fn reduce_quantity(quantity: &Quantity) -> std::result::Result<Quantity, QuantityError> {
    Ok(MilliQuantity::try_from(quantity)?
        .percent(REDUCTION_PERCENT)?
        .to_quantity())
}

fn request_path(index: &str, resource: &str) -> PointerBuf {
    pointer([
        "spec",
        "template",
        "spec",
        "containers",
        index,
        "resources",
        "requests",
        resource,
    ])
}

/// One `replace` per container request, reducing it.
///
/// Resource names are lower-cased in the path; a request declared under a
/// differently-cased key is moved to the lower-cased key.
pub fn reduction_patch(containers: &[Container]) -> Result<Vec<PatchOperation>> {
    let mut ops = Vec::new();
    for (index, container) in containers.iter().enumerate() {
        let Some(requests) = container
            .resources
            .as_ref()
            .and_then(|resources| resources.requests.as_ref())
        else {
            continue;
        };

        let index = index.to_string();
        for (resource, quantity) in requests {
            let value = Value::String(reduce_quantity(quantity)?.0);
            let canonical = resource.to_lowercase();
            let path = request_path(&index, &canonical);
            if canonical == *resource {
                ops.push(PatchOperation::Replace(ReplaceOperation { path, value }));
            } else {
                ops.push(PatchOperation::Remove(RemoveOperation {
                    path: request_path(&index, resource),
                }));
                ops.push(PatchOperation::Add(AddOperation { path, value }));
            }
        }
    }
    Ok(ops)
}

/// Reduce every container request in place.
pub fn reduce_requests(containers: &mut [Container]) -> Result<()> {
    for container in containers {
        let Some(requests) = container
            .resources
            .as_mut()
            .and_then(|resources| resources.requests.as_mut())
        else {
            continue;
        };

        let mut reduced = BTreeMap::new();
        for (resource, quantity) in requests.iter() {
            reduced.insert(resource.to_lowercase(), reduce_quantity(quantity)?);
        }
        *requests = reduced;
    }
    Ok(())
}

/// The init container injected into pods without one.
///
/// CPU is requested in milli-cores (decimal), memory in bytes (binary).
pub fn init_container(qos: QoSSpec) -> std::result::Result<Container, QuantityError> {
    let cpu = MilliQuantity::from_milli(qos.cpu, QuantityFormat::DecimalSI);
    let memory_bytes = qos
        .memory
        .checked_mul(BYTES_PER_MIB)
        .ok_or_else(|| QuantityError::Overflow(format!("{}Mi", qos.memory)))?;
    let memory = MilliQuantity::from_units(memory_bytes, QuantityFormat::BinarySI)?;

    Ok(Container {
        name: INIT_CONTAINER_NAME.to_string(),
        image: Some(INIT_CONTAINER_IMAGE.to_string()),
        command: Some(INIT_CONTAINER_COMMAND.iter().map(|s| s.to_string()).collect()),
        resources: Some(ResourceRequirements {
            requests: Some(BTreeMap::from([
                ("cpu".to_string(), cpu.to_quantity()),
                ("memory".to_string(), memory.to_quantity()),
            ])),
            ..Default::default()
        }),
        ..Default::default()
    })
}

fn has_init_containers(pod: &PodSpec) -> bool {
    pod.init_containers
        .as_ref()
        .is_some_and(|containers| !containers.is_empty())
}

/// `add` of the init container list, unless the pod already has one.
pub fn init_container_patch(pod: &PodSpec, qos: QoSSpec) -> Result<Option<PatchOperation>> {
    if has_init_containers(pod) {
        return Ok(None);
    }

    let value = serde_json::to_value(vec![init_container(qos)?])
        .map_err(|e| AdmissionError::PatchComputation(e.to_string()))?;
    Ok(Some(PatchOperation::Add(AddOperation {
        path: pointer(["spec", "template", "spec", "initContainers"]),
        value,
    })))
}

/// Inject the init container in place. Returns whether one was added.
pub fn inject_init_container(pod: &mut PodSpec, qos: QoSSpec) -> Result<bool> {
    if has_init_containers(pod) {
        return Ok(false);
    }
    pod.init_containers = Some(vec![init_container(qos)?]);
    Ok(true)
}
