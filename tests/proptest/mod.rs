// Test code is allowed to panic on failure
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic
)]

//! Property-based tests for qos-admission-webhook.
//!
//! Uses proptest to generate random inputs and verify invariants.

use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use proptest::prelude::*;
use serde_json::{Value, json};

use qos_admission_webhook::crd::QoSSpec;
use qos_admission_webhook::mutation::PatchBuilder;
use qos_admission_webhook::mutation::PatchStrategy;
use qos_admission_webhook::mutation::annotations;
use qos_admission_webhook::mutation::containers::reduce_quantity;
use qos_admission_webhook::mutation::quantity::{MilliQuantity, QuantityFormat};
use qos_admission_webhook::webhooks::AdmissionObject;
use qos_admission_webhook::webhooks::policies::{self, labels};

/// Strategy for quantity suffixes of every format.
fn any_suffix() -> impl Strategy<Value = &'static str> {
    prop_oneof![
        Just("m"),
        Just(""),
        Just("k"),
        Just("M"),
        Just("G"),
        Just("Ki"),
        Just("Mi"),
        Just("Gi"),
    ]
}

/// Strategy for resource names, including extended and mixed-case resources.
fn any_resource() -> impl Strategy<Value = &'static str> {
    prop_oneof![
        Just("cpu"),
        Just("memory"),
        Just("CPU"),
        Just("Memory"),
        Just("ephemeral-storage"),
        Just("nvidia.com/gpu"),
    ]
}

/// Strategy for container request maps.
fn any_requests() -> impl Strategy<Value = BTreeMap<&'static str, String>> {
    prop::collection::btree_map(
        any_resource(),
        (1..100_000i64, any_suffix()).prop_map(|(n, s)| format!("{n}{s}")),
        0..4,
    )
}

/// Strategy for Deployments with 1-4 containers and optional annotations.
fn any_deployment() -> impl Strategy<Value = Value> {
    (
        prop::collection::vec(any_requests(), 1..5),
        prop::option::of(prop::collection::btree_map("[a-z]{1,8}", "[a-z0-9]{0,8}", 0..3)),
        any::<bool>(),
    )
        .prop_map(|(requests, annotations, has_init)| {
            let containers: Vec<Value> = requests
                .iter()
                .enumerate()
                .map(|(i, requests)| {
                    let mut container = json!({ "name": format!("c{i}"), "image": "nginx" });
                    if !requests.is_empty() {
                        container["resources"] = json!({ "requests": requests });
                    }
                    container
                })
                .collect();
            let mut pod = json!({ "containers": containers });
            if has_init {
                pod["initContainers"] = json!([{ "name": "setup", "image": "alpine" }]);
            }
            let mut deployment = json!({
                "apiVersion": "apps/v1",
                "kind": "Deployment",
                "metadata": { "name": "web", "namespace": "default" },
                "spec": { "selector": {}, "template": { "spec": pod } }
            });
            if let Some(annotations) = annotations {
                deployment["metadata"]["annotations"] = json!(annotations);
            }
            deployment
        })
}

fn apply(object: &AdmissionObject, strategy: PatchStrategy, qos: QoSSpec) -> Value {
    let patch = PatchBuilder::new(strategy).build(object, qos).unwrap();
    let mut doc = object.to_value().unwrap();
    json_patch::patch(&mut doc, &patch.0).unwrap();
    doc
}

proptest! {
    /// Property: a reduced request is floor(milli * 90 / 100) in the same format.
    #[test]
    fn reduction_is_floor_of_ninety_percent(n in 1..1_000_000i64, suffix in any_suffix()) {
        let original = MilliQuantity::parse(&format!("{n}{suffix}")).unwrap();
        let reduced = reduce_quantity(&original.to_quantity()).unwrap();
        let reduced = MilliQuantity::try_from(&reduced).unwrap();

        prop_assert_eq!(
            i128::from(reduced.milli_value()),
            (i128::from(original.milli_value()) * 90).div_euclid(100)
        );
        if reduced.format() == QuantityFormat::BinarySI {
            prop_assert_eq!(original.format(), QuantityFormat::BinarySI);
        }
    }

    /// Property: canonical output parses back to the same value.
    #[test]
    fn canonical_form_is_stable(milli in -1_000_000_000_000i64..1_000_000_000_000i64) {
        for format in [QuantityFormat::DecimalSI, QuantityFormat::BinarySI, QuantityFormat::DecimalExponent] {
            let quantity = MilliQuantity::from_milli(milli, format);
            let reparsed = MilliQuantity::parse(&quantity.to_string()).unwrap();
            prop_assert_eq!(reparsed.milli_value(), milli);
            prop_assert_eq!(reparsed.to_string(), quantity.to_string());
        }
    }

    /// Property: both strategies turn the original into the same document.
    #[test]
    fn strategies_are_equivalent(raw in any_deployment(), cpu in 1..4000i64, memory in 1..8192i64) {
        let object = AdmissionObject::decode("Deployment", &raw).unwrap();
        let qos = QoSSpec::new(cpu, memory);
        prop_assert_eq!(
            apply(&object, PatchStrategy::Construct, qos),
            apply(&object, PatchStrategy::Diff, qos)
        );
    }

    /// Property: the patched object is no longer eligible for mutation.
    #[test]
    fn mutation_is_idempotent(raw in any_deployment()) {
        let mut raw = raw;
        raw["metadata"]["annotations"][policies::ANNOTATION_MUTATE] = json!("yes");
        let object = AdmissionObject::decode("Deployment", &raw).unwrap();
        prop_assert!(policies::mutation_required(object.metadata()));

        let patched = apply(&object, PatchStrategy::Construct, QoSSpec::DEFAULT);
        let patched = AdmissionObject::decode("Deployment", &patched).unwrap();
        prop_assert!(!policies::mutation_required(patched.metadata()));

        let status: BTreeMap<String, String> =
            [(policies::ANNOTATION_STATUS.to_string(), policies::STATUS_MUTATED.to_string())].into();
        prop_assert!(annotations::merge_patch(patched.metadata().annotations.as_ref(), &status).is_empty());
    }

    /// Property: any superset of the required labels is allowed.
    #[test]
    fn label_superset_allowed(extra in prop::collection::btree_map("[a-z]{1,10}", "[a-z]{0,5}", 0..5)) {
        let mut map: BTreeMap<String, String> = extra;
        for key in labels::REQUIRED_LABELS {
            map.insert(key.to_string(), "x".to_string());
        }
        prop_assert!(labels::validate(Some(&map)).allowed);
    }

    /// Property: removing any required label denies.
    #[test]
    fn missing_label_denied(missing in 0..labels::REQUIRED_LABELS.len()) {
        let map: BTreeMap<String, String> = labels::REQUIRED_LABELS
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != missing)
            .map(|(_, key)| (key.to_string(), "x".to_string()))
            .collect();
        let result = labels::validate(Some(&map));
        prop_assert!(!result.allowed);
        prop_assert_eq!(result.reason.as_deref(), Some(labels::REASON_MISSING_LABELS));
        prop_assert!(result.message.unwrap().contains(labels::REQUIRED_LABELS[missing]));
    }
}

#[test]
fn mixed_case_requests_agree_across_strategies() {
    let raw = json!({
        "apiVersion": "apps/v1",
        "kind": "Deployment",
        "metadata": { "name": "web", "namespace": "default" },
        "spec": {
            "selector": {},
            "template": { "spec": { "containers": [{
                "name": "web",
                "image": "nginx",
                "resources": { "requests": { "CPU": "1", "Memory": "1000Mi" } }
            }] } }
        }
    });
    let object = AdmissionObject::decode("Deployment", &raw).unwrap();
    let constructed = apply(&object, PatchStrategy::Construct, QoSSpec::DEFAULT);
    assert_eq!(constructed, apply(&object, PatchStrategy::Diff, QoSSpec::DEFAULT));

    let requests = &constructed["spec"]["template"]["spec"]["containers"][0]["resources"]["requests"];
    assert_eq!(requests, &json!({ "cpu": "900m", "memory": "900Mi" }));
}

#[test]
fn reduce_quantity_keeps_binary_suffix() {
    let reduced = reduce_quantity(&Quantity("1000Mi".to_string())).unwrap();
    assert_eq!(reduced, Quantity("900Mi".to_string()));
}
