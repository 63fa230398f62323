//! Test fixtures and builder patterns for AdmissionReview bodies.

#![allow(dead_code)]

use std::collections::BTreeMap;

use serde_json::{Value, json};

/// Every label the validating endpoint requires.
pub fn required_labels() -> BTreeMap<String, String> {
    [
        ("app.kubernetes.io/name", "web"),
        ("app.kubernetes.io/instance", "web-prod"),
        ("app.kubernetes.io/version", "1.0.0"),
        ("app.kubernetes.io/component", "frontend"),
        ("app.kubernetes.io/part-of", "shop"),
        ("app.kubernetes.io/managed-by", "helm"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

/// Builder for AdmissionReview request bodies.
///
/// # Example
/// ```
/// let body = ReviewBuilder::deployment("web")
///     .namespace("shop")
///     .annotation("admission-webhook-example.qikqiak.com/mutate", "yes")
///     .container("web", &[("cpu", "500m")])
///     .build();
/// ```
#[derive(Clone, Debug)]
pub struct ReviewBuilder {
    api_version: String,
    uid: String,
    kind: String,
    group: String,
    operation: String,
    name: String,
    namespace: Option<String>,
    object_namespace: Option<String>,
    labels: BTreeMap<String, String>,
    annotations: BTreeMap<String, String>,
    containers: Vec<Value>,
    init_containers: Vec<Value>,
    spec: Option<Value>,
    old_object: Option<Value>,
    omit_object: bool,
}

impl ReviewBuilder {
    fn new(group: &str, kind: &str, name: impl Into<String>) -> Self {
        Self {
            api_version: "admission.k8s.io/v1".to_string(),
            uid: "e911857d-c318-11e8-bbad-025000000001".to_string(),
            kind: kind.to_string(),
            group: group.to_string(),
            operation: "CREATE".to_string(),
            name: name.into(),
            namespace: Some("default".to_string()),
            object_namespace: None,
            labels: BTreeMap::new(),
            annotations: BTreeMap::new(),
            containers: Vec::new(),
            init_containers: Vec::new(),
            spec: None,
            old_object: None,
            omit_object: false,
        }
    }

    pub fn deployment(name: impl Into<String>) -> Self {
        Self::new("apps", "Deployment", name)
    }

    pub fn service(name: impl Into<String>) -> Self {
        Self::new("", "Service", name).spec(json!({ "ports": [{ "port": 80 }] }))
    }

    pub fn qos(name: impl Into<String>, cpu: i64, memory: i64) -> Self {
        Self::new("admission-webhook-example.qikqiak.com", "QoS", name)
            .namespace_none()
            .spec(json!({ "cpu": cpu, "memory": memory }))
    }

    /// Any other kind, with an empty object
    pub fn other(group: &str, kind: &str, name: impl Into<String>) -> Self {
        Self::new(group, kind, name)
    }

    pub fn api_version(mut self, api_version: &str) -> Self {
        self.api_version = api_version.to_string();
        self
    }

    pub fn uid(mut self, uid: &str) -> Self {
        self.uid = uid.to_string();
        self
    }

    pub fn operation(mut self, operation: &str) -> Self {
        self.operation = operation.to_string();
        self
    }

    /// Namespace of the request (the object itself omits it)
    pub fn namespace(mut self, namespace: &str) -> Self {
        self.namespace = Some(namespace.to_string());
        self
    }

    pub fn namespace_none(mut self) -> Self {
        self.namespace = None;
        self
    }

    /// Namespace written into the object's metadata
    pub fn object_namespace(mut self, namespace: &str) -> Self {
        self.object_namespace = Some(namespace.to_string());
        self
    }

    pub fn label(mut self, key: &str, value: &str) -> Self {
        self.labels.insert(key.to_string(), value.to_string());
        self
    }

    pub fn labels(mut self, labels: BTreeMap<String, String>) -> Self {
        self.labels.extend(labels);
        self
    }

    pub fn annotation(mut self, key: &str, value: &str) -> Self {
        self.annotations.insert(key.to_string(), value.to_string());
        self
    }

    pub fn container(mut self, name: &str, requests: &[(&str, &str)]) -> Self {
        self.containers.push(container(name, requests));
        self
    }

    pub fn init_container(mut self, name: &str) -> Self {
        self.init_containers.push(json!({ "name": name, "image": "alpine" }));
        self
    }

    pub fn spec(mut self, spec: Value) -> Self {
        self.spec = Some(spec);
        self
    }

    pub fn old_object(mut self, old_object: Value) -> Self {
        self.old_object = Some(old_object);
        self
    }

    pub fn without_object(mut self) -> Self {
        self.omit_object = true;
        self
    }

    /// The object carried by the request
    pub fn object(&self) -> Value {
        let mut metadata = json!({ "name": self.name });
        if let Some(namespace) = &self.object_namespace {
            metadata["namespace"] = json!(namespace);
        }
        if !self.labels.is_empty() {
            metadata["labels"] = json!(self.labels);
        }
        if !self.annotations.is_empty() {
            metadata["annotations"] = json!(self.annotations);
        }

        let spec = match (&self.spec, self.kind.as_str()) {
            (Some(spec), _) => spec.clone(),
            (None, "Deployment") => {
                let mut pod = json!({ "containers": self.containers });
                if !self.init_containers.is_empty() {
                    pod["initContainers"] = json!(self.init_containers);
                }
                json!({
                    "selector": { "matchLabels": { "app": self.name } },
                    "template": {
                        "metadata": { "labels": { "app": self.name } },
                        "spec": pod
                    }
                })
            }
            (None, _) => json!({}),
        };

        let api_version = match self.group.as_str() {
            "" => "v1".to_string(),
            group => format!("{group}/v1"),
        };
        json!({
            "apiVersion": api_version,
            "kind": self.kind,
            "metadata": metadata,
            "spec": spec
        })
    }

    /// The review as a JSON value
    pub fn review(&self) -> Value {
        let mut request = json!({
            "uid": self.uid,
            "kind": { "group": self.group, "version": "v1", "kind": self.kind },
            "resource": {
                "group": self.group,
                "version": "v1",
                "resource": format!("{}s", self.kind.to_lowercase())
            },
            "name": self.name,
            "operation": self.operation,
            "userInfo": { "username": "system:serviceaccount:default:deployer" },
            "dryRun": false
        });
        if let Some(namespace) = &self.namespace {
            request["namespace"] = json!(namespace);
        }
        if !self.omit_object {
            request["object"] = self.object();
        }
        if let Some(old_object) = &self.old_object {
            request["oldObject"] = old_object.clone();
        }
        json!({
            "apiVersion": self.api_version,
            "kind": "AdmissionReview",
            "request": request
        })
    }

    /// The review as a request body
    pub fn build(&self) -> Vec<u8> {
        serde_json::to_vec(&self.review()).unwrap_or_default()
    }
}

/// A container JSON value with the given requests
pub fn container(name: &str, requests: &[(&str, &str)]) -> Value {
    let mut container = json!({ "name": name, "image": "nginx:1.27" });
    if !requests.is_empty() {
        let requests: BTreeMap<&str, &str> = requests.iter().copied().collect();
        container["resources"] = json!({ "requests": requests });
    }
    container
}
