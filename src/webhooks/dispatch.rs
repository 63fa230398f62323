//! Decoding of admitted objects into typed views.
//!
//! The webhook handles a closed set of kinds. Each decodes into a variant of
//! [`AdmissionObject`], which exposes the metadata every policy needs and the
//! pod spec for workload kinds, so the patch builder is written once against
//! those accessors.

use std::borrow::Cow;
use std::collections::BTreeMap;

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{PodSpec, Service};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::Resource;
use kube::core::{DynamicObject, GroupVersionKind};
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::error::{AdmissionError, Result};
use crate::crd::QoS;

/// A decoded object of one of the supported kinds
#[derive(Clone, Debug)]
pub enum AdmissionObject {
    Deployment(Box<Deployment>),
    Service(Box<Service>),
    QoS(Box<QoS>),
}

fn decode_as<T: DeserializeOwned>(kind: &str, raw: &Value) -> Result<T> {
    T::deserialize(raw).map_err(|source| AdmissionError::Malformed {
        kind: kind.to_string(),
        source,
    })
}

/// API group of each supported kind
fn group_of(kind: &str) -> Option<Cow<'static, str>> {
    match kind {
        "Deployment" => Some(<Deployment as Resource>::group(&())),
        "Service" => Some(<Service as Resource>::group(&())),
        "QoS" => Some(QoS::group(&())),
        _ => None,
    }
}

impl AdmissionObject {
    /// Decode the object of an admission request of type `gvk`.
    ///
    /// Both group and kind must match a supported type.
    pub fn from_dynamic(gvk: &GroupVersionKind, object: &DynamicObject) -> Result<Self> {
        if group_of(&gvk.kind).is_none_or(|group| group != gvk.group) {
            let name = match gvk.group.as_str() {
                "" => gvk.kind.clone(),
                group => format!("{}/{}", group, gvk.kind),
            };
            return Err(AdmissionError::UnsupportedKind(name));
        }

        let raw = serde_json::to_value(object).map_err(|source| AdmissionError::Malformed {
            kind: gvk.kind.clone(),
            source,
        })?;
        Self::decode(&gvk.kind, &raw)
    }

    /// Decode `raw` as the object named by `kind`.
    pub fn decode(kind: &str, raw: &Value) -> Result<Self> {
        match kind {
            "Deployment" => Ok(Self::Deployment(Box::new(decode_as(kind, raw)?))),
            "Service" => Ok(Self::Service(Box::new(decode_as(kind, raw)?))),
            "QoS" => Ok(Self::QoS(Box::new(decode_as(kind, raw)?))),
            other => Err(AdmissionError::UnsupportedKind(other.to_string())),
        }
    }

    /// Kind name of the decoded object
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Deployment(_) => "Deployment",
            Self::Service(_) => "Service",
            Self::QoS(_) => "QoS",
        }
    }

    pub fn metadata(&self) -> &ObjectMeta {
        match self {
            Self::Deployment(d) => &d.metadata,
            Self::Service(s) => &s.metadata,
            Self::QoS(q) => &q.metadata,
        }
    }

    pub fn metadata_mut(&mut self) -> &mut ObjectMeta {
        match self {
            Self::Deployment(d) => &mut d.metadata,
            Self::Service(s) => &mut s.metadata,
            Self::QoS(q) => &mut q.metadata,
        }
    }

    /// Labels of the object, if any are set
    pub fn labels(&self) -> Option<&BTreeMap<String, String>> {
        self.metadata().labels.as_ref()
    }

    /// Pod template spec for workload kinds
    pub fn pod_spec(&self) -> Option<&PodSpec> {
        match self {
            Self::Deployment(d) => d.spec.as_ref()?.template.spec.as_ref(),
            Self::Service(_) | Self::QoS(_) => None,
        }
    }

    pub fn pod_spec_mut(&mut self) -> Option<&mut PodSpec> {
        match self {
            Self::Deployment(d) => d.spec.as_mut()?.template.spec.as_mut(),
            Self::Service(_) | Self::QoS(_) => None,
        }
    }

    /// Serialize back to JSON, as the API server would see the object
    pub fn to_value(&self) -> serde_json::Result<Value> {
        match self {
            Self::Deployment(d) => serde_json::to_value(d),
            Self::Service(s) => serde_json::to_value(s),
            Self::QoS(q) => serde_json::to_value(q),
        }
    }
}
