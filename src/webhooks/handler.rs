//! Admission request handling.
//!
//! Runs one review through the core: decode the object for its kind, ask
//! the policy gate, then validate labels or build a patch. QoS objects
//! update the shared store instead of being mutated.

use std::sync::Arc;
use std::time::Instant;

use kube::Resource;
use kube::core::DynamicObject;
use kube::core::admission::{AdmissionRequest, AdmissionResponse, AdmissionReview, Operation};
use tracing::{debug, info, warn};

use super::dispatch::AdmissionObject;
use super::error::{AdmissionError, Result};
use super::policies::{self, labels};
use super::review::{self, Verdict, assemble};
use crate::crd::QoS;
use crate::health::HealthState;
use crate::mutation::PatchBuilder;
use crate::store::QosStore;

/// Admission endpoints served by the webhook
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Endpoint {
    Mutate,
    Validate,
}

impl Endpoint {
    pub fn as_str(&self) -> &'static str {
        match self {
            Endpoint::Mutate => "mutate",
            Endpoint::Validate => "validate",
        }
    }
}

/// Shared state of the admission endpoints
pub struct AdmissionHandler {
    store: Arc<QosStore>,
    builder: PatchBuilder,
    health: Option<Arc<HealthState>>,
}

impl AdmissionHandler {
    pub fn new(store: Arc<QosStore>, builder: PatchBuilder) -> Self {
        Self {
            store,
            builder,
            health: None,
        }
    }

    /// Record admission metrics into `health`.
    pub fn with_health(mut self, health: Arc<HealthState>) -> Self {
        self.health = Some(health);
        self
    }

    pub fn store(&self) -> &QosStore {
        &self.store
    }

    /// Answer a raw AdmissionReview body sent to `endpoint`.
    ///
    /// Never fails: every error becomes a rejected response.
    pub fn review(&self, endpoint: Endpoint, body: &[u8]) -> AdmissionReview<DynamicObject> {
        let start = Instant::now();
        let review = match review::parse(body) {
            Ok(review) => review,
            Err(e) => {
                warn!(endpoint = endpoint.as_str(), error = %e, "Failed to parse AdmissionReview");
                let response = review::invalid(None, &e);
                return self.respond(endpoint, start, "unknown", response);
            }
        };

        let types = review.types.clone();
        let request: AdmissionRequest<DynamicObject> = match review.try_into() {
            Ok(request) => request,
            Err(_) => {
                let e = AdmissionError::MissingRequest;
                warn!(endpoint = endpoint.as_str(), error = %e, "Admission request rejected");
                let response = review::invalid(Some(types), &e);
                return self.respond(endpoint, start, "unknown", response);
            }
        };

        let outcome = self.handle(endpoint, &request);
        if let Err(e) = &outcome {
            warn!(
                uid = %request.uid,
                kind = %request.kind.kind,
                reason = e.reason(),
                error = %e,
                "Admission request rejected"
            );
        }
        let response = assemble(&request, outcome);
        self.respond(endpoint, start, &request.kind.kind, response)
    }

    fn respond(
        &self,
        endpoint: Endpoint,
        start: Instant,
        kind: &str,
        response: AdmissionResponse,
    ) -> AdmissionReview<DynamicObject> {
        let result = review::outcome(&response);
        info!(
            uid = %response.uid,
            endpoint = endpoint.as_str(),
            kind = %kind,
            result,
            "Admission request handled"
        );

        if let Some(health) = &self.health {
            health.metrics.record_admission(
                endpoint.as_str(),
                kind,
                result,
                start.elapsed().as_secs_f64(),
            );
        }

        response.into_review()
    }

    /// Decide a single admission request.
    pub fn handle(
        &self,
        endpoint: Endpoint,
        request: &AdmissionRequest<DynamicObject>,
    ) -> Result<Verdict> {
        debug!(
            uid = %request.uid,
            kind = %request.kind.kind,
            operation = ?request.operation,
            namespace = ?request.namespace,
            name = %request.name,
            "Processing admission request"
        );
        match endpoint {
            Endpoint::Validate => self.validate(request),
            Endpoint::Mutate => self.mutate(request),
        }
    }

    /// Required-label validation.
    pub fn validate(&self, request: &AdmissionRequest<DynamicObject>) -> Result<Verdict> {
        if request.operation == Operation::Delete {
            return Ok(Verdict::Allowed);
        }

        let object = decode_object(request)?;
        if !policies::validation_required(object.metadata()) {
            return Ok(Verdict::Allowed);
        }

        let result = labels::validate(object.labels());
        if !result.allowed {
            warn!(
                uid = %request.uid,
                kind = object.kind(),
                message = ?result.message,
                "Admission request denied"
            );
        }
        Ok(result.into())
    }

    /// Mutation, or a store update for QoS objects.
    pub fn mutate(&self, request: &AdmissionRequest<DynamicObject>) -> Result<Verdict> {
        if is_qos(request) {
            return self.apply_qos(request);
        }
        if request.operation == Operation::Delete {
            return Ok(Verdict::Allowed);
        }

        let object = decode_object(request)?;
        if !policies::mutation_required(object.metadata()) {
            return Ok(Verdict::Allowed);
        }

        let patch = self.builder.build(&object, self.store.get())?;
        Ok(Verdict::Patched(patch))
    }

    /// Update the QoS store from an admitted QoS object. Always allowed.
    ///
    /// Deletion resets the store; an object with an empty spec leaves it
    /// untouched.
    pub fn apply_qos(&self, request: &AdmissionRequest<DynamicObject>) -> Result<Verdict> {
        let raw = match request.operation {
            Operation::Delete => request.old_object.as_ref(),
            _ => request.object.as_ref(),
        }
        .ok_or_else(|| AdmissionError::MissingObject {
            operation: request.operation.clone(),
        })?;

        let AdmissionObject::QoS(qos) = AdmissionObject::from_dynamic(&request.kind, raw)? else {
            return Err(AdmissionError::UnsupportedKind(request.kind.kind.clone()));
        };

        if request.operation == Operation::Delete {
            info!(uid = %request.uid, name = ?qos.metadata.name, "QoS deleted, resetting to defaults");
            self.store.reset();
        } else if qos.spec.is_unset() {
            info!(uid = %request.uid, name = ?qos.metadata.name, "Ignoring QoS with empty spec");
        } else {
            self.store.set(qos.spec);
        }
        Ok(Verdict::Allowed)
    }
}

/// Whether the request targets the QoS custom resource, by group and kind.
fn is_qos(request: &AdmissionRequest<DynamicObject>) -> bool {
    request.kind.kind == QoS::kind(&()) && request.kind.group == QoS::group(&())
}

/// Decode the request object, defaulting its namespace to the request's.
fn decode_object(request: &AdmissionRequest<DynamicObject>) -> Result<AdmissionObject> {
    let raw = request
        .object
        .as_ref()
        .ok_or_else(|| AdmissionError::MissingObject {
            operation: request.operation.clone(),
        })?;
    let mut object = AdmissionObject::from_dynamic(&request.kind, raw)?;

    let metadata = object.metadata_mut();
    if metadata.namespace.is_none() {
        metadata.namespace.clone_from(&request.namespace);
    }
    Ok(object)
}
