//! Admission webhook server.
//!
//! Serves `/mutate` and `/validate` over TLS. Requests with an empty body
//! are answered with 400 and requests that are not `application/json` with
//! 415, before any review is parsed. Everything else gets a 200 carrying an
//! AdmissionReview.
//!
//! To enable the webhook:
//! 1. Issue a serving certificate (e.g. with cert-manager)
//! 2. Mount it at /etc/webhook/certs/ (or point TLS_CERT_FILE/TLS_KEY_FILE at it)
//! 3. Register a MutatingWebhookConfiguration and a ValidatingWebhookConfiguration

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode, header::CONTENT_TYPE},
    response::{IntoResponse, Response},
    routing::post,
};
use axum_server::tls_rustls::RustlsConfig;
use thiserror::Error;
use tracing::{info, warn};

use super::handler::{AdmissionHandler, Endpoint};
use crate::config::WebhookConfig;

/// Errors that can occur when running the webhook server
#[derive(Error, Debug)]
pub enum WebhookError {
    /// TLS configuration error
    #[error("TLS configuration error: {0}")]
    TlsConfig(String),

    /// Server error
    #[error("Webhook server error: {0}")]
    Server(String),
}

/// Create the webhook router
pub fn create_webhook_router(handler: Arc<AdmissionHandler>) -> Router {
    Router::new()
        .route("/mutate", post(mutate))
        .route("/validate", post(validate))
        .with_state(handler)
}

async fn mutate(
    State(handler): State<Arc<AdmissionHandler>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    serve(&handler, Endpoint::Mutate, &headers, &body)
}

async fn validate(
    State(handler): State<Arc<AdmissionHandler>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    serve(&handler, Endpoint::Validate, &headers, &body)
}

/// Whether the declared media type is `application/json`, parameters ignored
fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .is_some_and(|media_type| media_type.trim().eq_ignore_ascii_case("application/json"))
}

fn serve(handler: &AdmissionHandler, endpoint: Endpoint, headers: &HeaderMap, body: &[u8]) -> Response {
    if body.is_empty() {
        warn!(endpoint = endpoint.as_str(), "Rejecting request with empty body");
        return (StatusCode::BAD_REQUEST, "empty body").into_response();
    }

    if !is_json(headers) {
        let content_type = headers
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default();
        warn!(
            endpoint = endpoint.as_str(),
            content_type = %content_type,
            "Rejecting request with unsupported content type"
        );
        return (
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            format!("Content-Type={content_type}, expect `application/json`"),
        )
            .into_response();
    }

    (StatusCode::OK, Json(handler.review(endpoint, body))).into_response()
}

/// Run the webhook server with TLS
///
/// Binds to `0.0.0.0:<webhook_port>` and loads the PEM certificate and key
/// named by `config`.
pub async fn run_webhook_server(
    config: &WebhookConfig,
    handler: Arc<AdmissionHandler>,
) -> Result<(), WebhookError> {
    let app = create_webhook_router(handler);

    let tls = RustlsConfig::from_pem_file(&config.cert_path, &config.key_path)
        .await
        .map_err(|e| WebhookError::TlsConfig(e.to_string()))?;

    let addr = SocketAddr::from(([0, 0, 0, 0], config.webhook_port));
    info!(port = config.webhook_port, "Webhook server listening with TLS");

    axum_server::bind_rustls(addr, tls)
        .serve(app.into_make_service())
        .await
        .map_err(|e| WebhookError::Server(e.to_string()))?;

    Ok(())
}
