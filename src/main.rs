//! qos-admission-webhook - Kubernetes admission webhook for workload labels and QoS.
//!
//! This is the main entry point that:
//! - Initializes structured logging
//! - Reads configuration from the environment
//! - Starts the health server and, when certificates are present, the webhook server

use std::sync::Arc;
use std::time::Duration;

use tokio::signal;
use tracing::{error, info, warn};

use qos_admission_webhook::health::{HealthState, run_health_server};
use qos_admission_webhook::{
    AdmissionHandler, PatchBuilder, QosStore, WebhookConfig, run_webhook_server,
};

/// Grace period for in-flight reviews to complete during shutdown
const SHUTDOWN_GRACE_PERIOD_SECS: u64 = 2;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("qos_admission_webhook=info".parse()?),
        )
        .json()
        .init();

    info!("Starting qos-admission-webhook");

    let config = WebhookConfig::from_env();
    info!(
        webhook_port = config.webhook_port,
        health_port = config.health_port,
        patch_strategy = %config.patch_strategy,
        "Loaded configuration"
    );

    let health_state = Arc::new(HealthState::new());
    let store = Arc::new(QosStore::new());
    let handler = Arc::new(
        AdmissionHandler::new(store, PatchBuilder::new(config.patch_strategy))
            .with_health(health_state.clone()),
    );

    // Start health server immediately so liveness probes pass during startup
    let health_handle = {
        let health_state = health_state.clone();
        let port = config.health_port;
        tokio::spawn(async move {
            if let Err(e) = run_health_server(health_state, port).await {
                error!("Health server error: {}", e);
            }
        })
    };

    // Start webhook server if certificates are available
    let webhook_handle = if config.tls_available() {
        info!("TLS certificates found, starting webhook server");
        health_state.set_ready(true).await;
        let config = config.clone();
        Some(tokio::spawn(async move {
            if let Err(e) = run_webhook_server(&config, handler).await {
                error!("Webhook server error: {}", e);
            }
        }))
    } else {
        warn!(
            cert = %config.cert_path.display(),
            key = %config.key_path.display(),
            "Webhook certificates not found, webhook server disabled"
        );
        None
    };

    // Wait for any task to complete (or fail), or shutdown signal
    tokio::select! {
        result = health_handle => {
            if let Err(e) = result {
                error!("Health server task panicked: {}", e);
            }
        }
        result = async {
            match webhook_handle {
                Some(handle) => handle.await,
                None => std::future::pending().await,
            }
        } => {
            if let Err(e) = result {
                error!("Webhook server task panicked: {}", e);
            }
        }
        // Handle graceful shutdown on SIGTERM or SIGINT
        _ = shutdown_signal() => {
            info!("Received shutdown signal, initiating graceful shutdown...");

            // Mark as not ready so the endpoint is removed from the Service
            health_state.set_ready(false).await;
            info!("Marked webhook as not ready");

            tokio::time::sleep(Duration::from_secs(SHUTDOWN_GRACE_PERIOD_SECS)).await;
            info!("Grace period complete, shutting down");
        }
    }

    info!("Webhook stopped");
    Ok(())
}

/// Wait for shutdown signal (SIGTERM or SIGINT)
///
/// Note: Signal handler setup failures are fatal - the webhook cannot shut down
/// gracefully without them. Using expect() here is intentional.
#[allow(clippy::expect_used)]
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
