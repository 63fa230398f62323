//! Runtime configuration read from the environment.

use std::path::PathBuf;

use tracing::warn;

use crate::mutation::PatchStrategy;

/// Default path to webhook TLS certificate
pub const WEBHOOK_CERT_PATH: &str = "/etc/webhook/certs/tls.crt";
/// Default path to webhook TLS private key
pub const WEBHOOK_KEY_PATH: &str = "/etc/webhook/certs/tls.key";
/// Default webhook server port
pub const WEBHOOK_PORT: u16 = 9443;
/// Default health server port
pub const HEALTH_PORT: u16 = 8080;

/// Webhook process configuration
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WebhookConfig {
    /// HTTPS port serving `/mutate` and `/validate`
    pub webhook_port: u16,
    /// Plain HTTP port serving probes and metrics
    pub health_port: u16,
    /// PEM certificate chain
    pub cert_path: PathBuf,
    /// PEM private key
    pub key_path: PathBuf,
    pub patch_strategy: PatchStrategy,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            webhook_port: WEBHOOK_PORT,
            health_port: HEALTH_PORT,
            cert_path: PathBuf::from(WEBHOOK_CERT_PATH),
            key_path: PathBuf::from(WEBHOOK_KEY_PATH),
            patch_strategy: PatchStrategy::default(),
        }
    }
}

impl WebhookConfig {
    /// Read `WEBHOOK_PORT`, `HEALTH_PORT`, `TLS_CERT_FILE`, `TLS_KEY_FILE`
    /// and `PATCH_STRATEGY`, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source.
    ///
    /// Invalid values are logged and replaced by the default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            webhook_port: parsed(&lookup, "WEBHOOK_PORT", defaults.webhook_port),
            health_port: parsed(&lookup, "HEALTH_PORT", defaults.health_port),
            cert_path: lookup("TLS_CERT_FILE")
                .filter(|v| !v.is_empty())
                .map_or(defaults.cert_path, PathBuf::from),
            key_path: lookup("TLS_KEY_FILE")
                .filter(|v| !v.is_empty())
                .map_or(defaults.key_path, PathBuf::from),
            patch_strategy: parsed(&lookup, "PATCH_STRATEGY", defaults.patch_strategy),
        }
    }

    /// Whether both TLS files exist
    pub fn tls_available(&self) -> bool {
        self.cert_path.exists() && self.key_path.exists()
    }
}

fn parsed<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: std::str::FromStr + std::fmt::Display,
{
    let Some(raw) = lookup(key).filter(|v| !v.is_empty()) else {
        return default;
    };
    match raw.parse() {
        Ok(value) => value,
        Err(_) => {
            warn!(key, value = %raw, default = %default, "Invalid configuration value, using default");
            default
        }
    }
}
