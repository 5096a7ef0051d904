//! Provider configuration
//!
//! Values come from three layers, highest priority first: attributes given
//! explicitly (provider block or config file), environment variables, and
//! built-in defaults.

use crate::error::{ProviderError, Result};
use exoscale_client::config::{DEFAULT_COMPUTE_ENDPOINT, DEFAULT_DNS_ENDPOINT, DEFAULT_ENVIRONMENT};
use exoscale_client::{ClientConfig, PollConfig};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_DELAY_SECS: u64 = 5;
pub const DEFAULT_ZONE: &str = "ch-gva-2";

const KEY_VARS: &[&str] = &[
    "EXOSCALE_KEY",
    "EXOSCALE_API_KEY",
    "CLOUDSTACK_KEY",
    "CLOUDSTACK_API_KEY",
];
const SECRET_VARS: &[&str] = &[
    "EXOSCALE_SECRET",
    "EXOSCALE_API_SECRET",
    "CLOUDSTACK_SECRET",
    "CLOUDSTACK_SECRET_KEY",
];
const COMPUTE_ENDPOINT_VARS: &[&str] = &["EXOSCALE_COMPUTE_ENDPOINT", "CLOUDSTACK_ENDPOINT"];
const DNS_ENDPOINT_VARS: &[&str] = &["EXOSCALE_DNS_ENDPOINT"];
const TIMEOUT_VARS: &[&str] = &["EXOSCALE_TIMEOUT"];
const ENVIRONMENT_VARS: &[&str] = &["EXOSCALE_API_ENVIRONMENT"];
const ZONE_VARS: &[&str] = &["EXOSCALE_ZONE"];

/// Provider block attributes as the user wrote them
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RawConfig {
    pub key: Option<String>,
    pub secret: Option<String>,
    pub compute_endpoint: Option<String>,
    pub dns_endpoint: Option<String>,
    pub environment: Option<String>,
    pub timeout: Option<u64>,
    pub delay: Option<u64>,
    pub gzip_user_data: Option<bool>,
    pub zone: Option<String>,
}

/// Resolved provider configuration, immutable once built
#[derive(Clone, PartialEq)]
pub struct ProviderConfig {
    pub key: String,
    pub secret: String,
    pub compute_endpoint: String,
    pub dns_endpoint: String,
    pub environment: String,
    pub timeout: Duration,
    /// Polling interval for asynchronous jobs and operations
    pub delay: Duration,
    pub gzip_user_data: bool,
    /// Endpoint zone for resources that are not zonal
    pub zone: String,
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("key", &self.key)
            .field("secret", &"<redacted>")
            .field("compute_endpoint", &self.compute_endpoint)
            .field("dns_endpoint", &self.dns_endpoint)
            .field("environment", &self.environment)
            .field("timeout", &self.timeout)
            .field("delay", &self.delay)
            .field("gzip_user_data", &self.gzip_user_data)
            .field("zone", &self.zone)
            .finish()
    }
}

impl ProviderConfig {
    /// Resolve explicit attributes against the environment and defaults.
    pub fn resolve(raw: RawConfig) -> Result<Self> {
        let key = raw.key.or_else(|| env_first(KEY_VARS)).unwrap_or_default();
        let secret = raw
            .secret
            .or_else(|| env_first(SECRET_VARS))
            .unwrap_or_default();

        if key.is_empty() {
            return Err(ProviderError::Config(format!(
                "missing API key, set `key` or one of {}",
                KEY_VARS.join(", ")
            )));
        }
        if secret.is_empty() {
            return Err(ProviderError::Config(format!(
                "missing API secret, set `secret` or one of {}",
                SECRET_VARS.join(", ")
            )));
        }

        let timeout_secs = match raw.timeout {
            Some(t) => t,
            None => match env_first(TIMEOUT_VARS) {
                Some(v) => v.parse().map_err(|_| {
                    ProviderError::Config(format!("EXOSCALE_TIMEOUT {:?} is not a number of seconds", v))
                })?,
                None => DEFAULT_TIMEOUT_SECS,
            },
        };
        if timeout_secs == 0 {
            return Err(ProviderError::Config("timeout must be positive".to_string()));
        }

        let delay_secs = raw
            .delay
            .unwrap_or(DEFAULT_DELAY_SECS)
            .clamp(1, timeout_secs);

        Ok(Self {
            key,
            secret,
            compute_endpoint: raw
                .compute_endpoint
                .or_else(|| env_first(COMPUTE_ENDPOINT_VARS))
                .unwrap_or_else(|| DEFAULT_COMPUTE_ENDPOINT.to_string()),
            dns_endpoint: raw
                .dns_endpoint
                .or_else(|| env_first(DNS_ENDPOINT_VARS))
                .unwrap_or_else(|| DEFAULT_DNS_ENDPOINT.to_string()),
            environment: raw
                .environment
                .or_else(|| env_first(ENVIRONMENT_VARS))
                .unwrap_or_else(|| DEFAULT_ENVIRONMENT.to_string()),
            timeout: Duration::from_secs(timeout_secs),
            delay: Duration::from_secs(delay_secs),
            gzip_user_data: raw.gzip_user_data.unwrap_or(true),
            zone: raw
                .zone
                .or_else(|| env_first(ZONE_VARS))
                .unwrap_or_else(|| DEFAULT_ZONE.to_string()),
        })
    }

    /// Configuration from the environment alone
    pub fn from_env() -> Result<Self> {
        Self::resolve(RawConfig::default())
    }

    /// Read provider attributes from a JSON file, then resolve them.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            ProviderError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        let raw: RawConfig = serde_json::from_str(&content)?;
        Self::resolve(raw)
    }

    pub fn poll(&self) -> PollConfig {
        PollConfig::from_timeout(self.timeout, self.delay)
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig::new(&self.key, &self.secret)
            .with_compute_endpoint(&self.compute_endpoint)
            .with_dns_endpoint(&self.dns_endpoint)
            .with_environment(&self.environment)
            .with_poll(self.poll())
            .with_request_timeout(self.timeout)
    }
}

fn env_first(names: &[&str]) -> Option<String> {
    names
        .iter()
        .filter_map(|name| std::env::var(name).ok())
        .find(|value| !value.is_empty())
}
