//! Client configuration: credentials, endpoints and polling budget

use std::fmt;
use std::time::Duration;

pub const DEFAULT_COMPUTE_ENDPOINT: &str = "https://api.exoscale.com/v1";
pub const DEFAULT_DNS_ENDPOINT: &str = "https://api.exoscale.com/dns";
pub const DEFAULT_ENVIRONMENT: &str = "api";

/// API key pair
#[derive(Clone)]
pub struct Credentials {
    pub key: String,
    pub secret: String,
}

impl Credentials {
    pub fn new(key: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            secret: secret.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("key", &self.key)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Budget for waiting on asynchronous work (v1 jobs, v2 operations)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    /// Delay between two polls
    pub delay: Duration,

    /// Maximum number of polls after the initial submission
    pub retries: u32,
}

impl PollConfig {
    /// Derive a budget so that `retries * delay` covers `timeout`.
    pub fn from_timeout(timeout: Duration, delay: Duration) -> Self {
        let delay = delay.clamp(Duration::from_secs(1), timeout.max(Duration::from_secs(1)));
        let retries = (timeout.as_secs() / delay.as_secs().max(1)).max(1) as u32;
        Self { delay, retries }
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self::from_timeout(Duration::from_secs(60), Duration::from_secs(5))
    }
}

/// Everything needed to talk to the three API surfaces
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub credentials: Credentials,

    /// Legacy v1 command endpoint
    pub compute_endpoint: String,

    /// DNS API base (the `/v1` suffix is added per request)
    pub dns_endpoint: String,

    /// Environment prefix of the zonal v2 endpoints (`api` in production)
    pub environment: String,

    pub poll: PollConfig,

    /// Per HTTP request timeout
    pub request_timeout: Duration,
}

impl ClientConfig {
    pub fn new(key: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            credentials: Credentials::new(key, secret),
            compute_endpoint: DEFAULT_COMPUTE_ENDPOINT.to_string(),
            dns_endpoint: DEFAULT_DNS_ENDPOINT.to_string(),
            environment: DEFAULT_ENVIRONMENT.to_string(),
            poll: PollConfig::default(),
            request_timeout: Duration::from_secs(60),
        }
    }

    pub fn with_compute_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.compute_endpoint = endpoint.into();
        self
    }

    pub fn with_dns_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.dns_endpoint = endpoint.into();
        self
    }

    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = environment.into();
        self
    }

    pub fn with_poll(mut self, poll: PollConfig) -> Self {
        self.poll = poll;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Zonal v2 endpoint, e.g. `https://api-ch-gva-2.exoscale.com/v2`
    pub fn v2_endpoint(&self, zone: &str) -> String {
        format!("https://{}-{}.exoscale.com/v2", self.environment, zone)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_v2_endpoint() {
        let config = ClientConfig::new("EXOkey", "secret");
        assert_eq!(
            config.v2_endpoint("ch-gva-2"),
            "https://api-ch-gva-2.exoscale.com/v2"
        );

        let config = config.with_environment("ppapi");
        assert_eq!(
            config.v2_endpoint("de-fra-1"),
            "https://ppapi-de-fra-1.exoscale.com/v2"
        );
    }

    #[test]
    fn test_poll_from_timeout() {
        let poll = PollConfig::from_timeout(Duration::from_secs(300), Duration::from_secs(10));
        assert_eq!(poll.retries, 30);
        assert_eq!(poll.delay, Duration::from_secs(10));

        // delay larger than the timeout is clamped
        let poll = PollConfig::from_timeout(Duration::from_secs(5), Duration::from_secs(30));
        assert_eq!(poll.delay, Duration::from_secs(5));
        assert_eq!(poll.retries, 1);
    }

    #[test]
    fn test_credentials_debug_redacts_secret() {
        let creds = Credentials::new("EXOkey", "topsecret");
        let debug = format!("{:?}", creds);
        assert!(debug.contains("EXOkey"));
        assert!(!debug.contains("topsecret"));
    }
}
