use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Tunables shared by the services and the check scanner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Maximum number of checks a single user may own (default: 5).
    pub max_checks: usize,
    /// Lifetime of a freshly issued or extended token (default: 1 hour).
    pub token_ttl: Duration,
    /// Interval between scanner ticks (default: 60 seconds).
    pub scan_interval: Duration,
    /// Number of check records the scanner reads concurrently.
    pub scan_concurrency: usize,
    /// Key for the password HMAC.
    pub hashing_secret: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            max_checks: 5,
            token_ttl: Duration::from_secs(60 * 60),
            scan_interval: Duration::from_secs(60),
            scan_concurrency: 8,
            hashing_secret: "thisIsASecret".to_string(),
        }
    }
}

impl ServiceConfig {
    pub fn with_max_checks(mut self, max: usize) -> Self {
        self.max_checks = max;
        self
    }

    pub fn with_token_ttl(mut self, secs: u64) -> Self {
        self.token_ttl = Duration::from_secs(secs.max(1));
        self
    }

    pub fn with_scan_interval(mut self, secs: u64) -> Self {
        self.scan_interval = Duration::from_secs(secs.max(1));
        self
    }

    pub fn with_scan_concurrency(mut self, n: usize) -> Self {
        self.scan_concurrency = n.max(1);
        self
    }

    pub fn with_hashing_secret(mut self, secret: impl Into<String>) -> Self {
        self.hashing_secret = secret.into();
        self
    }

    pub(crate) fn token_ttl_chrono(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.token_ttl).unwrap_or_else(|_| chrono::Duration::hours(1))
    }
}
