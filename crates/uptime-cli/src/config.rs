//! TOML configuration file schema and parsing.
//!
//! Example config file:
//!
//! ```toml
//! [server]
//! listen = "0.0.0.0:8080"
//! log_format = "json"
//!
//! [store]
//! kind = "file"
//! data_dir = "/var/lib/uptime-monitor"
//!
//! [limits]
//! max_checks = 5
//!
//! [auth]
//! token_ttl_secs = 3600
//! hashing_secret = "change-me"
//!
//! [scanner]
//! enabled = true
//! interval_secs = 60
//! concurrency = 8
//! ```

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use uptime_core::ServiceConfig;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub limits: LimitsConfig,

    #[serde(default)]
    pub auth: AuthConfig,

    #[serde(default)]
    pub scanner: ScannerConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,

    #[serde(default = "default_log_format")]
    pub log_format: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            log_format: default_log_format(),
        }
    }
}

pub fn default_listen() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

fn default_log_format() -> String {
    "pretty".into()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    #[default]
    Memory,
    File,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub kind: StoreKind,

    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LimitsConfig {
    #[serde(default)]
    pub max_checks: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub token_ttl_secs: Option<u64>,

    #[serde(default)]
    pub hashing_secret: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScannerConfig {
    #[serde(default = "default_scanner_enabled")]
    pub enabled: bool,

    #[serde(default)]
    pub interval_secs: Option<u64>,

    #[serde(default)]
    pub concurrency: Option<usize>,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            enabled: default_scanner_enabled(),
            interval_secs: None,
            concurrency: None,
        }
    }
}

fn default_scanner_enabled() -> bool {
    true
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file {}: {}", path.display(), e))?;

        let config: AppConfig = toml::from_str(&content)
            .map_err(|e| format!("Failed to parse config file {}: {}", path.display(), e))?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), String> {
        match self.server.log_format.as_str() {
            "pretty" | "json" => {}
            other => {
                return Err(format!(
                    "Invalid log_format '{}': must be 'pretty' or 'json'",
                    other
                ));
            }
        }

        if self.store.kind == StoreKind::File && self.store.data_dir.is_none() {
            return Err("store.data_dir is required when store.kind = \"file\"".into());
        }

        if self.limits.max_checks == Some(0) {
            return Err("limits.max_checks must be at least 1".into());
        }
        if self.auth.token_ttl_secs == Some(0) {
            return Err("auth.token_ttl_secs must be at least 1".into());
        }
        if self.auth.hashing_secret.as_deref() == Some("") {
            return Err("auth.hashing_secret must not be empty".into());
        }
        if self.scanner.interval_secs == Some(0) {
            return Err("scanner.interval_secs must be at least 1".into());
        }
        if self.scanner.concurrency == Some(0) {
            return Err("scanner.concurrency must be at least 1".into());
        }

        Ok(())
    }

    pub fn to_service_config(&self) -> ServiceConfig {
        let mut c = ServiceConfig::default();
        if let Some(max) = self.limits.max_checks {
            c = c.with_max_checks(max);
        }
        if let Some(ttl) = self.auth.token_ttl_secs {
            c = c.with_token_ttl(ttl);
        }
        if let Some(ref secret) = self.auth.hashing_secret {
            c = c.with_hashing_secret(secret.clone());
        }
        if let Some(secs) = self.scanner.interval_secs {
            c = c.with_scan_interval(secs);
        }
        if let Some(n) = self.scanner.concurrency {
            c = c.with_scan_concurrency(n);
        }
        c
    }
}
