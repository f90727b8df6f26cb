//! Server configuration from environment variables.

use std::path::PathBuf;
use std::time::Duration;

use ppe_vision_artifacts::LifecycleConfig;

/// Runtime configuration for the HTTP server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Listen address.
    pub bind_addr: String,
    /// Listen port.
    pub port: u16,
    /// Directory holding generated artifacts, served under `/artifacts`.
    pub artifact_dir: PathBuf,
    /// Directory for transient upload copies.
    pub upload_dir: PathBuf,
    /// Artifact deletion timing.
    pub lifecycle: LifecycleConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1".to_string(),
            port: 8080,
            artifact_dir: PathBuf::from("data/artifacts"),
            upload_dir: PathBuf::from("data/uploads"),
            lifecycle: LifecycleConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Reads the configuration from the process environment.
    ///
    /// Unset or unparseable values fall back to their defaults, as does a
    /// zero sweep interval.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let secs = |key: &str, default: Duration| {
            lookup(key)
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map_or(default, Duration::from_secs)
        };

        Self {
            bind_addr: lookup("BIND_ADDR").unwrap_or(defaults.bind_addr),
            port: lookup("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            artifact_dir: lookup("PPE_ARTIFACT_DIR").map_or(defaults.artifact_dir, PathBuf::from),
            upload_dir: lookup("PPE_UPLOAD_DIR").map_or(defaults.upload_dir, PathBuf::from),
            lifecycle: LifecycleConfig {
                ttl: secs("PPE_ARTIFACT_TTL_SECS", defaults.lifecycle.ttl),
                sweep_interval: match secs("PPE_SWEEP_INTERVAL_SECS", Duration::ZERO) {
                    interval if interval.is_zero() => defaults.lifecycle.sweep_interval,
                    interval => interval,
                },
                sweep_max_age: secs("PPE_SWEEP_MAX_AGE_SECS", defaults.lifecycle.sweep_max_age),
            },
        }
    }
}
