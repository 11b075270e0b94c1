//! Configuration management for meshctl
//!
//! Configuration is loaded from `~/.meshctl/config.json` with environment
//! variable overrides. Command-line flags override both.

mod types;
pub mod validate;

pub use types::*;

use crate::error::{MeshError, Result};
use std::path::{Path, PathBuf};

/// Longest wait (readiness or CRD establishment) accepted, one day.
pub const MAX_TIMEOUT_SECS: u64 = 24 * 60 * 60;

impl Config {
    /// Returns the meshctl configuration directory path (~/.meshctl)
    pub fn dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".meshctl")
    }

    /// Returns the path to the config file (~/.meshctl/config.json)
    pub fn path() -> PathBuf {
        Self::dir().join("config.json")
    }

    /// Load configuration from the default path with environment overrides.
    ///
    /// If the config file doesn't exist, returns default configuration.
    /// Environment variables can override config values using the pattern:
    /// `MESHCTL_SECTION_KEY`
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::path())
    }

    /// Load configuration from a specific path with environment overrides.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            serde_json::from_str(&content)?
        } else {
            Config::default()
        };

        config.apply_env_overrides();

        Ok(config)
    }

    /// Apply environment variable overrides to the configuration.
    fn apply_env_overrides(&mut self) {
        // Logging
        if let Ok(val) = std::env::var("MESHCTL_LOGGING_LEVEL") {
            self.logging.level = val;
        }
        if let Ok(val) = std::env::var("MESHCTL_LOGGING_FORMAT") {
            if let Ok(format) = serde_json::from_value(serde_json::Value::String(val)) {
                self.logging.format = format;
            }
        }

        // Install
        if let Ok(val) = std::env::var("MESHCTL_INSTALL_WAIT") {
            if let Ok(v) = val.parse() {
                self.install.wait = v;
            }
        }
        if let Ok(val) = std::env::var("MESHCTL_INSTALL_WAIT_TIMEOUT_SECS") {
            if let Ok(v) = val.parse() {
                self.install.wait_timeout_secs = v;
            }
        }
        if let Ok(val) = std::env::var("MESHCTL_INSTALL_KUBECONFIG") {
            self.install.kubeconfig = Some(val);
        }
        if let Ok(val) = std::env::var("MESHCTL_INSTALL_CONTEXT") {
            self.install.context = Some(val);
        }
        if let Ok(val) = std::env::var("MESHCTL_INSTALL_KUBECTL") {
            self.install.kubectl = val;
        }
    }

    /// Reject values the installer cannot run with.
    pub fn validate(&self) -> Result<()> {
        let install = &self.install;
        for (key, secs) in [
            ("wait_timeout_secs", install.wait_timeout_secs),
            ("crd_timeout_secs", install.crd_timeout_secs),
        ] {
            if secs == 0 {
                return Err(MeshError::Config(format!(
                    "install.{} must be greater than 0",
                    key
                )));
            }
            if secs > MAX_TIMEOUT_SECS {
                return Err(MeshError::Config(format!(
                    "install.{} must be at most {}",
                    key, MAX_TIMEOUT_SECS
                )));
            }
        }
        if install.crd_poll_interval_ms == 0 || install.ready_poll_interval_ms == 0 {
            return Err(MeshError::Config(
                "poll intervals must be greater than 0".into(),
            ));
        }
        if install.kubectl.trim().is_empty() {
            return Err(MeshError::Config("install.kubectl must not be empty".into()));
        }
        Ok(())
    }
}
