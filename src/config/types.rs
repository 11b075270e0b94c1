//! Configuration types for meshctl.

use serde::{Deserialize, Serialize};

/// Main configuration struct for meshctl
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Logging output settings
    pub logging: LoggingConfig,
    /// Install run defaults (wait behaviour, cluster connection, poll tuning)
    pub install: InstallConfig,
}

// ============================================================================
// Logging
// ============================================================================

/// Log output format.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Multi-line human-readable output.
    Pretty,
    /// Compact single-line output with structured fields.
    #[default]
    Component,
    /// JSON lines.
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Output format.
    pub format: LogFormat,
    /// Append JSON logs to this file instead of stderr (json format only).
    pub file: Option<String>,
    /// Default filter level when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Component,
            file: None,
            level: "info".to_string(),
        }
    }
}

// ============================================================================
// Install
// ============================================================================

/// What a child component does when its parent's install failed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DependencyFailurePolicy {
    /// Install the child anyway.
    #[default]
    Proceed,
    /// Record a dependency failure for the child without applying it.
    Skip,
}

/// Defaults for `meshctl install`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InstallConfig {
    /// Wait for all applied resources to become ready after install.
    pub wait: bool,
    /// Upper bound for readiness waits, in seconds.
    pub wait_timeout_secs: u64,
    /// Explicit kubeconfig path (falls back through the usual chain when unset).
    pub kubeconfig: Option<String>,
    /// Kubeconfig context to use.
    pub context: Option<String>,
    /// kubectl binary name or path.
    pub kubectl: String,
    /// Behaviour of children whose parent failed.
    pub dependency_failure: DependencyFailurePolicy,
    /// CRD status poll interval, in milliseconds.
    pub crd_poll_interval_ms: u64,
    /// CRD establishment timeout, in seconds.
    pub crd_timeout_secs: u64,
    /// Resource readiness poll interval, in milliseconds.
    pub ready_poll_interval_ms: u64,
}

impl Default for InstallConfig {
    fn default() -> Self {
        Self {
            wait: false,
            wait_timeout_secs: 300,
            kubeconfig: None,
            context: None,
            kubectl: "kubectl".to_string(),
            dependency_failure: DependencyFailurePolicy::Proceed,
            crd_poll_interval_ms: 500,
            crd_timeout_secs: 60,
            ready_poll_interval_ms: 2000,
        }
    }
}
