//! Error types for meshctl
//!
//! This module defines all error types used by the installer. Uses
//! `thiserror` for `Display`/`Error` derives.
//!
//! Error classes and where they stop:
//! - [`MeshError::Parse`] and [`MeshError::Executor`] are fatal to one
//!   component and are recorded in that component's outcome.
//! - [`MeshError::Timeout`] is fatal to a component when raised by an
//!   intra-component wait, and to the whole run when raised by the final
//!   cluster-wide readiness wait.
//! - [`MeshError::Connection`] aborts a run before any component starts.

use std::time::Duration;
use thiserror::Error;

// ============================================================================
// Primary Error Type
// ============================================================================

/// The primary error type for meshctl operations.
#[derive(Error, Debug)]
pub enum MeshError {
    /// Configuration-related errors (invalid config values, bad flags, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed manifest text or `kubectl get` output
    #[error("Manifest parse error: {0}")]
    Parse(String),

    /// apply/delete/get failures reported by the cluster-facing executor
    #[error("Executor error: {0}")]
    Executor(String),

    /// Cluster API read failures while polling live state
    #[error("Cluster API error: {0}")]
    Cluster(String),

    /// No usable cluster connection could be resolved
    #[error("Connection error: {0}")]
    Connection(String),

    /// A bounded wait elapsed with resources still outstanding
    #[error("{what} not ready after {after:?}:\n{}", .pending.join("\n"))]
    Timeout {
        /// What was being waited on ("resources", "CRDs").
        what: String,
        /// The timeout that elapsed.
        after: Duration,
        /// `Kind/namespace/name` of every resource still not ready.
        pending: Vec<String>,
    },

    /// A component was skipped because a prerequisite component failed
    #[error("Dependency failed: {0}")]
    DependencyFailed(String),

    /// Standard I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML serialization/deserialization errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl MeshError {
    /// Returns `true` for bounded-wait expiry.
    pub fn is_timeout(&self) -> bool {
        matches!(self, MeshError::Timeout { .. })
    }

    /// Outstanding resource names for a timeout, empty otherwise.
    pub fn pending(&self) -> &[String] {
        match self {
            MeshError::Timeout { pending, .. } => pending,
            _ => &[],
        }
    }
}

/// A specialized `Result` type for meshctl operations.
pub type Result<T> = std::result::Result<T, MeshError>;
