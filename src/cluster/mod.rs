//! Cluster-facing collaborators.
//!
//! `ManifestExecutor` applies and deletes manifests, `ClusterClient` reads
//! live objects for the waiters. Both are traits so the installer can run
//! against [`Kubectl`] in production and against fakes in tests.

pub mod connection;
#[cfg(test)]
pub(crate) mod fake;
pub mod kubectl;
pub mod resources;

pub use connection::{ClusterConnection, ConnectionSource, ResolverInputs};
pub use kubectl::Kubectl;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

/// Output of one executor command.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    /// `None` when the process was killed by a signal or never ran.
    pub exit_code: Option<i32>,
}

impl CommandOutput {
    pub fn new(stdout: impl Into<String>, stderr: impl Into<String>, exit_code: Option<i32>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: stderr.into(),
            exit_code,
        }
    }

    /// A successful command with nothing printed.
    pub fn empty() -> Self {
        Self::new("", "", Some(0))
    }

    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Flags passed through to every apply/delete.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecFlags {
    pub dry_run: bool,
    pub verbose: bool,
}

/// Applies and deletes manifests and lists live objects.
///
/// `namespace` is empty when the command is not namespace scoped. An `Err`
/// means the command could not be run at all; a command that ran and failed
/// comes back as a [`CommandOutput`] with a non-zero exit code.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ManifestExecutor: Send + Sync {
    async fn apply(
        &self,
        flags: ExecFlags,
        namespace: &str,
        manifest: &str,
        extra_args: &[String],
    ) -> Result<CommandOutput>;

    async fn delete(
        &self,
        flags: ExecFlags,
        namespace: &str,
        manifest: &str,
        extra_args: &[String],
    ) -> Result<CommandOutput>;

    async fn get_all(
        &self,
        namespace: &str,
        output_format: &str,
        extra_args: &[String],
    ) -> Result<CommandOutput>;
}

/// Read access to live cluster objects.
///
/// Objects are returned as raw JSON; [`resources`] has typed views.
#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// Fetch one object. Missing objects are an error.
    async fn get(&self, kind: &str, namespace: &str, name: &str) -> Result<Value>;

    /// List objects of `kind` in `namespace` matching a label selector
    /// (`k=v,k2=v2`). An empty selector matches everything.
    async fn list(&self, kind: &str, namespace: &str, selector: &str) -> Result<Vec<Value>>;
}
