//! Installing mesh components into a cluster.
//!
//! - `engine`: apply one component's manifest (label, sort, partition,
//!   apply in three steps, wait between them)
//! - `prune`: delete what a disabled component left behind
//! - `wait`: CRD establishment and resource readiness polling
//! - `orchestrator`: one task per component, gated on its parents
//! - `render`: write manifests to disk instead of applying them

pub mod engine;
pub mod orchestrator;
pub mod prune;
pub mod render;
pub mod wait;

pub use engine::ComponentApplyEngine;
pub use orchestrator::{install, Installer};
pub use prune::PruneManager;
pub use render::render_to_dir;
pub use wait::{CrdWaiter, ReadinessProbe, ReadinessWaiter};

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::cluster::ExecFlags;
use crate::component::ComponentName;
use crate::config::{DependencyFailurePolicy, InstallConfig};
use crate::error::MeshError;

/// Knobs for one install run.
#[derive(Debug, Clone, PartialEq)]
pub struct InstallOptions {
    pub dry_run: bool,
    pub verbose: bool,
    /// Run the cluster-wide readiness wait after every component applied.
    pub wait: bool,
    /// Bound for namespace readiness inside a component and for the final
    /// readiness wait.
    pub wait_timeout: Duration,
    pub kubeconfig: Option<PathBuf>,
    pub context: Option<String>,
    pub kubectl: String,
    pub dependency_failure: DependencyFailurePolicy,
    pub crd_poll_interval: Duration,
    pub crd_timeout: Duration,
    pub ready_poll_interval: Duration,
}

impl InstallOptions {
    pub fn from_config(cfg: &InstallConfig) -> Self {
        Self {
            dry_run: false,
            verbose: false,
            wait: cfg.wait,
            wait_timeout: Duration::from_secs(cfg.wait_timeout_secs),
            kubeconfig: cfg.kubeconfig.as_ref().map(PathBuf::from),
            context: cfg.context.clone(),
            kubectl: cfg.kubectl.clone(),
            dependency_failure: cfg.dependency_failure,
            crd_poll_interval: Duration::from_millis(cfg.crd_poll_interval_ms),
            crd_timeout: Duration::from_secs(cfg.crd_timeout_secs),
            ready_poll_interval: Duration::from_millis(cfg.ready_poll_interval_ms),
        }
    }

    pub fn exec_flags(&self) -> ExecFlags {
        ExecFlags {
            dry_run: self.dry_run,
            verbose: self.verbose,
        }
    }
}

impl Default for InstallOptions {
    fn default() -> Self {
        Self::from_config(&InstallConfig::default())
    }
}

/// Result of installing (or pruning) one component.
#[derive(Debug)]
pub struct ApplyOutcome {
    pub stdout: String,
    pub stderr: String,
    pub error: Option<MeshError>,
    /// Exactly what was sent to the executor, one chunk per apply step.
    pub manifest: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl ApplyOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// An outcome for a component that never ran.
    pub fn failed(error: MeshError) -> Self {
        let now = Utc::now();
        Self {
            stdout: String::new(),
            stderr: String::new(),
            error: Some(error),
            manifest: String::new(),
            started_at: now,
            finished_at: now,
        }
    }
}

/// Outcome per component for a whole run.
pub type CompositeOutcome = BTreeMap<ComponentName, ApplyOutcome>;

/// What [`Installer::install`] returns.
///
/// Individual component failures live in `outcomes`; `error` is set only
/// when the final readiness wait failed.
#[derive(Debug, Default)]
pub struct InstallReport {
    pub outcomes: CompositeOutcome,
    pub error: Option<MeshError>,
}

impl InstallReport {
    pub fn is_success(&self) -> bool {
        self.error.is_none() && self.outcomes.values().all(ApplyOutcome::is_success)
    }

    pub fn failed_components(&self) -> Vec<&ComponentName> {
        self.outcomes
            .iter()
            .filter(|(_, o)| !o.is_success())
            .map(|(name, _)| name)
            .collect()
    }
}
