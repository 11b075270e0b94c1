//! Cluster connection resolution.
//!
//! Resolution order:
//! 1. an explicit kubeconfig path, when the file exists and is non-empty
//! 2. in-cluster service-account credentials
//! 3. `$KUBECONFIG`
//! 4. `~/.kube/config`

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{MeshError, Result};

/// Service-account token mounted into every pod.
pub const IN_CLUSTER_TOKEN_PATH: &str = "/var/run/secrets/kubernetes.io/serviceaccount/token";

/// Where a connection's credentials came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionSource {
    Explicit,
    InCluster,
    KubeconfigEnv,
    HomeKubeconfig,
}

/// Resolved, read-only cluster connection shared by every component task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterConnection {
    /// Kubeconfig to pass to kubectl. `None` lets kubectl discover the
    /// in-cluster config or `$KUBECONFIG` itself.
    pub kubeconfig: Option<PathBuf>,
    pub context: Option<String>,
    pub source: ConnectionSource,
}

/// Everything resolution reads from the environment, gathered up front so
/// resolution itself is a pure function.
#[derive(Debug, Clone, Default)]
pub struct ResolverInputs {
    pub explicit: Option<PathBuf>,
    pub service_host: Option<String>,
    pub token_path: PathBuf,
    pub kubeconfig_env: Option<String>,
    pub home: Option<PathBuf>,
}

impl ResolverInputs {
    pub fn from_env(explicit: Option<&Path>) -> Self {
        Self {
            explicit: explicit.map(Path::to_path_buf),
            service_host: std::env::var("KUBERNETES_SERVICE_HOST")
                .ok()
                .filter(|h| !h.is_empty()),
            token_path: PathBuf::from(IN_CLUSTER_TOKEN_PATH),
            kubeconfig_env: std::env::var("KUBECONFIG").ok().filter(|v| !v.is_empty()),
            home: dirs::home_dir(),
        }
    }
}

fn non_empty_file(path: &Path) -> bool {
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.len() > 0)
        .unwrap_or(false)
}

impl ClusterConnection {
    /// Resolve against the real environment.
    pub fn resolve(kubeconfig: Option<&Path>, context: Option<&str>) -> Result<Self> {
        Self::resolve_with(ResolverInputs::from_env(kubeconfig), context)
    }

    pub fn resolve_with(inputs: ResolverInputs, context: Option<&str>) -> Result<Self> {
        let context = context.filter(|c| !c.is_empty()).map(str::to_string);
        let connection = |kubeconfig, source| Self {
            kubeconfig,
            context: context.clone(),
            source,
        };

        if let Some(path) = &inputs.explicit {
            if non_empty_file(path) {
                debug!("Using kubeconfig {}", path.display());
                return Ok(connection(Some(path.clone()), ConnectionSource::Explicit));
            }
            warn!(
                "Kubeconfig {} is missing or empty, falling back",
                path.display()
            );
        }

        if inputs.service_host.is_some() && inputs.token_path.is_file() {
            debug!("Using in-cluster service account credentials");
            return Ok(connection(None, ConnectionSource::InCluster));
        }

        if let Some(paths) = &inputs.kubeconfig_env {
            if std::env::split_paths(paths).any(|p| non_empty_file(&p)) {
                debug!("Using $KUBECONFIG={}", paths);
                return Ok(connection(None, ConnectionSource::KubeconfigEnv));
            }
        }

        if let Some(home) = &inputs.home {
            let path = home.join(".kube").join("config");
            if non_empty_file(&path) {
                debug!("Using kubeconfig {}", path.display());
                return Ok(connection(Some(path), ConnectionSource::HomeKubeconfig));
            }
        }

        Err(MeshError::Connection(
            "no usable kubeconfig: pass --kubeconfig, set KUBECONFIG, or create ~/.kube/config"
                .into(),
        ))
    }

    /// Global kubectl flags selecting this connection.
    pub fn kubectl_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(path) = &self.kubeconfig {
            args.push("--kubeconfig".to_string());
            args.push(path.display().to_string());
        }
        if let Some(context) = &self.context {
            args.push("--context".to_string());
            args.push(context.clone());
        }
        args
    }
}
