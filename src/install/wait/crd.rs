//! Waiting for CustomResourceDefinitions to be established.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::cluster::resources::{get_as, CustomResourceDefinition};
use crate::cluster::ClusterClient;
use crate::error::{MeshError, Result};
use crate::manifest::object::KIND_CRD;
use crate::manifest::ResourceObject;
use crate::utils::poll::{poll_until, PollOutcome};

pub const DEFAULT_CRD_POLL_INTERVAL: Duration = Duration::from_millis(500);
pub const DEFAULT_CRD_TIMEOUT: Duration = Duration::from_secs(60);

/// Polls every CRD until all report `Established=True`.
pub struct CrdWaiter {
    client: Arc<dyn ClusterClient>,
    interval: Duration,
    timeout: Duration,
}

impl CrdWaiter {
    pub fn new(client: Arc<dyn ClusterClient>) -> Self {
        Self {
            client,
            interval: DEFAULT_CRD_POLL_INTERVAL,
            timeout: DEFAULT_CRD_TIMEOUT,
        }
    }

    pub fn with_timing(mut self, interval: Duration, timeout: Duration) -> Self {
        self.interval = interval;
        self.timeout = timeout;
        self
    }

    pub async fn wait(&self, crds: &[ResourceObject], dry_run: bool) -> Result<()> {
        if dry_run {
            debug!("Dry run, not waiting for {} CRDs", crds.len());
            return Ok(());
        }
        if crds.is_empty() {
            return Ok(());
        }

        let names: Vec<&str> = crds.iter().map(ResourceObject::name).collect();
        info!("Waiting for {} CRDs to be established", names.len());
        let client = self.client.as_ref();
        let names = names.as_slice();
        match poll_until(self.interval, self.timeout, move || pending_crds(client, names)).await? {
            PollOutcome::Done => {
                info!("CRDs established");
                Ok(())
            }
            PollOutcome::TimedOut { pending } => Err(MeshError::Timeout {
                what: "CRDs".into(),
                after: self.timeout,
                pending,
            }),
        }
    }
}

async fn pending_crds(client: &dyn ClusterClient, names: &[&str]) -> Result<Vec<String>> {
    let mut pending = Vec::new();
    for name in names {
        let crd: CustomResourceDefinition = get_as(client, KIND_CRD, "", name).await?;
        if let Some(condition) = crd.names_rejected() {
            warn!("Name conflict for CRD {}: {}", name, condition.reason);
        }
        if !crd.is_established() {
            pending.push(format!("{}/{}", KIND_CRD, name));
        }
    }
    Ok(pending)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::fake::FakeCluster;
    use serde_json::json;

    fn crd(name: &str, established: &str) -> serde_json::Value {
        json!({
            "apiVersion": "apiextensions.k8s.io/v1",
            "kind": "CustomResourceDefinition",
            "metadata": {"name": name},
            "status": {"conditions": [{"type": "Established", "status": established}]}
        })
    }

    fn objects(names: &[&str]) -> Vec<ResourceObject> {
        names
            .iter()
            .map(|n| ResourceObject::new("apiextensions.k8s.io/v1", KIND_CRD, "", n))
            .collect()
    }

    fn waiter(cluster: &Arc<FakeCluster>, timeout: Duration) -> CrdWaiter {
        CrdWaiter::new(cluster.clone()).with_timing(Duration::from_millis(10), timeout)
    }

    #[test]
    fn test_defaults() {
        assert_eq!(DEFAULT_CRD_POLL_INTERVAL, Duration::from_millis(500));
        assert_eq!(DEFAULT_CRD_TIMEOUT, Duration::from_secs(60));
    }

    #[tokio::test]
    async fn test_two_of_three_established_times_out() {
        let cluster = Arc::new(FakeCluster::new());
        cluster.insert(crd("a.mesh.io", "True"));
        cluster.insert(crd("b.mesh.io", "True"));
        cluster.insert(crd("c.mesh.io", "False"));

        let timeout = Duration::from_millis(150);
        let started = std::time::Instant::now();
        let err = waiter(&cluster, timeout)
            .wait(&objects(&["a.mesh.io", "b.mesh.io", "c.mesh.io"]), false)
            .await
            .unwrap_err();
        assert!(started.elapsed() >= timeout);
        assert!(err.is_timeout());
        assert_eq!(err.pending(), &["CustomResourceDefinition/c.mesh.io".to_string()]);
        // every tick checks every CRD
        assert!(cluster.reads("CustomResourceDefinition", "", "a.mesh.io") > 1);
    }

    #[tokio::test]
    async fn test_established_after_a_few_polls() {
        let cluster = Arc::new(FakeCluster::new());
        cluster.insert_timeline(vec![
            crd("gateways.mesh.io", "False"),
            crd("gateways.mesh.io", "False"),
            crd("gateways.mesh.io", "True"),
        ]);
        waiter(&cluster, Duration::from_secs(5))
            .wait(&objects(&["gateways.mesh.io"]), false)
            .await
            .unwrap();
        assert_eq!(cluster.reads("CustomResourceDefinition", "", "gateways.mesh.io"), 3);
    }

    #[tokio::test]
    async fn test_names_not_accepted_keeps_waiting() {
        let cluster = Arc::new(FakeCluster::new());
        cluster.insert(json!({
            "apiVersion": "apiextensions.k8s.io/v1",
            "kind": "CustomResourceDefinition",
            "metadata": {"name": "rules.mesh.io"},
            "status": {"conditions": [{"type": "NamesAccepted", "status": "False", "reason": "KindConflict"}]}
        }));
        let err = waiter(&cluster, Duration::from_millis(50))
            .wait(&objects(&["rules.mesh.io"]), false)
            .await
            .unwrap_err();
        assert!(err.is_timeout());
    }

    #[tokio::test]
    async fn test_api_error_aborts() {
        let cluster = Arc::new(FakeCluster::new());
        cluster.fail_reads("the server is currently unable to handle the request");
        let started = std::time::Instant::now();
        let err = waiter(&cluster, Duration::from_secs(5))
            .wait(&objects(&["a.mesh.io"]), false)
            .await
            .unwrap_err();
        assert!(matches!(err, MeshError::Cluster(_)));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_dry_run_skips_polling() {
        let cluster = Arc::new(FakeCluster::new());
        waiter(&cluster, Duration::from_secs(5))
            .wait(&objects(&["a.mesh.io"]), true)
            .await
            .unwrap();
        assert_eq!(cluster.reads("CustomResourceDefinition", "", "a.mesh.io"), 0);
    }
}
