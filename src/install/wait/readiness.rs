//! Waiting for applied resources to become ready.
//!
//! Readiness is decided per kind by a [`ReadinessProbe`] looked up in a
//! registry. Kinds without a probe are ignored.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::cluster::resources::{
    get_as, list_as, selector_string, Deployment, Namespace, Pod, ReplicaSet,
    ReplicationController, SelectorWorkload, Service, REVISION_ANNOTATION,
};
use crate::cluster::ClusterClient;
use crate::error::{MeshError, Result};
use crate::manifest::ResourceObject;
use crate::utils::poll::{poll_until, PollOutcome};

pub const DEFAULT_READY_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Decides whether one live object is ready.
#[async_trait]
pub trait ReadinessProbe: Send + Sync {
    /// Names (`Kind/namespace/name`) of whatever is holding `object` back.
    /// Empty when ready.
    async fn pending(&self, client: &dyn ClusterClient, object: &ResourceObject)
        -> Result<Vec<String>>;
}

/// Polls a set of objects until every probe reports ready.
pub struct ReadinessWaiter {
    client: Arc<dyn ClusterClient>,
    interval: Duration,
    probes: HashMap<&'static str, Arc<dyn ReadinessProbe>>,
}

impl ReadinessWaiter {
    /// Waiter with probes for the built-in workload kinds.
    pub fn new(client: Arc<dyn ClusterClient>) -> Self {
        let mut waiter = Self {
            client,
            interval: DEFAULT_READY_POLL_INTERVAL,
            probes: HashMap::new(),
        };
        let pods: Arc<dyn ReadinessProbe> = Arc::new(SelectedPodsProbe);
        waiter.register("Namespace", Arc::new(NamespaceProbe));
        waiter.register("Pod", Arc::new(PodProbe));
        waiter.register("ReplicationController", Arc::new(ReplicationControllerProbe));
        waiter.register("DaemonSet", pods.clone());
        waiter.register("StatefulSet", pods.clone());
        waiter.register("ReplicaSet", pods);
        waiter.register("Deployment", Arc::new(DeploymentProbe));
        waiter.register("Service", Arc::new(ServiceProbe));
        waiter
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Add or replace the probe for `kind`.
    pub fn register(&mut self, kind: &'static str, probe: Arc<dyn ReadinessProbe>) {
        self.probes.insert(kind, probe);
    }

    /// One pass over `objects`, returning everything not ready.
    pub async fn pending(&self, objects: &[ResourceObject]) -> Result<Vec<String>> {
        let mut pending = Vec::new();
        for object in objects {
            if let Some(probe) = self.probes.get(object.kind()) {
                pending.extend(probe.pending(self.client.as_ref(), object).await?);
            }
        }
        if !pending.is_empty() {
            debug!("Waiting on {}", pending.join(", "));
        }
        Ok(pending)
    }

    pub async fn wait(
        &self,
        objects: &[ResourceObject],
        timeout: Duration,
        dry_run: bool,
    ) -> Result<()> {
        if dry_run {
            debug!("Dry run, not waiting for {} resources", objects.len());
            return Ok(());
        }
        let watched: Vec<ResourceObject> = objects
            .iter()
            .filter(|o| self.probes.contains_key(o.kind()))
            .cloned()
            .collect();
        if watched.is_empty() {
            return Ok(());
        }

        info!(
            "Waiting up to {:?} for {} resources to become ready",
            timeout,
            watched.len()
        );
        let watched = watched.as_slice();
        match poll_until(self.interval, timeout, move || self.pending(watched)).await? {
            PollOutcome::Done => {
                info!("Resources are ready");
                Ok(())
            }
            PollOutcome::TimedOut { pending } => Err(MeshError::Timeout {
                what: "resources".into(),
                after: timeout,
                pending,
            }),
        }
    }
}

// ============================================================================
// Built-in probes
// ============================================================================

struct NamespaceProbe;

#[async_trait]
impl ReadinessProbe for NamespaceProbe {
    async fn pending(
        &self,
        client: &dyn ClusterClient,
        object: &ResourceObject,
    ) -> Result<Vec<String>> {
        let ns: Namespace = get_as(client, object.kind(), "", object.name()).await?;
        Ok(if ns.is_active() {
            Vec::new()
        } else {
            vec![object.display_name()]
        })
    }
}

struct PodProbe;

#[async_trait]
impl ReadinessProbe for PodProbe {
    async fn pending(
        &self,
        client: &dyn ClusterClient,
        object: &ResourceObject,
    ) -> Result<Vec<String>> {
        let pod: Pod = get_as(client, object.kind(), object.namespace(), object.name()).await?;
        Ok(if pod.is_ready() {
            Vec::new()
        } else {
            vec![object.display_name()]
        })
    }
}

/// Every pod matched by `selector` in `namespace` that is not ready.
async fn unready_pods(
    client: &dyn ClusterClient,
    namespace: &str,
    selector: &str,
) -> Result<Vec<String>> {
    // An empty selector would match every pod in the namespace.
    if selector.is_empty() {
        return Ok(Vec::new());
    }
    let pods: Vec<Pod> = list_as(client, "Pod", namespace, selector).await?;
    Ok(pods
        .iter()
        .filter(|p| !p.is_ready())
        .map(|p| format!("Pod/{}/{}", p.metadata.namespace, p.metadata.name))
        .collect())
}

/// DaemonSet, StatefulSet and ReplicaSet: all selected pods ready.
struct SelectedPodsProbe;

#[async_trait]
impl ReadinessProbe for SelectedPodsProbe {
    async fn pending(
        &self,
        client: &dyn ClusterClient,
        object: &ResourceObject,
    ) -> Result<Vec<String>> {
        let workload: SelectorWorkload =
            get_as(client, object.kind(), object.namespace(), object.name()).await?;
        let selector = workload.spec.selector.to_selector_string();
        unready_pods(client, object.namespace(), &selector).await
    }
}

struct ReplicationControllerProbe;

#[async_trait]
impl ReadinessProbe for ReplicationControllerProbe {
    async fn pending(
        &self,
        client: &dyn ClusterClient,
        object: &ResourceObject,
    ) -> Result<Vec<String>> {
        let rc: ReplicationController =
            get_as(client, object.kind(), object.namespace(), object.name()).await?;
        let selector = selector_string(&rc.spec.selector);
        unready_pods(client, object.namespace(), &selector).await
    }
}

/// The current ReplicaSet (same revision as the deployment) must have at
/// least `spec.replicas` ready replicas.
struct DeploymentProbe;

#[async_trait]
impl ReadinessProbe for DeploymentProbe {
    async fn pending(
        &self,
        client: &dyn ClusterClient,
        object: &ResourceObject,
    ) -> Result<Vec<String>> {
        let deployment: Deployment =
            get_as(client, object.kind(), object.namespace(), object.name()).await?;
        let selector = deployment.spec.selector.to_selector_string();
        let replica_sets: Vec<ReplicaSet> =
            list_as(client, "ReplicaSet", object.namespace(), &selector).await?;

        let current = deployment.revision().and_then(|revision| {
            replica_sets.iter().find(|rs| {
                deployment.owns(rs) && rs.metadata.annotation(REVISION_ANNOTATION) == Some(revision)
            })
        });
        let ready = match current {
            Some(rs) => rs.status.ready_replicas >= deployment.desired_replicas(),
            None => false,
        };
        Ok(if ready {
            Vec::new()
        } else {
            vec![object.display_name()]
        })
    }
}

struct ServiceProbe;

#[async_trait]
impl ReadinessProbe for ServiceProbe {
    async fn pending(
        &self,
        client: &dyn ClusterClient,
        object: &ResourceObject,
    ) -> Result<Vec<String>> {
        let svc: Service = get_as(client, object.kind(), object.namespace(), object.name()).await?;
        Ok(if svc.is_ready() {
            Vec::new()
        } else {
            vec![object.display_name()]
        })
    }
}
