//! Dependency-ordered install of every component in a manifest map.
//!
//! One task is spawned per component up front. A task waits on its gate
//! until every declared parent has finished, applies its manifest through
//! the [`ComponentApplyEngine`], then releases its own children. Declared
//! components with no manifest still get a task that only forwards the
//! signal, so a grandchild never starts before its grandparent finished.

use std::collections::BTreeSet;
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use super::engine::ComponentApplyEngine;
use super::wait::ReadinessWaiter;
use super::{ApplyOutcome, CompositeOutcome, InstallOptions, InstallReport};
use crate::cluster::{ClusterClient, ClusterConnection, Kubectl, ManifestExecutor};
use crate::component::{
    ComponentName, DependencyDeclaration, DependencyGraph, GateSet, GateSignal,
};
use crate::config::DependencyFailurePolicy;
use crate::error::{MeshError, Result};
use crate::manifest::{ManifestMap, ResourceObject};

/// What the component tasks write back.
#[derive(Default)]
struct Collected {
    outcomes: CompositeOutcome,
    applied: Vec<ResourceObject>,
}

/// Installs manifest maps against one cluster.
pub struct Installer {
    declaration: Arc<DependencyDeclaration>,
    graph: Arc<DependencyGraph>,
    executor: Arc<dyn ManifestExecutor>,
    client: Arc<dyn ClusterClient>,
}

impl Installer {
    pub fn new(
        declaration: DependencyDeclaration,
        executor: Arc<dyn ManifestExecutor>,
        client: Arc<dyn ClusterClient>,
    ) -> Self {
        let graph = DependencyGraph::build(&declaration);
        Self {
            declaration: Arc::new(declaration),
            graph: Arc::new(graph),
            executor,
            client,
        }
    }

    /// Install every component in `manifests`.
    ///
    /// Per-component failures are recorded in the report's outcomes and
    /// never stop other components. The report's `error` is set only by
    /// the final readiness wait, which runs when `opts.wait` is set.
    pub async fn install(
        &self,
        manifests: &ManifestMap,
        version: &str,
        opts: &InstallOptions,
    ) -> InstallReport {
        info!(
            "The following component dependency tree will be installed:\n{}",
            self.graph.render()
        );
        let names: Vec<&str> = manifests.keys().map(ComponentName::as_str).collect();
        info!("Preparing manifests for these components: {}", names.join(", "));

        let gates = Arc::new(GateSet::from_declaration(&self.declaration));
        let collected = Arc::new(Mutex::new(Collected::default()));
        let engine = Arc::new(ComponentApplyEngine::new(
            Arc::clone(&self.executor),
            Arc::clone(&self.client),
            self.declaration.root().clone(),
        ));
        let opts = Arc::new(opts.clone());
        let version: Arc<str> = Arc::from(version);

        let mut spawned = Vec::with_capacity(manifests.len());
        for (name, manifest) in manifests {
            let name = name.clone();
            let manifest = manifest.clone();
            let gates = Arc::clone(&gates);
            let collected = Arc::clone(&collected);
            let engine = Arc::clone(&engine);
            let opts = Arc::clone(&opts);
            let version = Arc::clone(&version);
            let declaration = Arc::clone(&self.declaration);
            let task_name = name.clone();

            let handle = tokio::spawn(async move {
                let name = task_name;
                let upstream = match gates.gate(&name) {
                    Some(gate) => gate.wait().await,
                    None => GateSignal::Completed,
                };
                let guard = gates.guard(name.clone());

                if upstream == GateSignal::Failed
                    && opts.dependency_failure == DependencyFailurePolicy::Skip
                {
                    let parents: Vec<&str> = declaration
                        .parents_of(&name)
                        .into_iter()
                        .map(ComponentName::as_str)
                        .collect();
                    warn!(component = %name, "Skipping {}: a prerequisite failed", name);
                    let err = MeshError::DependencyFailed(format!(
                        "{} not installed because {} failed",
                        name,
                        parents.join(", ")
                    ));
                    collected
                        .lock()
                        .await
                        .outcomes
                        .insert(name, ApplyOutcome::failed(err));
                    guard.complete(GateSignal::Failed);
                    return;
                }

                let (outcome, applied) = engine
                    .apply_component(&name, &manifest, &version, &opts)
                    .await;
                let signal = if outcome.is_success() {
                    GateSignal::Completed
                } else {
                    GateSignal::Failed
                };
                {
                    let mut collected = collected.lock().await;
                    collected.applied.extend(applied);
                    collected.outcomes.insert(name, outcome);
                }
                guard.complete(signal);
            });
            spawned.push((name, handle));
        }

        let relays: Vec<_> = self
            .declared_without_manifest(manifests)
            .into_iter()
            .map(|name| {
                let gates = Arc::clone(&gates);
                tokio::spawn(async move {
                    let signal = match gates.gate(&name) {
                        Some(gate) => gate.wait().await,
                        None => GateSignal::Completed,
                    };
                    gates.guard(name).complete(signal);
                })
            })
            .collect();

        let (names, handles): (Vec<_>, Vec<_>) = spawned.into_iter().unzip();
        let results = join_all(handles).await;
        join_all(relays).await;

        let mut collected = std::mem::take(&mut *collected.lock().await);
        for (name, result) in names.into_iter().zip(results) {
            if let Err(e) = result {
                error!(component = %name, "Install task for {} aborted: {}", name, e);
                collected.outcomes.entry(name).or_insert_with(|| {
                    ApplyOutcome::failed(MeshError::Executor(format!(
                        "install task aborted: {}",
                        e
                    )))
                });
            }
        }

        let mut report = InstallReport {
            outcomes: collected.outcomes,
            error: None,
        };

        if opts.wait {
            let waited = ReadinessWaiter::new(Arc::clone(&self.client))
                .with_interval(opts.ready_poll_interval)
                .wait(&collected.applied, opts.wait_timeout, opts.dry_run)
                .await;
            if let Err(e) = waited {
                error!("✘ Resources not ready: {}", e);
                report.error = Some(e);
            }
        }

        let failed = report.failed_components();
        if failed.is_empty() && report.error.is_none() {
            info!("✔ Installed {} components", report.outcomes.len());
        } else if !failed.is_empty() {
            let failed: Vec<&str> = failed.into_iter().map(ComponentName::as_str).collect();
            error!("✘ Components failed: {}", failed.join(", "));
        }
        report
    }

    /// Declared components that have no entry in `manifests`.
    fn declared_without_manifest(&self, manifests: &ManifestMap) -> BTreeSet<ComponentName> {
        let mut declared = BTreeSet::new();
        declared.insert(self.declaration.root().clone());
        for (parent, children) in self.declaration.edges() {
            declared.insert(parent.clone());
            declared.extend(children.iter().cloned());
        }
        declared.retain(|name| !manifests.contains_key(name));
        declared
    }
}

/// Resolve the cluster connection, then install `manifests` with the
/// built-in dependency declaration.
///
/// The only error is a connection failure, returned before any component
/// starts.
pub async fn install(
    manifests: &ManifestMap,
    version: &str,
    opts: &InstallOptions,
) -> Result<InstallReport> {
    let connection =
        ClusterConnection::resolve(opts.kubeconfig.as_deref(), opts.context.as_deref())?;
    let kubectl = Arc::new(Kubectl::new(opts.kubectl.clone(), connection));
    let installer = Installer::new(
        DependencyDeclaration::default(),
        kubectl.clone(),
        kubectl,
    );
    Ok(installer.install(manifests, version, opts).await)
}
