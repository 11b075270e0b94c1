//! Applying one component's manifest.
//!
//! Objects are labelled, sorted by kind priority and applied in three
//! steps: namespaces, then CRDs, then everything else. Namespaces must be
//! ready and CRDs established before the next step starts. An empty
//! manifest prunes whatever the component left in the cluster.

use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info};

use super::prune::PruneManager;
use super::wait::{CrdWaiter, ReadinessWaiter};
use super::{ApplyOutcome, InstallOptions};
use crate::cluster::{ClusterClient, CommandOutput, ExecFlags, ManifestExecutor};
use crate::component::ComponentName;
use crate::error::{MeshError, Result};
use crate::log_component;
use crate::manifest::{
    component_selector, parse_manifest, partition, sort_objects, to_yaml_manifest,
    ResourceObject, LABEL_COMPONENT, LABEL_MANAGED, LABEL_VERSION, MANAGED_RECONCILE,
};

/// Output collected across the apply steps of one component.
#[derive(Default)]
struct StepLog {
    stdout: Vec<String>,
    stderr: Vec<String>,
    sent: Vec<String>,
    applied: Vec<ResourceObject>,
}

impl StepLog {
    fn record(&mut self, sent: String, output: &CommandOutput) {
        self.sent.push(sent);
        if !output.stdout.is_empty() {
            self.stdout.push(output.stdout.clone());
        }
        if !output.stderr.is_empty() {
            self.stderr.push(output.stderr.clone());
        }
    }
}

/// Applies one component at a time. Shared by every component task.
pub struct ComponentApplyEngine {
    executor: Arc<dyn ManifestExecutor>,
    client: Arc<dyn ClusterClient>,
    root: ComponentName,
}

impl ComponentApplyEngine {
    /// `root` is the declaration root; its objects are never pruned.
    pub fn new(
        executor: Arc<dyn ManifestExecutor>,
        client: Arc<dyn ClusterClient>,
        root: ComponentName,
    ) -> Self {
        Self {
            executor,
            client,
            root,
        }
    }

    /// Apply `manifest` for `name`. Never fails: errors end up in the
    /// outcome. Also returns every object whose apply step succeeded.
    pub async fn apply_component(
        &self,
        name: &ComponentName,
        manifest: &str,
        version: &str,
        opts: &InstallOptions,
    ) -> (ApplyOutcome, Vec<ResourceObject>) {
        let started_at = Utc::now();
        let mut log = StepLog::default();
        let result = self.run_steps(name, manifest, version, opts, &mut log).await;

        if let Err(e) = &result {
            error!(component = %name, "✘ Finished applying manifest for component {}: {}", name, e);
        } else if !log.sent.is_empty() {
            info!(component = %name, "✔ Finished applying manifest for component {}", name);
        }

        let outcome = ApplyOutcome {
            stdout: log.stdout.join("\n"),
            stderr: log.stderr.join("\n"),
            error: result.err(),
            manifest: log.sent.join("---\n"),
            started_at,
            finished_at: Utc::now(),
        };
        (outcome, log.applied)
    }

    async fn run_steps(
        &self,
        name: &ComponentName,
        manifest: &str,
        version: &str,
        opts: &InstallOptions,
        log: &mut StepLog,
    ) -> Result<()> {
        let mut objects = parse_manifest(manifest)?;
        let flags = opts.exec_flags();

        if objects.is_empty() {
            log_component!(debug, name, "empty manifest, pruning");
            let pruned = PruneManager::new(Arc::clone(&self.executor))
                .prune(name, flags)
                .await?;
            if pruned.deleted > 0 {
                let output = CommandOutput::new(pruned.stdout, pruned.stderr, Some(0));
                log.record(pruned.manifest, &output);
            }
            return Ok(());
        }

        info!(component = %name, "Applying manifest for component {}", name);
        let mut namespace = String::new();
        for object in &mut objects {
            object.add_labels([
                (LABEL_MANAGED, MANAGED_RECONCILE),
                (LABEL_COMPONENT, name.as_str()),
                (LABEL_VERSION, version),
            ]);
            if !object.namespace().is_empty() {
                namespace = object.namespace().to_string();
            }
        }
        sort_objects(&mut objects);
        let parts = partition(objects);
        let force = vec!["--force".to_string()];

        if !parts.namespaces.is_empty() {
            self.apply_step(flags, &namespace, &parts.namespaces, &force, log)
                .await?;
            ReadinessWaiter::new(Arc::clone(&self.client))
                .with_interval(opts.ready_poll_interval)
                .wait(&parts.namespaces, opts.wait_timeout, opts.dry_run)
                .await?;
        }

        if !parts.crds.is_empty() {
            self.apply_step(flags, &namespace, &parts.crds, &force, log)
                .await?;
            CrdWaiter::new(Arc::clone(&self.client))
                .with_timing(opts.crd_poll_interval, opts.crd_timeout)
                .wait(&parts.crds, opts.dry_run)
                .await?;
        }

        if !parts.others.is_empty() {
            let mut extra_args = force;
            if *name != self.root {
                extra_args.extend([
                    "--prune".to_string(),
                    "--selector".to_string(),
                    component_selector(name),
                ]);
            }
            self.apply_step(flags, &namespace, &parts.others, &extra_args, log)
                .await?;
        }
        Ok(())
    }

    async fn apply_step(
        &self,
        flags: ExecFlags,
        namespace: &str,
        objects: &[ResourceObject],
        extra_args: &[String],
        log: &mut StepLog,
    ) -> Result<()> {
        let manifest = to_yaml_manifest(objects)?;
        let output = self
            .executor
            .apply(flags, namespace, &manifest, extra_args)
            .await?;
        log.record(manifest, &output);
        if !output.success() {
            let stderr = output.stderr.trim();
            return Err(MeshError::Executor(if stderr.is_empty() {
                format!("apply exited with {:?}", output.exit_code)
            } else {
                stderr.to_string()
            }));
        }
        log.applied.extend(objects.iter().cloned());
        Ok(())
    }
}
