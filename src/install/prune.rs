//! Removing a disabled component's objects from the cluster.

use std::sync::Arc;

use tracing::{error, info};

use crate::cluster::{ExecFlags, ManifestExecutor};
use crate::component::ComponentName;
use crate::error::{MeshError, Result};
use crate::manifest::{component_selector, parse_list};

/// What a prune sent and got back.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PruneOutput {
    pub stdout: String,
    pub stderr: String,
    /// The list document handed to `delete`, empty for a no-op.
    pub manifest: String,
    pub deleted: usize,
}

/// Finds live objects carrying a component's label and deletes them.
pub struct PruneManager {
    executor: Arc<dyn ManifestExecutor>,
}

impl PruneManager {
    pub fn new(executor: Arc<dyn ManifestExecutor>) -> Self {
        Self { executor }
    }

    pub async fn prune(&self, name: &ComponentName, flags: ExecFlags) -> Result<PruneOutput> {
        let result = self.prune_inner(name, flags).await;
        match &result {
            Ok(out) if out.deleted == 0 => {}
            Ok(_) => info!("✔ Finished pruning objects for component {}", name),
            Err(e) => error!("✘ Finished pruning objects for component {}: {}", name, e),
        }
        result
    }

    async fn prune_inner(&self, name: &ComponentName, flags: ExecFlags) -> Result<PruneOutput> {
        let selector = component_selector(name);
        let listed = self
            .executor
            .get_all(
                "",
                "yaml",
                &[
                    "--all-namespaces".to_string(),
                    "--selector".to_string(),
                    selector.clone(),
                ],
            )
            .await?;
        if !listed.success() {
            return Err(MeshError::Executor(listed.stderr.trim().to_string()));
        }

        let live = parse_list(&listed.stdout)?;
        if live.is_empty() {
            return Ok(PruneOutput::default());
        }

        info!(
            "Pruning {} objects for disabled component {}",
            live.len(),
            name
        );
        let deleted = self
            .executor
            .delete(
                flags,
                "",
                &listed.stdout,
                &["--selector".to_string(), selector],
            )
            .await?;
        if !deleted.success() {
            return Err(MeshError::Executor(deleted.stderr.trim().to_string()));
        }
        Ok(PruneOutput {
            stdout: deleted.stdout,
            stderr: deleted.stderr,
            manifest: listed.stdout,
            deleted: live.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::{CommandOutput, MockManifestExecutor};

    const LIVE: &str = r#"apiVersion: v1
kind: List
items:
  - apiVersion: v1
    kind: ConfigMap
    metadata: {name: kiali, namespace: mesh-system}
  - apiVersion: apps/v1
    kind: Deployment
    metadata: {name: kiali, namespace: mesh-system}
"#;

    #[tokio::test]
    async fn test_nothing_live_is_noop() {
        let mut exec = MockManifestExecutor::new();
        exec.expect_get_all()
            .withf(|ns, format, args| {
                ns.is_empty()
                    && format == "yaml"
                    && args
                        == [
                            "--all-namespaces".to_string(),
                            "--selector".to_string(),
                            "install.operator.mesh.io/component=Kiali".to_string(),
                        ]
            })
            .times(1)
            .returning(|_, _, _| Ok(CommandOutput::new("apiVersion: v1\nkind: List\nitems: []\n", "", Some(0))));
        exec.expect_delete().times(0);

        let out = PruneManager::new(Arc::new(exec))
            .prune(&ComponentName::KIALI, ExecFlags::default())
            .await
            .unwrap();
        assert_eq!(out, PruneOutput::default());
    }

    #[tokio::test]
    async fn test_live_objects_deleted_once_with_selector() {
        let mut exec = MockManifestExecutor::new();
        exec.expect_get_all()
            .times(1)
            .returning(|_, _, _| Ok(CommandOutput::new(LIVE, "", Some(0))));
        exec.expect_delete()
            .withf(|_, ns, manifest, args| {
                ns.is_empty()
                    && manifest == LIVE
                    && args
                        == [
                            "--selector".to_string(),
                            "install.operator.mesh.io/component=Kiali".to_string(),
                        ]
            })
            .times(1)
            .returning(|_, _, _, _| {
                Ok(CommandOutput::new(
                    "configmap \"kiali\" deleted\ndeployment.apps \"kiali\" deleted",
                    "",
                    Some(0),
                ))
            });

        let out = PruneManager::new(Arc::new(exec))
            .prune(&ComponentName::KIALI, ExecFlags::default())
            .await
            .unwrap();
        assert_eq!(out.deleted, 2);
        assert_eq!(out.manifest, LIVE);
        assert!(out.stdout.contains("deployment.apps \"kiali\" deleted"));
    }

    #[tokio::test]
    async fn test_get_failure_is_recorded() {
        let mut exec = MockManifestExecutor::new();
        exec.expect_get_all()
            .returning(|_, _, _| Ok(CommandOutput::new("", "error: Unauthorized\n", Some(1))));
        let err = PruneManager::new(Arc::new(exec))
            .prune(&ComponentName::KIALI, ExecFlags::default())
            .await
            .unwrap_err();
        assert!(matches!(err, MeshError::Executor(ref m) if m == "error: Unauthorized"));
    }

    #[tokio::test]
    async fn test_delete_failure_is_recorded() {
        let mut exec = MockManifestExecutor::new();
        exec.expect_get_all()
            .returning(|_, _, _| Ok(CommandOutput::new(LIVE, "", Some(0))));
        exec.expect_delete()
            .returning(|_, _, _, _| Ok(CommandOutput::new("", "error: forbidden", Some(1))));
        let err = PruneManager::new(Arc::new(exec))
            .prune(&ComponentName::KIALI, ExecFlags::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("forbidden"));
    }

    #[tokio::test]
    async fn test_malformed_listing() {
        let mut exec = MockManifestExecutor::new();
        exec.expect_get_all()
            .returning(|_, _, _| Ok(CommandOutput::new("kind: ConfigMap\nmetadata: {name: x}\n", "", Some(0))));
        let err = PruneManager::new(Arc::new(exec))
            .prune(&ComponentName::KIALI, ExecFlags::default())
            .await
            .unwrap_err();
        assert!(matches!(err, MeshError::Parse(_)));
    }
}
