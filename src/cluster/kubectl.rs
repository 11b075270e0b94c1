//! kubectl-backed executor and client.

use std::process::Stdio;

use async_trait::async_trait;
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info};

use super::{ClusterClient, ClusterConnection, CommandOutput, ExecFlags, ManifestExecutor};
use crate::error::{MeshError, Result};

/// Runs `kubectl` against one resolved connection. Manifests are piped on
/// stdin (`-f -`), reads use `-o json`.
#[derive(Debug, Clone)]
pub struct Kubectl {
    binary: String,
    connection: ClusterConnection,
}

impl Kubectl {
    pub fn new(binary: impl Into<String>, connection: ClusterConnection) -> Self {
        Self {
            binary: binary.into(),
            connection,
        }
    }

    fn args(&self, verb: &[&str], namespace: &str, extra_args: &[String]) -> Vec<String> {
        let mut args = self.connection.kubectl_args();
        args.extend(verb.iter().map(|s| s.to_string()));
        if !namespace.is_empty() {
            args.push("--namespace".to_string());
            args.push(namespace.to_string());
        }
        args.extend(extra_args.iter().cloned());
        args
    }

    fn command_line(&self, args: &[String]) -> String {
        format!("{} {}", self.binary, args.join(" "))
    }

    async fn run(&self, args: &[String], stdin: Option<&str>) -> Result<CommandOutput> {
        let mut cmd = Command::new(&self.binary);
        cmd.args(args)
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd
            .spawn()
            .map_err(|e| MeshError::Executor(format!("failed to run {}: {}", self.binary, e)))?;

        // Feed stdin from its own task so a chatty child can't block on a
        // full stdout pipe while we are still writing.
        let writer = match (stdin, child.stdin.take()) {
            (Some(input), Some(mut pipe)) => {
                let bytes = input.as_bytes().to_vec();
                Some(tokio::spawn(async move {
                    pipe.write_all(&bytes).await?;
                    pipe.shutdown().await
                }))
            }
            _ => None,
        };

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| MeshError::Executor(format!("{} failed: {}", self.binary, e)))?;
        if let Some(writer) = writer {
            match writer.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => debug!("writing manifest to {} stdin: {}", self.binary, e),
                Err(e) => debug!("stdin writer task failed: {}", e),
            }
        }

        Ok(CommandOutput::new(
            String::from_utf8_lossy(&output.stdout).to_string(),
            String::from_utf8_lossy(&output.stderr).to_string(),
            output.status.code(),
        ))
    }

    async fn run_with_manifest(
        &self,
        verb: &str,
        flags: ExecFlags,
        namespace: &str,
        manifest: &str,
        extra_args: &[String],
    ) -> Result<CommandOutput> {
        let args = self.args(&[verb, "-f", "-"], namespace, extra_args);
        let command_line = self.command_line(&args);
        if flags.dry_run {
            info!("[dry-run] {}", command_line);
            if flags.verbose {
                info!("[dry-run] manifest:\n{}", manifest);
            }
            return Ok(CommandOutput::empty());
        }
        if flags.verbose {
            info!("Running {}", command_line);
        } else {
            debug!("Running {}", command_line);
        }
        self.run(&args, Some(manifest)).await
    }

    async fn read_json(&self, args: Vec<String>) -> Result<Value> {
        debug!("Running {}", self.command_line(&args));
        let output = self.run(&args, None).await?;
        if !output.success() {
            return Err(MeshError::Cluster(output.stderr.trim().to_string()));
        }
        serde_json::from_str(&output.stdout)
            .map_err(|e| MeshError::Cluster(format!("decoding kubectl output: {}", e)))
    }
}

#[async_trait]
impl ManifestExecutor for Kubectl {
    async fn apply(
        &self,
        flags: ExecFlags,
        namespace: &str,
        manifest: &str,
        extra_args: &[String],
    ) -> Result<CommandOutput> {
        self.run_with_manifest("apply", flags, namespace, manifest, extra_args)
            .await
    }

    async fn delete(
        &self,
        flags: ExecFlags,
        namespace: &str,
        manifest: &str,
        extra_args: &[String],
    ) -> Result<CommandOutput> {
        self.run_with_manifest("delete", flags, namespace, manifest, extra_args)
            .await
    }

    async fn get_all(
        &self,
        namespace: &str,
        output_format: &str,
        extra_args: &[String],
    ) -> Result<CommandOutput> {
        let args = self.args(&["get", "all", "-o", output_format], namespace, extra_args);
        debug!("Running {}", self.command_line(&args));
        self.run(&args, None).await
    }
}

#[async_trait]
impl ClusterClient for Kubectl {
    async fn get(&self, kind: &str, namespace: &str, name: &str) -> Result<Value> {
        let kind = kind.to_lowercase();
        let args = self.args(&["get", &kind, name, "-o", "json"], namespace, &[]);
        self.read_json(args).await
    }

    async fn list(&self, kind: &str, namespace: &str, selector: &str) -> Result<Vec<Value>> {
        let kind = kind.to_lowercase();
        let mut extra = Vec::new();
        if namespace.is_empty() {
            extra.push("--all-namespaces".to_string());
        }
        if !selector.is_empty() {
            extra.push("--selector".to_string());
            extra.push(selector.to_string());
        }
        let args = self.args(&["get", &kind, "-o", "json"], namespace, &extra);
        match self.read_json(args).await? {
            Value::Object(mut list) => match list.remove("items") {
                Some(Value::Array(items)) => Ok(items),
                Some(Value::Null) | None => Ok(Vec::new()),
                Some(_) => Err(MeshError::Cluster(format!("{} list items is not an array", kind))),
            },
            _ => Err(MeshError::Cluster(format!("{} list is not an object", kind))),
        }
    }
}
