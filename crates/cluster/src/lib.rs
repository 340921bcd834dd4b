//! Tailor cluster client – the operations the engine needs from the
//! platform, and an implementation that drives the `oc` binary.

#![forbid(unsafe_code)]

use std::process::Stdio;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tailor_core::{pointer, Error, JsonPatchOp, Result};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version {
    pub client: String,
    pub server: String,
}

/// Captured output of a successful invocation.
#[derive(Debug, Clone, Default)]
pub struct ProcessOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

/// Operations consumed from the cluster. Failures carry the client's
/// stderr in [`Error::ExternalProcessFailed`].
#[async_trait::async_trait]
pub trait ClusterClient: Send + Sync {
    async fn version(&self) -> Result<Version>;
    async fn current_project(&self) -> Result<String>;
    async fn check_project_exists(&self, namespace: &str) -> Result<bool>;
    async fn check_logged_in(&self) -> Result<bool>;
    /// Render a template; `args` are passed to `process` verbatim.
    async fn process(&self, args: &[String]) -> Result<ProcessOutput>;
    /// Export the given comma-joined kinds as YAML. Empty when nothing matches.
    async fn export(&self, kinds: &str, label: &str) -> Result<Vec<u8>>;
    /// Apply a JSON patch to `kind/name`.
    async fn patch(&self, target: &str, ops: &[JsonPatchOp]) -> Result<()>;
    /// Create a resource from YAML, labelled with the `k=v` pairs of `selector`.
    async fn create(&self, config: &str, selector: &str) -> Result<()>;
    async fn delete(&self, kind: &str, name: &str) -> Result<()>;
}

/// [`ClusterClient`] backed by the `oc` command line client.
#[derive(Debug, Clone)]
pub struct OcClient {
    binary: String,
    namespace: String,
}

impl OcClient {
    pub fn new(binary: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self { binary: binary.into(), namespace: namespace.into() }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    fn namespaced(&self, mut args: Vec<String>) -> Vec<String> {
        if !self.namespace.is_empty() {
            args.push(format!("--namespace={}", self.namespace));
        }
        args
    }

    /// Run the binary and return its output when it exits zero.
    async fn run(&self, operation: &str, args: &[String], stdin: Option<&[u8]>) -> Result<ProcessOutput> {
        debug!(binary = %self.binary, ?args, "executing");
        let mut cmd = Command::new(&self.binary);
        cmd.args(args)
            .stdin(if stdin.is_some() { Stdio::piped() } else { Stdio::null() })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        let mut child = cmd
            .spawn()
            .map_err(|e| Error::external(operation, format!("failed to execute {}: {}", self.binary, e)))?;
        if let (Some(input), Some(mut pipe)) = (stdin, child.stdin.take()) {
            pipe.write_all(input).await.map_err(|e| Error::io(&self.binary, e))?;
            drop(pipe);
        }
        let output = child.wait_with_output().await.map_err(|e| Error::io(&self.binary, e))?;
        if output.status.success() {
            Ok(ProcessOutput { stdout: output.stdout, stderr: output.stderr })
        } else {
            debug!(operation, status = ?output.status.code(), "command failed");
            Err(Error::external(operation, &output.stderr))
        }
    }

    /// Like [`run`](Self::run) but reports the exit status instead of failing.
    async fn probe(&self, args: &[String]) -> Result<bool> {
        match self.run("probe", args, None).await {
            Ok(_) => Ok(true),
            Err(Error::ExternalProcessFailed { stderr, .. }) if !stderr.starts_with("failed to execute") => {
                debug!(?args, %stderr, "probe negative");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }
}

#[async_trait::async_trait]
impl ClusterClient for OcClient {
    async fn version(&self) -> Result<Version> {
        let out = self.run("oc version", &["version".to_string()], None).await?;
        Ok(parse_version(&String::from_utf8_lossy(&out.stdout)))
    }

    async fn current_project(&self) -> Result<String> {
        let out = self.run("oc project", &["project".to_string(), "--short".to_string()], None).await?;
        Ok(String::from_utf8_lossy(&out.stdout).trim().to_string())
    }

    async fn check_project_exists(&self, namespace: &str) -> Result<bool> {
        self.probe(&["get".to_string(), "project".to_string(), namespace.to_string(), "--output=name".to_string()]).await
    }

    async fn check_logged_in(&self) -> Result<bool> {
        self.probe(&["whoami".to_string()]).await
    }

    async fn process(&self, args: &[String]) -> Result<ProcessOutput> {
        let mut full = vec!["process".to_string()];
        full.extend(args.iter().cloned());
        let full = self.namespaced(full);
        let out = self.run("oc process", &full, None).await?;
        if !out.stderr.is_empty() {
            warn!(stderr = %String::from_utf8_lossy(&out.stderr).trim(), "oc process reported warnings");
        }
        Ok(out)
    }

    async fn export(&self, kinds: &str, label: &str) -> Result<Vec<u8>> {
        let args = self.namespaced(export_args(kinds, label));
        let out = self.run("oc get", &args, None).await?;
        if String::from_utf8_lossy(&out.stderr).contains("No resources found") {
            return Ok(Vec::new());
        }
        Ok(out.stdout)
    }

    async fn patch(&self, target: &str, ops: &[JsonPatchOp]) -> Result<()> {
        let patch = serde_json::to_string(ops)?;
        let args = self.namespaced(vec![
            "patch".to_string(),
            target.to_string(),
            "--type=json".to_string(),
            format!("--patch={}", patch),
        ]);
        self.run("oc patch", &args, None).await?;
        info!(target, ops = ops.len(), "patched");
        Ok(())
    }

    async fn create(&self, config: &str, selector: &str) -> Result<()> {
        let labelled = with_selector_labels(config, selector)?;
        let args = self.namespaced(vec!["create".to_string(), "--save-config".to_string(), "--filename=-".to_string()]);
        self.run("oc create", &args, Some(labelled.as_bytes())).await?;
        info!("created");
        Ok(())
    }

    async fn delete(&self, kind: &str, name: &str) -> Result<()> {
        let args = self.namespaced(vec!["delete".to_string(), kind.to_string(), name.to_string()]);
        self.run("oc delete", &args, None).await?;
        info!(kind, name, "deleted");
        Ok(())
    }
}

pub fn export_args(kinds: &str, label: &str) -> Vec<String> {
    let mut args = vec!["get".to_string(), kinds.to_string(), "--output=yaml".to_string()];
    if !label.is_empty() {
        args.push(format!("--selector={}", label));
    }
    args
}

/// Parse `oc version` output of both the 3.x (`oc v3.11.0`, `openshift v3.11.0`)
/// and the 4.x (`Client Version: 4.6.0`, `Server Version: 4.6.0`) layouts.
pub fn parse_version(output: &str) -> Version {
    let mut v = Version::default();
    for line in output.lines().map(str::trim) {
        if let Some(rest) = line.strip_prefix("Client Version:") {
            v.client = rest.trim().to_string();
        } else if let Some(rest) = line.strip_prefix("Server Version:") {
            v.server = rest.trim().to_string();
        } else if let Some(rest) = line.strip_prefix("oc ") {
            v.client = rest.trim().to_string();
        } else if let Some(rest) = line.strip_prefix("openshift ") {
            v.server = rest.trim().to_string();
        }
    }
    v
}

/// Merge the `k=v` pairs of `selector` into `/metadata/labels` of a YAML resource.
pub fn with_selector_labels(config: &str, selector: &str) -> Result<String> {
    let pairs: Vec<(&str, &str)> = selector
        .split(',')
        .filter_map(|p| p.split_once('='))
        .map(|(k, v)| (k.trim(), v.trim()))
        .filter(|(k, _)| !k.is_empty())
        .collect();
    if pairs.is_empty() {
        return Ok(config.to_string());
    }
    let raw: serde_yaml::Value = serde_yaml::from_str(config)?;
    let mut doc: Value = serde_json::to_value(raw)?;
    for (k, v) in pairs {
        pointer::set(&mut doc, &pointer::join("/metadata/labels", k), Value::String(v.to_string()));
    }
    Ok(serde_yaml::to_string(&doc)?)
}
