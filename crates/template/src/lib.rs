//! Render local OpenShift templates through the cluster client.
//!
//! Each `*.yml`/`*.yaml` file in a template directory is passed to
//! `oc process` together with its parameter files. Encrypted overlays
//! (`<file>.enc`) are decrypted and appended to the plain parameters, and
//! the combined set is handed over in a scratch file that is removed once
//! processing returns.

#![forbid(unsafe_code)]

use std::path::{Path, PathBuf};

use serde_json::Value;
use tailor_cluster::ClusterClient;
use tailor_core::export::NAMESPACE_PARAMETER;
use tailor_core::{Error, Result};
use tailor_params::{ParamStore, ScratchFile};
use tracing::{debug, info};

/// Scratch file holding the combined parameters, relative to the working directory.
pub const COMBINED_PARAMS: &str = ".combined.env";

#[derive(Debug, Clone)]
pub struct TemplateOptions {
    pub template_dir: PathBuf,
    pub param_dir: PathBuf,
    /// Explicit parameter files. When empty, `<param_dir>/<stem>.env` or
    /// `<param_dir>/<namespace>/<stem>.env` is used.
    pub param_files: Vec<PathBuf>,
    /// `KEY=VALUE` overrides.
    pub params: Vec<String>,
    pub labels: String,
    pub namespace: String,
    pub ignore_unknown_parameters: bool,
    pub scratch: PathBuf,
}

impl Default for TemplateOptions {
    fn default() -> Self {
        Self {
            template_dir: PathBuf::from("."),
            param_dir: PathBuf::from("."),
            param_files: Vec::new(),
            params: Vec::new(),
            labels: String::new(),
            namespace: String::new(),
            ignore_unknown_parameters: false,
            scratch: PathBuf::from(COMBINED_PARAMS),
        }
    }
}

pub struct TemplateProcessor<'a> {
    client: &'a dyn ClusterClient,
    store: Option<&'a ParamStore>,
    opts: TemplateOptions,
}

impl<'a> TemplateProcessor<'a> {
    /// `store` is needed only when encrypted overlays exist.
    pub fn new(client: &'a dyn ClusterClient, store: Option<&'a ParamStore>, opts: TemplateOptions) -> Self {
        Self { client, store, opts }
    }

    /// Render every template in the template directory, in file name order.
    pub async fn process_all(&self) -> Result<Vec<Vec<u8>>> {
        let files = template_files(&self.opts.template_dir)?;
        debug!(dir = %self.opts.template_dir.display(), count = files.len(), "templates found");
        let mut rendered = Vec::with_capacity(files.len());
        for file in files {
            rendered.push(self.process_file(&file).await?);
        }
        Ok(rendered)
    }

    pub async fn process_file(&self, file: &Path) -> Result<Vec<u8>> {
        let mut args = vec![format!("--filename={}", file.display()), "--output=yaml".to_string()];
        if !self.opts.labels.is_empty() {
            args.push(format!("--labels={}", self.opts.labels));
        }
        for param in &self.opts.params {
            args.push(format!("--param={}", param));
        }

        let raw = std::fs::read_to_string(file).map_err(|e| Error::io(file, e))?;
        if declares_parameter(&raw, NAMESPACE_PARAMETER) {
            args.push(format!("--param={}={}", NAMESPACE_PARAMETER, self.opts.namespace));
        }

        let combined = self.combined_params(file)?;
        // Held until `process` returns so the client can read it.
        let _scratch = match combined {
            Some(contents) => {
                let scratch = ScratchFile::create(&self.opts.scratch, contents.as_bytes())?;
                args.push(format!("--param-file={}", scratch.path().display()));
                Some(scratch)
            }
            None => None,
        };

        if self.opts.ignore_unknown_parameters {
            args.push("--ignore-unknown-parameters=true".to_string());
        }

        let out = self.client.process(&args).await?;
        info!(template = %file.display(), bytes = out.stdout.len(), "processed");
        Ok(out.stdout)
    }

    /// Parameter files that apply to `template`, in order.
    pub fn param_files_for(&self, template: &Path) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = if self.opts.param_files.is_empty() {
            let stem = template.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
            let name = format!("{}.env", stem);
            let mut candidates = vec![self.opts.param_dir.join(&name)];
            if !self.opts.namespace.is_empty() {
                candidates.push(self.opts.param_dir.join(&self.opts.namespace).join(&name));
            }
            candidates.into_iter().find(|c| exists_with_overlay(c)).into_iter().collect()
        } else {
            self.opts.param_files.clone()
        };
        if !self.opts.namespace.is_empty() {
            let ns_file = self.opts.param_dir.join(format!("{}.env", self.opts.namespace));
            if exists_with_overlay(&ns_file) && !files.contains(&ns_file) {
                files.push(ns_file);
            }
        }
        files
    }

    fn combined_params(&self, template: &Path) -> Result<Option<String>> {
        let files = self.param_files_for(template);
        if files.is_empty() {
            return Ok(None);
        }
        let mut combined = String::new();
        for file in &files {
            let overlay = overlay_path(file);
            let has_overlay = overlay.is_file();
            if file.is_file() || !has_overlay {
                let contents = std::fs::read_to_string(file).map_err(|e| Error::io(file, e))?;
                push_normalized(&mut combined, &contents);
            }
            if has_overlay {
                let store = self.store.ok_or_else(|| {
                    Error::KeyMaterial(format!("{} is encrypted but no private key is configured", overlay.display()))
                })?;
                let contents = std::fs::read_to_string(&overlay).map_err(|e| Error::io(&overlay, e))?;
                push_normalized(&mut combined, &store.decrypt(&contents)?);
                debug!(overlay = %overlay.display(), "decrypted parameter overlay");
            }
        }
        Ok(Some(combined))
    }
}

/// Template files (`*.yml`, `*.yaml`) directly inside `dir`, sorted by name.
pub fn template_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir).map_err(|e| Error::io(dir, e))?;
    let mut files = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| Error::io(dir, e))?.path();
        let yaml = path.extension().map_or(false, |ext| ext == "yml" || ext == "yaml");
        if yaml && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Whether the template lists `name` under `/parameters`.
pub fn declares_parameter(raw: &str, name: &str) -> bool {
    let Ok(doc) = serde_yaml::from_str::<Value>(raw) else {
        return false;
    };
    doc.get("parameters")
        .and_then(Value::as_array)
        .map_or(false, |params| params.iter().any(|p| p.get("name").and_then(Value::as_str) == Some(name)))
}

fn overlay_path(file: &Path) -> PathBuf {
    let mut s = file.as_os_str().to_owned();
    s.push(".enc");
    PathBuf::from(s)
}

fn exists_with_overlay(file: &Path) -> bool {
    file.is_file() || overlay_path(file).is_file()
}

fn push_normalized(buf: &mut String, contents: &str) {
    buf.push_str(contents);
    if !contents.is_empty() && !contents.ends_with('\n') {
        buf.push('\n');
    }
}
