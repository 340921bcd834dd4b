//! Tailorfile: one `key value` directive per line, defaults for the
//! command line.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};

pub const DEFAULT_FILE: &str = "Tailorfile";

const KNOWN_KEYS: &[&str] = &[
    "verbose",
    "debug",
    "non-interactive",
    "namespace",
    "selector",
    "exclude",
    "template-dir",
    "param-dir",
    "param",
    "param-file",
    "labels",
    "preserve",
    "preserve-immutable-fields",
    "ignore-unknown-parameters",
    "upsert-only",
    "allow-recreate",
    "reveal-secrets",
    "verify",
    "force",
    "oc-binary",
    "public-key-dir",
    "private-key",
    "passphrase",
    "resource",
];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tailorfile {
    directives: BTreeMap<String, String>,
}

impl Tailorfile {
    /// Load `path`. A missing file is an error only when `explicit`.
    pub fn load(path: &Path, explicit: bool) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(text) => Self::parse(&text).with_context(|| format!("reading {}", path.display())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && !explicit => Ok(Self::default()),
            Err(e) => Err(e).with_context(|| format!("cannot read {}", path.display())),
        }
    }

    pub fn parse(text: &str) -> Result<Self> {
        let mut directives: BTreeMap<String, String> = BTreeMap::new();
        for (n, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with("//") {
                continue;
            }
            let (key, value) = match line.split_once(char::is_whitespace) {
                Some((key, value)) => (key, value.trim()),
                None if KNOWN_KEYS.contains(&line) => (line, ""),
                None => ("resource", line),
            };
            if !KNOWN_KEYS.contains(&key) {
                bail!("line {}: unknown directive '{}'", n + 1, key);
            }
            directives
                .entry(key.to_string())
                .and_modify(|existing| {
                    if !value.is_empty() {
                        if !existing.is_empty() {
                            existing.push(',');
                        }
                        existing.push_str(value);
                    }
                })
                .or_insert_with(|| value.to_string());
        }
        Ok(Self { directives })
    }

    pub fn string(&self, key: &str) -> Option<&str> {
        self.directives.get(key).map(String::as_str)
    }

    /// Comma-separated values of a repeatable directive.
    pub fn list(&self, key: &str) -> Vec<String> {
        self.string(key)
            .map(|v| v.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_string).collect())
            .unwrap_or_default()
    }

    /// A flag directive: present without value, `true` or `false`.
    pub fn flag(&self, key: &str) -> Result<bool> {
        match self.string(key) {
            None => Ok(false),
            Some("") | Some("true") => Ok(true),
            Some("false") => Ok(false),
            Some(other) => Err(anyhow!("directive '{}' expects true or false, got '{}'", key, other)),
        }
    }
}
