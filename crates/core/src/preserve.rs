//! Preserve tokens: `path`, `kind:path` or `kind:name:path`.

use std::str::FromStr;

use crate::error::{Error, Result};
use crate::item::ResourceItem;
use crate::kinds;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreservePath {
    /// Canonical kind, or `None` for a global token.
    pub kind: Option<String>,
    /// Lowercase resource name, or `None` for all resources of the kind.
    pub name: Option<String>,
    pub pointer: String,
}

impl FromStr for PreservePath {
    type Err = Error;

    fn from_str(token: &str) -> Result<Self> {
        let token = token.trim();
        let parts: Vec<&str> = token.split(':').collect();
        let (kind, name, pointer) = match parts.as_slice() {
            [pointer] => (None, None, *pointer),
            [kind, pointer] => (Some(*kind), None, *pointer),
            [kind, name, pointer] => (Some(*kind), Some(*name), *pointer),
            _ => return Err(Error::PreserveTokenInvalid(token.to_string())),
        };
        if !pointer.starts_with('/') {
            return Err(Error::PreserveTokenInvalid(token.to_string()));
        }
        let kind = match kind {
            Some(k) => Some(
                kinds::canonical_kind(k)
                    .ok_or_else(|| Error::UnknownKind(k.to_string()))?
                    .to_string(),
            ),
            None => None,
        };
        Ok(PreservePath { kind, name: name.map(str::to_lowercase), pointer: pointer.to_string() })
    }
}

impl PreservePath {
    pub fn parse_all<S: AsRef<str>>(tokens: &[S]) -> Result<Vec<Self>> {
        tokens
            .iter()
            .flat_map(|t| t.as_ref().split(','))
            .filter(|t| !t.trim().is_empty())
            .map(|t| t.parse::<PreservePath>())
            .collect()
    }

    pub fn applies_to(&self, item: &ResourceItem) -> bool {
        if let Some(kind) = &self.kind {
            if *kind != item.kind {
                return false;
            }
        }
        match &self.name {
            Some(name) => *name == item.name.to_lowercase(),
            None => true,
        }
    }

    /// One `kind:path` token per immutable field of every kind.
    pub fn immutable_fields() -> Vec<Self> {
        kinds::kinds_with_immutable_fields()
            .flat_map(|(kind, fields)| {
                fields.iter().map(move |f| PreservePath { kind: Some(kind.to_string()), name: None, pointer: f.to_string() })
            })
            .collect()
    }
}

/// Pointers from `preserve` that apply to `item`, deduplicated.
pub fn paths_for(preserve: &[PreservePath], item: &ResourceItem) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for p in preserve.iter().filter(|p| p.applies_to(item)) {
        if !out.contains(&p.pointer) {
            out.push(p.pointer.clone());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::Source;
    use serde_json::json;

    fn item(kind: &str, name: &str) -> ResourceItem {
        ResourceItem::from_value(json!({"kind": kind, "metadata": {"name": name}}), Source::Template).unwrap()
    }

    #[test]
    fn parses_three_token_shapes() {
        let g: PreservePath = "/spec/replicas".parse().unwrap();
        assert_eq!(g, PreservePath { kind: None, name: None, pointer: "/spec/replicas".into() });
        let k: PreservePath = "bc:/spec/output/to/name".parse().unwrap();
        assert_eq!(k.kind.as_deref(), Some("BuildConfig"));
        let n: PreservePath = "dc:Foo:/spec/replicas".parse().unwrap();
        assert_eq!(n.name.as_deref(), Some("foo"));
    }

    #[test]
    fn rejects_too_many_separators_and_relative_paths() {
        assert!(matches!("a:b:c:/d".parse::<PreservePath>(), Err(Error::PreserveTokenInvalid(_))));
        assert!(matches!("dc:spec/replicas".parse::<PreservePath>(), Err(Error::PreserveTokenInvalid(_))));
        assert!(matches!("pod:/spec".parse::<PreservePath>(), Err(Error::UnknownKind(_))));
    }

    #[test]
    fn selects_paths_per_item() {
        let tokens = PreservePath::parse_all(&["/metadata/labels/x,dc:/spec/replicas", "dc:foo:/spec/paused", "bc:/spec/output"]).unwrap();
        assert_eq!(paths_for(&tokens, &item("DeploymentConfig", "Foo")), vec!["/metadata/labels/x", "/spec/replicas", "/spec/paused"]);
        assert_eq!(paths_for(&tokens, &item("DeploymentConfig", "bar")), vec!["/metadata/labels/x", "/spec/replicas"]);
        assert_eq!(paths_for(&tokens, &item("ConfigMap", "foo")), vec!["/metadata/labels/x"]);
    }

    #[test]
    fn immutable_fields_become_kind_tokens() {
        let tokens = PreservePath::immutable_fields();
        assert!(tokens.iter().any(|t| t.kind.as_deref() == Some("Route") && t.pointer == "/spec/host"));
        assert_eq!(tokens.len(), 5);
    }
}
