//! Inclusion/exclusion predicate over kind, name, labels and an exclude list.

use crate::error::{Error, Result};
use crate::item::ResourceItem;
use crate::kinds;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceFilter {
    /// Canonical kinds, e.g. `DeploymentConfig`.
    pub kinds: Vec<String>,
    /// `Kind/name`, or empty.
    pub name: String,
    /// Comma-joined `k=v` pairs, AND-composed.
    pub label: String,
    /// Kind, `Kind/name` or `k=v` tokens.
    pub excludes: Vec<String>,
}

impl ResourceFilter {
    /// Build a filter from a resource argument (`dc,svc` or `dc/foo`),
    /// a label selector and a comma-joined exclude list.
    pub fn new(resource: &str, selector: &str, exclude: &str) -> Result<Self> {
        let mut filter = ResourceFilter { label: selector.trim().to_string(), ..Default::default() };
        for token in split_tokens(resource) {
            match token.split_once('/') {
                Some((kind, name)) => {
                    let kind = canonical(kind)?;
                    filter.name = format!("{}/{}", kind, name);
                    push_unique(&mut filter.kinds, kind);
                }
                None => push_unique(&mut filter.kinds, canonical(token)?),
            }
        }
        for token in split_tokens(exclude) {
            let normalized = if token.contains('=') {
                token.to_string()
            } else if let Some((kind, name)) = token.split_once('/') {
                format!("{}/{}", canonical(kind)?, name)
            } else {
                canonical(token)?.to_string()
            };
            push_unique(&mut filter.excludes, &normalized);
        }
        Ok(filter)
    }

    pub fn satisfied_by(&self, item: &ResourceItem) -> bool {
        if !self.name.is_empty() {
            if self.name != item.full_name() {
                return false;
            }
        } else if !self.kinds.is_empty() && !self.kinds.iter().any(|k| *k == item.kind) {
            return false;
        }
        if !split_tokens(&self.label).all(|pair| label_matches(item, pair)) {
            return false;
        }
        !self.excludes.iter().any(|token| {
            if token.contains('=') {
                label_matches(item, token)
            } else {
                *token == item.kind || *token == item.full_name()
            }
        })
    }

    /// Comma-joined resource types to export for this filter.
    pub fn export_kinds(&self) -> String {
        if let Some((kind, _)) = self.name.split_once('/') {
            return kind.to_string();
        }
        if !self.kinds.is_empty() {
            return self.kinds.join(",");
        }
        kinds::all_short_names()
    }
}

fn canonical(token: &str) -> Result<&'static str> {
    kinds::canonical_kind(token).ok_or_else(|| Error::UnknownKind(token.to_string()))
}

fn split_tokens(s: &str) -> impl Iterator<Item = &str> {
    s.split(',').map(str::trim).filter(|t| !t.is_empty())
}

fn push_unique(v: &mut Vec<String>, s: &str) {
    if !v.iter().any(|x| x == s) {
        v.push(s.to_string());
    }
}

fn label_matches(item: &ResourceItem, pair: &str) -> bool {
    match pair.split_once('=') {
        Some((k, v)) => item.has_label(k.trim(), Some(v.trim())),
        None => item.has_label(pair, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::Source;
    use serde_json::json;

    fn item(kind: &str, name: &str, labels: serde_json::Value) -> ResourceItem {
        ResourceItem::from_value(
            json!({"kind": kind, "metadata": {"name": name, "labels": labels}}),
            Source::Platform,
        )
        .unwrap()
    }

    #[test]
    fn resource_argument_maps_to_kinds() {
        let f = ResourceFilter::new("dc,svc", "", "").unwrap();
        assert_eq!(f.kinds, vec!["DeploymentConfig", "Service"]);
        assert!(f.name.is_empty());
        assert_eq!(f.export_kinds(), "DeploymentConfig,Service");

        let f = ResourceFilter::new("dc/foo", "", "").unwrap();
        assert_eq!(f.name, "DeploymentConfig/foo");
        assert_eq!(f.export_kinds(), "DeploymentConfig");
    }

    #[test]
    fn unknown_kind_is_rejected() {
        assert!(matches!(ResourceFilter::new("pods", "", ""), Err(Error::UnknownKind(k)) if k == "pods"));
        assert!(matches!(ResourceFilter::new("", "", "foo/bar"), Err(Error::UnknownKind(_))));
    }

    #[test]
    fn empty_filter_accepts_everything() {
        let f = ResourceFilter::new("", "", "").unwrap();
        assert!(f.satisfied_by(&item("ConfigMap", "x", json!({}))));
        assert_eq!(f.export_kinds(), kinds::all_short_names());
    }

    #[test]
    fn name_takes_precedence_over_kinds() {
        let f = ResourceFilter::new("dc/foo", "", "").unwrap();
        assert!(f.satisfied_by(&item("DeploymentConfig", "foo", json!({}))));
        assert!(!f.satisfied_by(&item("DeploymentConfig", "bar", json!({}))));
    }

    #[test]
    fn selector_is_and_composed() {
        let f = ResourceFilter::new("", "app=foo,tier=web", "").unwrap();
        assert!(f.satisfied_by(&item("Service", "a", json!({"app": "foo", "tier": "web"}))));
        assert!(!f.satisfied_by(&item("Service", "b", json!({"app": "foo"}))));
        assert!(!f.satisfied_by(&item("Service", "c", json!({}))));
    }

    #[test]
    fn exclude_matches_kind_name_or_label() {
        let f = ResourceFilter::new("", "", "bc,route/public,skip=true").unwrap();
        assert_eq!(f.excludes, vec!["BuildConfig", "Route/public", "skip=true"]);
        assert!(!f.satisfied_by(&item("BuildConfig", "x", json!({}))));
        assert!(!f.satisfied_by(&item("Route", "public", json!({}))));
        assert!(f.satisfied_by(&item("Route", "internal", json!({}))));
        assert!(!f.satisfied_by(&item("Service", "s", json!({"skip": "true"}))));
        assert!(f.satisfied_by(&item("Service", "t", json!({"skip": "false"}))));
    }
}
