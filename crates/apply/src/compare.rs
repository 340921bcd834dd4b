//! Field-by-field comparison of one template item against its live
//! counterpart.

use rustc_hash::FxHashSet;
use serde_json::Value;
use tailor_core::{kinds, pointer, JsonPatchOp, ResourceItem};
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub enum Comparison {
    Noop,
    Patch(Vec<JsonPatchOp>),
    /// An immutable field differs at `path`; the item must be recreated.
    Recreate { path: String },
}

/// Diff two items that went through the pairwise preparation.
///
/// Adds and replaces come in template walk order. Removes follow, deepest
/// and highest-index first, and never overlap so each stays addressable
/// after the ones before it were applied.
pub fn compare(template: &ResourceItem, platform: &ResourceItem) -> Comparison {
    let kind = template.kind.as_str();
    let mut visited: FxHashSet<&str> = FxHashSet::default();
    // Nodes handled as a whole; their descendants are not compared again.
    let mut covered: FxHashSet<&str> = FxHashSet::default();
    let mut ops = Vec::new();

    for p in &template.paths {
        if under_any(p, &covered) {
            continue;
        }
        let Some(desired) = pointer::get(&template.config, p) else { continue };
        visited.insert(p.as_str());
        match pointer::get(&platform.config, p) {
            None => {
                if touches_immutable(kind, p, &template.config) {
                    return Comparison::Recreate { path: p.clone() };
                }
                debug!(item = %template.full_name(), path = %p, "add");
                ops.push(JsonPatchOp::add(p.as_str(), desired.clone()));
                covered.insert(p.as_str());
            }
            Some(live) if same_container_shape(desired, live) => {}
            Some(live) if live == desired => {}
            Some(live) => {
                if kinds::is_immutable(kind, p) || touches_immutable(kind, p, &template.config) {
                    return Comparison::Recreate { path: p.clone() };
                }
                debug!(item = %template.full_name(), path = %p, "replace");
                ops.push(JsonPatchOp::replace(p.as_str(), desired.clone()));
                if pointer::is_container(desired) || pointer::is_container(live) {
                    covered.insert(p.as_str());
                }
            }
        }
    }

    let mut removed: Vec<&str> = Vec::new();
    let mut removed_set: FxHashSet<&str> = FxHashSet::default();
    for p in &platform.paths {
        if visited.contains(p.as_str()) || under_any(p, &covered) || under_any(p, &removed_set) {
            continue;
        }
        debug!(item = %platform.full_name(), path = %p, "remove");
        removed.push(p.as_str());
        removed_set.insert(p.as_str());
    }
    removed.sort_by(|a, b| pointer::compare(b, a));
    ops.extend(removed.into_iter().map(JsonPatchOp::remove));

    if ops.is_empty() {
        Comparison::Noop
    } else {
        Comparison::Patch(ops)
    }
}

fn under_any(p: &str, set: &FxHashSet<&str>) -> bool {
    !set.is_empty() && pointer::ancestors(p).iter().any(|a| set.contains(a.as_str()))
}

fn same_container_shape(a: &Value, b: &Value) -> bool {
    matches!((a, b), (Value::Object(_), Value::Object(_)) | (Value::Array(_), Value::Array(_)))
}

/// Whether writing `p` as a whole sets an immutable field: `p` is one, or
/// the desired subtree at `p` contains one.
fn touches_immutable(kind: &str, p: &str, desired: &Value) -> bool {
    kinds::is_immutable(kind, p)
        || kinds::immutable_fields(kind)
            .iter()
            .any(|f| pointer::is_descendant(f, p) && pointer::get(desired, f).is_some())
}
