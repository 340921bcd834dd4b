//! RFC 6902 JSON patch operations as sent to the cluster client.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchOpKind {
    Add,
    Replace,
    Remove,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonPatchOp {
    pub op: PatchOpKind,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub value: Option<Value>,
}

impl JsonPatchOp {
    pub fn add(path: impl Into<String>, value: Value) -> Self {
        Self { op: PatchOpKind::Add, path: path.into(), value: Some(value) }
    }

    pub fn replace(path: impl Into<String>, value: Value) -> Self {
        Self { op: PatchOpKind::Replace, path: path.into(), value: Some(value) }
    }

    pub fn remove(path: impl Into<String>) -> Self {
        Self { op: PatchOpKind::Remove, path: path.into(), value: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn serializes_like_rfc6902() {
        let ops = vec![JsonPatchOp::replace("/data/bar", json!("qux")), JsonPatchOp::remove("/data/old")];
        assert_eq!(
            serde_json::to_value(&ops).unwrap(),
            json!([{"op": "replace", "path": "/data/bar", "value": "qux"}, {"op": "remove", "path": "/data/old"}])
        );
    }

    #[test]
    fn add_keeps_explicit_null_values() {
        let op = JsonPatchOp::add("/spec/x", Value::Null);
        assert_eq!(serde_json::to_value(&op).unwrap(), json!({"op": "add", "path": "/spec/x", "value": null}));
    }
}
