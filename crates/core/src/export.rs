//! Render current state as an OpenShift template.

use serde_json::{json, Map, Value};

use crate::error::Result;
use crate::item::{ResourceItem, LAST_APPLIED_ANNOTATION};
use crate::list::ResourceList;
use crate::pointer;

pub const NAMESPACE_PARAMETER: &str = "TAILOR_NAMESPACE";

/// Build a `Template` document whose objects are the normalized items of
/// `list`. Occurrences of `namespace` inside string values are replaced by
/// the `TAILOR_NAMESPACE` parameter.
pub fn export_as_template(list: &ResourceList, template_name: &str, namespace: &str) -> Result<String> {
    let objects: Vec<Value> = list.items.iter().map(|item| export_config(item, namespace)).collect();
    let mut doc = json!({
        "apiVersion": "template.openshift.io/v1",
        "kind": "Template",
        "metadata": {"name": template_name},
        "objects": objects,
    });
    if !namespace.is_empty() {
        doc["parameters"] = json!([{"name": NAMESPACE_PARAMETER, "required": true}]);
    }
    Ok(serde_yaml::to_string(&doc)?)
}

fn export_config(item: &ResourceItem, namespace: &str) -> Value {
    let mut config = item.config.clone();
    pointer::remove(&mut config, &pointer::join("/metadata/annotations", LAST_APPLIED_ANNOTATION));
    let empty = config
        .pointer("/metadata/annotations")
        .and_then(Value::as_object)
        .map_or(true, Map::is_empty);
    if empty && !item.annotations_present {
        pointer::remove(&mut config, "/metadata/annotations");
    }
    if !namespace.is_empty() {
        parameterize_namespace(&mut config, namespace);
    }
    config
}

fn parameterize_namespace(v: &mut Value, namespace: &str) {
    match v {
        Value::String(s) if s.contains(namespace) => {
            *s = s.replace(namespace, &format!("${{{}}}", NAMESPACE_PARAMETER));
        }
        Value::Object(map) => map.values_mut().for_each(|v| parameterize_namespace(v, namespace)),
        Value::Array(arr) => arr.iter_mut().for_each(|v| parameterize_namespace(v, namespace)),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::ResourceFilter;

    #[test]
    fn exports_template_with_namespace_parameter() {
        let export = r#"
kind: List
items:
- apiVersion: v1
  kind: ImageStream
  metadata:
    name: app
    namespace: foo-dev
  spec:
    dockerImageRepository: 172.30.1.1:5000/foo-dev/app
- apiVersion: v1
  kind: ConfigMap
  metadata:
    name: cfg
    annotations:
      kubectl.kubernetes.io/last-applied-configuration: '{"kind":"ConfigMap"}'
      team: a
  data:
    k: v
"#;
        let list = ResourceList::from_export(ResourceFilter::default(), export.as_bytes()).unwrap();
        let out = export_as_template(&list, "exported", "foo-dev").unwrap();
        let doc: Value = serde_yaml::from_str(&out).unwrap();
        assert_eq!(doc["kind"], "Template");
        assert_eq!(doc["objects"][0]["spec"]["dockerImageRepository"], "172.30.1.1:5000/${TAILOR_NAMESPACE}/app");
        assert!(doc["objects"][0]["metadata"].get("annotations").is_none());
        assert!(doc["objects"][0]["metadata"].get("namespace").is_none());
        assert_eq!(doc["objects"][1]["metadata"]["annotations"], json!({"team": "a"}));
        assert_eq!(doc["parameters"][0]["name"], NAMESPACE_PARAMETER);
    }
}
