//! A single resource in normalized form.
//!
//! Construction strips everything the platform manages on its own so a
//! template item and an exported item can be compared field by field.
//! `paths` always equals the pre-order walk of `config`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::kinds::{
    self, EXPORT_NOISE_FIELDS, PLATFORM_MANAGED_REGEX_FIELDS, PLATFORM_MANAGED_SIMPLE_FIELDS,
};
use crate::pointer;

pub const LAST_APPLIED_ANNOTATION: &str = "kubectl.kubernetes.io/last-applied-configuration";

const ANNOTATIONS_POINTER: &str = "/metadata/annotations";
const DC_CONTAINERS_POINTER: &str = "/spec/template/spec/containers";

/// Where an item came from: the processed templates or the live namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Template,
    Platform,
}

#[derive(Debug, Clone)]
pub struct ResourceItem {
    pub source: Source,
    pub kind: String,
    pub name: String,
    pub labels: Map<String, Value>,
    pub annotations: Map<String, Value>,
    /// Every pointer reaching a branch or leaf of `config`.
    pub paths: Vec<String>,
    pub config: Value,
    pub last_applied_configuration: Map<String, Value>,
    pub last_applied_annotations: Map<String, Value>,
    /// Whether `/metadata/annotations` existed before normalization.
    pub annotations_present: bool,
}

impl ResourceItem {
    pub fn from_yaml(yaml: &str, source: Source) -> Result<Self> {
        let raw: serde_yaml::Value = serde_yaml::from_str(yaml)?;
        let config = serde_json::to_value(raw)?;
        Self::from_value(config, source)
    }

    pub fn from_value(mut config: Value, source: Source) -> Result<Self> {
        if !config.is_object() {
            return Err(Error::malformed("resource is not a mapping", None));
        }
        let kind = config
            .pointer("/kind")
            .and_then(Value::as_str)
            .filter(|k| !k.is_empty())
            .ok_or_else(|| Error::malformed("missing /kind", None))?
            .to_string();
        let name = ["/metadata/name", "/metadata/generateName"]
            .iter()
            .find_map(|p| config.pointer(p).and_then(Value::as_str).filter(|n| !n.is_empty()))
            .ok_or_else(|| Error::malformed(format!("{} has neither /metadata/name nor /metadata/generateName", kind), Some(&kind)))?
            .to_string();

        let labels = object_at(&config, "/metadata/labels");
        let annotations_present = config.pointer(ANNOTATIONS_POINTER).map_or(false, |v| !v.is_null());
        let annotations = object_at(&config, ANNOTATIONS_POINTER);
        if !annotations_present {
            pointer::set(&mut config, ANNOTATIONS_POINTER, Value::Object(Map::new()));
        }

        let last_applied_configuration = match annotations.get(LAST_APPLIED_ANNOTATION).and_then(Value::as_str) {
            Some(raw) => match serde_json::from_str::<Value>(raw) {
                Ok(Value::Object(map)) => map,
                Ok(_) | Err(_) => {
                    warn!(kind = %kind, name = %name, "ignoring malformed last-applied-configuration annotation");
                    Map::new()
                }
            },
            None => Map::new(),
        };
        let last_applied_annotations = last_applied_configuration
            .get("metadata")
            .and_then(|m| m.get("annotations"))
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();

        let mut item = ResourceItem {
            source,
            kind,
            name,
            labels,
            annotations,
            paths: Vec::new(),
            config,
            last_applied_configuration,
            last_applied_annotations,
            annotations_present,
        };
        item.normalize();
        Ok(item)
    }

    fn normalize(&mut self) {
        if self.kind == "DeploymentConfig" && self.source == Source::Platform {
            self.restore_applied_images();
        }
        for field in PLATFORM_MANAGED_SIMPLE_FIELDS.iter().chain(EXPORT_NOISE_FIELDS) {
            if pointer::remove(&mut self.config, field).is_some() {
                debug!(item = %self.full_name(), field, "removed platform-managed field");
            }
        }
        let managed: Vec<String> = pointer::walk(&self.config)
            .into_iter()
            .filter(|p| PLATFORM_MANAGED_REGEX_FIELDS.iter().any(|re| re.is_match(p)))
            .collect();
        // Deepest first so sequence indices stay valid while removing.
        for p in managed.iter().rev() {
            pointer::remove(&mut self.config, p);
            debug!(item = %self.full_name(), field = %p, "removed platform-managed field");
        }
        self.refresh_paths();
    }

    /// The platform resolves image tags to digests on deployment. The image
    /// recorded in last-applied-configuration is what was submitted.
    fn restore_applied_images(&mut self) {
        let applied = self
            .last_applied_configuration
            .get("spec")
            .and_then(|s| s.pointer("/template/spec/containers"))
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        for (i, container) in applied.iter().enumerate() {
            let Some(image) = container.get("image").and_then(Value::as_str) else { continue };
            let container_ptr = format!("{}/{}", DC_CONTAINERS_POINTER, i);
            if self.config.pointer(&container_ptr).is_none() {
                continue;
            }
            let image_ptr = format!("{}/image", container_ptr);
            if self.config.pointer(&image_ptr).and_then(Value::as_str) != Some(image) {
                debug!(item = %self.full_name(), container = i, image, "restoring applied image");
                pointer::set(&mut self.config, &image_ptr, Value::String(image.to_string()));
            }
        }
    }

    fn refresh_paths(&mut self) {
        self.paths = pointer::walk(&self.config);
    }

    /// `Kind/name`, the identity used for pairing and `--resource`.
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.kind, self.name)
    }

    /// `short-kind/name`, e.g. `dc/foo`, used in logs and prompts.
    pub fn short_name(&self) -> String {
        format!("{}/{}", kinds::short_name(&self.kind), self.name)
    }

    pub fn has_label(&self, key: &str, value: Option<&str>) -> bool {
        match (self.labels.get(key), value) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(v), Some(want)) => scalar_string(v).as_deref() == Some(want),
        }
    }

    pub fn yaml_config(&self) -> Result<String> {
        Ok(serde_yaml::to_string(&self.config)?)
    }

    /// Align a template item with the live item before comparing.
    ///
    /// For each preserved pointer the live value replaces the desired one;
    /// where the live item has nothing the desired value is dropped as well.
    pub fn prepare_for_platform(&mut self, platform: &ResourceItem, preserve: &[String]) {
        for p in preserve {
            match platform.config.pointer(p) {
                Some(live) => {
                    if pointer::set(&mut self.config, p, live.clone()) {
                        debug!(item = %self.full_name(), path = %p, "preserving live value");
                    } else {
                        warn!(item = %self.full_name(), path = %p, "cannot preserve path: parent is not a container");
                    }
                }
                None => {
                    if pointer::remove(&mut self.config, p).is_some() {
                        debug!(item = %self.full_name(), path = %p, "dropping preserved path absent on platform");
                    }
                }
            }
        }
        self.refresh_annotations();
        self.refresh_paths();
    }

    /// Drop annotations that neither the template nor the last applied
    /// configuration know about. They were added outside of Tailor.
    pub fn prepare_for_template(&mut self, template: &ResourceItem) {
        let desired = object_at(&template.config, ANNOTATIONS_POINTER);
        let unmanaged: Vec<String> = self
            .annotations
            .keys()
            .filter(|k| !desired.contains_key(*k) && !self.last_applied_annotations.contains_key(*k))
            .cloned()
            .collect();
        for key in unmanaged {
            pointer::remove(&mut self.config, &pointer::join(ANNOTATIONS_POINTER, &key));
            self.annotations.remove(&key);
            debug!(item = %self.full_name(), annotation = %key, "ignoring unmanaged annotation");
        }
        self.refresh_paths();
    }

    fn refresh_annotations(&mut self) {
        self.annotations = object_at(&self.config, ANNOTATIONS_POINTER);
        self.labels = object_at(&self.config, "/metadata/labels");
    }
}

fn object_at(tree: &Value, ptr: &str) -> Map<String, Value> {
    tree.pointer(ptr).and_then(Value::as_object).cloned().unwrap_or_default()
}

/// Render a scalar the way it appears in a label selector.
pub(crate) fn scalar_string(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn platform_pvc() -> &'static str {
        r#"
apiVersion: v1
kind: PersistentVolumeClaim
metadata:
  annotations:
    pv.kubernetes.io/bind-completed: "yes"
    pv.kubernetes.io/bound-by-controller: "yes"
    volume.beta.kubernetes.io/storage-provisioner: kubernetes.io/aws-ebs
  creationTimestamp: 2018-01-01T00:00:00Z
  labels:
    app: foo
  name: foo
  namespace: foo-dev
  resourceVersion: "1234"
  uid: 2c1f0b5e-0000-0000-0000-000000000000
spec:
  accessModes:
  - ReadWriteOnce
  resources:
    requests:
      storage: 1Gi
  storageClassName: gp2
  volumeName: pvc-2c1f0b5e
status:
  phase: Bound
"#
    }

    #[test]
    fn strips_platform_managed_fields() {
        let item = ResourceItem::from_yaml(platform_pvc(), Source::Platform).unwrap();
        assert_eq!(item.kind, "PersistentVolumeClaim");
        assert_eq!(item.name, "foo");
        for gone in ["/metadata/creationTimestamp", "/status", "/spec/volumeName", "/metadata/uid", "/metadata/namespace"] {
            assert!(item.config.pointer(gone).is_none(), "{} should be gone", gone);
            assert!(!item.paths.iter().any(|p| p == gone));
        }
        for p in &item.paths {
            assert!(item.config.pointer(p).is_some(), "{} must resolve", p);
        }
        assert!(item.annotations_present);
    }

    #[test]
    fn falls_back_to_generate_name() {
        let item = ResourceItem::from_value(
            json!({"kind": "Pod", "metadata": {"generateName": "job-"}}),
            Source::Template,
        )
        .unwrap();
        assert_eq!(item.name, "job-");
        assert!(!item.annotations_present);
        assert_eq!(item.config.pointer("/metadata/annotations"), Some(&json!({})));
    }

    #[test]
    fn rejects_items_without_kind_or_name() {
        let e = ResourceItem::from_value(json!({"metadata": {"name": "x"}}), Source::Template).unwrap_err();
        assert!(matches!(e, Error::MalformedItem { .. }));
        let e = ResourceItem::from_value(json!({"kind": "ConfigMap", "metadata": {}}), Source::Template).unwrap_err();
        assert!(matches!(e, Error::MalformedItem { kind: Some(ref k), .. } if k == "ConfigMap"));
    }

    #[test]
    fn removes_last_triggered_images() {
        let item = ResourceItem::from_value(
            json!({
                "kind": "DeploymentConfig",
                "metadata": {"name": "foo"},
                "spec": {"triggers": [
                    {"type": "ConfigChange"},
                    {"type": "ImageChange", "imageChangeParams": {
                        "from": {"name": "foo:latest"},
                        "lastTriggeredImage": "registry/foo@sha256:abc"
                    }}
                ]}
            }),
            Source::Platform,
        )
        .unwrap();
        assert!(item.config.pointer("/spec/triggers/1/imageChangeParams/lastTriggeredImage").is_none());
        assert!(item.config.pointer("/spec/triggers/1/imageChangeParams/from/name").is_some());
        assert!(!item.paths.iter().any(|p| p.ends_with("lastTriggeredImage")));
    }

    #[test]
    fn restores_images_from_last_applied_configuration() {
        let applied = json!({
            "kind": "DeploymentConfig",
            "metadata": {"name": "foo"},
            "spec": {"template": {"spec": {"containers": [{"name": "foo", "image": "foo:latest"}]}}}
        });
        let item = ResourceItem::from_value(
            json!({
                "kind": "DeploymentConfig",
                "metadata": {"name": "foo", "annotations": {LAST_APPLIED_ANNOTATION: applied.to_string()}},
                "spec": {"template": {"spec": {"containers": [
                    {"name": "foo", "image": "172.30.1.1:5000/ns/foo@sha256:abc"},
                    {"name": "sidecar", "image": "sidecar:1"}
                ]}}}
            }),
            Source::Platform,
        )
        .unwrap();
        assert_eq!(item.config.pointer("/spec/template/spec/containers/0/image"), Some(&json!("foo:latest")));
        assert_eq!(item.config.pointer("/spec/template/spec/containers/1/image"), Some(&json!("sidecar:1")));
        assert!(item.last_applied_annotations.is_empty());
    }

    #[test]
    fn malformed_last_applied_is_ignored() {
        let item = ResourceItem::from_value(
            json!({"kind": "ConfigMap", "metadata": {"name": "x", "annotations": {LAST_APPLIED_ANNOTATION: "{not json"}}}),
            Source::Platform,
        )
        .unwrap();
        assert!(item.last_applied_configuration.is_empty());
    }

    #[test]
    fn platform_drops_unmanaged_annotations() {
        let applied = json!({"metadata": {"annotations": {"managed-before": "1"}}});
        let mut platform = ResourceItem::from_value(
            json!({"kind": "ConfigMap", "metadata": {"name": "x", "annotations": {
                "added-by-operator": "y",
                "managed-before": "1",
                "in-template": "z",
                LAST_APPLIED_ANNOTATION: applied.to_string()
            }}}),
            Source::Platform,
        )
        .unwrap();
        let template = ResourceItem::from_value(
            json!({"kind": "ConfigMap", "metadata": {"name": "x", "annotations": {"in-template": "z"}}}),
            Source::Template,
        )
        .unwrap();
        platform.prepare_for_template(&template);
        let annotations = platform.config.pointer("/metadata/annotations").unwrap().as_object().unwrap();
        let mut keys: Vec<_> = annotations.keys().cloned().collect();
        keys.sort();
        assert_eq!(keys, vec!["in-template", "managed-before"]);
        assert!(!platform.paths.iter().any(|p| p.contains("added-by-operator")));
    }

    #[test]
    fn template_takes_preserved_values_from_platform() {
        let platform = ResourceItem::from_value(
            json!({"kind": "BuildConfig", "metadata": {"name": "foo"}, "spec": {"output": {
                "to": {"kind": "ImageStreamTag", "name": "foo:abcdef"},
                "imageLabels": [{"name": "a", "value": "b"}]
            }}}),
            Source::Platform,
        )
        .unwrap();
        let mut template = ResourceItem::from_value(
            json!({"kind": "BuildConfig", "metadata": {"name": "foo"}, "spec": {
                "output": {"to": {"kind": "ImageStreamTag", "name": "foo:latest"}},
                "runPolicy": "Serial"
            }}),
            Source::Template,
        )
        .unwrap();
        template.prepare_for_platform(
            &platform,
            &["/spec/output/to/name".to_string(), "/spec/output/imageLabels".to_string(), "/spec/runPolicy".to_string()],
        );
        assert_eq!(template.config.pointer("/spec/output/to/name"), Some(&json!("foo:abcdef")));
        assert!(template.paths.iter().any(|p| p == "/spec/output/imageLabels/0/value"));
        assert!(template.config.pointer("/spec/runPolicy").is_none());
        for p in &template.paths {
            assert!(template.config.pointer(p).is_some());
        }
    }

    #[test]
    fn labels_match_selector_values() {
        let item = ResourceItem::from_value(
            json!({"kind": "Service", "metadata": {"name": "x", "labels": {"app": "foo", "tier": 1}}}),
            Source::Template,
        )
        .unwrap();
        assert!(item.has_label("app", Some("foo")));
        assert!(item.has_label("tier", Some("1")));
        assert!(item.has_label("app", None));
        assert!(!item.has_label("app", Some("bar")));
        assert!(!item.has_label("env", None));
        assert_eq!(item.short_name(), "svc/x");
        assert_eq!(item.full_name(), "Service/x");
    }
}
