//! Filtered, ordered collection of resource items.

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::error::{Error, Result};
use crate::filter::ResourceFilter;
use crate::item::{ResourceItem, Source};

#[derive(Debug, Clone, Default)]
pub struct ResourceList {
    pub filter: ResourceFilter,
    pub items: Vec<ResourceItem>,
}

impl ResourceList {
    pub fn new(filter: ResourceFilter) -> Self {
        Self { filter, items: Vec::new() }
    }

    /// Desired state: one rendered document per processed template.
    pub fn from_templates<B: AsRef<[u8]>>(filter: ResourceFilter, documents: &[B]) -> Result<Self> {
        let mut list = Self::new(filter);
        for doc in documents {
            list.append(doc.as_ref(), Source::Template)?;
        }
        Ok(list)
    }

    /// Current state: the output of an export. Empty input yields an empty list.
    pub fn from_export(filter: ResourceFilter, output: &[u8]) -> Result<Self> {
        let mut list = Self::new(filter);
        list.append(output, Source::Platform)?;
        Ok(list)
    }

    /// Parse every item of a (possibly multi-document) YAML stream and keep
    /// the ones the filter accepts. Wrappers may carry `/items` or `/objects`.
    pub fn append(&mut self, raw: &[u8], source: Source) -> Result<()> {
        let text = std::str::from_utf8(raw)
            .map_err(|e| Error::malformed(format!("input is not valid UTF-8: {}", e), None))?;
        if text.trim().is_empty() {
            return Ok(());
        }
        for document in serde_yaml::Deserializer::from_str(text) {
            let doc = serde_yaml::Value::deserialize(document)?;
            let doc: Value = serde_json::to_value(doc)?;
            for raw_item in unwrap_items(doc) {
                let item = ResourceItem::from_value(raw_item, source)?;
                if self.filter.satisfied_by(&item) {
                    self.items.push(item);
                } else {
                    debug!(item = %item.full_name(), "filtered out");
                }
            }
        }
        Ok(())
    }

    pub fn get_item(&self, kind: &str, name: &str) -> Option<&ResourceItem> {
        self.items.iter().find(|i| i.kind == kind && i.name == name)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

fn unwrap_items(doc: Value) -> Vec<Value> {
    match doc {
        Value::Null => Vec::new(),
        Value::Object(mut map) => {
            for key in ["items", "objects"] {
                match map.remove(key) {
                    Some(Value::Array(items)) => return items,
                    Some(Value::Null) => return Vec::new(),
                    _ => {}
                }
            }
            if map.contains_key("kind") {
                vec![Value::Object(map)]
            } else {
                Vec::new()
            }
        }
        other => vec![other],
    }
}
