//! A single planned change and its rendered diff.

use serde::Serialize;
use similar::TextDiff;
use tailor_core::{kinds, JsonPatchOp, Result};

pub const CURRENT_HEADER: &str = "Current State (OpenShift cluster)";
pub const DESIRED_HEADER: &str = "Desired State (Processed template)";

const SECRET_PLACEHOLDER: &str = "Secret drift is hidden. Use --reveal-secrets to see details.\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Action {
    Create,
    Update,
    Delete,
    Noop,
}

/// One step of a changeset.
#[derive(Debug, Clone, Serialize)]
pub struct Change {
    pub action: Action,
    pub kind: String,
    pub name: String,
    /// YAML of the live item, empty for creations.
    pub current_state: String,
    /// YAML of the processed template item, empty for deletions.
    pub desired_state: String,
    /// JSON patch for updates, empty otherwise.
    pub patches: Vec<JsonPatchOp>,
}

impl Change {
    pub fn new(action: Action, kind: &str, name: &str) -> Self {
        Self {
            action,
            kind: kind.to_string(),
            name: name.to_string(),
            current_state: String::new(),
            desired_state: String::new(),
            patches: Vec::new(),
        }
    }

    /// `short-kind/name`, e.g. `cm/foo`.
    pub fn item_name(&self) -> String {
        format!("{}/{}", kinds::short_name(&self.kind), self.name)
    }

    /// `Kind/name`, the target for patch operations.
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.kind, self.name)
    }

    /// Unified diff from current to desired state. Secret contents are
    /// hidden behind a placeholder unless `reveal_secrets` is set.
    pub fn diff(&self, reveal_secrets: bool) -> String {
        if self.kind == "Secret" && !reveal_secrets {
            return SECRET_PLACEHOLDER.to_string();
        }
        TextDiff::from_lines(&self.current_state, &self.desired_state)
            .unified_diff()
            .context_radius(3)
            .header(CURRENT_HEADER, DESIRED_HEADER)
            .to_string()
    }

    pub fn json_patches(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.patches)?)
    }
}
