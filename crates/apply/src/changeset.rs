//! Pair desired and current items and classify the differences.

use metrics::counter;
use tailor_core::preserve::paths_for;
use tailor_core::{kinds, Error, PreservePath, ResourceItem, ResourceList, Result};
use tracing::{debug, info};

use crate::change::{Action, Change};
use crate::compare::{compare, Comparison};

#[derive(Debug, Clone, Default)]
pub struct CompareOptions {
    /// Never delete live resources missing from the templates.
    pub upsert_only: bool,
    /// Recreate resources whose immutable fields differ. Ignored with `upsert_only`.
    pub allow_recreate: bool,
    /// Preserve tokens (`path`, `kind:path`, `kind:name:path`).
    pub preserve: Vec<String>,
    /// Preserve every immutable field of every kind.
    pub preserve_immutable_fields: bool,
}

impl CompareOptions {
    fn preserve_paths(&self) -> Result<Vec<PreservePath>> {
        let mut paths = PreservePath::parse_all(&self.preserve)?;
        if self.preserve_immutable_fields {
            paths.extend(PreservePath::immutable_fields());
        }
        Ok(paths)
    }
}

/// Changes grouped by action. Creates and updates are in dependency
/// order, deletes in reverse dependency order.
#[derive(Debug, Clone, Default)]
pub struct Changeset {
    pub create: Vec<Change>,
    pub update: Vec<Change>,
    pub delete: Vec<Change>,
    pub noop: Vec<Change>,
}

impl Changeset {
    pub fn new(platform: &ResourceList, template: &ResourceList, opts: &CompareOptions) -> Result<Self> {
        let preserve = opts.preserve_paths()?;
        let mut cs = Changeset::default();

        if !opts.upsert_only {
            for live in &platform.items {
                if template.get_item(&live.kind, &live.name).is_none() {
                    cs.delete.push(deletion(live)?);
                }
            }
        }

        for desired in &template.items {
            let Some(live) = platform.get_item(&desired.kind, &desired.name) else {
                cs.create.push(creation(desired)?);
                continue;
            };
            let mut desired = desired.clone();
            let mut live = live.clone();
            desired.prepare_for_platform(&live, &paths_for(&preserve, &desired));
            live.prepare_for_template(&desired);

            match compare(&desired, &live) {
                Comparison::Noop => {
                    let mut c = Change::new(Action::Noop, &desired.kind, &desired.name);
                    c.current_state = live.yaml_config()?;
                    c.desired_state = desired.yaml_config()?;
                    cs.noop.push(c);
                }
                Comparison::Patch(patches) => {
                    let mut c = Change::new(Action::Update, &desired.kind, &desired.name);
                    c.current_state = live.yaml_config()?;
                    c.desired_state = desired.yaml_config()?;
                    c.patches = patches;
                    cs.update.push(c);
                }
                Comparison::Recreate { path } if opts.allow_recreate && !opts.upsert_only => {
                    info!(item = %desired.short_name(), %path, "immutable field differs, recreating");
                    cs.delete.push(deletion(&live)?);
                    cs.create.push(creation(&desired)?);
                }
                Comparison::Recreate { path } => {
                    return Err(Error::ImmutableFieldChanged { item: desired.full_name(), path });
                }
            }
        }

        cs.sort();
        counter!("changeset_create_total", cs.create.len() as u64);
        counter!("changeset_update_total", cs.update.len() as u64);
        counter!("changeset_delete_total", cs.delete.len() as u64);
        debug!(
            create = cs.create.len(),
            update = cs.update.len(),
            delete = cs.delete.len(),
            noop = cs.noop.len(),
            "changeset assembled"
        );
        Ok(cs)
    }

    fn sort(&mut self) {
        self.create.sort_by_key(|c| kinds::kind_order(&c.kind));
        self.update.sort_by_key(|c| kinds::kind_order(&c.kind));
        self.delete.sort_by_key(|c| std::cmp::Reverse(kinds::kind_order(&c.kind)));
    }

    /// No creations, updates or deletions.
    pub fn is_blank(&self) -> bool {
        self.create.is_empty() && self.update.is_empty() && self.delete.is_empty()
    }

    /// Whether `change` is the creation half of a recreation.
    pub fn is_recreation(&self, change: &Change) -> bool {
        change.action == Action::Create && self.delete.iter().any(|d| d.kind == change.kind && d.name == change.name)
    }

    /// Changes in execution order: creations, then deletions, then updates.
    /// The creation half of a recreation directly follows its deletion.
    pub fn ordered(&self) -> Vec<&Change> {
        let mut out: Vec<&Change> = self.create.iter().filter(|c| !self.is_recreation(c)).collect();
        for d in &self.delete {
            out.push(d);
            if let Some(c) = self.create.iter().find(|c| c.kind == d.kind && c.name == d.name) {
                out.push(c);
            }
        }
        out.extend(self.update.iter());
        out
    }
}

fn creation(item: &ResourceItem) -> Result<Change> {
    let mut c = Change::new(Action::Create, &item.kind, &item.name);
    c.desired_state = item.yaml_config()?;
    Ok(c)
}

fn deletion(item: &ResourceItem) -> Result<Change> {
    let mut c = Change::new(Action::Delete, &item.kind, &item.name);
    c.current_state = item.yaml_config()?;
    Ok(c)
}
