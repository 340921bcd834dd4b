//! Execute a changeset against the cluster, strictly in sequence.

use metrics::counter;
use serde::Serialize;
use tailor_cluster::ClusterClient;
use tailor_core::{Error, Result};
use tracing::{info, warn};

use crate::change::{Action, Change};
use crate::changeset::Changeset;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ApplyReport {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    pub skipped: usize,
}

/// Apply `changeset` in [`Changeset::ordered`] order. `confirm` is asked
/// once per change; a declined change is skipped, and declining the
/// deletion of a recreation skips its creation too. The first failing
/// operation aborts the run with [`Error::ApplyFailed`]; completed
/// operations are not rolled back.
pub async fn apply_changeset(
    client: &dyn ClusterClient,
    changeset: &Changeset,
    selector: &str,
    confirm: &mut dyn FnMut(&Change) -> bool,
) -> Result<ApplyReport> {
    let mut report = ApplyReport::default();
    let mut declined: Vec<(&str, &str)> = Vec::new();

    for change in changeset.ordered() {
        let paired_delete_declined = changeset.is_recreation(change)
            && declined.iter().any(|(k, n)| *k == change.kind && *n == change.name);
        if paired_delete_declined || !confirm(change) {
            info!(item = %change.item_name(), action = ?change.action, "skipped");
            declined.push((change.kind.as_str(), change.name.as_str()));
            report.skipped += 1;
            continue;
        }

        counter!("apply_attempts", 1u64);
        if let Err(e) = execute(client, change, selector).await {
            counter!("apply_err", 1u64);
            warn!(item = %change.item_name(), error = %e, "apply aborted");
            return Err(Error::ApplyFailed { item: change.item_name(), source: Box::new(e) });
        }
        counter!("apply_ok", 1u64);

        match change.action {
            Action::Create => report.created += 1,
            Action::Update => report.updated += 1,
            Action::Delete => report.deleted += 1,
            Action::Noop => {}
        }
    }
    Ok(report)
}

async fn execute(client: &dyn ClusterClient, change: &Change, selector: &str) -> Result<()> {
    match change.action {
        Action::Create => {
            info!(item = %change.item_name(), "creating");
            client.create(&change.desired_state, selector).await
        }
        Action::Delete => {
            info!(item = %change.item_name(), "deleting");
            client.delete(&change.kind, &change.name).await
        }
        Action::Update => {
            info!(item = %change.item_name(), ops = change.patches.len(), "patching");
            client.patch(&change.full_name(), &change.patches).await
        }
        Action::Noop => Ok(()),
    }
}
