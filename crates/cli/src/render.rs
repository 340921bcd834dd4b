//! Human-readable status output.

use std::io::{self, Write};

use tailor_apply::{Change, Changeset};

/// Print every change with its diff, then the summary line.
pub fn status(cs: &Changeset, verbose: bool, reveal_secrets: bool, out: &mut dyn Write) -> io::Result<()> {
    if verbose {
        for c in &cs.noop {
            writeln!(out, "* {} in sync", c.item_name())?;
        }
    }
    for c in &cs.create {
        writeln!(out, "+ {} to create", c.item_name())?;
        write_diff(c, reveal_secrets, out)?;
    }
    for c in &cs.update {
        writeln!(out, "~ {} to update", c.item_name())?;
        write_diff(c, reveal_secrets, out)?;
        if reveal_secrets || c.kind != "Secret" {
            match c.json_patches() {
                Ok(p) => writeln!(out, "Patches:\n{}", p)?,
                Err(e) => writeln!(out, "Patches could not be rendered: {}", e)?,
            }
        }
    }
    for c in &cs.delete {
        writeln!(out, "- {} to delete", c.item_name())?;
        write_diff(c, reveal_secrets, out)?;
    }
    writeln!(out)?;
    writeln!(out, "{}", summary(cs))
}

pub fn summary(cs: &Changeset) -> String {
    format!(
        "Summary: {} in sync, {} to create, {} to update, {} to delete",
        cs.noop.len(),
        cs.create.len(),
        cs.update.len(),
        cs.delete.len()
    )
}

fn write_diff(c: &Change, reveal_secrets: bool, out: &mut dyn Write) -> io::Result<()> {
    write!(out, "{}", c.diff(reveal_secrets))?;
    writeln!(out)
}
