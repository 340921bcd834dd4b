//! Tailor changeset engine: compare desired against current state, order
//! the resulting changes by kind dependency and apply them.

#![forbid(unsafe_code)]

pub mod change;
pub mod changeset;
pub mod compare;
pub mod driver;

pub use change::{Action, Change};
pub use changeset::{Changeset, CompareOptions};
pub use compare::{compare, Comparison};
pub use driver::{apply_changeset, ApplyReport};
