//! Tailor core: the normalized resource model shared by every crate.

#![forbid(unsafe_code)]

pub mod error;
pub mod export;
pub mod filter;
pub mod item;
pub mod kinds;
pub mod list;
pub mod patch;
pub mod pointer;
pub mod preserve;

pub use error::{Error, Result};
pub use filter::ResourceFilter;
pub use item::{ResourceItem, Source, LAST_APPLIED_ANNOTATION};
pub use list::ResourceList;
pub use patch::{JsonPatchOp, PatchOpKind};
pub use preserve::PreservePath;

pub mod prelude {
    pub use super::{Error, JsonPatchOp, PreservePath, ResourceFilter, ResourceItem, ResourceList, Result, Source};
}
