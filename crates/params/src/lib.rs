//! Encrypted parameter files: `KEY=VALUE` records whose `.ENC` values are
//! PGP-encrypted for every public key in a directory.

#![forbid(unsafe_code)]

pub mod crypt;
pub mod file;
pub mod scratch;
pub mod store;

pub use crypt::{generate_key, Crypter, GpgCrypter};
pub use file::{split_suffix, Line, ParamFile, ENC_SUFFIX, STRING_SUFFIX};
pub use scratch::ScratchFile;
pub use store::{ParamStore, EDIT_SCRATCH};
