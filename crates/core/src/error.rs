//! Error type shared by all Tailor crates.
//!
//! Errors are reported once at the surface. Library code returns
//! [`Error`] and lets the binary decide how to render it.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// A resource token did not map to a known kind.
    #[error("unknown resource kind: {0}")]
    UnknownKind(String),

    /// A resource document is missing required fields.
    #[error("malformed resource item: {message}")]
    MalformedItem {
        message: String,
        /// Kind of the offending item, when it could be determined
        kind: Option<String>,
    },

    /// A preserve token had more than two `:` separators.
    #[error("invalid preserve token '{0}' (expected path, kind:path or kind:name:path)")]
    PreserveTokenInvalid(String),

    /// The cluster client (or another external process) returned non-zero.
    #[error("{operation} failed: {stderr}")]
    ExternalProcessFailed { operation: String, stderr: String },

    /// A parameter file line is unusable or a record failed to decrypt.
    #[error("invalid params: {0}")]
    ParamsInvalid(String),

    /// PGP key material missing, unreadable, or locked with another passphrase.
    #[error("key material: {0}")]
    KeyMaterial(String),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A field that cannot be patched in place differs and recreation is not allowed.
    #[error("{item}: immutable field {path} differs (use --allow-recreate or preserve the field)")]
    ImmutableFieldChanged { item: String, path: String },

    /// An apply step failed; remaining steps were not attempted.
    #[error("applying {item} failed: {source}")]
    ApplyFailed {
        item: String,
        #[source]
        source: Box<Error>,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn malformed(message: impl Into<String>, kind: Option<&str>) -> Self {
        Error::MalformedItem { message: message.into(), kind: kind.map(str::to_string) }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io { path: path.into(), source }
    }

    pub fn external(operation: impl Into<String>, stderr: impl AsRef<[u8]>) -> Self {
        Error::ExternalProcessFailed {
            operation: operation.into(),
            stderr: String::from_utf8_lossy(stderr.as_ref()).trim().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn external_error_surfaces_stderr_verbatim() {
        let e = Error::external("oc patch", b"Error from server (NotFound): routes \"x\" not found\n");
        assert_eq!(e.to_string(), "oc patch failed: Error from server (NotFound): routes \"x\" not found");
    }

    #[test]
    fn apply_failure_keeps_source() {
        let inner = Error::external("oc delete", b"boom");
        let e = Error::ApplyFailed { item: "route/foo".into(), source: Box::new(inner) };
        assert!(e.to_string().contains("route/foo"));
        assert!(std::error::Error::source(&e).is_some());
    }
}
