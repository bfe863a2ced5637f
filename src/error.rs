//! Error taxonomy for the build pipeline.
//!
//! Every library operation returns [`BuildError`]. The kind decides how the
//! CLI reports the failure; the context map carries the diagnostics
//! (paths, attempt counts, sizes, tool output) that make it actionable.

use std::collections::BTreeMap;
use std::fmt;
use std::io;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, BuildError>;

/// Broad classification of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Uncategorized.
    General,
    /// Ownership, ACL, or file lock failure.
    Permission,
    /// An expected artifact is missing.
    NotFound,
    /// Bad index or selection.
    InvalidInput,
    /// Non-zero exit from dism, reg, takeown, icacls or oscdimg.
    ExternalTool,
    /// Not enough free space for an export.
    DiskSpace,
    /// Download failure.
    Network,
}

impl ErrorKind {
    /// Stable numeric code, reported as the CLI exit detail.
    pub fn code(self) -> u16 {
        match self {
            ErrorKind::General => 1000,
            ErrorKind::Permission => 1001,
            ErrorKind::NotFound => 1002,
            ErrorKind::InvalidInput => 1003,
            ErrorKind::ExternalTool => 1004,
            ErrorKind::DiskSpace => 1005,
            ErrorKind::Network => 1006,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ErrorKind::General => "general",
            ErrorKind::Permission => "permission",
            ErrorKind::NotFound => "not found",
            ErrorKind::InvalidInput => "invalid input",
            ErrorKind::ExternalTool => "external tool",
            ErrorKind::DiskSpace => "disk space",
            ErrorKind::Network => "network",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.label(), self.code())
    }
}

/// A classified failure with a free-form diagnostic context.
#[derive(Debug, Error)]
#[error("{message} [{kind}]{}", render_context(.context))]
pub struct BuildError {
    pub kind: ErrorKind,
    pub message: String,
    pub context: BTreeMap<String, String>,
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl BuildError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            context: BTreeMap::new(),
            source: None,
        }
    }

    pub fn general(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::General, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn permission(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Permission, message)
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidInput, message)
    }

    pub fn tool(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ExternalTool, message)
    }

    /// Attach a diagnostic key/value pair. Later values replace earlier ones.
    pub fn with_context(mut self, key: impl Into<String>, value: impl fmt::Display) -> Self {
        self.context.insert(key.into(), value.to_string());
        self
    }

    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    /// Look up a context value.
    pub fn context_value(&self, key: &str) -> Option<&str> {
        self.context.get(key).map(String::as_str)
    }

    pub fn is(&self, kind: ErrorKind) -> bool {
        self.kind == kind
    }
}

impl From<io::Error> for BuildError {
    fn from(err: io::Error) -> Self {
        let kind = match err.kind() {
            io::ErrorKind::NotFound => ErrorKind::NotFound,
            io::ErrorKind::PermissionDenied => ErrorKind::Permission,
            _ => ErrorKind::General,
        };
        BuildError::new(kind, err.to_string()).with_source(err)
    }
}

fn render_context(context: &BTreeMap<String, String>) -> String {
    if context.is_empty() {
        return String::new();
    }
    let pairs: Vec<String> = context
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect();
    format!(" ({})", pairs.join(", "))
}

/// Attach a path to I/O failures, the most common context in this crate.
pub trait IoContext<T> {
    fn with_path(self, what: &str, path: &std::path::Path) -> Result<T>;
}

impl<T> IoContext<T> for std::result::Result<T, io::Error> {
    fn with_path(self, what: &str, path: &std::path::Path) -> Result<T> {
        self.map_err(|e| {
            let kind = BuildError::from(e);
            BuildError {
                message: format!("{}: {}", what, kind.message),
                ..kind
            }
            .with_context("path", path.display())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_start_at_general() {
        assert_eq!(ErrorKind::General.code(), 1000);
        assert_eq!(ErrorKind::Network.code(), 1006);
    }

    #[test]
    fn test_display_includes_context() {
        let err = BuildError::new(ErrorKind::DiskSpace, "not enough space")
            .with_context("required", 10)
            .with_context("available", 5);
        let msg = err.to_string();
        assert!(msg.contains("not enough space"));
        assert!(msg.contains("disk space (1005)"));
        assert!(msg.contains("available=5"));
        assert!(msg.contains("required=10"));
    }

    #[test]
    fn test_io_error_mapping() {
        let err: BuildError = io::Error::new(io::ErrorKind::NotFound, "gone").into();
        assert!(err.is(ErrorKind::NotFound));

        let err: BuildError = io::Error::new(io::ErrorKind::PermissionDenied, "locked").into();
        assert!(err.is(ErrorKind::Permission));

        let err: BuildError = io::Error::new(io::ErrorKind::Other, "odd").into();
        assert!(err.is(ErrorKind::General));
    }

    #[test]
    fn test_with_path_keeps_kind() {
        let res: std::result::Result<(), io::Error> =
            Err(io::Error::new(io::ErrorKind::NotFound, "missing"));
        let err = res
            .with_path("read manifest", std::path::Path::new("/x/y"))
            .unwrap_err();
        assert!(err.is(ErrorKind::NotFound));
        assert_eq!(err.context_value("path"), Some("/x/y"));
        assert!(err.message.starts_with("read manifest"));
    }
}
