//! Component removal against a mounted image.
//!
//! Catalog data lives in [`catalog`]; the functions in [`apps`], [`files`]
//! and [`services`] interpret it. Per-item failures are counted and logged as
//! warnings; only failures that leave the image unusable are returned.

pub mod apps;
pub mod catalog;
pub mod files;
pub mod services;

use std::path::{Path, PathBuf};

use glob::{MatchOptions, Pattern};

use crate::error::Result;
use crate::log::BuildLog;
use crate::tools::{Acl, Dism};

/// Everything a remover needs.
pub struct RemovalContext<'a> {
    pub dism: &'a Dism,
    pub acl: &'a Acl,
    /// Root of the mounted image.
    pub mount: &'a Path,
    /// Normalized architecture (`amd64`, `arm64`, ...).
    pub arch: &'a str,
    pub language: &'a str,
    pub log: &'a BuildLog,
}

impl RemovalContext<'_> {
    /// Join a `/`-separated relative path onto the mount root.
    pub fn path(&self, rel: &str) -> PathBuf {
        rel.split('/')
            .fold(self.mount.to_path_buf(), |p, part| p.join(part))
    }
}

/// Tally for one removal step.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RemovalReport {
    pub removed: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl RemovalReport {
    /// Count an outcome, warning on failure.
    pub fn record(&mut self, what: &str, outcome: Result<()>, log: &BuildLog) {
        match outcome {
            Ok(()) => {
                log.debug(format!("removed {}", what));
                self.removed += 1;
            }
            Err(e) => {
                log.warn(format!("could not remove {}: {}", what, e));
                self.failed += 1;
            }
        }
    }

    pub fn summarize(&self, title: &str, log: &BuildLog) {
        log.success(format!(
            "{}: {} removed, {} failed, {} skipped",
            title, self.removed, self.failed, self.skipped
        ));
    }
}

const CASE_INSENSITIVE: MatchOptions = MatchOptions {
    case_sensitive: false,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

/// Shell-style wildcard match, ignoring case.
pub fn wildcard_match(pattern: &str, name: &str) -> bool {
    Pattern::new(pattern)
        .map(|p| p.matches_with(name, CASE_INSENSITIVE))
        .unwrap_or(false)
}

pub fn matches_any(patterns: &[&str], name: &str) -> bool {
    patterns.iter().any(|p| wildcard_match(p, name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wildcards() {
        assert!(wildcard_match("prn*", "prnms001.inf_amd64_abc"));
        assert!(wildcard_match("segoe*", "SegoeUI.ttf"));
        assert!(!wildcard_match("segoe*", "arial.ttf"));
        assert!(wildcard_match(
            "amd64_microsoft.windows.gdiplus_6595b64144ccf1df_*",
            "amd64_microsoft.windows.gdiplus_6595b64144ccf1df_1.1.22621.1_none_x"
        ));
        assert!(matches_any(&["a*", "b*"], "bee"));
    }

    #[test]
    fn test_context_path() {
        let log = BuildLog::new("t");
        let runner: std::sync::Arc<dyn crate::process::ToolRunner> =
            std::sync::Arc::new(crate::process::SystemRunner);
        let dism = Dism::new(runner.clone());
        let acl = Acl::new(runner);
        let ctx = RemovalContext {
            dism: &dism,
            acl: &acl,
            mount: Path::new("/mnt"),
            arch: "amd64",
            language: "en-US",
            log: &log,
        };
        assert_eq!(
            ctx.path("Windows/System32/Recovery"),
            Path::new("/mnt").join("Windows").join("System32").join("Recovery")
        );
    }
}
