//! Session-scoped logger.
//!
//! A `BuildLog` is created once per build session and handed to every
//! component at construction. It wraps a `tracing` span so all events of a
//! run share the session field, and counts warnings so the session can
//! report how many soft failures it absorbed.

use std::fmt::Display;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tracing::Span;

#[derive(Clone)]
pub struct BuildLog {
    span: Span,
    warnings: Arc<AtomicUsize>,
}

impl BuildLog {
    /// Create a logger for one build session.
    pub fn new(session: &str) -> Self {
        Self {
            span: tracing::info_span!("build", session = %session),
            warnings: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Child logger for a component. Shares the warning counter.
    pub fn component(&self, name: &'static str) -> Self {
        Self {
            span: tracing::info_span!(parent: &self.span, "component", component = name),
            warnings: Arc::clone(&self.warnings),
        }
    }

    pub fn section(&self, title: &str) {
        let _g = self.span.enter();
        tracing::info!("=== {} ===", title);
    }

    pub fn step(&self, ordinal: usize, total: usize, label: &str) {
        let _g = self.span.enter();
        tracing::info!(step = ordinal, total, "[{}/{}] {}", ordinal, total, label);
    }

    pub fn info(&self, msg: impl Display) {
        let _g = self.span.enter();
        tracing::info!("{}", msg);
    }

    pub fn debug(&self, msg: impl Display) {
        let _g = self.span.enter();
        tracing::debug!("{}", msg);
    }

    pub fn success(&self, msg: impl Display) {
        let _g = self.span.enter();
        tracing::info!(outcome = "ok", "{}", msg);
    }

    pub fn skip(&self, msg: impl Display) {
        let _g = self.span.enter();
        tracing::info!(outcome = "skipped", "{}", msg);
    }

    /// Log a recoverable failure. Every swallowed error goes through here.
    pub fn warn(&self, msg: impl Display) {
        self.warnings.fetch_add(1, Ordering::Relaxed);
        let _g = self.span.enter();
        tracing::warn!("{}", msg);
    }

    pub fn error(&self, msg: impl Display) {
        let _g = self.span.enter();
        tracing::error!("{}", msg);
    }

    pub fn warning_count(&self) -> usize {
        self.warnings.load(Ordering::Relaxed)
    }
}

/// Install the process-wide subscriber. Called once from `main`.
pub fn init_subscriber(verbose: bool) {
    let default = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default.into()),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_warnings_shared_with_components() {
        let log = BuildLog::new("t");
        let child = log.component("copy");
        child.warn("one");
        log.warn("two");
        log.info("not counted");
        assert_eq!(log.warning_count(), 2);
        assert_eq!(child.warning_count(), 2);
    }
}
