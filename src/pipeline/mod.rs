//! Build orchestration.
//!
//! A [`BuildSession`] turns [`BuildOptions`] into an ordered step list for
//! the chosen [`Variant`] and drives it through the [`BuildState`] machine.

pub mod context;
pub mod session;
pub mod state;
mod steps;
pub mod variant;

use std::path::PathBuf;

pub use session::BuildSession;
pub use state::BuildState;
pub use variant::{Policy, Step, StepId, Variant};

use crate::config::DEFAULT_THEME;

/// Per-run choices.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Root of the extracted installation media.
    pub source: PathBuf,
    pub variant: Variant,
    /// Image index to build; required when the image has several.
    pub index: Option<u32>,
    pub theme: String,
    /// Preinstall app ids; empty means every configured app.
    pub apps: Vec<String>,
    pub netfx3: bool,
    pub keep_staging: bool,
    pub verify_copy: bool,
    /// Overrides the configured ISO path.
    pub output: Option<PathBuf>,
}

impl BuildOptions {
    pub fn new(source: impl Into<PathBuf>, variant: Variant) -> Self {
        Self {
            source: source.into(),
            variant,
            index: None,
            theme: DEFAULT_THEME.to_string(),
            apps: Vec::new(),
            netfx3: false,
            keep_staging: false,
            verify_copy: false,
            output: None,
        }
    }
}
