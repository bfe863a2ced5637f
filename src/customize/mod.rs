//! Optional edits: theme and branding, staged installers, the answer file.

pub mod preinstall;
pub mod theme;
pub mod unattend;

use std::fs;
use std::path::Path;

use serde::de::DeserializeOwned;

use crate::error::{BuildError, IoContext, Result};

pub use preinstall::{PreinstallApp, PreinstallConfig};
pub use theme::Theme;

/// Read and deserialize a JSON config file.
pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = fs::read_to_string(path).with_path("read config", path)?;
    serde_json::from_str(&text).map_err(|e| {
        BuildError::invalid_input(format!("malformed {}: {}", path.display(), e))
            .with_context("path", path.display())
            .with_source(e)
    })
}

/// Copy one file, creating the destination's parent.
pub(crate) fn copy_into(src: &Path, dst: &Path) -> Result<()> {
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent).with_path("create directory", parent)?;
    }
    fs::copy(src, dst).with_path("copy file", src)?;
    Ok(())
}
