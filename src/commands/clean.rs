//! Clean command - releases leftover mounts and removes working directories.

use anyhow::{Context, Result};
use std::sync::Arc;

use tiny11::config::{Config, Timings};
use tiny11::image::ImageMountGuard;
use tiny11::log::BuildLog;
use tiny11::process::SystemRunner;

/// Execute the clean command.
pub fn cmd_clean(config: &Config, force_unmount: bool) -> Result<()> {
    if force_unmount {
        println!("Releasing hives and discarding any mount at {}...", config.scratch_dir.display());
        let mut guard = ImageMountGuard::new(
            Arc::new(SystemRunner),
            &config.scratch_dir,
            Timings::default(),
            BuildLog::new("clean"),
        );
        if guard.force_release() {
            println!("Discarded the image mounted at {}.", config.scratch_dir.display());
        } else {
            println!("No live mount found.");
        }
    }

    for dir in config.working_dirs() {
        if dir.exists() {
            println!("Removing {}...", dir.display());
            std::fs::remove_dir_all(dir).with_context(|| {
                format!(
                    "Failed to remove {}. If an image is still mounted, run `tiny11 clean --force-unmount`.",
                    dir.display()
                )
            })?;
        }
    }
    println!("Clean complete.");
    Ok(())
}
