//! Show command - displays information.

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;

use tiny11::config::Config;
use tiny11::customize::{theme, PreinstallConfig};
use tiny11::image::{info, validate_source};
use tiny11::process::SystemRunner;
use tiny11::tools::parse::format_bytes;
use tiny11::tools::Dism;

/// Show target for the show command.
pub enum ShowTarget<'a> {
    /// Show configuration
    Config,
    /// List the editions in a source's install image
    Images { source: &'a Path },
    /// List available themes
    Themes,
    /// List preinstallable apps
    Apps,
}

/// Execute the show command.
pub fn cmd_show(target: ShowTarget<'_>, config: &Config) -> Result<()> {
    match target {
        ShowTarget::Config => config.print(),
        ShowTarget::Images { source } => {
            let layout = validate_source(source)?;
            let dism = Dism::new(Arc::new(SystemRunner));
            let listing = dism
                .get_wim_info(&layout.install, None)
                .context("Failed to read image information")?;
            println!("Images in {}:", layout.install.display());
            for entry in info::parse_listing(&listing) {
                println!(
                    "  [{}] {} ({})",
                    entry.index,
                    entry.name,
                    format_bytes(entry.size)
                );
            }
        }
        ShowTarget::Themes => {
            println!("Themes in {}:", config.themes_dir.display());
            println!("  {} (no customization)", tiny11::config::DEFAULT_THEME);
            for name in theme::list_themes(&config.themes_dir) {
                println!("  {}", name);
            }
        }
        ShowTarget::Apps => {
            let preinstall = PreinstallConfig::load(&config.preinstall_dir)?;
            if !preinstall.enabled || preinstall.apps.is_empty() {
                println!("No preinstall apps configured in {}", config.preinstall_dir.display());
                return Ok(());
            }
            println!("Preinstall apps:");
            for app in &preinstall.apps {
                println!("  {:<20} {} {}", app.id, app.name, app.version);
            }
        }
    }
    Ok(())
}
