//! Preflight command - runs preflight checks.

use anyhow::Result;
use std::path::Path;

use tiny11::config::Config;
use tiny11::preflight;

/// Execute the preflight command.
pub fn cmd_preflight(config: &Config, source: Option<&Path>, strict: bool) -> Result<()> {
    if strict {
        preflight::run_preflight_or_fail(config, source)?;
    } else {
        let report = preflight::run_preflight(config, source);
        report.print();
        if !report.all_passed() {
            println!("Some checks failed. Use --strict to fail on them.");
        }
    }
    Ok(())
}
