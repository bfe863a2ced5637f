//! Build command - runs the reduction pipeline for one variant.

use anyhow::{bail, Context, Result};
use std::io::{self, BufRead, Write};
use std::sync::Arc;

use tiny11::config::{Config, Timings};
use tiny11::pipeline::{BuildOptions, BuildSession, Variant};
use tiny11::preflight;
use tiny11::process::SystemRunner;
use tiny11::tools::parse::format_bytes;

/// Execute the build command.
pub fn cmd_build(config: &Config, options: BuildOptions, yes: bool) -> Result<()> {
    if options.variant.needs_confirmation() && !yes && !confirm(options.variant)? {
        bail!("Build cancelled.");
    }

    preflight::run_preflight_or_fail(config, Some(&options.source))?;

    let variant = options.variant;
    let mut session = BuildSession::new(
        config.clone(),
        options,
        Arc::new(SystemRunner),
        Timings::default(),
    );
    let iso = session
        .build()
        .with_context(|| format!("{} build failed", variant))?;

    println!();
    println!("=== Build Complete ===");
    println!("  ISO:      {}", iso.display());
    if let Some(export) = session.export_report() {
        println!(
            "  Image:    {} -> {}",
            format_bytes(export.before),
            format_bytes(export.after)
        );
    }
    println!("  Warnings: {}", session.warning_count());
    Ok(())
}

fn confirm(variant: Variant) -> Result<bool> {
    println!("WARNING: the {} variant removes components that cannot be added back.", variant);
    if variant == Variant::Nano {
        println!("The result cannot be serviced: no updates, no language packs, no drivers added later.");
    }
    print!("Continue? [y/N] ");
    io::stdout().flush()?;

    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(answer.trim().eq_ignore_ascii_case("y"))
}
