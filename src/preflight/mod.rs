//! Preflight checks for a tiny11 build.
//!
//! Validates host tools, the source media and the working directories
//! before any image is touched. Run with `tiny11 preflight`.

mod environment;
mod host_tools;
mod types;

use std::path::Path;

use anyhow::{bail, Result};

use crate::config::Config;

pub use types::{CheckResult, CheckStatus, PreflightReport};

/// Free space the work directory should have.
pub const MIN_FREE_SPACE: u64 = 20 * 1024 * 1024 * 1024;

/// Run all preflight checks.
pub fn run_preflight(config: &Config, source: Option<&Path>) -> PreflightReport {
    let mut checks = Vec::new();

    println!("Running preflight checks...\n");

    println!("Checking host tools...");
    checks.extend(host_tools::check_host_tools(config));

    if let Some(source) = source {
        println!("Checking source media...");
        checks.push(environment::check_source(source));
    }

    println!("Checking build environment...");
    checks.extend(environment::check_build_environment(config, MIN_FREE_SPACE));

    println!();

    PreflightReport { checks }
}

/// Run preflight and bail if any checks fail.
pub fn run_preflight_or_fail(config: &Config, source: Option<&Path>) -> Result<()> {
    let report = run_preflight(config, source);
    report.print();

    if !report.all_passed() {
        bail!(
            "Preflight failed: {} check(s) failed. Fix the issues above before building.",
            report.fail_count()
        );
    }

    println!("All preflight checks passed!\n");
    Ok(())
}
