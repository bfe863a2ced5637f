//! Host tool availability checks.

use crate::config::Config;
use crate::iso;
use crate::process;

use super::types::CheckResult;

/// Check the servicing tools are on PATH.
pub fn check_host_tools(config: &Config) -> Vec<CheckResult> {
    let required_tools = [
        ("dism", "Required to mount, service and export images"),
        ("reg", "Required to edit offline registry hives"),
        ("takeown", "Required to take ownership of protected files"),
        ("icacls", "Required to grant access to protected files"),
    ];

    let mut results: Vec<CheckResult> = required_tools
        .into_iter()
        .map(|(tool, purpose)| check_tool_exists(tool, purpose))
        .collect();

    // Downloaded on demand, so only a warning.
    match iso::locate_oscdimg(config) {
        Some(path) => results.push(CheckResult::pass_with("oscdimg", &path.display().to_string())),
        None => results.push(CheckResult::warn(
            "oscdimg",
            "Not found - it will be downloaded from the Microsoft symbol server during the build",
        )),
    }

    results
}

fn check_tool_exists(tool: &str, purpose: &str) -> CheckResult {
    match process::which(tool) {
        Some(path) => CheckResult::pass_with(tool, &path.display().to_string()),
        None => CheckResult::fail(
            tool,
            &format!("Not found. {}. Run tiny11 from an elevated Windows shell.", purpose),
        ),
    }
}
