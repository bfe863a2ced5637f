//! Centralized command execution with consistent error handling.
//!
//! All external tools (dism, reg, takeown, icacls, oscdimg, curl) are
//! reached through the [`ToolRunner`] trait. Production code uses
//! [`SystemRunner`], which spawns real processes; tests swap in
//! a scripted runner to simulate tool state and inject failures.

use std::path::PathBuf;
use std::process::{Command, ExitStatus};

use crate::error::{BuildError, ErrorKind, Result};

/// Result of a command execution.
#[derive(Debug, Clone)]
pub struct CommandResult {
    /// Exit code, or -1 if terminated by signal.
    pub code: i32,
    /// Captured stdout as a string.
    pub stdout: String,
    /// Captured stderr as a string.
    pub stderr: String,
}

impl CommandResult {
    /// A successful result with the given stdout.
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            code: 0,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// A failed result with the given exit code and stderr.
    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            code,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    fn from_status(status: ExitStatus, stdout: &[u8], stderr: &[u8]) -> Self {
        Self {
            code: status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(stdout).into_owned(),
            stderr: String::from_utf8_lossy(stderr).into_owned(),
        }
    }

    /// Returns true if the command exited successfully.
    pub fn success(&self) -> bool {
        self.code == 0
    }

    /// Combined output for diagnostics. dism reports errors on stdout.
    pub fn output_text(&self) -> String {
        match (self.stdout.trim(), self.stderr.trim()) {
            ("", e) => e.to_string(),
            (o, "") => o.to_string(),
            (o, e) => format!("{}\n{}", o, e),
        }
    }
}

/// Spawn `program` and capture its output. A non-zero exit is not an error
/// here; only a failure to start the process is.
fn spawn(program: &str, args: &[String]) -> Result<CommandResult> {
    let output = Command::new(program).args(args).output().map_err(|e| {
        BuildError::new(
            ErrorKind::ExternalTool,
            format!("Failed to execute '{}'. Is it installed?", program),
        )
        .with_context("program", program)
        .with_source(e)
    })?;
    Ok(CommandResult::from_status(
        output.status,
        &output.stdout,
        &output.stderr,
    ))
}

/// Build the error for a non-zero exit, keeping the tool output.
pub fn failure(prefix: impl Into<String>, program: &str, result: &CommandResult) -> BuildError {
    let prefix = prefix.into();
    let output = result.output_text();
    let message = if output.is_empty() {
        format!("{} (exit code {})", prefix, result.code)
    } else {
        format!("{} (exit code {}):\n{}", prefix, result.code, output)
    };
    BuildError::new(ErrorKind::ExternalTool, message)
        .with_context("program", program)
        .with_context("exit_code", result.code)
        .with_context("output", output)
}

// =============================================================================
// Tool runner seam
// =============================================================================

/// Runs an external program and captures its output.
///
/// Implementations return `Ok` with a non-zero code when the program ran but
/// failed; `Err` is reserved for "could not run at all". Use [`ToolRunner::check`]
/// to turn a non-zero exit into an error.
pub trait ToolRunner: Send + Sync {
    fn run(&self, program: &str, args: &[String]) -> Result<CommandResult>;

    /// Run and fail on non-zero exit.
    fn check(&self, program: &str, args: &[String]) -> Result<CommandResult> {
        let result = self.run(program, args)?;
        if !result.success() {
            return Err(failure(format!("'{}' failed", program), program, &result));
        }
        Ok(result)
    }
}

/// Runs real processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl ToolRunner for SystemRunner {
    fn run(&self, program: &str, args: &[String]) -> Result<CommandResult> {
        spawn(program, args)
    }
}

/// Check if a program exists in PATH.
///
/// Returns the full path if found, None otherwise.
pub fn which(program: &str) -> Option<PathBuf> {
    which::which(program).ok()
}

/// Check if a program exists in PATH (bool version).
pub fn exists(program: &str) -> bool {
    which(program).is_some()
}

/// Owned argument list from borrowed pieces.
pub fn argv<I, S>(args: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    args.into_iter().map(Into::into).collect()
}

// =============================================================================
// Tests
// =============================================================================
