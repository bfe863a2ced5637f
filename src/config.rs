//! Configuration management for tiny11.
//!
//! Reads configuration from environment variables. `main` loads a `.env`
//! file first (via dotenvy), so values there act as defaults that the real
//! environment overrides.

use std::path::{Path, PathBuf};
use std::time::Duration;

/// Theme name that means "no customization".
pub const DEFAULT_THEME: &str = "default";

/// Default cap on concurrent copy workers.
pub const DEFAULT_MAX_COPY_WORKERS: usize = 8;

/// Paths and defaults for a build host.
#[derive(Debug, Clone)]
pub struct Config {
    /// Root all relative paths resolve against (default: current directory)
    pub work_dir: PathBuf,
    /// Clean staged copy of the source tree (default: build/tiny11)
    pub staging_dir: PathBuf,
    /// Mount point for the offline image (default: build/scratch)
    pub scratch_dir: PathBuf,
    /// Scratch space for downloads and intermediates (default: build/temp)
    pub temp_dir: PathBuf,
    /// Directory holding autounattend.xml (default: resources)
    pub resources_dir: PathBuf,
    /// Theme directories, one per theme (default: themes)
    pub themes_dir: PathBuf,
    /// preinstall.json and installers (default: preinstall)
    pub preinstall_dir: PathBuf,
    /// Final ISO path (default: tiny11.iso)
    pub output_iso: PathBuf,
    /// Theme applied when the CLI does not name one
    pub theme: String,
    /// Upper bound on copy workers
    pub max_copy_workers: usize,
}

impl Config {
    /// Load configuration from the process environment.
    pub fn load(work_dir: &Path) -> Self {
        Self::from_lookup(work_dir, |key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(default_work_dir: &Path, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let work_dir = lookup("TINY11_WORK_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| default_work_dir.to_path_buf());

        let path = |key: &str, default: &str| -> PathBuf {
            let raw = lookup(key).unwrap_or_else(|| default.to_string());
            let path = PathBuf::from(raw);
            if path.is_absolute() {
                path
            } else {
                work_dir.join(path)
            }
        };

        let staging_dir = path("TINY11_STAGING_DIR", "build/tiny11");
        let scratch_dir = path("TINY11_SCRATCH_DIR", "build/scratch");
        let temp_dir = path("TINY11_TEMP_DIR", "build/temp");
        let resources_dir = path("TINY11_RESOURCES_DIR", "resources");
        let themes_dir = path("TINY11_THEMES_DIR", "themes");
        let preinstall_dir = path("TINY11_PREINSTALL_DIR", "preinstall");
        let output_iso = path("TINY11_OUTPUT_ISO", "tiny11.iso");

        let theme = lookup("TINY11_THEME")
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_THEME.to_string());

        let max_copy_workers = lookup("TINY11_MAX_COPY_WORKERS")
            .and_then(|s| s.trim().parse::<usize>().ok())
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_MAX_COPY_WORKERS);

        Self {
            work_dir,
            staging_dir,
            scratch_dir,
            temp_dir,
            resources_dir,
            themes_dir,
            preinstall_dir,
            output_iso,
            theme,
            max_copy_workers,
        }
    }

    /// Directories created by a build and removed by `clean`.
    pub fn working_dirs(&self) -> [&Path; 3] {
        [&self.staging_dir, &self.scratch_dir, &self.temp_dir]
    }

    /// Directory for the cached oscdimg download.
    pub fn tool_cache_dir(&self) -> PathBuf {
        dirs::cache_dir()
            .map(|d| d.join("tiny11"))
            .unwrap_or_else(|| self.temp_dir.clone())
    }

    /// Print configuration for debugging.
    pub fn print(&self) {
        println!("Configuration:");
        println!("  TINY11_WORK_DIR:        {}", self.work_dir.display());
        println!("  TINY11_STAGING_DIR:     {}", self.staging_dir.display());
        println!("  TINY11_SCRATCH_DIR:     {}", self.scratch_dir.display());
        println!("  TINY11_TEMP_DIR:        {}", self.temp_dir.display());
        println!("  TINY11_RESOURCES_DIR:   {}", self.resources_dir.display());
        println!("  TINY11_THEMES_DIR:      {}", self.themes_dir.display());
        println!("  TINY11_PREINSTALL_DIR:  {}", self.preinstall_dir.display());
        println!("  TINY11_OUTPUT_ISO:      {}", self.output_iso.display());
        println!("  TINY11_THEME:           {}", self.theme);
        println!("  TINY11_MAX_COPY_WORKERS: {}", self.max_copy_workers);
        println!("  Tool cache:             {}", self.tool_cache_dir().display());
    }
}

/// Waits used by the retry loops. Production values mirror what the
/// servicing tools need to release file handles.
#[derive(Debug, Clone, Copy)]
pub struct Timings {
    /// Pause between export attempts
    pub export_backoff: Duration,
    /// Pause between whole hive-unload rounds
    pub unload_round_wait: Duration,
    /// Pause before retrying a single `reg unload`
    pub unload_retry: Duration,
    /// Settle time after discarding a stale mount
    pub remount_settle: Duration,
    /// Settle time after taking ownership of a tree
    pub permission_settle: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            export_backoff: Duration::from_secs(2),
            unload_round_wait: Duration::from_secs(2),
            unload_retry: Duration::from_millis(500),
            remount_settle: Duration::from_secs(2),
            permission_settle: Duration::from_secs(1),
        }
    }
}

impl Timings {
    /// No waiting at all. Used by tests and dry runs.
    pub fn immediate() -> Self {
        Self {
            export_backoff: Duration::ZERO,
            unload_round_wait: Duration::ZERO,
            unload_retry: Duration::ZERO,
            remount_settle: Duration::ZERO,
            permission_settle: Duration::ZERO,
        }
    }
}

/// Sleep unless the duration is zero.
pub fn pause(d: Duration) {
    if !d.is_zero() {
        std::thread::sleep(d);
    }
}
