//! Re-export of an edited image with retries and validation.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::config::pause;
use crate::error::{BuildError, ErrorKind, IoContext, Result};
use crate::log::BuildLog;
use crate::tools::parse::format_bytes;
use crate::tools::{Compression, Dism};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
/// Free space required on top of the source size.
pub const SPACE_MARGIN: u64 = 2 * 1024 * 1024 * 1024;
/// Anything smaller is treated as a corrupt export.
pub const MIN_VALID_SIZE: u64 = 100 * 1024 * 1024;

/// Free-space query for the destination volume.
pub trait SpaceProbe: Send + Sync {
    fn available(&self, path: &Path) -> io::Result<u64>;
}

/// Queries the filesystem via `fs2`.
#[derive(Debug, Default, Clone, Copy)]
pub struct Fs2Probe;

impl SpaceProbe for Fs2Probe {
    fn available(&self, path: &Path) -> io::Result<u64> {
        // fs2 needs an existing path; walk up to the nearest one.
        let existing = path
            .ancestors()
            .find(|p| p.exists())
            .unwrap_or_else(|| Path::new("."));
        fs2::available_space(existing)
    }
}

/// What happens to the source after a validated export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Finish {
    /// Delete the source and rename the export into its place.
    ReplaceSource,
    /// Delete the source and keep the export under its own name.
    DropSource,
    /// Leave both files.
    KeepSource,
}

/// One export call.
#[derive(Debug, Clone)]
pub struct ExportRequest {
    pub source: PathBuf,
    pub index: u32,
    pub destination: PathBuf,
    pub compression: Compression,
    pub check_integrity: bool,
    pub finish: Finish,
}

/// A single try, logged and then discarded.
#[derive(Debug, Clone)]
pub struct ExportAttempt<'a> {
    pub ordinal: u32,
    pub source: &'a Path,
    pub destination: &'a Path,
    pub compression: Compression,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExportReport {
    pub before: u64,
    pub after: u64,
    pub attempts: u32,
    /// Where the exported image ended up.
    pub output: PathBuf,
}

impl ExportReport {
    /// Exported size as a fraction of the original.
    pub fn ratio(&self) -> f64 {
        if self.before == 0 {
            0.0
        } else {
            self.after as f64 / self.before as f64
        }
    }
}

pub struct ExportRetryPolicy {
    dism: Dism,
    probe: Arc<dyn SpaceProbe>,
    pub max_attempts: u32,
    pub backoff: Duration,
    pub margin: u64,
    pub min_size: u64,
    log: BuildLog,
}

impl ExportRetryPolicy {
    pub fn new(dism: Dism, probe: Arc<dyn SpaceProbe>, backoff: Duration, log: BuildLog) -> Self {
        Self {
            dism,
            probe,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff,
            margin: SPACE_MARGIN,
            min_size: MIN_VALID_SIZE,
            log,
        }
    }

    /// Export, validate, then finish per `req.finish`.
    ///
    /// On error the destination does not exist.
    pub fn export(&self, req: &ExportRequest) -> Result<ExportReport> {
        let before = fs::metadata(&req.source)
            .map_err(|e| {
                BuildError::not_found("export source does not exist")
                    .with_context("path", req.source.display())
                    .with_source(e)
            })?
            .len();

        self.check_space(&req.destination, before)?;

        let mut last_error = None;
        let mut attempts = 0;
        for ordinal in 1..=self.max_attempts {
            attempts = ordinal;
            let attempt = ExportAttempt {
                ordinal,
                source: &req.source,
                destination: &req.destination,
                compression: req.compression,
            };
            match self.try_once(&attempt, req) {
                Ok(after) => {
                    return self.finish(req, before, after, attempts);
                }
                Err(e) => {
                    remove_partial(&req.destination, &self.log);
                    self.log.warn(format!(
                        "export attempt {}/{} failed: {}",
                        ordinal, self.max_attempts, e.message
                    ));
                    last_error = Some(e);
                    if ordinal < self.max_attempts {
                        pause(self.backoff);
                    }
                }
            }
        }

        let err = last_error
            .unwrap_or_else(|| BuildError::general("export was never attempted"));
        Err(BuildError {
            message: format!("export failed after {} attempts: {}", attempts, err.message),
            ..err
        }
        .with_context("attempts", attempts)
        .with_context("destination", req.destination.display()))
    }

    fn check_space(&self, destination: &Path, source_size: u64) -> Result<()> {
        let dir = destination.parent().unwrap_or_else(|| Path::new("."));
        let required = source_size.saturating_add(self.margin);
        match self.probe.available(dir) {
            Ok(available) if available < required => Err(BuildError::new(
                ErrorKind::DiskSpace,
                "not enough free space to export the image",
            )
            .with_context("required", required)
            .with_context("available", available)
            .with_context("path", dir.display())
            .with_context("attempts", 0)),
            Ok(available) => {
                self.log.debug(format!(
                    "free space {} (need {})",
                    format_bytes(available),
                    format_bytes(required)
                ));
                Ok(())
            }
            Err(e) => {
                self.log
                    .warn(format!("free-space query failed, continuing: {}", e));
                Ok(())
            }
        }
    }

    fn try_once(&self, attempt: &ExportAttempt<'_>, req: &ExportRequest) -> Result<u64> {
        remove_partial(attempt.destination, &self.log);
        self.log.info(format!(
            "export attempt {}: {} -> {} ({})",
            attempt.ordinal,
            attempt.source.display(),
            attempt.destination.display(),
            attempt.compression
        ));
        self.dism.export(
            attempt.source,
            req.index,
            attempt.destination,
            attempt.compression,
            req.check_integrity,
        )?;

        let size = fs::metadata(attempt.destination)
            .map_err(|e| {
                BuildError::not_found("export reported success but wrote no file")
                    .with_context("path", attempt.destination.display())
                    .with_source(e)
            })?
            .len();
        if size < self.min_size {
            return Err(BuildError::general("exported image is implausibly small")
                .with_context("size", size)
                .with_context("min_size", self.min_size));
        }
        Ok(size)
    }

    fn finish(&self, req: &ExportRequest, before: u64, after: u64, attempts: u32) -> Result<ExportReport> {
        let output = match req.finish {
            Finish::KeepSource => req.destination.clone(),
            Finish::DropSource => {
                fs::remove_file(&req.source).with_path("remove export source", &req.source)?;
                req.destination.clone()
            }
            Finish::ReplaceSource => {
                fs::remove_file(&req.source).with_path("remove export source", &req.source)?;
                fs::rename(&req.destination, &req.source)
                    .with_path("move export into place", &req.destination)?;
                req.source.clone()
            }
        };

        let report = ExportReport {
            before,
            after,
            attempts,
            output,
        };
        self.log.success(format!(
            "exported {} -> {} ({:.1}% of original)",
            format_bytes(before),
            format_bytes(after),
            report.ratio() * 100.0
        ));
        Ok(report)
    }
}

fn remove_partial(path: &Path, log: &BuildLog) {
    if path.exists() {
        if let Err(e) = fs::remove_file(path) {
            log.warn(format!("cannot remove partial export {}: {}", path.display(), e));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(u64);

    impl SpaceProbe for Fixed {
        fn available(&self, _path: &Path) -> io::Result<u64> {
            Ok(self.0)
        }
    }

    #[test]
    fn test_ratio() {
        let r = ExportReport {
            before: 200,
            after: 50,
            attempts: 1,
            output: PathBuf::from("x"),
        };
        assert_eq!(r.ratio(), 0.25);
    }

    #[test]
    fn test_fs2_probe_walks_to_existing_parent() {
        let tmp = tempfile::TempDir::new().unwrap();
        let deep = tmp.path().join("not/yet/created/file.wim");
        assert!(Fs2Probe.available(&deep).is_ok());
    }

    #[test]
    fn test_insufficient_space_makes_no_attempt() {
        use crate::process::{CommandResult, ToolRunner};
        use std::sync::atomic::{AtomicUsize, Ordering};

        #[derive(Default)]
        struct Counting(AtomicUsize);
        impl ToolRunner for Counting {
            fn run(&self, _p: &str, _a: &[String]) -> Result<CommandResult> {
                self.0.fetch_add(1, Ordering::SeqCst);
                Ok(CommandResult::ok(""))
            }
        }

        let tmp = tempfile::TempDir::new().unwrap();
        let source = tmp.path().join("install.wim");
        fs::write(&source, vec![0u8; 4096]).unwrap();

        let runner = Arc::new(Counting::default());
        let policy = ExportRetryPolicy::new(
            Dism::new(runner.clone()),
            Arc::new(Fixed(SPACE_MARGIN)),
            Duration::ZERO,
            BuildLog::new("t"),
        );
        let err = policy
            .export(&ExportRequest {
                source: source.clone(),
                index: 1,
                destination: tmp.path().join("install2.wim"),
                compression: Compression::Recovery,
                check_integrity: true,
                finish: Finish::ReplaceSource,
            })
            .unwrap_err();

        assert!(err.is(ErrorKind::DiskSpace));
        assert_eq!(err.context_value("attempts"), Some("0"));
        assert_eq!(runner.0.load(Ordering::SeqCst), 0);
        assert!(source.exists());
    }
}
