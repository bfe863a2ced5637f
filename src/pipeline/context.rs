//! Everything a running pipeline holds.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::BuildOptions;
use crate::config::{Config, Timings};
use crate::copy::{ProgressSink, ProgressUpdate};
use crate::error::{BuildError, Result};
use crate::image::{ConvertedEsd, ExportReport, ImageInfo, ImageMountGuard, SourceLayout, SpaceProbe};
use crate::log::BuildLog;
use crate::process::ToolRunner;
use crate::removal::RemovalContext;
use crate::tools::{Acl, Dism};

/// Logs staging progress every tenth of the total.
pub struct LogProgress {
    log: BuildLog,
    last_decile: AtomicU64,
}

impl LogProgress {
    pub fn new(log: BuildLog) -> Self {
        Self {
            log,
            last_decile: AtomicU64::new(0),
        }
    }
}

impl ProgressSink for LogProgress {
    fn report(&self, update: ProgressUpdate) {
        let decile = (update.percent() / 10.0) as u64;
        if update.finished || decile > self.last_decile.swap(decile, Ordering::Relaxed) {
            self.log.info(format!(
                "staged {:.0}% ({}/{} files)",
                update.percent(),
                update.files_done,
                update.files_total
            ));
        }
    }
}

pub struct PipelineContext {
    pub config: Config,
    pub options: BuildOptions,
    pub timings: Timings,
    pub runner: Arc<dyn ToolRunner>,
    pub dism: Dism,
    pub acl: Acl,
    pub guard: ImageMountGuard,
    pub probe: Arc<dyn SpaceProbe>,
    pub progress: Box<dyn ProgressSink>,
    pub log: BuildLog,

    pub layout: Option<SourceLayout>,
    pub converted: Option<ConvertedEsd>,
    pub info: Option<ImageInfo>,
    pub export: Option<ExportReport>,
    pub output: Option<PathBuf>,
}

impl PipelineContext {
    pub fn staging(&self) -> &Path {
        &self.config.staging_dir
    }

    pub fn mount_dir(&self) -> PathBuf {
        self.guard.mount_dir().to_path_buf()
    }

    /// `<staging>/sources/<name>`
    pub fn staged(&self, name: &str) -> PathBuf {
        crate::image::source::sources_file(&self.config.staging_dir, name)
    }

    pub fn info(&self) -> Result<&ImageInfo> {
        self.info
            .as_ref()
            .ok_or_else(|| BuildError::general("image has not been inspected yet"))
    }

    /// Run `f` with a removal context over the mounted image.
    pub fn with_removal<R>(&self, f: impl FnOnce(&RemovalContext<'_>) -> R) -> Result<R> {
        let info = self.info()?;
        let mount = self.mount_dir();
        let ctx = RemovalContext {
            dism: &self.dism,
            acl: &self.acl,
            mount: &mount,
            arch: &info.architecture,
            language: &info.language,
            log: &self.log,
        };
        Ok(f(&ctx))
    }
}
