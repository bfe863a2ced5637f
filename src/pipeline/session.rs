//! The build session: runs a variant's steps and owns the outcome.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use super::context::{LogProgress, PipelineContext};
use super::state::BuildState;
use super::variant::{Policy, Step};
use super::BuildOptions;
use crate::config::{Config, Timings};
use crate::copy::ProgressSink;
use crate::error::{BuildError, Result};
use crate::image::{ExportReport, Fs2Probe, ImageInfo, ImageMountGuard, MountState, SpaceProbe};
use crate::log::BuildLog;
use crate::process::ToolRunner;
use crate::timing::Timer;
use crate::tools::{Acl, Dism};

pub struct BuildSession {
    ctx: PipelineContext,
    state: BuildState,
    id: String,
}

impl BuildSession {
    pub fn new(config: Config, options: BuildOptions, runner: Arc<dyn ToolRunner>, timings: Timings) -> Self {
        let stamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let id = format!("{}-{}", options.variant, stamp);
        let log = BuildLog::new(&id);
        let guard = ImageMountGuard::new(
            Arc::clone(&runner),
            &config.scratch_dir,
            timings,
            log.component("mount"),
        );

        let ctx = PipelineContext {
            dism: Dism::new(Arc::clone(&runner)),
            acl: Acl::new(Arc::clone(&runner)),
            runner,
            guard,
            probe: Arc::new(Fs2Probe),
            progress: Box::new(LogProgress::new(log.component("copy"))),
            config,
            options,
            timings,
            log,
            layout: None,
            converted: None,
            info: None,
            export: None,
            output: None,
        };

        Self {
            ctx,
            state: BuildState::Created,
            id,
        }
    }

    /// Replace the free-space query used before export.
    pub fn with_probe(mut self, probe: Arc<dyn SpaceProbe>) -> Self {
        self.ctx.probe = probe;
        self
    }

    pub fn with_progress(mut self, sink: Box<dyn ProgressSink>) -> Self {
        self.ctx.progress = sink;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> BuildState {
        self.state
    }

    pub fn mount_state(&self) -> &MountState {
        self.ctx.guard.state()
    }

    pub fn hives_loaded(&self) -> bool {
        self.ctx.guard.hives_loaded()
    }

    pub fn image_info(&self) -> Option<&ImageInfo> {
        self.ctx.info.as_ref()
    }

    pub fn export_report(&self) -> Option<&ExportReport> {
        self.ctx.export.as_ref()
    }

    pub fn warning_count(&self) -> usize {
        self.ctx.log.warning_count()
    }

    pub fn steps(&self) -> Vec<Step> {
        self.ctx.options.variant.steps(self.ctx.options.netfx3)
    }

    fn advance(&mut self, next: BuildState) {
        if self.state.can_advance_to(next) {
            self.state = next;
        }
    }

    /// Run every step and return the ISO path.
    ///
    /// A fatal step aborts: hives are unloaded, the mount is discarded and
    /// the working directories are kept for inspection.
    pub fn build(&mut self) -> Result<PathBuf> {
        if self.state != BuildState::Created {
            return Err(BuildError::general("build session already ran").with_context("state", self.state));
        }

        let steps = self.steps();
        let log = self.ctx.log.clone();
        log.section(&format!("tiny11 {} build", self.ctx.options.variant));

        for step in &steps {
            self.advance(step.id.state());
            log.step(step.ordinal, steps.len(), step.label);
            let timer = Timer::start(step.label);
            let outcome = self.ctx.run_step(step.id);
            let (_, line) = timer.finish();
            log.info(line);

            match (outcome, step.policy) {
                (Ok(()), _) => {}
                (Err(e), Policy::Soft) => log.warn(format!("{} failed, continuing: {}", step.label, e)),
                (Err(e), Policy::Fatal) => return Err(self.abort(step, e)),
            }
        }

        self.advance(BuildState::Cleanup);
        if self.ctx.options.keep_staging {
            log.info("keeping working directories");
        } else {
            self.remove_working_dirs();
        }
        self.advance(BuildState::Done);

        let output = self
            .ctx
            .output
            .clone()
            .ok_or_else(|| BuildError::general("pipeline finished without an ISO"))?;
        log.success(format!(
            "build complete: {} ({} warnings)",
            output.display(),
            log.warning_count()
        ));
        Ok(output)
    }

    fn abort(&mut self, step: &Step, err: BuildError) -> BuildError {
        let log = self.ctx.log.clone();
        log.error(format!("{} failed: {}", step.label, err));
        self.ctx.guard.emergency_cleanup();
        self.state = BuildState::Aborted;

        log.error(format!(
            "working directories kept for inspection: {}, {}",
            self.ctx.config.staging_dir.display(),
            self.ctx.config.scratch_dir.display()
        ));
        log.error("run `tiny11 clean --force-unmount` before retrying");
        err.with_context("step", step.label)
            .with_context("session", &self.id)
    }

    fn remove_working_dirs(&self) {
        for dir in self.ctx.config.working_dirs() {
            if !dir.exists() {
                continue;
            }
            match fs::remove_dir_all(dir) {
                Ok(()) => self.ctx.log.debug(format!("removed {}", dir.display())),
                Err(e) => self.ctx.log.warn(format!("could not remove {}: {}", dir.display(), e)),
            }
        }
    }
}
