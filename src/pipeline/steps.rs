//! What each step does.

use std::fs;
use std::path::Path;

use super::context::PipelineContext;
use super::variant::{StepId, Variant};
use crate::config::pause;
use crate::copy::{verify_copy, CopyEngine};
use crate::customize::{preinstall, theme, unattend, Theme};
use crate::error::{BuildError, IoContext, Result};
use crate::image::{self, ExportRequest, ExportRetryPolicy, Finish};
use crate::iso;
use crate::registry::TweakSet;
use crate::removal::apps::{self, AppMatch};
use crate::removal::catalog::{CORE_PACKAGES, NANO_PACKAGES, STANDARD_APPS};
use crate::removal::{files, services};
use crate::tools::Compression;

/// Boot image index holding Windows Setup.
const SETUP_INDEX: u32 = 2;

impl PipelineContext {
    pub(super) fn run_step(&mut self, id: StepId) -> Result<()> {
        match id {
            StepId::ValidateSource => {
                let layout = image::validate_source(&self.options.source)?;
                self.log.info(format!(
                    "source media OK ({:?} install image)",
                    layout.format
                ));
                self.layout = Some(layout);
                Ok(())
            }
            StepId::StageFiles => self.stage_files(),
            StepId::ConvertEsd => {
                self.converted = image::source::convert_esd(
                    &self.dism,
                    &self.config.staging_dir,
                    self.options.index,
                    &self.log,
                )?;
                Ok(())
            }
            StepId::InspectImage => self.inspect_image(),
            StepId::MountInstall => {
                let install = self.staged("install.wim");
                let index = self.info()?.index;
                self.guard.mount(&install, index, false)
            }
            StepId::TakeOwnership => self.with_removal(files::take_ownership),
            StepId::RemoveApps => {
                self.with_removal(|r| apps::remove_provisioned_apps(r, STANDARD_APPS, AppMatch::Exact))??;
                Ok(())
            }
            StepId::RemoveExtraApps => {
                self.with_removal(apps::remove_extra_apps)??;
                Ok(())
            }
            StepId::RemoveSystemPackages => {
                let patterns = match self.options.variant {
                    Variant::Nano => NANO_PACKAGES,
                    _ => CORE_PACKAGES,
                };
                self.with_removal(|r| apps::remove_system_packages(r, patterns))??;
                Ok(())
            }
            StepId::EnableNetFx3 => {
                let sxs = self.staged("sxs");
                self.dism.enable_feature(&self.mount_dir(), "NetFx3", &sxs)?;
                self.log.success(".NET Framework 3.5 enabled");
                Ok(())
            }
            StepId::RemoveNativeImages => self.with_removal(|r| {
                files::remove_native_images(r);
            }),
            StepId::RemoveDrivers => self.with_removal(|r| {
                files::remove_drivers(r);
            }),
            StepId::RemoveFonts => self.with_removal(|r| {
                files::remove_fonts(r);
            }),
            StepId::RemoveSystemFolders => self.with_removal(|r| {
                files::remove_system_folders(r);
            }),
            StepId::RemoveEdge => self.with_removal(|r| {
                files::remove_edge(r);
            }),
            StepId::RemoveOneDrive => self.with_removal(|r| {
                files::remove_onedrive(r);
            }),
            StepId::RemoveScheduledTasks => self.with_removal(|r| {
                files::remove_scheduled_tasks(r);
            }),
            StepId::DisableWinRe => self.with_removal(files::disable_winre)?,
            StepId::CleanupImage => self.dism.cleanup_image(&self.mount_dir(), true),
            StepId::SlimWinSxS => {
                let engine = CopyEngine::new(self.config.max_copy_workers, self.log.component("copy"));
                self.with_removal(|r| files::slim_winsxs(r, &engine))??;
                Ok(())
            }
            StepId::StagePreinstall => {
                preinstall::stage(
                    &self.config.preinstall_dir,
                    &self.options.apps,
                    &self.mount_dir(),
                    &self.log,
                )?;
                Ok(())
            }
            StepId::LoadHives => self.guard.registry().load(),
            StepId::ApplyTweaks => self.apply_tweaks(TweakSet::Base),
            StepId::ApplyCoreTweaks => self.apply_tweaks(TweakSet::Core),
            StepId::ApplyNanoTweaks => self.apply_tweaks(TweakSet::Nano),
            StepId::ApplyTheme => self.apply_theme(),
            StepId::UnloadHives => self.guard.registry().unload(),
            StepId::RemoveServices => {
                services::remove_services(self.guard.registry(), &self.log)?;
                Ok(())
            }
            StepId::InstallAnswerFile => {
                let theme_dir = (!theme::is_default(&self.options.theme))
                    .then(|| self.config.themes_dir.join(&self.options.theme));
                let answer = unattend::resolve(&self.config.resources_dir, theme_dir.as_deref(), &self.log)?;
                unattend::install(&answer, &self.mount_dir(), &self.config.staging_dir, &self.log)
            }
            StepId::UnmountInstall => self.guard.unmount(true),
            StepId::ExportInstall => self.export_install(),
            StepId::ProcessBootImage => match self.options.variant {
                Variant::Nano => self.process_boot_nano(),
                _ => self.process_boot(),
            },
            StepId::TrimIsoRoot => iso::trim_iso_root(&self.config.staging_dir, &self.log).map(|_| ()),
            StepId::CreateIso => {
                let oscdimg = iso::ensure_oscdimg(self.runner.as_ref(), &self.config, &self.log)?;
                let output = self
                    .options
                    .output
                    .clone()
                    .unwrap_or_else(|| self.config.output_iso.clone());
                let iso = iso::create_iso(
                    self.runner.as_ref(),
                    &oscdimg,
                    &self.config.staging_dir,
                    &output,
                    &self.log,
                )?;
                self.output = Some(iso);
                Ok(())
            }
        }
    }

    /// A converted ESD leaves a single-image WIM, so the edition is always
    /// index 1 there; its name still comes from the ESD listing.
    fn inspect_image(&mut self) -> Result<()> {
        let install = self.staged("install.wim");
        let requested = match &self.converted {
            Some(_) => Some(image::source::CONVERTED_INDEX),
            None => self.options.index,
        };
        let mut info = image::info::inspect(&self.dism, &mut self.guard, &install, requested, &self.log)?;
        if let Some(esd) = &self.converted {
            self.log.info(format!(
                "edition {} ({}) from install.esd index {}",
                info.index, esd.name, esd.source_index
            ));
            if !esd.name.is_empty() {
                info.name = esd.name.clone();
            }
            if !esd.description.is_empty() {
                info.description = esd.description.clone();
            }
        }
        self.info = Some(info);
        Ok(())
    }

    fn stage_files(&mut self) -> Result<()> {
        let staging = self.config.staging_dir.clone();
        if staging.exists() {
            self.log.info(format!("clearing previous staging tree {}", staging.display()));
            fs::remove_dir_all(&staging).with_path("clear staging directory", &staging)?;
        }

        let engine = CopyEngine::new(self.config.max_copy_workers, self.log.component("copy"));
        let summary = engine.copy_tree(&self.options.source, &staging, self.progress.as_ref())?;
        self.log.success(format!(
            "staged {} files ({}) with {} workers",
            summary.files,
            crate::tools::parse::format_bytes(summary.bytes),
            summary.workers
        ));

        if self.options.verify_copy {
            let diff = verify_copy(&self.options.source, &staging)?;
            if !diff.is_identical() {
                return Err(BuildError::general("staged copy differs from the source")
                    .with_context("missing", diff.missing.len())
                    .with_context("extra", diff.extra.len())
                    .with_context("mismatched", diff.mismatched.len()));
            }
            self.log.success("staged copy verified");
        }
        Ok(())
    }

    fn apply_tweaks(&mut self, set: TweakSet) -> Result<()> {
        let report = self.guard.registry().apply(set.tweaks());
        if report.failed > 0 && report.applied == 0 {
            return Err(BuildError::tool(format!("no {} tweaks could be applied", set.name()))
                .with_context("failed", report.failed));
        }
        Ok(())
    }

    fn apply_theme(&mut self) -> Result<()> {
        if theme::is_default(&self.options.theme) {
            self.log.skip("default theme, nothing to apply");
            return Ok(());
        }
        let theme = Theme::load(&self.config.themes_dir, &self.options.theme)?;
        let mount = self.mount_dir();
        let log = self.log.clone();
        theme.apply(&mount, self.guard.registry(), &log);
        Ok(())
    }

    fn export_install(&mut self) -> Result<()> {
        let variant = self.options.variant;
        let request = ExportRequest {
            source: self.staged("install.wim"),
            index: self.info()?.index,
            destination: self.staged(variant.export_target()),
            compression: Compression::Recovery,
            check_integrity: variant.export_integrity(),
            finish: match variant {
                Variant::Nano => Finish::DropSource,
                _ => Finish::ReplaceSource,
            },
        };
        let policy = ExportRetryPolicy::new(
            self.dism.clone(),
            self.probe.clone(),
            self.timings.export_backoff,
            self.log.component("export"),
        );
        self.export = Some(policy.export(&request)?);
        Ok(())
    }

    /// Bypass tweaks on the mounted boot image. Hive trouble is a warning.
    fn tweak_boot_image(&mut self) {
        let registry = self.guard.registry();
        if let Err(e) = registry.load() {
            self.log.warn(format!("boot image hives did not load: {}", e));
            if let Err(e) = registry.unload() {
                self.log.warn(format!("boot image hive unload: {}", e));
            }
            return;
        }
        registry.apply(TweakSet::Boot.tweaks());
        if let Err(e) = registry.unload() {
            self.log.warn(format!("boot image hive unload: {}", e));
        }
    }

    fn seize(&self, path: &Path) {
        if let Err(e) = self.acl.seize(path, false) {
            self.log.warn(format!("could not take ownership of {}: {}", path.display(), e.message));
        }
    }

    fn process_boot(&mut self) -> Result<()> {
        let boot = self.staged("boot.wim");
        self.seize(&boot);
        self.guard.mount(&boot, SETUP_INDEX, false)?;
        self.tweak_boot_image();
        self.guard.unmount(true)
    }

    /// Export the setup index alone, edit it, then recompress it over
    /// `boot.wim`.
    fn process_boot_nano(&mut self) -> Result<()> {
        let boot = self.staged("boot.wim");
        let boot_new = self.staged("boot_new.wim");
        let boot_final = self.staged("boot_final.wim");

        self.seize(&boot);
        for stale in [&boot_new, &boot_final] {
            if stale.exists() {
                fs::remove_file(stale).with_path("remove stale boot image", stale)?;
            }
        }

        self.dism.export(&boot, SETUP_INDEX, &boot_new, Compression::Keep, false)?;
        self.guard.mount(&boot_new, 1, false)?;
        self.tweak_boot_image();
        self.guard.unmount(true)?;
        pause(self.timings.remount_settle);

        self.seize(&boot);
        fs::remove_file(&boot).with_path("remove original boot.wim", &boot)?;
        self.dism.export(&boot_new, 1, &boot_final, Compression::Max, false)?;
        fs::remove_file(&boot_new).with_path("remove intermediate boot image", &boot_new)?;
        fs::rename(&boot_final, &boot).with_path("move compressed boot image", &boot_final)?;
        self.log.success("boot image rebuilt");
        Ok(())
    }
}
