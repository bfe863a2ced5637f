//! Ownership of the scratch mount point.
//!
//! [`ImageMountGuard`] is the only code that mounts or unmounts an image,
//! and it owns the registry session for whatever is mounted. Dropping a
//! guard that never reached an orderly unmount unloads the hives and
//! discards the mount, so no return path leaves either behind.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::{pause, Timings};
use crate::error::{BuildError, ErrorKind, IoContext, Result};
use crate::log::BuildLog;
use crate::process::ToolRunner;
use crate::registry::{RegistryEditSession, HIVES};
use crate::tools::{Acl, Dism, Reg};

/// What is currently mounted at the scratch directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MountState {
    Unmounted,
    Mounted {
        image: PathBuf,
        index: u32,
        read_only: bool,
    },
}

impl MountState {
    pub fn is_mounted(&self) -> bool {
        matches!(self, MountState::Mounted { .. })
    }
}

pub struct ImageMountGuard {
    dism: Dism,
    acl: Acl,
    reg: Reg,
    scratch: PathBuf,
    state: MountState,
    registry: RegistryEditSession,
    /// Set by a successful unmount, cleared by a mount.
    orderly: bool,
    timings: Timings,
    log: BuildLog,
}

impl ImageMountGuard {
    pub fn new(runner: Arc<dyn ToolRunner>, scratch: &Path, timings: Timings, log: BuildLog) -> Self {
        let reg = Reg::new(Arc::clone(&runner));
        let registry = RegistryEditSession::new(
            reg.clone(),
            scratch,
            timings,
            log.component("registry"),
        );
        Self {
            dism: Dism::new(Arc::clone(&runner)),
            acl: Acl::new(runner),
            reg,
            scratch: scratch.to_path_buf(),
            state: MountState::Unmounted,
            registry,
            orderly: true,
            timings,
            log,
        }
    }

    pub fn mount_dir(&self) -> &Path {
        &self.scratch
    }

    pub fn state(&self) -> &MountState {
        &self.state
    }

    /// Hive session for the mounted image.
    pub fn registry(&mut self) -> &mut RegistryEditSession {
        &mut self.registry
    }

    pub fn hives_loaded(&self) -> bool {
        self.registry.is_loaded()
    }

    /// Mount `index` of `image` at the scratch directory.
    pub fn mount(&mut self, image: &Path, index: u32, read_only: bool) -> Result<()> {
        if let MountState::Mounted { image: current, .. } = &self.state {
            return Err(BuildError::general("an image is already mounted")
                .with_context("mounted", current.display())
                .with_context("requested", image.display()));
        }
        if !image.is_file() {
            return Err(BuildError::not_found("image file does not exist")
                .with_context("path", image.display()));
        }

        if let Err(e) = self.acl.seize(image, false) {
            self.log.warn(format!("could not take ownership of {}: {}", image.display(), e.message));
        }

        self.prepare_scratch()?;

        let mode = if read_only { "read-only" } else { "editable" };
        self.log.info(format!(
            "mounting {} index {} ({}) at {}",
            image.display(),
            index,
            mode,
            self.scratch.display()
        ));
        self.dism.mount(image, index, &self.scratch, read_only)?;

        self.state = MountState::Mounted {
            image: image.to_path_buf(),
            index,
            read_only,
        };
        self.orderly = false;
        self.log.success("image mounted");
        Ok(())
    }

    /// Make sure the scratch directory exists and is empty.
    fn prepare_scratch(&self) -> Result<()> {
        if dir_has_entries(&self.scratch) {
            self.log.info("clearing stale scratch directory");
            if let Err(e) = self.dism.unmount(&self.scratch, false) {
                self.log.debug(format!("stale discard: {}", e.message));
            }
            pause(self.timings.remount_settle);

            if let Err(first) = fs::remove_dir_all(&self.scratch) {
                self.log.warn(format!(
                    "cannot remove {} ({}), taking ownership",
                    self.scratch.display(),
                    first
                ));
                if let Err(e) = self.acl.seize(&self.scratch, true) {
                    self.log.warn(format!("ownership change failed: {}", e.message));
                }
                pause(self.timings.permission_settle);

                if let Err(e) = fs::remove_dir_all(&self.scratch) {
                    return Err(BuildError::new(
                        ErrorKind::Permission,
                        "cannot clear the scratch directory",
                    )
                    .with_context("path", self.scratch.display())
                    .with_context(
                        "remediation",
                        format!("delete {} manually or reboot", self.scratch.display()),
                    )
                    .with_source(e));
                }
            }
        }

        fs::create_dir_all(&self.scratch).with_path("create scratch directory", &self.scratch)?;
        if dir_has_entries(&self.scratch) {
            return Err(BuildError::general("scratch directory is not empty")
                .with_context("path", self.scratch.display()));
        }
        Ok(())
    }

    /// Unmount, committing or discarding edits. Loaded hives are unloaded
    /// first. No-op when nothing is mounted.
    pub fn unmount(&mut self, commit: bool) -> Result<()> {
        if !self.state.is_mounted() {
            self.log.skip("no image mounted");
            return Ok(());
        }

        if self.registry.is_loaded() {
            if let Err(e) = self.registry.unload() {
                self.log.warn(format!("hive unload before unmount: {}", e));
            }
        }

        let action = if commit { "commit" } else { "discard" };
        self.log.info(format!("unmounting image ({})", action));
        self.dism.unmount(&self.scratch, commit)?;

        self.state = MountState::Unmounted;
        self.orderly = true;
        self.log.success("image unmounted");
        Ok(())
    }

    /// Ask dism whether the scratch directory is a live mount.
    ///
    /// Both checks must agree: the directory holds a `Windows` tree and
    /// `/Get-MountedImageInfo` lists the path.
    pub fn is_mounted(&self) -> bool {
        if !dir_has_entries(&self.scratch) || !self.scratch.join("Windows").is_dir() {
            return false;
        }
        let dir = self.scratch.to_string_lossy();
        self.dism
            .mounted_info()
            .map(|out| out.contains(dir.as_ref()))
            .unwrap_or(false)
    }

    /// Unload any tracked hives and discard the mount. Never fails; every
    /// problem is logged. Returns true if there was anything to clean.
    pub fn emergency_cleanup(&mut self) -> bool {
        let hives = self.registry.is_loaded();
        let mounted = self.state.is_mounted();
        if !hives && !mounted {
            self.orderly = true;
            return false;
        }

        self.log.warn("emergency cleanup: releasing hives and discarding mount");
        if hives {
            if let Err(e) = self.registry.unload() {
                self.log.warn(format!("emergency hive unload: {}", e));
            }
        }
        if mounted {
            match self.dism.unmount(&self.scratch, false) {
                Ok(()) => self.log.info("mount discarded"),
                Err(e) => self.log.error(format!(
                    "discard failed, delete {} or reboot: {}",
                    self.scratch.display(),
                    e.message
                )),
            }
            self.state = MountState::Unmounted;
        }
        self.orderly = true;
        true
    }

    /// Release everything at the scratch path whether or not this guard
    /// mounted it. Used by `clean --force-unmount`. Returns true if a live
    /// mount was found and a discard was issued.
    pub fn force_release(&mut self) -> bool {
        for h in HIVES {
            if self.reg.unload(&h.key()).is_ok() {
                self.log.info(format!("unloaded {}", h.key()));
            }
        }

        let live = self.is_mounted();
        if live {
            match self.dism.unmount(&self.scratch, false) {
                Ok(()) => self.log.info("discarded mount"),
                Err(e) => self.log.warn(format!(
                    "discard failed, delete {} or reboot: {}",
                    self.scratch.display(),
                    e.message
                )),
            }
        } else if dir_has_entries(&self.scratch) {
            self.log.info(format!(
                "{} holds files but is not a live mount",
                self.scratch.display()
            ));
        }
        self.state = MountState::Unmounted;
        self.orderly = true;
        live
    }
}

impl Drop for ImageMountGuard {
    fn drop(&mut self) {
        if !self.orderly || self.registry.is_loaded() {
            self.emergency_cleanup();
        }
    }
}

fn dir_has_entries(dir: &Path) -> bool {
    fs::read_dir(dir)
        .map(|mut entries| entries.next().is_some())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::CommandResult;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Accepts every call and records it. `/Get-MountedImageInfo` prints
    /// `listing`.
    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<String>>,
        listing: String,
    }

    impl ToolRunner for Recorder {
        fn run(&self, program: &str, args: &[String]) -> Result<CommandResult> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("{} {}", program, args.join(" ")));
            if args.iter().any(|a| a == "/Get-MountedImageInfo") {
                return Ok(CommandResult::ok(self.listing.clone()));
            }
            Ok(CommandResult::ok(""))
        }
    }

    fn discards(runner: &Recorder) -> usize {
        runner
            .calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.contains("/Unmount-Image"))
            .count()
    }

    /// Scratch dir with or without a `Windows` tree, and a runner whose
    /// mount listing does or does not name it.
    fn leftover(tree: bool, listed: bool) -> (TempDir, Arc<Recorder>, ImageMountGuard) {
        let tmp = TempDir::new().unwrap();
        let scratch = tmp.path().join("scratch");
        fs::create_dir_all(&scratch).unwrap();
        if tree {
            fs::create_dir_all(scratch.join("Windows/System32")).unwrap();
        }
        let listing = if listed {
            format!("Mount Dir : {}\nImage Index : 1\n", scratch.display())
        } else {
            String::new()
        };
        let runner = Arc::new(Recorder {
            listing,
            ..Default::default()
        });
        let guard = ImageMountGuard::new(runner.clone(), &scratch, Timings::immediate(), BuildLog::new("t"));
        (tmp, runner, guard)
    }

    #[test]
    fn test_live_mount_needs_both_signals() {
        let (_tmp, _, guard) = leftover(true, true);
        assert!(guard.is_mounted());

        let (_tmp, _, guard) = leftover(true, false);
        assert!(!guard.is_mounted());

        let (_tmp, _, guard) = leftover(false, true);
        assert!(!guard.is_mounted());
    }

    #[test]
    fn test_force_release_discards_only_live_mounts() {
        let (_tmp, runner, mut guard) = leftover(true, true);
        assert!(guard.force_release());
        assert_eq!(discards(&runner), 1);
        assert_eq!(
            runner.calls.lock().unwrap().iter().filter(|c| c.starts_with("reg unload")).count(),
            HIVES.len()
        );

        let (_tmp, runner, mut guard) = leftover(true, false);
        assert!(!guard.force_release());
        assert_eq!(discards(&runner), 0);

        let (_tmp, runner, mut guard) = leftover(false, true);
        assert!(!guard.force_release());
        assert_eq!(discards(&runner), 0);
    }

    fn setup() -> (TempDir, Arc<Recorder>, PathBuf) {
        let tmp = TempDir::new().unwrap();
        let wim = tmp.path().join("install.wim");
        fs::write(&wim, b"wim").unwrap();
        (tmp, Arc::new(Recorder::default()), wim)
    }

    #[test]
    fn test_unmount_when_unmounted_is_noop() {
        let (tmp, runner, _) = setup();
        let mut guard = ImageMountGuard::new(
            runner.clone(),
            &tmp.path().join("scratch"),
            Timings::immediate(),
            BuildLog::new("t"),
        );
        guard.unmount(true).unwrap();
        assert!(runner.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_double_mount_rejected() {
        let (tmp, runner, wim) = setup();
        let mut guard = ImageMountGuard::new(
            runner,
            &tmp.path().join("scratch"),
            Timings::immediate(),
            BuildLog::new("t"),
        );
        guard.mount(&wim, 1, false).unwrap();
        assert!(guard.mount(&wim, 1, false).is_err());
        guard.unmount(false).unwrap();
        assert_eq!(guard.state(), &MountState::Unmounted);
    }

    #[test]
    fn test_drop_discards_unfinished_mount() {
        let (tmp, runner, wim) = setup();
        {
            let mut guard = ImageMountGuard::new(
                runner.clone(),
                &tmp.path().join("scratch"),
                Timings::immediate(),
                BuildLog::new("t"),
            );
            guard.mount(&wim, 6, false).unwrap();
            guard.registry().load().unwrap();
        }
        let calls = runner.calls.lock().unwrap();
        let last = calls.last().unwrap();
        assert!(last.contains("/Unmount-Image") && last.ends_with("/Discard"));
        assert_eq!(calls.iter().filter(|c| c.starts_with("reg unload")).count(), 5);
    }

    #[test]
    fn test_missing_image() {
        let (tmp, runner, _) = setup();
        let mut guard = ImageMountGuard::new(
            runner,
            &tmp.path().join("scratch"),
            Timings::immediate(),
            BuildLog::new("t"),
        );
        let err = guard.mount(&tmp.path().join("nope.wim"), 1, true).unwrap_err();
        assert!(err.is(ErrorKind::NotFound));
    }
}
