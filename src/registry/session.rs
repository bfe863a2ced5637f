//! Offline registry hive session: load, apply, unload.

use std::path::{Path, PathBuf};

use super::tweaks::{RegOp, Tweak};
use crate::config::{pause, Timings};
use crate::error::{BuildError, ErrorKind, Result};
use crate::log::BuildLog;
use crate::tools::Reg;

/// Unload rounds before giving up on a stuck hive.
pub const UNLOAD_ROUNDS: usize = 3;

/// A hive file inside a mounted image and the alias it loads under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hive {
    pub alias: &'static str,
    /// Relative to the mount root, backslash separated.
    pub file: &'static str,
}

impl Hive {
    pub fn key(&self) -> String {
        format!("HKLM\\{}", self.alias)
    }

    pub fn path_in(&self, mount_dir: &Path) -> PathBuf {
        self.file
            .split('\\')
            .fold(mount_dir.to_path_buf(), |p, part| p.join(part))
    }
}

pub const HIVES: [Hive; 5] = [
    Hive {
        alias: "zCOMPONENTS",
        file: "Windows\\System32\\config\\COMPONENTS",
    },
    Hive {
        alias: "zDEFAULT",
        file: "Windows\\System32\\config\\default",
    },
    Hive {
        alias: "zNTUSER",
        file: "Users\\Default\\ntuser.dat",
    },
    Hive {
        alias: "zSOFTWARE",
        file: "Windows\\System32\\config\\SOFTWARE",
    },
    Hive {
        alias: "zSYSTEM",
        file: "Windows\\System32\\config\\SYSTEM",
    },
];

pub fn hive(alias: &str) -> Option<Hive> {
    HIVES.iter().copied().find(|h| h.alias == alias)
}

/// Outcome of applying a tweak list.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TweakReport {
    pub applied: usize,
    pub failed: usize,
}

/// Tracks which hives of the mounted image are loaded.
///
/// Loaded aliases are the only state; [`unload`](Self::unload) always ends
/// with none tracked, even when `reg` refuses to release one.
pub struct RegistryEditSession {
    reg: Reg,
    mount_dir: PathBuf,
    loaded: Vec<Hive>,
    timings: Timings,
    log: BuildLog,
}

impl RegistryEditSession {
    pub fn new(reg: Reg, mount_dir: &Path, timings: Timings, log: BuildLog) -> Self {
        Self {
            reg,
            mount_dir: mount_dir.to_path_buf(),
            loaded: Vec::new(),
            timings,
            log,
        }
    }

    pub fn is_loaded(&self) -> bool {
        !self.loaded.is_empty()
    }

    pub fn loaded_aliases(&self) -> Vec<&'static str> {
        self.loaded.iter().map(|h| h.alias).collect()
    }

    /// Load all five hives.
    pub fn load(&mut self) -> Result<()> {
        self.load_only(&HIVES)
    }

    /// Load a subset. Already-loaded hives are skipped. Stops at the first
    /// failure; whatever loaded before it stays tracked for unload.
    pub fn load_only(&mut self, hives: &[Hive]) -> Result<()> {
        for h in hives {
            if self.loaded.contains(h) {
                continue;
            }
            let file = h.path_in(&self.mount_dir);
            self.reg.load(&h.key(), &file).map_err(|e| {
                BuildError {
                    message: format!("failed to load hive {}: {}", h.alias, e.message),
                    ..e
                }
                .with_context("hive", h.alias)
                .with_context("path", file.display())
            })?;
            self.log.debug(format!("loaded {}", h.key()));
            self.loaded.push(*h);
        }
        Ok(())
    }

    /// Apply tweaks in order. A tweak fails if any of its adds fails;
    /// deletes are best-effort.
    pub fn apply(&self, tweaks: &[Tweak]) -> TweakReport {
        let mut report = TweakReport::default();
        for (i, tweak) in tweaks.iter().enumerate() {
            self.log
                .info(format!("[{}/{}] {}", i + 1, tweaks.len(), tweak.label));
            let mut first_error = None;
            for op in tweak.ops {
                match *op {
                    RegOp::Add {
                        path,
                        name,
                        kind,
                        value,
                    } => {
                        if let Err(e) = self.reg.add(path, name, kind, value) {
                            first_error.get_or_insert(e);
                        }
                    }
                    RegOp::Delete { path } => {
                        if let Err(e) = self.reg.delete(path) {
                            self.log.debug(format!("delete {} skipped: {}", path, e.message));
                        }
                    }
                }
            }
            match first_error {
                None => report.applied += 1,
                Some(e) => {
                    self.log.warn(format!("{} failed: {}", tweak.label, e));
                    report.failed += 1;
                }
            }
        }
        self.log.success(format!(
            "registry tweaks: {} applied, {} failed",
            report.applied, report.failed
        ));
        report
    }

    fn require_loaded(&self, path: &str) -> Result<()> {
        let alias = super::tweaks::alias_of(path).unwrap_or_default();
        if self.loaded.iter().any(|h| h.alias == alias) {
            return Ok(());
        }
        Err(BuildError::general("hive is not loaded")
            .with_context("hive", alias)
            .with_context("key", path))
    }

    /// Write one value under a loaded hive.
    pub fn set_value(&self, path: &str, name: &str, kind: &str, value: &str) -> Result<()> {
        self.require_loaded(path)?;
        self.reg.add(path, name, kind, value)
    }

    /// Delete a key under a loaded hive.
    pub fn delete_key(&self, path: &str) -> Result<()> {
        self.require_loaded(path)?;
        self.reg.delete(path)
    }

    /// Unload every tracked hive.
    ///
    /// Runs up to [`UNLOAD_ROUNDS`] rounds over the remaining aliases, each
    /// alias retried once after a short wait. If some stay loaded after the
    /// last round they are dropped from tracking anyway and an error naming
    /// them is returned.
    pub fn unload(&mut self) -> Result<()> {
        if self.loaded.is_empty() {
            return Ok(());
        }

        for round in 1..=UNLOAD_ROUNDS {
            if round > 1 {
                self.log.info("waiting for hive handles to be released...");
                pause(self.timings.unload_round_wait);
            }

            let pending = std::mem::take(&mut self.loaded);
            for h in pending {
                if let Err(e) = self.unload_one(&h) {
                    self.log.warn(format!(
                        "unload {} failed (round {}/{}): {}",
                        h.key(),
                        round,
                        UNLOAD_ROUNDS,
                        e.message
                    ));
                    self.loaded.push(h);
                }
            }

            if self.loaded.is_empty() {
                self.log.success("registry hives unloaded");
                return Ok(());
            }
        }

        let stuck = self.loaded_aliases().join(", ");
        self.loaded.clear();
        self.log.warn(format!(
            "hives still loaded after {} rounds, treating as unloaded: {}",
            UNLOAD_ROUNDS, stuck
        ));
        Err(BuildError::new(ErrorKind::ExternalTool, "some registry hives failed to unload")
            .with_context("hives", stuck)
            .with_context("rounds", UNLOAD_ROUNDS))
    }

    fn unload_one(&self, h: &Hive) -> Result<()> {
        if self.reg.unload(&h.key()).is_ok() {
            return Ok(());
        }
        pause(self.timings.unload_retry);
        self.reg.unload(&h.key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::{CommandResult, ToolRunner};
    use std::sync::{Arc, Mutex};

    /// `reg` that never releases one alias.
    struct StuckHive {
        stuck: &'static str,
        unloads: Mutex<Vec<String>>,
    }

    impl ToolRunner for StuckHive {
        fn run(&self, _program: &str, args: &[String]) -> Result<CommandResult> {
            if args[0] != "unload" {
                return Ok(CommandResult::ok("The operation completed successfully."));
            }
            self.unloads.lock().unwrap().push(args[1].clone());
            if args[1].ends_with(self.stuck) {
                return Ok(CommandResult::failed(1, "ERROR: Access is denied."));
            }
            Ok(CommandResult::ok("The operation completed successfully."))
        }
    }

    fn session(runner: Arc<StuckHive>, log: BuildLog) -> RegistryEditSession {
        RegistryEditSession::new(Reg::new(runner), Path::new("/mnt"), Timings::immediate(), log)
    }

    #[test]
    fn test_stuck_hive_is_dropped_after_last_round() {
        let runner = Arc::new(StuckHive {
            stuck: "zSOFTWARE",
            unloads: Mutex::new(Vec::new()),
        });
        let log = BuildLog::new("registry-test");
        let mut reg = session(runner.clone(), log.clone());
        reg.load().unwrap();
        assert_eq!(reg.loaded_aliases().len(), HIVES.len());

        let err = reg.unload().unwrap_err();

        assert!(!reg.is_loaded());
        assert!(err.is(ErrorKind::ExternalTool));
        assert_eq!(err.context_value("hives"), Some("zSOFTWARE"));
        assert_eq!(err.context_value("rounds"), Some("3"));
        assert!(log.warning_count() > 0);

        // Two attempts per round on the stuck alias, one for each of the rest.
        let unloads = runner.unloads.lock().unwrap();
        let stuck = unloads.iter().filter(|k| k.ends_with("zSOFTWARE")).count();
        assert_eq!(stuck, 2 * UNLOAD_ROUNDS);
        assert_eq!(unloads.len() - stuck, HIVES.len() - 1);

        // Nothing left to release.
        drop(unloads);
        assert!(reg.unload().is_ok());
    }

    #[test]
    fn test_unload_clears_every_hive() {
        let runner = Arc::new(StuckHive {
            stuck: "zNONE",
            unloads: Mutex::new(Vec::new()),
        });
        let mut reg = session(runner, BuildLog::new("registry-test"));
        reg.load_only(&[HIVES[0], HIVES[4]]).unwrap();
        assert!(reg.is_loaded());
        reg.unload().unwrap();
        assert!(!reg.is_loaded());
    }

    #[test]
    fn test_hive_paths() {
        let h = hive("zNTUSER").unwrap();
        assert_eq!(h.key(), "HKLM\\zNTUSER");
        assert_eq!(
            h.path_in(Path::new("/mnt")),
            Path::new("/mnt").join("Users").join("Default").join("ntuser.dat")
        );
        assert!(hive("zBOGUS").is_none());
    }
}
