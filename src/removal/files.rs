//! File-tree removals inside the mounted image.

use std::fs;
use std::path::Path;

use walkdir::WalkDir;

use super::catalog::{
    self, ASSEMBLY_DIR, DRIVER_PATTERNS, DRIVER_REPOSITORY, EDGE_DIRS, EDGE_WEBVIEW, FONTS_DIR,
    FONT_KEEP, FONT_REMOVE, NANO_FOLDERS, NANO_OWNED_DIRS, NANO_OWNED_FILES, NATIVE_IMAGES_PREFIX,
    ONEDRIVE_SETUP, RECOVERY_DIR, SCHEDULED_TASKS, WINSXS, WINSXS_EDIT,
};
use super::{matches_any, RemovalContext, RemovalReport};
use crate::copy::{CopyEngine, NoProgress};
use crate::error::{BuildError, IoContext, Result};
use crate::tools::parse::format_bytes;

fn remove_path(path: &Path) -> Result<()> {
    if path.is_dir() {
        fs::remove_dir_all(path).with_path("remove directory", path)
    } else {
        fs::remove_file(path).with_path("remove file", path)
    }
}

/// Total size of regular files under `path`.
pub fn tree_size(path: &Path) -> u64 {
    WalkDir::new(path)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| e.metadata().ok())
        .map(|m| m.len())
        .sum()
}

/// Names in `dir` matching any pattern. Missing directories yield nothing.
fn matching_entries(dir: &Path, patterns: &[&str]) -> Vec<(String, std::path::PathBuf)> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut found: Vec<_> = entries
        .flatten()
        .map(|e| (e.file_name().to_string_lossy().into_owned(), e.path()))
        .filter(|(name, _)| matches_any(patterns, name))
        .collect();
    found.sort();
    found
}

/// Edge, EdgeUpdate, EdgeCore, the WebView runtime and its WinSxS payload.
pub fn remove_edge(ctx: &RemovalContext<'_>) -> RemovalReport {
    let mut report = RemovalReport::default();
    for rel in EDGE_DIRS {
        let path = ctx.path(rel);
        if !path.exists() {
            report.skipped += 1;
            continue;
        }
        report.record(rel, remove_path(&path), ctx.log);
    }

    let webview = ctx.path(EDGE_WEBVIEW);
    if webview.exists() {
        if let Err(e) = ctx.acl.seize(&webview, true) {
            ctx.log.warn(format!("could not take ownership of WebView: {}", e.message));
        }
        report.record(EDGE_WEBVIEW, remove_path(&webview), ctx.log);
    } else {
        report.skipped += 1;
    }

    let pattern = format!("{}_microsoft-edge-webview_*", ctx.arch);
    for (name, path) in matching_entries(&ctx.path(WINSXS), &[pattern.as_str()]) {
        if let Err(e) = ctx.acl.seize(&path, true) {
            ctx.log.debug(format!("takeown {} failed: {}", name, e.message));
        }
        report.record(&format!("WinSxS/{}", name), remove_path(&path), ctx.log);
    }

    report.summarize("Edge", ctx.log);
    report
}

pub fn remove_onedrive(ctx: &RemovalContext<'_>) -> RemovalReport {
    let mut report = RemovalReport::default();
    let setup = ctx.path(ONEDRIVE_SETUP);
    if !setup.exists() {
        ctx.log.skip("OneDriveSetup.exe not present");
        report.skipped += 1;
        return report;
    }
    if let Err(e) = ctx.acl.seize(&setup, false) {
        ctx.log.warn(format!("could not take ownership of OneDriveSetup.exe: {}", e.message));
    }
    report.record("OneDriveSetup.exe", remove_path(&setup), ctx.log);
    report
}

pub fn remove_scheduled_tasks(ctx: &RemovalContext<'_>) -> RemovalReport {
    let mut report = RemovalReport::default();
    for rel in SCHEDULED_TASKS {
        let path = ctx.path(rel);
        if !path.exists() {
            report.skipped += 1;
            continue;
        }
        report.record(rel, remove_path(&path), ctx.log);
    }
    report.summarize("scheduled tasks", ctx.log);
    report
}

/// Replace `winre.wim` with an empty placeholder so setup still finds it.
pub fn disable_winre(ctx: &RemovalContext<'_>) -> Result<()> {
    let recovery = ctx.path(RECOVERY_DIR);
    let winre = recovery.join("winre.wim");
    if !winre.exists() {
        ctx.log.skip("winre.wim not present");
        return Ok(());
    }
    if let Err(e) = ctx.acl.seize(&recovery, true) {
        ctx.log.warn(format!("could not take ownership of Recovery: {}", e.message));
    }
    fs::remove_file(&winre).with_path("remove winre.wim", &winre)?;
    fs::File::create(&winre).with_path("create winre.wim placeholder", &winre)?;
    ctx.log.success("WinRE disabled");
    Ok(())
}

/// Sizes reported by [`slim_winsxs`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlimReport {
    pub kept: usize,
    pub before: u64,
    pub after: u64,
}

impl SlimReport {
    pub fn saved(&self) -> u64 {
        self.before.saturating_sub(self.after)
    }
}

/// Rebuild WinSxS from the keep-list. Any failure after the copy starts
/// leaves the image broken, so every error is returned.
pub fn slim_winsxs(ctx: &RemovalContext<'_>, engine: &CopyEngine) -> Result<SlimReport> {
    let winsxs = ctx.path(WINSXS);
    let edit = ctx.path(WINSXS_EDIT);
    if !winsxs.is_dir() {
        return Err(BuildError::not_found("WinSxS directory not found")
            .with_context("path", winsxs.display()));
    }

    let before = tree_size(&winsxs);
    ctx.log.info(format!("WinSxS is {}", format_bytes(before)));

    if edit.exists() {
        fs::remove_dir_all(&edit).with_path("remove stale WinSxS_edit", &edit)?;
    }
    fs::create_dir_all(&edit).with_path("create WinSxS_edit", &edit)?;

    let keep = catalog::winsxs_keep(ctx.arch);
    let entries = matching_entries(&winsxs, &keep);
    for (name, src) in &entries {
        let dst = edit.join(name);
        if src.is_dir() {
            engine.copy_tree(src, &dst, &NoProgress)?;
        } else {
            fs::copy(src, &dst).with_path("copy WinSxS entry", src)?;
        }
    }
    ctx.log.info(format!("kept {} WinSxS entries", entries.len()));

    if let Err(e) = ctx.acl.seize(&winsxs, true) {
        ctx.log.warn(format!("could not take ownership of WinSxS: {}", e.message));
    }
    fs::remove_dir_all(&winsxs).with_path("remove WinSxS", &winsxs)?;
    fs::rename(&edit, &winsxs).with_path("rename WinSxS_edit", &edit)?;

    let report = SlimReport {
        kept: entries.len(),
        before,
        after: tree_size(&winsxs),
    };
    ctx.log.success(format!(
        "WinSxS slimmed: {} -> {} (saved {})",
        format_bytes(report.before),
        format_bytes(report.after),
        format_bytes(report.saved())
    ));
    Ok(report)
}

/// Take ownership of everything nano deletes later. Warnings only.
pub fn take_ownership(ctx: &RemovalContext<'_>) {
    let targets = NANO_OWNED_DIRS
        .iter()
        .map(|rel| (rel, true))
        .chain(NANO_OWNED_FILES.iter().map(|rel| (rel, false)));
    for (rel, recursive) in targets {
        let path = ctx.path(rel);
        if !path.exists() {
            continue;
        }
        if let Err(e) = ctx.acl.take_ownership(&path, recursive) {
            ctx.log.warn(format!("takeown {} failed: {}", rel, e.message));
        }
        if let Err(e) = ctx.acl.grant_full_control(&path, recursive) {
            ctx.log.warn(format!("icacls {} failed: {}", rel, e.message));
        }
    }
}

/// `NativeImages_*` under `Windows/assembly`.
pub fn remove_native_images(ctx: &RemovalContext<'_>) -> RemovalReport {
    let mut report = RemovalReport::default();
    let pattern = format!("{}*", NATIVE_IMAGES_PREFIX);
    for (name, path) in matching_entries(&ctx.path(ASSEMBLY_DIR), &[pattern.as_str()]) {
        report.record(&name, remove_path(&path), ctx.log);
    }
    report.summarize("native images", ctx.log);
    report
}

pub fn remove_drivers(ctx: &RemovalContext<'_>) -> RemovalReport {
    let mut report = RemovalReport::default();
    for (name, path) in matching_entries(&ctx.path(DRIVER_REPOSITORY), DRIVER_PATTERNS) {
        report.record(&name, remove_path(&path), ctx.log);
    }
    report.summarize("driver packages", ctx.log);
    report
}

/// Whether a font file survives nano's trim.
pub fn keep_font(name: &str) -> bool {
    !matches_any(FONT_REMOVE, name) && matches_any(FONT_KEEP, name)
}

/// Fonts outside the keep-list. Failures are counted, not logged per file.
pub fn remove_fonts(ctx: &RemovalContext<'_>) -> RemovalReport {
    let mut report = RemovalReport::default();
    let Ok(entries) = fs::read_dir(ctx.path(FONTS_DIR)) else {
        ctx.log.skip("Fonts directory not present");
        return report;
    };
    for entry in entries.flatten() {
        let name = entry.file_name().to_string_lossy().into_owned();
        if keep_font(&name) {
            report.skipped += 1;
            continue;
        }
        match remove_path(&entry.path()) {
            Ok(()) => report.removed += 1,
            Err(_) => report.failed += 1,
        }
    }
    report.summarize("fonts", ctx.log);
    report
}

pub fn remove_system_folders(ctx: &RemovalContext<'_>) -> RemovalReport {
    let mut report = RemovalReport::default();
    for rel in NANO_FOLDERS {
        let path = ctx.path(rel);
        if !path.exists() {
            report.skipped += 1;
            continue;
        }
        report.record(rel, remove_path(&path), ctx.log);
    }
    report.summarize("system folders", ctx.log);
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::BuildLog;
    use crate::process::{CommandResult, ToolRunner};
    use crate::tools::{Acl, Dism};
    use std::sync::Arc;
    use tempfile::TempDir;

    struct AlwaysOk;

    impl ToolRunner for AlwaysOk {
        fn run(&self, _program: &str, _args: &[String]) -> Result<CommandResult> {
            Ok(CommandResult::ok(""))
        }
    }

    fn with_ctx<R>(mount: &Path, arch: &str, f: impl FnOnce(&RemovalContext<'_>) -> R) -> R {
        let runner: Arc<dyn ToolRunner> = Arc::new(AlwaysOk);
        let dism = Dism::new(runner.clone());
        let acl = Acl::new(runner);
        let log = BuildLog::new("removal-test");
        let ctx = RemovalContext {
            dism: &dism,
            acl: &acl,
            mount,
            arch,
            language: "en-US",
            log: &log,
        };
        f(&ctx)
    }

    fn touch(path: &Path, bytes: usize) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, vec![1u8; bytes]).unwrap();
    }

    #[test]
    fn test_font_rules() {
        assert!(keep_font("segoeui.ttf"));
        assert!(keep_font("Arial.TTF"));
        assert!(!keep_font("segoeuihistoric.ttf"));
        assert!(!keep_font("msyh.ttc"));
        assert!(!keep_font("webdings.ttf"));
    }

    #[test]
    fn test_slim_winsxs_keeps_only_listed() {
        let tmp = TempDir::new().unwrap();
        let sxs = tmp.path().join("Windows/WinSxS");
        touch(&sxs.join("Manifests/a.manifest"), 10);
        touch(&sxs.join("amd64_microsoft.windows.gdiplus_6595b64144ccf1df_1.0_none_x/gdiplus.dll"), 20);
        touch(&sxs.join("amd64_junk_0000/big.dll"), 1000);
        touch(&sxs.join("pending.xml"), 5);

        let report = with_ctx(tmp.path(), "amd64", |ctx| {
            let engine = CopyEngine::with_workers(2, ctx.log.clone());
            slim_winsxs(ctx, &engine).unwrap()
        });

        assert_eq!(report.kept, 2);
        assert_eq!(report.before, 1035);
        assert_eq!(report.after, 30);
        assert_eq!(report.saved(), 1005);
        assert!(sxs.join("Manifests/a.manifest").is_file());
        assert!(!sxs.join("amd64_junk_0000").exists());
        assert!(!tmp.path().join("Windows/WinSxS_edit").exists());
    }

    #[test]
    fn test_slim_winsxs_requires_directory() {
        let tmp = TempDir::new().unwrap();
        let err = with_ctx(tmp.path(), "amd64", |ctx| {
            let engine = CopyEngine::with_workers(1, ctx.log.clone());
            slim_winsxs(ctx, &engine).unwrap_err()
        });
        assert!(err.is(crate::error::ErrorKind::NotFound));
    }

    #[test]
    fn test_winre_placeholder() {
        let tmp = TempDir::new().unwrap();
        let winre = tmp.path().join("Windows/System32/Recovery/winre.wim");
        touch(&winre, 4096);
        with_ctx(tmp.path(), "amd64", |ctx| disable_winre(ctx).unwrap());
        assert_eq!(fs::metadata(&winre).unwrap().len(), 0);
    }

    #[test]
    fn test_drivers_and_edge() {
        let tmp = TempDir::new().unwrap();
        let repo = tmp.path().join("Windows/System32/DriverStore/FileRepository");
        touch(&repo.join("prnms001.inf_amd64_1/prnms001.inf"), 1);
        touch(&repo.join("netrtwlane.inf_amd64_2/netrtwlane.inf"), 1);
        touch(&tmp.path().join("Program Files (x86)/Microsoft/Edge/msedge.exe"), 1);
        touch(
            &tmp.path()
                .join("Windows/WinSxS/amd64_microsoft-edge-webview_31bf_1/x.dll"),
            1,
        );

        let (drivers, edge) = with_ctx(tmp.path(), "amd64", |ctx| {
            (remove_drivers(ctx), remove_edge(ctx))
        });

        assert_eq!(drivers.removed, 1);
        assert!(repo.join("netrtwlane.inf_amd64_2").exists());
        assert_eq!(edge.removed, 2);
        assert_eq!(edge.skipped, 3);
        assert!(!tmp.path().join("Program Files (x86)/Microsoft/Edge").exists());
    }
}
