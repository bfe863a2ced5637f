//! Build environment checks (source media, disk space, scratch directory).

use std::path::Path;

use crate::config::Config;
use crate::image::{validate_source, InstallFormat};
use crate::tools::parse::format_bytes;

use super::types::CheckResult;

/// The source root must carry boot.wim and an install image.
pub fn check_source(source: &Path) -> CheckResult {
    match validate_source(source) {
        Ok(layout) => {
            let format = match layout.format {
                InstallFormat::Wim => "install.wim",
                InstallFormat::Esd => "install.esd",
            };
            CheckResult::pass_with("source media", &format!("boot.wim + {}", format))
        }
        Err(e) => CheckResult::fail("source media", &e.to_string()),
    }
}

/// Check the work directory and scratch mount point.
pub fn check_build_environment(config: &Config, min_free: u64) -> Vec<CheckResult> {
    let mut results = Vec::new();

    // Check the work directory is writable
    let probe = config.work_dir.join(".preflight-test");
    match std::fs::write(&probe, "test") {
        Ok(_) => results.push(match std::fs::remove_file(&probe) {
            Ok(()) => CheckResult::pass("work directory writable"),
            Err(e) => CheckResult::warn(
                "work directory writable",
                &format!("could not remove {}: {}", probe.display(), e),
            ),
        }),
        Err(e) => results.push(CheckResult::fail(
            "work directory writable",
            &format!("Cannot write to {}: {}", config.work_dir.display(), e),
        )),
    }

    results.push(check_free_space(&config.work_dir, min_free));
    results.push(check_scratch_empty(&config.scratch_dir));
    results
}

/// Warn when the volume holding `dir` has less than `min_free` bytes.
pub fn check_free_space(dir: &Path, min_free: u64) -> CheckResult {
    match fs2::available_space(dir) {
        Ok(free) if free >= min_free => CheckResult::pass_with("free space", &format_bytes(free)),
        Ok(free) => CheckResult::warn(
            "free space",
            &format!(
                "{} available, at least {} recommended",
                format_bytes(free),
                format_bytes(min_free)
            ),
        ),
        Err(e) => CheckResult::warn("free space", &format!("Cannot query: {}", e)),
    }
}

/// A leftover mount in the scratch directory blocks the next build.
pub fn check_scratch_empty(scratch: &Path) -> CheckResult {
    let leftover = std::fs::read_dir(scratch)
        .map(|mut entries| entries.next().is_some())
        .unwrap_or(false);
    if leftover {
        CheckResult::warn(
            "scratch directory",
            &format!(
                "{} is not empty - run `tiny11 clean --force-unmount` if a previous build failed",
                scratch.display()
            ),
        )
    } else {
        CheckResult::pass("scratch directory")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preflight::CheckStatus;
    use tempfile::TempDir;

    #[test]
    fn test_source_check() {
        let tmp = TempDir::new().unwrap();
        assert_eq!(check_source(tmp.path()).status, CheckStatus::Fail);

        std::fs::create_dir_all(tmp.path().join("sources")).unwrap();
        std::fs::write(tmp.path().join("sources/boot.wim"), b"b").unwrap();
        std::fs::write(tmp.path().join("sources/install.esd"), b"e").unwrap();
        let check = check_source(tmp.path());
        assert_eq!(check.status, CheckStatus::Pass);
        assert_eq!(check.details.as_deref(), Some("boot.wim + install.esd"));
    }

    #[test]
    fn test_scratch_check() {
        let tmp = TempDir::new().unwrap();
        let scratch = tmp.path().join("scratch");
        assert_eq!(check_scratch_empty(&scratch).status, CheckStatus::Pass);

        std::fs::create_dir_all(scratch.join("Windows")).unwrap();
        assert_eq!(check_scratch_empty(&scratch).status, CheckStatus::Warn);
    }

    #[test]
    fn test_free_space_floor() {
        let tmp = TempDir::new().unwrap();
        assert_eq!(check_free_space(tmp.path(), 0).status, CheckStatus::Pass);
        assert_eq!(check_free_space(tmp.path(), u64::MAX).status, CheckStatus::Warn);
    }
}
