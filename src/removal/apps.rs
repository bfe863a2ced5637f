//! Provisioned app and system package removal.

use std::fs;

use super::catalog::{self, NANO_APP_PATTERNS, WINDOWS_APPS};
use super::{RemovalContext, RemovalReport};
use crate::error::Result;
use crate::tools::parse::{parse_package_names, short_package_name, table_package_ids};

/// How an app pattern is compared with a package name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppMatch {
    /// Case-sensitive substring.
    Exact,
    /// Pattern stripped of `*`, case-insensitive substring.
    Loose,
}

pub fn app_matches(mode: AppMatch, pattern: &str, package: &str) -> bool {
    match mode {
        AppMatch::Exact => package.contains(pattern),
        AppMatch::Loose => package
            .to_lowercase()
            .contains(&pattern.trim_matches('*').to_lowercase()),
    }
}

/// Provisioned packages matching any pattern, in listing order.
pub fn select_apps(packages: &[String], patterns: &[&str], mode: AppMatch) -> Vec<String> {
    packages
        .iter()
        .filter(|pkg| patterns.iter().any(|p| app_matches(mode, p, pkg)))
        .cloned()
        .collect()
}

/// Remove provisioned apps matching `patterns`. Fails only if the package
/// listing itself fails.
pub fn remove_provisioned_apps(
    ctx: &RemovalContext<'_>,
    patterns: &[&str],
    mode: AppMatch,
) -> Result<RemovalReport> {
    let listing = ctx.dism.provisioned_packages(ctx.mount)?;
    let installed = parse_package_names(&listing);
    let targets = select_apps(&installed, patterns, mode);
    ctx.log.info(format!(
        "{} provisioned packages, {} selected for removal",
        installed.len(),
        targets.len()
    ));

    let mut report = RemovalReport::default();
    for (i, pkg) in targets.iter().enumerate() {
        let short = short_package_name(pkg);
        ctx.log.info(format!("[{}/{}] {}", i + 1, targets.len(), short));
        report.record(short, ctx.dism.remove_provisioned(ctx.mount, pkg), ctx.log);
    }
    report.summarize("provisioned apps", ctx.log);
    Ok(report)
}

/// Nano's extended app list, then any matching `WindowsApps` folders.
pub fn remove_extra_apps(ctx: &RemovalContext<'_>) -> Result<RemovalReport> {
    let mut report = remove_provisioned_apps(ctx, NANO_APP_PATTERNS, AppMatch::Loose)?;

    let apps_dir = ctx.path(WINDOWS_APPS);
    if let Ok(entries) = fs::read_dir(&apps_dir) {
        for entry in entries.flatten() {
            let name = entry.file_name().to_string_lossy().into_owned();
            let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
            if !is_dir || !NANO_APP_PATTERNS.iter().any(|p| app_matches(AppMatch::Loose, p, &name)) {
                continue;
            }
            let outcome = fs::remove_dir_all(entry.path()).map_err(Into::into);
            report.record(&format!("WindowsApps/{}", name), outcome, ctx.log);
        }
    }
    report.summarize("extended apps", ctx.log);
    Ok(report)
}

/// Remove system packages whose table row matches a pattern. `{lang}` in
/// a pattern is replaced with the image language.
pub fn remove_system_packages(ctx: &RemovalContext<'_>, patterns: &[&str]) -> Result<RemovalReport> {
    let table = ctx.dism.packages_table(ctx.mount)?;
    let patterns = catalog::with_language(patterns, ctx.language);

    let mut report = RemovalReport::default();
    for (i, pattern) in patterns.iter().enumerate() {
        let ids = table_package_ids(&table, pattern);
        if ids.is_empty() {
            ctx.log
                .debug(format!("[{}/{}] no package matches {}", i + 1, patterns.len(), pattern));
            report.skipped += 1;
            continue;
        }
        for id in ids {
            ctx.log.info(format!("[{}/{}] {}", i + 1, patterns.len(), id));
            report.record(&id, ctx.dism.remove_package(ctx.mount, &id), ctx.log);
        }
    }
    report.summarize("system packages", ctx.log);
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_vs_loose() {
        let pkgs = vec![
            "Microsoft.BingNews_4.2_neutral_~_8wekyb3d8bbwe".to_string(),
            "Microsoft.Windows.Photos_2024_x64__8wekyb3d8bbwe".to_string(),
            "Microsoft.WindowsStore_22.0_neutral_~_8wekyb3d8bbwe".to_string(),
        ];
        assert_eq!(
            select_apps(&pkgs, &["Microsoft.BingNews"], AppMatch::Exact),
            vec![pkgs[0].clone()]
        );
        assert!(select_apps(&pkgs, &["microsoft.bingnews"], AppMatch::Exact).is_empty());
        assert_eq!(
            select_apps(&pkgs, &["*photos*"], AppMatch::Loose),
            vec![pkgs[1].clone()]
        );
    }
}
