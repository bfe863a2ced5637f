//! Bootable ISO authoring with oscdimg.

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::error::{BuildError, ErrorKind, IoContext, Result};
use crate::log::BuildLog;
use crate::process::{self, argv, ToolRunner};

pub const OSCDIMG: &str = "oscdimg.exe";

/// Symbol-server copy of oscdimg used when no ADK is installed.
pub const OSCDIMG_URL: &str =
    "https://msdl.microsoft.com/download/symbols/oscdimg.exe/3D44737265000/oscdimg.exe";

pub const DOWNLOAD_ATTEMPTS: usize = 3;

/// BIOS boot sector, relative to the ISO root.
pub const ETFSBOOT: &str = "boot/etfsboot.com";
/// UEFI boot image, relative to the ISO root.
pub const EFISYS: &str = "efi/microsoft/boot/efisys.bin";

/// Root entries a nano ISO keeps; everything else at the top level goes.
pub const NANO_ROOT_KEEP: &[&str] = &[
    "boot",
    "efi",
    "sources",
    "bootmgr",
    "bootmgr.efi",
    "setup.exe",
    "autounattend.xml",
];

const ADK_ROOT: &str =
    r"C:\Program Files (x86)\Windows Kits\10\Assessment and Deployment Kit\Deployment Tools";

/// Places oscdimg is looked for, in order.
pub fn oscdimg_candidates(config: &Config) -> Vec<PathBuf> {
    let mut paths = vec![
        config.work_dir.join(OSCDIMG),
        config.temp_dir.join(OSCDIMG),
        config.tool_cache_dir().join(OSCDIMG),
    ];
    for arch in ["amd64", "x86", "arm64"] {
        paths.push(PathBuf::from(format!(r"{}\{}\Oscdimg\{}", ADK_ROOT, arch, OSCDIMG)));
    }
    paths.push(PathBuf::from(r"C:\Windows\System32\oscdimg.exe"));
    paths
}

/// Find an installed oscdimg without downloading.
pub fn locate_oscdimg(config: &Config) -> Option<PathBuf> {
    oscdimg_candidates(config)
        .into_iter()
        .find(|p| p.is_file())
        .or_else(|| process::which("oscdimg"))
}

/// Fetch oscdimg into `cache_dir` with curl. The file lands under a `.tmp`
/// name and is renamed only after curl succeeds.
pub fn download_oscdimg(runner: &dyn ToolRunner, cache_dir: &Path, log: &BuildLog) -> Result<PathBuf> {
    fs::create_dir_all(cache_dir).with_path("create tool cache", cache_dir)?;
    let target = cache_dir.join(OSCDIMG);
    let partial = cache_dir.join(format!("{}.tmp", OSCDIMG));

    let mut last_error = String::new();
    for attempt in 1..=DOWNLOAD_ATTEMPTS {
        log.info(format!(
            "downloading oscdimg (attempt {}/{})",
            attempt, DOWNLOAD_ATTEMPTS
        ));
        discard_partial(&partial, log);
        let args = argv([
            "-L".to_string(),
            "--fail".to_string(),
            "--silent".to_string(),
            "--show-error".to_string(),
            "-o".to_string(),
            partial.to_string_lossy().into_owned(),
            OSCDIMG_URL.to_string(),
        ]);
        match runner.check("curl", &args) {
            Ok(_) if partial.is_file() => {
                fs::rename(&partial, &target).with_path("store oscdimg", &target)?;
                log.success(format!("oscdimg saved to {}", target.display()));
                return Ok(target);
            }
            Ok(_) => last_error = "curl reported success but wrote nothing".to_string(),
            Err(e) => last_error = e.message,
        }
        log.warn(format!("download attempt {} failed: {}", attempt, last_error));
    }

    discard_partial(&partial, log);
    Err(BuildError::new(ErrorKind::Network, "failed to download oscdimg")
        .with_context("url", OSCDIMG_URL)
        .with_context("attempts", DOWNLOAD_ATTEMPTS)
        .with_context("last_error", last_error))
}

/// Remove a leftover partial download. Absence is fine; anything else is
/// logged.
fn discard_partial(path: &Path, log: &BuildLog) {
    match fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => log.warn(format!("cannot remove partial download {}: {}", path.display(), e)),
    }
}

/// An installed oscdimg, or a freshly downloaded one.
pub fn ensure_oscdimg(runner: &dyn ToolRunner, config: &Config, log: &BuildLog) -> Result<PathBuf> {
    if let Some(found) = locate_oscdimg(config) {
        log.info(format!("using oscdimg at {}", found.display()));
        return Ok(found);
    }
    log.info("oscdimg not found locally");
    download_oscdimg(runner, &config.tool_cache_dir(), log)
}

/// Author a dual-boot (BIOS + UEFI) ISO from the staging tree.
pub fn create_iso(
    runner: &dyn ToolRunner,
    oscdimg: &Path,
    staging: &Path,
    output: &Path,
    log: &BuildLog,
) -> Result<PathBuf> {
    let etfs = join_rel(staging, ETFSBOOT);
    let efisys = join_rel(staging, EFISYS);
    for boot_file in [&etfs, &efisys] {
        if !boot_file.is_file() {
            return Err(BuildError::not_found("boot file missing from staging tree")
                .with_context("path", boot_file.display()));
        }
    }

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).with_path("create output directory", parent)?;
    }
    if output.exists() {
        fs::remove_file(output).with_path("remove previous ISO", output)?;
    }

    let bootdata = format!(
        "-bootdata:2#p0,e,b{}#pEF,e,b{}",
        etfs.display(),
        efisys.display()
    );
    let args = argv([
        "-m".to_string(),
        "-o".to_string(),
        "-u2".to_string(),
        "-udfver102".to_string(),
        bootdata,
        staging.to_string_lossy().into_owned(),
        output.to_string_lossy().into_owned(),
    ]);

    log.info(format!("authoring {}", output.display()));
    runner.check(&oscdimg.to_string_lossy(), &args)?;

    let size = fs::metadata(output)
        .map_err(|_| {
            BuildError::tool("oscdimg finished but produced no ISO").with_context("path", output.display())
        })?
        .len();
    log.success(format!(
        "ISO created: {} ({})",
        output.display(),
        crate::tools::parse::format_bytes(size)
    ));
    Ok(output.to_path_buf())
}

/// Drop top-level ISO entries not needed to boot setup. Returns how many
/// were removed; a removal failure is a warning.
pub fn trim_iso_root(staging: &Path, log: &BuildLog) -> Result<usize> {
    let mut removed = 0;
    for entry in fs::read_dir(staging).with_path("read staging root", staging)?.flatten() {
        let name = entry.file_name().to_string_lossy().to_lowercase();
        if NANO_ROOT_KEEP.contains(&name.as_str()) {
            continue;
        }
        let path = entry.path();
        let outcome = if path.is_dir() {
            fs::remove_dir_all(&path)
        } else {
            fs::remove_file(&path)
        };
        match outcome {
            Ok(()) => removed += 1,
            Err(e) => log.warn(format!("could not remove {}: {}", path.display(), e)),
        }
    }
    log.success(format!("ISO root trimmed ({} entries removed)", removed));
    Ok(removed)
}

fn join_rel(root: &Path, rel: &str) -> PathBuf {
    rel.split('/').fold(root.to_path_buf(), |p, part| p.join(part))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::CommandResult;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Records calls; curl writes its `-o` target, oscdimg its last arg.
    #[derive(Default)]
    struct Scripted {
        calls: Mutex<Vec<String>>,
        curl_failures: usize,
    }

    impl ToolRunner for Scripted {
        fn run(&self, program: &str, args: &[String]) -> Result<CommandResult> {
            let mut calls = self.calls.lock().unwrap();
            calls.push(program.to_string());
            let curl_calls = calls.iter().filter(|c| *c == "curl").count();
            if program == "curl" {
                if curl_calls <= self.curl_failures {
                    return Ok(CommandResult::failed(22, "HTTP 503"));
                }
                let pos = args.iter().position(|a| a == "-o").unwrap();
                fs::write(&args[pos + 1], b"MZ").unwrap();
            } else {
                fs::write(args.last().unwrap(), b"ISO").unwrap();
            }
            Ok(CommandResult::ok(""))
        }
    }

    #[test]
    fn test_discard_partial_warns_only_on_real_errors() {
        let tmp = TempDir::new().unwrap();
        let log = BuildLog::new("t");

        discard_partial(&tmp.path().join("absent.tmp"), &log);
        assert_eq!(log.warning_count(), 0);

        let stuck = tmp.path().join("stuck.tmp");
        fs::create_dir_all(&stuck).unwrap();
        discard_partial(&stuck, &log);
        assert_eq!(log.warning_count(), 1);
        assert!(stuck.is_dir());
    }

    #[test]
    fn test_download_retries_then_succeeds() {
        let tmp = TempDir::new().unwrap();
        let runner = Scripted {
            curl_failures: 2,
            ..Default::default()
        };
        let path = download_oscdimg(&runner, tmp.path(), &BuildLog::new("t")).unwrap();
        assert_eq!(path, tmp.path().join(OSCDIMG));
        assert!(path.is_file());
        assert!(!tmp.path().join("oscdimg.exe.tmp").exists());
        assert_eq!(runner.calls.lock().unwrap().len(), 3);
    }

    #[test]
    fn test_download_exhaustion_is_network_error() {
        let tmp = TempDir::new().unwrap();
        let runner = Scripted {
            curl_failures: 10,
            ..Default::default()
        };
        let err = download_oscdimg(&runner, tmp.path(), &BuildLog::new("t")).unwrap_err();
        assert!(err.is(ErrorKind::Network));
        assert_eq!(err.context_value("attempts"), Some("3"));
        assert!(!tmp.path().join(OSCDIMG).exists());
    }

    #[test]
    fn test_create_iso_checks_boot_files() {
        let tmp = TempDir::new().unwrap();
        let staging = tmp.path().join("stage");
        fs::create_dir_all(staging.join("boot")).unwrap();
        fs::write(staging.join(ETFSBOOT), b"x").unwrap();
        let runner = Scripted::default();
        let out = tmp.path().join("out/tiny11.iso");
        let log = BuildLog::new("t");

        let err = create_iso(&runner, Path::new("oscdimg.exe"), &staging, &out, &log).unwrap_err();
        assert!(err.is(ErrorKind::NotFound));

        fs::create_dir_all(staging.join("efi/microsoft/boot")).unwrap();
        fs::write(join_rel(&staging, EFISYS), b"x").unwrap();
        let iso = create_iso(&runner, Path::new("oscdimg.exe"), &staging, &out, &log).unwrap();
        assert!(iso.is_file());
    }

    #[test]
    fn test_trim_keeps_boot_entries() {
        let tmp = TempDir::new().unwrap();
        for dir in ["boot", "efi", "sources", "support"] {
            fs::create_dir_all(tmp.path().join(dir)).unwrap();
        }
        for file in ["bootmgr", "Setup.exe", "autorun.inf"] {
            fs::write(tmp.path().join(file), b"x").unwrap();
        }
        let removed = trim_iso_root(tmp.path(), &BuildLog::new("t")).unwrap();
        assert_eq!(removed, 2);
        assert!(tmp.path().join("Setup.exe").exists());
        assert!(!tmp.path().join("support").exists());
    }
}
