//! Shared test utilities for tiny11 tests.
#![allow(dead_code)]

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tempfile::TempDir;
use tiny11::config::{Config, Timings};
use tiny11::copy::NoProgress;
use tiny11::error::Result;
use tiny11::image::SpaceProbe;
use tiny11::pipeline::{BuildOptions, BuildSession, Variant};
use tiny11::process::{CommandResult, ToolRunner};

/// Size the fake export writes: just above the plausibility floor.
pub const EXPORT_SIZE: u64 = 101 * 1024 * 1024;

/// Test environment: fake installation media and a work directory.
pub struct TestEnv {
    /// Temporary directory (kept alive for lifetime of TestEnv)
    pub _temp_dir: TempDir,
    pub work_dir: PathBuf,
    /// Fake installation media
    pub source: PathBuf,
    pub config: Config,
}

impl TestEnv {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let work_dir = temp_dir.path().join("work");
        let source = temp_dir.path().join("media");
        fs::create_dir_all(&work_dir).unwrap();
        create_mock_media(&source);

        // Found first by the oscdimg lookup, so nothing is downloaded.
        fs::write(work_dir.join("oscdimg.exe"), b"MZ").unwrap();

        let config = Config::from_lookup(&work_dir, |_| None);
        Self {
            _temp_dir: temp_dir,
            work_dir,
            source,
            config,
        }
    }

    pub fn options(&self, variant: Variant) -> BuildOptions {
        BuildOptions::new(&self.source, variant)
    }

    pub fn session(&self, options: BuildOptions, tools: &Arc<FakeTools>) -> BuildSession {
        let runner: Arc<dyn ToolRunner> = tools.clone();
        BuildSession::new(self.config.clone(), options, runner, Timings::immediate())
            .with_probe(Arc::new(FixedSpace(u64::MAX)))
            .with_progress(Box::new(NoProgress))
    }
}

/// Minimal extracted installation media.
pub fn create_mock_media(root: &Path) {
    let files: [(&str, &[u8]); 8] = [
        ("setup.exe", b"MZ"),
        ("bootmgr", b"boot"),
        ("bootmgr.efi", b"boot"),
        ("boot/etfsboot.com", b"etfs"),
        ("efi/microsoft/boot/efisys.bin", b"efisys"),
        ("sources/boot.wim", b"boot image"),
        ("sources/install.wim", b"install image"),
        ("support/readme.txt", b"docs"),
    ];
    for (rel, content) in files {
        write_file(root, rel, content);
    }
    fs::create_dir_all(root.join("sources/sxs")).unwrap();
}

/// Swap the media's `install.wim` for a two-edition `install.esd`.
pub fn use_esd_media(root: &Path) {
    let sources = root.join("sources");
    fs::rename(sources.join("install.wim"), sources.join("install.esd")).unwrap();
}

/// Write `content` at `root/rel`, creating parents.
pub fn write_file(root: &Path, rel: &str, content: &[u8]) {
    let path = rel.split('/').fold(root.to_path_buf(), |p, part| p.join(part));
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

/// A mounted Windows tree as dism would expose it.
fn create_mock_windows(mount: &Path) {
    let files = [
        "Windows/System32/config/SYSTEM",
        "Windows/System32/config/SOFTWARE",
        "Windows/System32/config/COMPONENTS",
        "Windows/System32/config/default",
        "Users/Default/ntuser.dat",
        "Windows/System32/Recovery/winre.wim",
        "Windows/System32/OneDriveSetup.exe",
        "Windows/WinSxS/Manifests/x.manifest",
        "Windows/WinSxS/amd64_microsoft-edge-webview_31bf_10.0/webview.dll",
        "Windows/Fonts/arial.ttf",
        "Program Files (x86)/Microsoft/Edge/Application/msedge.exe",
    ];
    for rel in files {
        write_file(mount, rel, b"data");
    }
}

/// Free-space probe with a fixed answer.
pub struct FixedSpace(pub u64);

impl SpaceProbe for FixedSpace {
    fn available(&self, _path: &Path) -> io::Result<u64> {
        Ok(self.0)
    }
}

#[derive(Default)]
struct FakeState {
    calls: Vec<String>,
    fail_at: Option<usize>,
    mounted: Option<PathBuf>,
    hives: BTreeSet<String>,
}

/// Scripted stand-in for dism, reg, takeown, icacls, curl and oscdimg.
///
/// Keeps just enough state to catch leaks: which directory is mounted and
/// which hive aliases are loaded. One call can be made to fail by ordinal.
#[derive(Default)]
pub struct FakeTools {
    state: Mutex<FakeState>,
}

impl FakeTools {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Fail the `ordinal`-th call (1-based) once.
    pub fn failing_at(ordinal: usize) -> Arc<Self> {
        let tools = Self::default();
        tools.state.lock().unwrap().fail_at = Some(ordinal);
        Arc::new(tools)
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn is_mounted(&self) -> bool {
        self.state.lock().unwrap().mounted.is_some()
    }

    pub fn loaded_hives(&self) -> Vec<String> {
        self.state.lock().unwrap().hives.iter().cloned().collect()
    }

    fn dism(state: &mut FakeState, args: &[String]) -> CommandResult {
        let value = |prefix: &str| {
            args.iter()
                .find_map(|a| a.strip_prefix(prefix))
                .map(PathBuf::from)
        };
        let has = |flag: &str| args.iter().any(|a| a == flag);

        if has("/Get-WimInfo") {
            let esd = args
                .iter()
                .any(|a| a.starts_with("/WimFile:") && a.ends_with(".esd"));
            if esd {
                return CommandResult::ok(
                    "Index : 1\nName : Windows 11 Home\nDescription : Windows 11 Home\nSize : 16,521,431,203 bytes\n\n\
                     Index : 6\nName : Windows 11 Pro N\nDescription : Windows 11 Pro N\nSize : 16,788,123,456 bytes\n",
                );
            }
            let details = if has("/Index:1") {
                "Architecture : x64\n"
            } else {
                ""
            };
            return CommandResult::ok(format!(
                "Index : 1\nName : Windows 11 Pro\nDescription : Windows 11 Pro\n{}Size : 16,788,123,456 bytes\n",
                details
            ));
        }
        if has("/Mount-Image") {
            let Some(dir) = value("/MountDir:") else {
                return CommandResult::failed(87, "missing /MountDir");
            };
            if state.mounted.is_some() {
                return CommandResult::failed(0xc1420127u32 as i32, "already mounted");
            }
            create_mock_windows(&dir);
            state.mounted = Some(dir);
            return CommandResult::ok("The operation completed successfully.");
        }
        if has("/Unmount-Image") {
            let Some(dir) = value("/MountDir:") else {
                return CommandResult::failed(87, "missing /MountDir");
            };
            if state.mounted.as_deref() != Some(dir.as_path()) {
                return CommandResult::failed(0xc1420126u32 as i32, "not mounted");
            }
            if !state.hives.is_empty() {
                return CommandResult::failed(0xc1420117u32 as i32, "hives still loaded");
            }
            let _ = fs::remove_dir_all(&dir);
            let _ = fs::create_dir_all(&dir);
            state.mounted = None;
            return CommandResult::ok("The operation completed successfully.");
        }
        if has("/Export-Image") {
            let Some(dst) = value("/DestinationImageFile:") else {
                return CommandResult::failed(87, "missing destination");
            };
            let file = fs::File::create(&dst).and_then(|f| f.set_len(EXPORT_SIZE));
            return match file {
                Ok(()) => CommandResult::ok("The operation completed successfully."),
                Err(e) => CommandResult::failed(5, e.to_string()),
            };
        }
        if has("/Get-MountedImageInfo") {
            let listing = state
                .mounted
                .as_ref()
                .map(|d| format!("Mount Dir : {}\n", d.display()))
                .unwrap_or_default();
            return CommandResult::ok(listing);
        }
        if has("/Get-ProvisionedAppxPackages") {
            return CommandResult::ok(
                "PackageName : Clipchamp.Clipchamp_2.2.8.0_neutral_~_yxz26nhyzhsrt\n\
                 PackageName : Microsoft.BingNews_4.2.27001.0_neutral_~_8wekyb3d8bbwe\n\
                 PackageName : Microsoft.WindowsCalculator_11.2210.0.0_neutral_~_8wekyb3d8bbwe\n",
            );
        }
        if has("/Get-Packages") {
            return CommandResult::ok(
                "Package Identity | State\n\
                 Microsoft-Windows-InternetExplorer-Optional-Package~31bf3856ad364e35~amd64~~11.0 | Installed\n\
                 Microsoft-Windows-LanguageFeatures-Handwriting-en-us-Package~31bf3856ad364e35~amd64~~10.0 | Installed\n",
            );
        }
        if has("/Get-Intl") {
            return CommandResult::ok("Default system UI language : en-US\n");
        }
        CommandResult::ok("The operation completed successfully.")
    }

    fn reg(state: &mut FakeState, args: &[String]) -> CommandResult {
        let verb = args.first().map(String::as_str).unwrap_or_default();
        let key = args.get(1).cloned().unwrap_or_default();
        let alias = key
            .trim_start_matches("HKLM\\")
            .split('\\')
            .next()
            .unwrap_or_default()
            .to_string();
        match verb {
            "load" => {
                if !state.hives.insert(alias) {
                    return CommandResult::failed(1, "ERROR: The process cannot access the file");
                }
                CommandResult::ok("The operation completed successfully.")
            }
            "unload" => {
                if !state.hives.remove(&alias) {
                    return CommandResult::failed(1, "ERROR: The parameter is incorrect.");
                }
                CommandResult::ok("The operation completed successfully.")
            }
            "add" | "delete" if !state.hives.contains(&alias) => {
                CommandResult::failed(1, "ERROR: The system was unable to find the specified registry key.")
            }
            _ => CommandResult::ok("The operation completed successfully."),
        }
    }

    /// Writes the file named after `flag`, or the last argument.
    fn write_output(args: &[String], flag: Option<&str>) -> CommandResult {
        let target = match flag {
            Some(flag) => args
                .iter()
                .position(|a| a == flag)
                .and_then(|i| args.get(i + 1)),
            None => args.last(),
        };
        match target.map(|t| fs::write(t, b"output")) {
            Some(Ok(())) => CommandResult::ok(""),
            Some(Err(e)) => CommandResult::failed(1, e.to_string()),
            None => CommandResult::failed(1, "no output path"),
        }
    }
}

impl ToolRunner for FakeTools {
    fn run(&self, program: &str, args: &[String]) -> Result<CommandResult> {
        let mut state = self.state.lock().unwrap();
        let name = if program.ends_with("oscdimg.exe") {
            "oscdimg"
        } else {
            program
        };
        state.calls.push(format!("{} {}", name, args.join(" ")));

        if state.fail_at == Some(state.calls.len()) {
            return Ok(CommandResult::failed(1, "injected failure"));
        }

        let result = match name {
            "dism" => Self::dism(&mut state, args),
            "reg" => Self::reg(&mut state, args),
            "takeown" | "icacls" => CommandResult::ok("SUCCESS"),
            "curl" => Self::write_output(args, Some("-o")),
            "oscdimg" => Self::write_output(args, None),
            other => CommandResult::failed(9009, format!("'{}' is not recognized", other)),
        };
        Ok(result)
    }
}
