//! Installers staged into the image and run by `SetupComplete.cmd`.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::{copy_into, read_json};
use crate::error::{BuildError, IoContext, Result};
use crate::log::BuildLog;

pub const PREINSTALL_FILE: &str = "preinstall.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreinstallApp {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub version: String,
    /// Installer path relative to the preinstall directory.
    pub source: String,
    pub install_cmd: String,
    #[serde(default)]
    pub silent: bool,
    #[serde(default)]
    pub post_script: Option<String>,
}

impl PreinstallApp {
    /// The `SetupComplete.cmd` block for this app.
    pub fn script_block(&self) -> String {
        let mut cmd = self.install_cmd.clone();
        if self.silent {
            cmd.push_str(" /S /Silent");
        }
        let mut block = format!(
            "@echo off\r\necho Installing {}...\r\ncd /d %SystemRoot%\\Setup\\PreInstall\r\n{}\r\n",
            self.name, cmd
        );
        if let Some(post) = self.post_script.as_deref().filter(|s| !s.trim().is_empty()) {
            block.push_str(post);
            block.push_str("\r\n");
        }
        block
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreinstallConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub apps: Vec<PreinstallApp>,
}

impl PreinstallConfig {
    /// Load `preinstall.json`. A missing file is an empty, disabled config.
    pub fn load(dir: &Path) -> Result<Self> {
        let file = dir.join(PREINSTALL_FILE);
        if !file.exists() {
            return Ok(Self::default());
        }
        read_json(&file)
    }

    /// Apps named in `ids`, or every app when `ids` is empty.
    pub fn select(&self, ids: &[String]) -> Vec<&PreinstallApp> {
        self.apps
            .iter()
            .filter(|a| ids.is_empty() || ids.contains(&a.id))
            .collect()
    }
}

/// Copy selected installers into the mount and append their setup blocks.
/// Returns how many apps were staged; a failing app is a warning.
pub fn stage(dir: &Path, ids: &[String], mount: &Path, log: &BuildLog) -> Result<usize> {
    let config = PreinstallConfig::load(dir)?;
    if !config.enabled || config.apps.is_empty() {
        log.skip("no preinstall apps configured");
        return Ok(0);
    }
    for id in ids {
        if !config.apps.iter().any(|a| &a.id == id) {
            log.warn(format!("unknown preinstall app '{}'", id));
        }
    }

    let apps = config.select(ids);
    let mut staged = 0;
    for (i, app) in apps.iter().enumerate() {
        log.info(format!("[{}/{}] staging {} {}", i + 1, apps.len(), app.name, app.version));
        match stage_one(dir, app, mount) {
            Ok(()) => staged += 1,
            Err(e) => log.warn(format!("could not stage {}: {}", app.name, e)),
        }
    }
    log.success(format!("{} of {} apps staged", staged, apps.len()));
    Ok(staged)
}

fn stage_one(dir: &Path, app: &PreinstallApp, mount: &Path) -> Result<()> {
    let src = dir.join(&app.source);
    let file_name = src.file_name().ok_or_else(|| {
        BuildError::invalid_input("installer source has no file name").with_context("app", &app.id)
    })?;
    if !src.is_file() {
        return Err(BuildError::not_found("installer not found").with_context("path", src.display()));
    }

    let setup = mount.join("Windows").join("Setup");
    copy_into(&src, &setup.join("PreInstall").join(file_name))?;

    let script = setup.join("Scripts").join("SetupComplete.cmd");
    if let Some(parent) = script.parent() {
        std::fs::create_dir_all(parent).with_path("create directory", parent)?;
    }
    let mut f = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&script)
        .with_path("open SetupComplete.cmd", &script)?;
    f.write_all(app.script_block().as_bytes())
        .with_path("write SetupComplete.cmd", &script)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const JSON: &str = r#"{
        "enabled": true,
        "apps": [
            { "id": "7zip", "name": "7-Zip", "version": "23.01", "source": "7z.exe",
              "installCmd": "7z.exe", "silent": true },
            { "id": "vlc", "name": "VLC", "source": "missing/vlc.exe", "installCmd": "vlc.exe" }
        ]
    }"#;

    #[test]
    fn test_missing_config_stages_nothing() {
        let tmp = TempDir::new().unwrap();
        let log = BuildLog::new("t");
        assert_eq!(stage(tmp.path(), &[], tmp.path(), &log).unwrap(), 0);
    }

    #[test]
    fn test_stages_selected_and_skips_missing() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("preinstall");
        let mount = tmp.path().join("mount");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(PREINSTALL_FILE), JSON).unwrap();
        fs::write(dir.join("7z.exe"), b"MZ").unwrap();

        let log = BuildLog::new("t");
        assert_eq!(stage(&dir, &[], &mount, &log).unwrap(), 1);
        assert!(mount.join("Windows/Setup/PreInstall/7z.exe").is_file());
        let script = fs::read_to_string(mount.join("Windows/Setup/Scripts/SetupComplete.cmd")).unwrap();
        assert!(script.contains("7z.exe /S /Silent"));
        assert!(!script.contains("VLC"));
    }

    #[test]
    fn test_select_filters_ids() {
        let config: PreinstallConfig = serde_json::from_str(JSON).unwrap();
        assert_eq!(config.select(&[]).len(), 2);
        let picked = config.select(&["vlc".to_string()]);
        assert_eq!(picked.len(), 1);
        assert_eq!(picked[0].name, "VLC");
        assert!(!picked[0].script_block().contains("/Silent"));
    }
}
