//! Theme and branding applied to the mounted image.
//!
//! A theme is a directory under the themes root holding `theme.json` plus
//! the files it references. Registry values go through the loaded hives.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::{copy_into, read_json};
use crate::config::DEFAULT_THEME;
use crate::error::{BuildError, Result};
use crate::log::BuildLog;
use crate::registry::RegistryEditSession;

pub const THEME_FILE: &str = "theme.json";

const CURRENT_VERSION: &str = "HKLM\\zSOFTWARE\\Microsoft\\Windows NT\\CurrentVersion";
const OEM_INFORMATION: &str = "HKLM\\zSOFTWARE\\Microsoft\\Windows\\CurrentVersion\\OEMInformation";
const DESKTOP: &str = "HKLM\\zNTUSER\\Control Panel\\Desktop";
const PERSONALIZATION: &str = "HKLM\\zSOFTWARE\\Policies\\Microsoft\\Windows\\Personalization";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Wallpapers {
    #[serde(default)]
    pub desktop: Option<String>,
    #[serde(default)]
    pub lockscreen: Option<String>,
    #[serde(default)]
    pub set_as_default: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Branding {
    #[serde(default)]
    pub registered_owner: Option<String>,
    #[serde(default)]
    pub registered_organization: Option<String>,
    #[serde(default)]
    pub manufacturer: Option<String>,
    #[serde(default)]
    pub support_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Theme {
    pub name: String,
    #[serde(default)]
    pub wallpapers: Option<Wallpapers>,
    #[serde(default)]
    pub branding: Option<Branding>,
    /// Directory the theme was loaded from.
    #[serde(skip)]
    pub dir: PathBuf,
}

/// Counts from applying a theme.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ThemeReport {
    pub files: usize,
    pub values: usize,
    pub failed: usize,
}

impl Theme {
    pub fn load(themes_dir: &Path, name: &str) -> Result<Self> {
        let dir = themes_dir.join(name);
        let file = dir.join(THEME_FILE);
        if !file.is_file() {
            return Err(BuildError::not_found(format!("theme '{}' not found", name))
                .with_context("path", file.display()));
        }
        let mut theme: Theme = read_json(&file)?;
        theme.dir = dir;
        Ok(theme)
    }

    /// Directory name used under `Windows/Web/Wallpaper`.
    pub fn folder_name(&self) -> String {
        let name: String = self
            .name
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
            .collect();
        if name.is_empty() {
            "Theme".to_string()
        } else {
            name
        }
    }

    /// Copy wallpapers and write branding values. Each failure is a warning.
    pub fn apply(&self, mount: &Path, registry: &RegistryEditSession, log: &BuildLog) -> ThemeReport {
        log.info(format!("applying theme {}", self.name));
        let mut report = ThemeReport::default();

        if let Some(w) = &self.wallpapers {
            self.apply_wallpapers(w, mount, registry, log, &mut report);
        }
        if let Some(b) = &self.branding {
            let values = [
                (CURRENT_VERSION, "RegisteredOwner", &b.registered_owner),
                (CURRENT_VERSION, "RegisteredOrganization", &b.registered_organization),
                (OEM_INFORMATION, "Manufacturer", &b.manufacturer),
                (OEM_INFORMATION, "SupportURL", &b.support_url),
            ];
            for (path, name, value) in values {
                if let Some(value) = value {
                    set(registry, path, name, value, log, &mut report);
                }
            }
        }

        log.success(format!(
            "theme {}: {} files, {} values, {} failed",
            self.name, report.files, report.values, report.failed
        ));
        report
    }

    fn apply_wallpapers(
        &self,
        w: &Wallpapers,
        mount: &Path,
        registry: &RegistryEditSession,
        log: &BuildLog,
        report: &mut ThemeReport,
    ) {
        let folder = self.folder_name();
        let target = mount.join("Windows").join("Web").join("Wallpaper").join(&folder);
        let slots = [
            (&w.desktop, "desktop", DESKTOP, "Wallpaper", w.set_as_default),
            (&w.lockscreen, "lockscreen", PERSONALIZATION, "LockScreenImage", true),
        ];

        for (source, stem, key, value_name, register) in slots {
            let Some(rel) = source else { continue };
            let src = self.dir.join(rel);
            if !src.is_file() {
                log.warn(format!("{} wallpaper {} not found", stem, src.display()));
                report.failed += 1;
                continue;
            }
            let ext = src
                .extension()
                .map(|e| e.to_string_lossy().into_owned())
                .unwrap_or_else(|| "jpg".to_string());
            let file_name = format!("{}.{}", stem, ext);
            if let Err(e) = copy_into(&src, &target.join(&file_name)) {
                log.warn(format!("could not copy {} wallpaper: {}", stem, e));
                report.failed += 1;
                continue;
            }
            report.files += 1;
            if register {
                let value = format!("%SystemRoot%\\Web\\Wallpaper\\{}\\{}", folder, file_name);
                set(registry, key, value_name, &value, log, report);
            }
        }
    }
}

fn set(
    registry: &RegistryEditSession,
    path: &str,
    name: &str,
    value: &str,
    log: &BuildLog,
    report: &mut ThemeReport,
) {
    match registry.set_value(path, name, "REG_SZ", value) {
        Ok(()) => report.values += 1,
        Err(e) => {
            log.warn(format!("could not set {}\\{}: {}", path, name, e.message));
            report.failed += 1;
        }
    }
}

/// Whether a theme name asks for customization at all.
pub fn is_default(name: &str) -> bool {
    name.trim().is_empty() || name.eq_ignore_ascii_case(DEFAULT_THEME)
}

/// Theme directories that contain a `theme.json`, sorted by name.
pub fn list_themes(themes_dir: &Path) -> Vec<String> {
    let Ok(entries) = fs::read_dir(themes_dir) else {
        return Vec::new();
    };
    let mut names: Vec<String> = entries
        .flatten()
        .filter(|e| e.path().join(THEME_FILE).is_file())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const JSON: &str = r#"{
        "name": "Miku Blue",
        "wallpapers": { "desktop": "wall.png", "setAsDefault": true },
        "branding": { "registeredOwner": "Lab", "supportUrl": "https://example.org" }
    }"#;

    #[test]
    fn test_load_camel_case() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("miku")).unwrap();
        fs::write(tmp.path().join("miku/theme.json"), JSON).unwrap();

        let theme = Theme::load(tmp.path(), "miku").unwrap();
        let w = theme.wallpapers.as_ref().unwrap();
        assert!(w.set_as_default);
        assert_eq!(w.desktop.as_deref(), Some("wall.png"));
        assert!(w.lockscreen.is_none());
        let b = theme.branding.as_ref().unwrap();
        assert_eq!(b.support_url.as_deref(), Some("https://example.org"));
        assert_eq!(theme.folder_name(), "MikuBlue");
        assert_eq!(theme.dir, tmp.path().join("miku"));
        assert_eq!(list_themes(tmp.path()), vec!["miku".to_string()]);
    }

    #[test]
    fn test_missing_and_malformed() {
        let tmp = TempDir::new().unwrap();
        let err = Theme::load(tmp.path(), "nope").unwrap_err();
        assert!(err.is(crate::error::ErrorKind::NotFound));

        fs::create_dir_all(tmp.path().join("bad")).unwrap();
        fs::write(tmp.path().join("bad/theme.json"), "{").unwrap();
        let err = Theme::load(tmp.path(), "bad").unwrap_err();
        assert!(err.is(crate::error::ErrorKind::InvalidInput));
    }

    #[test]
    fn test_default_names() {
        assert!(is_default("default"));
        assert!(is_default("Default"));
        assert!(is_default(""));
        assert!(!is_default("miku"));
    }
}
