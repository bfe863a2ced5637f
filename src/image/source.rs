//! Installation-media layout checks and ESD conversion.

use std::fs;
use std::path::{Path, PathBuf};

use super::info::{parse_listing, select_index};
use crate::error::{BuildError, IoContext, Result};
use crate::log::BuildLog;
use crate::tools::{Compression, Dism};

/// Format of the installable image shipped on the media.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallFormat {
    Wim,
    Esd,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLayout {
    pub root: PathBuf,
    pub boot_wim: PathBuf,
    pub install: PathBuf,
    pub format: InstallFormat,
}

/// `<root>/sources/<name>`
pub fn sources_file(root: &Path, name: &str) -> PathBuf {
    root.join("sources").join(name)
}

/// The media must carry `sources/boot.wim` and an install image.
pub fn validate_source(root: &Path) -> Result<SourceLayout> {
    if !root.is_dir() {
        return Err(BuildError::not_found("source directory does not exist")
            .with_context("path", root.display()));
    }

    let boot_wim = sources_file(root, "boot.wim");
    if !boot_wim.is_file() {
        return Err(BuildError::not_found("boot.wim not found on the source media")
            .with_context("path", boot_wim.display()));
    }

    let wim = sources_file(root, "install.wim");
    let esd = sources_file(root, "install.esd");
    let (install, format) = if wim.is_file() {
        (wim, InstallFormat::Wim)
    } else if esd.is_file() {
        (esd, InstallFormat::Esd)
    } else {
        return Err(BuildError::not_found("neither install.wim nor install.esd found")
            .with_context("path", root.join("sources").display()));
    };

    Ok(SourceLayout {
        root: root.to_path_buf(),
        boot_wim,
        install,
        format,
    })
}

/// Edition a staged ESD was converted from.
///
/// The converted `install.wim` holds that edition alone, at index 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertedEsd {
    pub source_index: u32,
    pub name: String,
    pub description: String,
}

/// Index of the only image in a WIM produced by [`convert_esd`].
pub const CONVERTED_INDEX: u32 = 1;

/// Turn a staged `install.esd` into `install.wim`, then delete the ESD.
///
/// Returns the converted edition, or `None` when nothing was converted
/// (no ESD staged, or the media already shipped an `install.wim`).
pub fn convert_esd(
    dism: &Dism,
    staging: &Path,
    requested: Option<u32>,
    log: &BuildLog,
) -> Result<Option<ConvertedEsd>> {
    let esd = sources_file(staging, "install.esd");
    if !esd.is_file() {
        log.skip("no install.esd staged");
        return Ok(None);
    }

    let wim = sources_file(staging, "install.wim");
    let converted = if wim.is_file() {
        log.skip("install.wim already present, dropping install.esd");
        None
    } else {
        let listing = parse_listing(&dism.get_wim_info(&esd, None)?);
        let indices: Vec<u32> = listing.iter().map(|e| e.index).collect();
        let index = select_index(&indices, requested)?;
        log.info(format!("converting install.esd index {} to install.wim", index));
        dism.export(&esd, index, &wim, Compression::Max, true)?;
        log.success("ESD converted");

        let entry = listing.into_iter().find(|e| e.index == index);
        Some(ConvertedEsd {
            source_index: index,
            name: entry.as_ref().map(|e| e.name.clone()).unwrap_or_default(),
            description: entry.map(|e| e.description).unwrap_or_default(),
        })
    };

    fs::remove_file(&esd).with_path("remove staged install.esd", &esd)?;
    Ok(converted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use tempfile::TempDir;

    fn media(files: &[&str]) -> TempDir {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("sources")).unwrap();
        for f in files {
            fs::write(tmp.path().join("sources").join(f), b"x").unwrap();
        }
        tmp
    }

    #[test]
    fn test_prefers_wim() {
        let tmp = media(&["boot.wim", "install.wim", "install.esd"]);
        let layout = validate_source(tmp.path()).unwrap();
        assert_eq!(layout.format, InstallFormat::Wim);
    }

    #[test]
    fn test_esd_only() {
        let tmp = media(&["boot.wim", "install.esd"]);
        assert_eq!(validate_source(tmp.path()).unwrap().format, InstallFormat::Esd);
    }

    #[test]
    fn test_missing_pieces() {
        let tmp = media(&["install.wim"]);
        assert!(validate_source(tmp.path()).unwrap_err().is(ErrorKind::NotFound));

        let tmp = media(&["boot.wim"]);
        assert!(validate_source(tmp.path()).unwrap_err().is(ErrorKind::NotFound));
    }
}
