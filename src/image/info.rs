//! Image inspection: index selection, details, language.

use std::path::Path;

use super::mount::ImageMountGuard;
use crate::error::{BuildError, Result};
use crate::log::BuildLog;
use crate::tools::parse::{extract_field, extract_indices, extract_language, parse_size, DEFAULT_LANGUAGE};
use crate::tools::Dism;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageInfo {
    pub index: u32,
    pub name: String,
    pub description: String,
    /// `amd64`, `arm64` or `x86`.
    pub architecture: String,
    pub size: u64,
    pub language: String,
}

/// One row of a `/Get-WimInfo` listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageEntry {
    pub index: u32,
    pub name: String,
    pub description: String,
    pub size: u64,
}

/// Split a listing into entries. Each entry starts at an `Index :` line.
pub fn parse_listing(output: &str) -> Vec<ImageEntry> {
    let mut entries = Vec::new();
    let mut block = String::new();
    let flush = |block: &str, entries: &mut Vec<ImageEntry>| {
        let index = extract_indices(block).first().copied();
        if let Some(index) = index {
            entries.push(ImageEntry {
                index,
                name: extract_field(block, "Name").unwrap_or_default(),
                description: extract_field(block, "Description").unwrap_or_default(),
                size: extract_field(block, "Size").map(|s| parse_size(&s)).unwrap_or(0),
            });
        }
    };

    for line in output.lines() {
        if line.trim_start().starts_with("Index :") {
            flush(&block, &mut entries);
            block.clear();
        }
        block.push_str(line);
        block.push('\n');
    }
    flush(&block, &mut entries);
    entries
}

pub fn normalize_arch(arch: &str) -> String {
    match arch.trim() {
        "x64" => "amd64".to_string(),
        other => other.to_lowercase(),
    }
}

/// Pick the index to build. A single-image file auto-selects.
pub fn select_index(available: &[u32], requested: Option<u32>) -> Result<u32> {
    let listed = || {
        available
            .iter()
            .map(u32::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    };
    match (requested, available) {
        (_, []) => Err(BuildError::invalid_input("image contains no indices")),
        (Some(i), _) if available.contains(&i) => Ok(i),
        (Some(i), _) => Err(BuildError::invalid_input("image index not present")
            .with_context("index", i)
            .with_context("available", listed())),
        (None, [only]) => Ok(*only),
        (None, _) => Err(BuildError::invalid_input("image has several indices; choose one with --index")
            .with_context("available", listed())),
    }
}

/// Resolve the index and read its details, detecting the language with a
/// short read-only mount.
pub fn inspect(
    dism: &Dism,
    guard: &mut ImageMountGuard,
    image: &Path,
    requested: Option<u32>,
    log: &BuildLog,
) -> Result<ImageInfo> {
    let listing = dism.get_wim_info(image, None)?;
    let index = select_index(&extract_indices(&listing), requested)?;

    let details = dism.get_wim_info(image, Some(index))?;
    let field = |key: &str| extract_field(&details, key).unwrap_or_default();

    let info = ImageInfo {
        index,
        name: field("Name"),
        description: field("Description"),
        architecture: normalize_arch(&field("Architecture")),
        size: parse_size(&field("Size")),
        language: detect_language(dism, guard, image, index, log)?,
    };

    log.info(format!(
        "image {}: {} [{}] {} ({})",
        info.index,
        info.name,
        info.architecture,
        info.language,
        crate::tools::parse::format_bytes(info.size)
    ));
    Ok(info)
}

/// Mount read-only, query `/Get-Intl`, discard. Mount or query failures
/// fall back to the default language; a failed discard is an error.
fn detect_language(
    dism: &Dism,
    guard: &mut ImageMountGuard,
    image: &Path,
    index: u32,
    log: &BuildLog,
) -> Result<String> {
    if let Err(e) = guard.mount(image, index, true) {
        log.warn(format!("language detection mount failed, assuming {}: {}", DEFAULT_LANGUAGE, e.message));
        return Ok(DEFAULT_LANGUAGE.to_string());
    }

    let language = match dism.get_intl(guard.mount_dir()) {
        Ok(out) => extract_language(&out),
        Err(e) => {
            log.warn(format!("/Get-Intl failed, assuming {}: {}", DEFAULT_LANGUAGE, e.message));
            DEFAULT_LANGUAGE.to_string()
        }
    };

    guard.unmount(false)?;
    Ok(language)
}
