//! Content comparison of two directory trees by SHA-256.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use sha2::{Digest, Sha256};
use walkdir::WalkDir;

use crate::error::{BuildError, IoContext, Result};

/// Differences between a source tree and its copy.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TreeDiff {
    /// In the source, absent from the copy.
    pub missing: Vec<String>,
    /// In the copy, absent from the source.
    pub extra: Vec<String>,
    /// Present in both with different content.
    pub mismatched: Vec<String>,
}

impl TreeDiff {
    pub fn is_identical(&self) -> bool {
        self.missing.is_empty() && self.extra.is_empty() && self.mismatched.is_empty()
    }
}

/// Hash a single file.
pub fn file_digest(path: &Path) -> Result<String> {
    let mut file = File::open(path).with_path("open file for hashing", path)?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf).with_path("read file for hashing", path)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// Relative path (forward slashes) to hex digest, for every regular file.
pub fn tree_digest(root: &Path) -> Result<BTreeMap<String, String>> {
    let mut digests = BTreeMap::new();
    for entry in WalkDir::new(root).min_depth(1) {
        let entry = entry.map_err(|e| {
            BuildError::general(format!("walk failed: {}", e)).with_context("root", root.display())
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = match entry.path().strip_prefix(root) {
            Ok(r) => r,
            Err(_) => continue,
        };
        let key = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        digests.insert(key, file_digest(entry.path())?);
    }
    Ok(digests)
}

/// Compare `dst` against `src`.
pub fn verify_copy(src: &Path, dst: &Path) -> Result<TreeDiff> {
    let expected = tree_digest(src)?;
    let actual = tree_digest(dst)?;

    let mut diff = TreeDiff::default();
    for (path, hash) in &expected {
        match actual.get(path) {
            None => diff.missing.push(path.clone()),
            Some(h) if h != hash => diff.mismatched.push(path.clone()),
            Some(_) => {}
        }
    }
    diff.extra = actual
        .keys()
        .filter(|k| !expected.contains_key(*k))
        .cloned()
        .collect();
    Ok(diff)
}
