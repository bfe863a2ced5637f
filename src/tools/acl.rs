//! Ownership and ACL tools (`takeown`, `icacls`).

use std::path::Path;
use std::sync::Arc;

use crate::error::{ErrorKind, Result};
use crate::process::ToolRunner;

#[derive(Clone)]
pub struct Acl {
    runner: Arc<dyn ToolRunner>,
}

impl Acl {
    pub fn new(runner: Arc<dyn ToolRunner>) -> Self {
        Self { runner }
    }

    /// `takeown /F path [/R /D Y]`
    pub fn take_ownership(&self, path: &Path, recursive: bool) -> Result<()> {
        let mut args = vec!["/F".to_string(), path.to_string_lossy().into_owned()];
        if recursive {
            args.extend(["/R".to_string(), "/D".to_string(), "Y".to_string()]);
        }
        self.runner
            .check("takeown", &args)
            .map(|_| ())
            .map_err(|e| reclassify(e, path))
    }

    /// `icacls path /grant Administrators:(F) [/T /C]`
    pub fn grant_full_control(&self, path: &Path, recursive: bool) -> Result<()> {
        let mut args = vec![
            path.to_string_lossy().into_owned(),
            "/grant".to_string(),
            "Administrators:(F)".to_string(),
        ];
        if recursive {
            args.extend(["/T".to_string(), "/C".to_string()]);
        }
        self.runner
            .check("icacls", &args)
            .map(|_| ())
            .map_err(|e| reclassify(e, path))
    }

    /// Take ownership and grant full control. Returns the first failure.
    pub fn seize(&self, path: &Path, recursive: bool) -> Result<()> {
        let owned = self.take_ownership(path, recursive);
        let granted = self.grant_full_control(path, recursive);
        owned.and(granted)
    }
}

fn reclassify(mut err: crate::error::BuildError, path: &Path) -> crate::error::BuildError {
    err.kind = ErrorKind::Permission;
    err.with_context("path", path.display())
}
