//! Image-servicing tool (`dism`).

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use crate::error::Result;
use crate::process::{CommandResult, ToolRunner};

pub const PROGRAM: &str = "dism";

/// Export compression modes understood by dism.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    /// No `/Compress` flag; dism keeps the source compression.
    Keep,
    Fast,
    Max,
    /// Solid LZMS compression used for `.esd` archives.
    Recovery,
}

impl Compression {
    fn flag(self) -> Option<&'static str> {
        match self {
            Compression::Keep => None,
            Compression::Fast => Some("/Compress:fast"),
            Compression::Max => Some("/Compress:max"),
            Compression::Recovery => Some("/Compress:recovery"),
        }
    }
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Compression::Keep => "keep",
            Compression::Fast => "fast",
            Compression::Max => "max",
            Compression::Recovery => "recovery",
        };
        f.write_str(s)
    }
}

#[derive(Clone)]
pub struct Dism {
    runner: Arc<dyn ToolRunner>,
}

fn p(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

impl Dism {
    pub fn new(runner: Arc<dyn ToolRunner>) -> Self {
        Self { runner }
    }

    fn call(&self, args: Vec<String>) -> Result<CommandResult> {
        let mut full = Vec::with_capacity(args.len() + 1);
        full.push("/English".to_string());
        full.extend(args);
        self.runner.check(PROGRAM, &full)
    }

    pub fn get_wim_info(&self, image: &Path, index: Option<u32>) -> Result<String> {
        let mut args = vec!["/Get-WimInfo".to_string(), format!("/WimFile:{}", p(image))];
        if let Some(i) = index {
            args.push(format!("/Index:{}", i));
        }
        Ok(self.call(args)?.stdout)
    }

    pub fn mount(&self, image: &Path, index: u32, dir: &Path, read_only: bool) -> Result<()> {
        let mut args = vec![
            "/Mount-Image".to_string(),
            format!("/ImageFile:{}", p(image)),
            format!("/Index:{}", index),
            format!("/MountDir:{}", p(dir)),
        ];
        if read_only {
            args.push("/ReadOnly".to_string());
        }
        self.call(args).map(|_| ())
    }

    pub fn unmount(&self, dir: &Path, commit: bool) -> Result<()> {
        let action = if commit { "/Commit" } else { "/Discard" };
        self.call(vec![
            "/Unmount-Image".to_string(),
            format!("/MountDir:{}", p(dir)),
            action.to_string(),
        ])
        .map(|_| ())
    }

    /// Export one index into a new image file. Returns the tool output.
    pub fn export(
        &self,
        source: &Path,
        index: u32,
        destination: &Path,
        compression: Compression,
        check_integrity: bool,
    ) -> Result<String> {
        let mut args = vec![
            "/Export-Image".to_string(),
            format!("/SourceImageFile:{}", p(source)),
            format!("/SourceIndex:{}", index),
            format!("/DestinationImageFile:{}", p(destination)),
        ];
        if let Some(flag) = compression.flag() {
            args.push(flag.to_string());
        }
        if check_integrity {
            args.push("/CheckIntegrity".to_string());
        }
        Ok(self.call(args)?.stdout)
    }

    pub fn mounted_info(&self) -> Result<String> {
        Ok(self.call(vec!["/Get-MountedImageInfo".to_string()])?.stdout)
    }

    pub fn cleanup_image(&self, dir: &Path, reset_base: bool) -> Result<()> {
        let mut args = vec![
            format!("/Image:{}", p(dir)),
            "/Cleanup-Image".to_string(),
            "/StartComponentCleanup".to_string(),
        ];
        if reset_base {
            args.push("/ResetBase".to_string());
        }
        self.call(args).map(|_| ())
    }

    pub fn provisioned_packages(&self, dir: &Path) -> Result<String> {
        Ok(self
            .call(vec![
                format!("/Image:{}", p(dir)),
                "/Get-ProvisionedAppxPackages".to_string(),
            ])?
            .stdout)
    }

    pub fn remove_provisioned(&self, dir: &Path, package: &str) -> Result<()> {
        self.call(vec![
            format!("/Image:{}", p(dir)),
            "/Remove-ProvisionedAppxPackage".to_string(),
            format!("/PackageName:{}", package),
        ])
        .map(|_| ())
    }

    pub fn packages_table(&self, dir: &Path) -> Result<String> {
        Ok(self
            .call(vec![
                format!("/Image:{}", p(dir)),
                "/Get-Packages".to_string(),
                "/Format:Table".to_string(),
            ])?
            .stdout)
    }

    pub fn remove_package(&self, dir: &Path, package: &str) -> Result<()> {
        self.call(vec![
            format!("/Image:{}", p(dir)),
            "/Remove-Package".to_string(),
            format!("/PackageName:{}", package),
        ])
        .map(|_| ())
    }

    pub fn enable_feature(&self, dir: &Path, feature: &str, source: &Path) -> Result<()> {
        self.call(vec![
            format!("/Image:{}", p(dir)),
            "/Enable-Feature".to_string(),
            format!("/FeatureName:{}", feature),
            "/All".to_string(),
            format!("/Source:{}", p(source)),
        ])
        .map(|_| ())
    }

    pub fn get_intl(&self, dir: &Path) -> Result<String> {
        Ok(self
            .call(vec![format!("/Image:{}", p(dir)), "/Get-Intl".to_string()])?
            .stdout)
    }
}
