//! Registry-hive tool (`reg`).

use std::path::Path;
use std::sync::Arc;

use crate::error::Result;
use crate::process::{CommandResult, ToolRunner};

pub const PROGRAM: &str = "reg";

#[derive(Clone)]
pub struct Reg {
    runner: Arc<dyn ToolRunner>,
}

impl Reg {
    pub fn new(runner: Arc<dyn ToolRunner>) -> Self {
        Self { runner }
    }

    fn call(&self, args: Vec<String>) -> Result<CommandResult> {
        self.runner.check(PROGRAM, &args)
    }

    /// Load a hive file under `HKLM\<alias>`.
    pub fn load(&self, key: &str, file: &Path) -> Result<()> {
        self.call(vec![
            "load".to_string(),
            key.to_string(),
            file.to_string_lossy().into_owned(),
        ])
        .map(|_| ())
    }

    pub fn unload(&self, key: &str) -> Result<()> {
        self.call(vec!["unload".to_string(), key.to_string()])
            .map(|_| ())
    }

    pub fn add(&self, path: &str, name: &str, kind: &str, value: &str) -> Result<()> {
        self.call(vec![
            "add".to_string(),
            path.to_string(),
            "/v".to_string(),
            name.to_string(),
            "/t".to_string(),
            kind.to_string(),
            "/d".to_string(),
            value.to_string(),
            "/f".to_string(),
        ])
        .map(|_| ())
    }

    pub fn delete(&self, path: &str) -> Result<()> {
        self.call(vec!["delete".to_string(), path.to_string(), "/f".to_string()])
            .map(|_| ())
    }
}
