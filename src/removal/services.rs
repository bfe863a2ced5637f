//! Service deletion from the offline SYSTEM hive.

use super::catalog::NANO_SERVICES;
use super::RemovalReport;
use crate::error::{BuildError, Result};
use crate::log::BuildLog;
use crate::registry::{hive, RegistryEditSession};

const SERVICES_KEY: &str = "HKLM\\zSYSTEM\\ControlSet001\\Services";

/// Delete nano's service keys. Loads only SYSTEM and always unloads it.
/// A key that cannot be deleted is treated as already absent.
pub fn remove_services(registry: &mut RegistryEditSession, log: &BuildLog) -> Result<RemovalReport> {
    let system = hive("zSYSTEM").ok_or_else(|| BuildError::general("SYSTEM hive is not defined"))?;
    registry.load_only(&[system])?;

    let mut report = RemovalReport::default();
    for name in NANO_SERVICES {
        let key = format!("{}\\{}", SERVICES_KEY, name);
        match registry.delete_key(&key) {
            Ok(()) => {
                log.debug(format!("deleted service {}", name));
                report.removed += 1;
            }
            Err(_) => {
                log.info(format!("service {} not present", name));
                report.skipped += 1;
            }
        }
    }
    report.summarize("services", log);

    registry.unload()?;
    Ok(report)
}
