//! The setup answer file.

use std::fs;
use std::path::{Path, PathBuf};

use super::copy_into;
use crate::error::{IoContext, Result};
use crate::log::BuildLog;

pub const UNATTEND_FILE: &str = "autounattend.xml";

/// Bypasses the hardware checks and the online-account requirement.
pub const DEFAULT_UNATTEND: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<unattend xmlns="urn:schemas-microsoft-com:unattend" xmlns:wcm="http://schemas.microsoft.com/WMIConfig/2002/State">
  <settings pass="windowsPE">
    <component name="Microsoft-Windows-Setup" processorArchitecture="amd64" publicKeyToken="31bf3856ad364e35" language="neutral" versionScope="nonSxS">
      <UserData>
        <ProductKey>
          <Key></Key>
        </ProductKey>
        <AcceptEula>true</AcceptEula>
      </UserData>
      <DynamicUpdate>
        <Enable>false</Enable>
      </DynamicUpdate>
    </component>
  </settings>
  <settings pass="specialize">
    <component name="Microsoft-Windows-Deployment" processorArchitecture="amd64" publicKeyToken="31bf3856ad364e35" language="neutral" versionScope="nonSxS">
      <RunSynchronous>
        <RunSynchronousCommand wcm:action="add">
          <Order>1</Order>
          <Path>reg add HKLM\SOFTWARE\Microsoft\Windows\CurrentVersion\OOBE /v BypassNRO /t REG_DWORD /d 1 /f</Path>
        </RunSynchronousCommand>
      </RunSynchronous>
    </component>
  </settings>
  <settings pass="oobeSystem">
    <component name="Microsoft-Windows-Shell-Setup" processorArchitecture="amd64" publicKeyToken="31bf3856ad364e35" language="neutral" versionScope="nonSxS">
      <OOBE>
        <HideOnlineAccountScreens>true</HideOnlineAccountScreens>
        <HideEULAPage>true</HideEULAPage>
        <ProtectYourPC>3</ProtectYourPC>
      </OOBE>
    </component>
  </settings>
</unattend>
"#;

/// Pick the answer file: resources, then the theme, then the built-in
/// default written to the resources path.
pub fn resolve(resources_dir: &Path, theme_dir: Option<&Path>, log: &BuildLog) -> Result<PathBuf> {
    let primary = resources_dir.join(UNATTEND_FILE);
    if primary.is_file() {
        return Ok(primary);
    }
    if let Some(candidate) = theme_dir.map(|d| d.join(UNATTEND_FILE)).filter(|p| p.is_file()) {
        log.info(format!("using answer file from {}", candidate.display()));
        return Ok(candidate);
    }
    log.info("writing default answer file");
    fs::create_dir_all(resources_dir).with_path("create resources directory", resources_dir)?;
    fs::write(&primary, DEFAULT_UNATTEND).with_path("write answer file", &primary)?;
    Ok(primary)
}

/// Place the answer file in Sysprep inside the mount and at the staging
/// root. Only the mount copy is required.
pub fn install(answer: &Path, mount: &Path, staging: &Path, log: &BuildLog) -> Result<()> {
    let sysprep = mount
        .join("Windows")
        .join("System32")
        .join("Sysprep")
        .join(UNATTEND_FILE);
    copy_into(answer, &sysprep)?;
    if let Err(e) = copy_into(answer, &staging.join(UNATTEND_FILE)) {
        log.warn(format!("could not copy answer file to the ISO root: {}", e));
    }
    log.success("answer file installed");
    Ok(())
}
