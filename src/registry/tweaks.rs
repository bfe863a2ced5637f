//! Registry tweak catalog.
//!
//! Paths address the offline hives by their load alias (`HKLM\zSOFTWARE`,
//! ...), so a set only works while the matching hives are loaded.

/// One registry edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegOp {
    Add {
        path: &'static str,
        name: &'static str,
        kind: &'static str,
        value: &'static str,
    },
    /// Remove a key. Failure is tolerated: the key may not exist.
    Delete { path: &'static str },
}

const fn dword(path: &'static str, name: &'static str, value: &'static str) -> RegOp {
    RegOp::Add {
        path,
        name,
        kind: "REG_DWORD",
        value,
    }
}

const fn sz(path: &'static str, name: &'static str, value: &'static str) -> RegOp {
    RegOp::Add {
        path,
        name,
        kind: "REG_SZ",
        value,
    }
}

const fn delete(path: &'static str) -> RegOp {
    RegOp::Delete { path }
}

/// A named group of edits that succeeds or fails as a unit.
#[derive(Debug, Clone, Copy)]
pub struct Tweak {
    pub label: &'static str,
    pub ops: &'static [RegOp],
}

/// Catalog sections, applied by different pipeline steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TweakSet {
    Base,
    Core,
    Nano,
    Boot,
}

impl TweakSet {
    pub fn tweaks(self) -> &'static [Tweak] {
        match self {
            TweakSet::Base => BASE,
            TweakSet::Core => CORE,
            TweakSet::Nano => NANO,
            TweakSet::Boot => BOOT,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            TweakSet::Base => "base",
            TweakSet::Core => "core",
            TweakSet::Nano => "nano",
            TweakSet::Boot => "boot",
        }
    }
}

const CDM: &str = "HKLM\\zNTUSER\\Software\\Microsoft\\Windows\\CurrentVersion\\ContentDeliveryManager";
const CLOUD: &str = "HKLM\\zSOFTWARE\\Policies\\Microsoft\\Windows\\CloudContent";
const LAB: &str = "HKLM\\zSYSTEM\\Setup\\LabConfig";
const WU_POLICY: &str = "HKLM\\zSOFTWARE\\Policies\\Microsoft\\Windows\\WindowsUpdate";
const DEFENDER_RTP: &str =
    "HKLM\\zSOFTWARE\\Policies\\Microsoft\\Windows Defender\\Real-Time Protection";
const RUN_ONCE: &str = "HKLM\\zSOFTWARE\\Microsoft\\Windows\\CurrentVersion\\RunOnce";
const EXPLORER_POLICY: &str =
    "HKLM\\zSOFTWARE\\Microsoft\\Windows\\CurrentVersion\\Policies\\Explorer";

const BYPASS_REQUIREMENTS: Tweak = Tweak {
    label: "Bypass system requirements",
    ops: &[
        dword("HKLM\\zDEFAULT\\Control Panel\\UnsupportedHardwareNotificationCache", "SV1", "0"),
        dword("HKLM\\zDEFAULT\\Control Panel\\UnsupportedHardwareNotificationCache", "SV2", "0"),
        dword("HKLM\\zNTUSER\\Control Panel\\UnsupportedHardwareNotificationCache", "SV1", "0"),
        dword("HKLM\\zNTUSER\\Control Panel\\UnsupportedHardwareNotificationCache", "SV2", "0"),
        dword(LAB, "BypassCPUCheck", "1"),
        dword(LAB, "BypassRAMCheck", "1"),
        dword(LAB, "BypassSecureBootCheck", "1"),
        dword(LAB, "BypassStorageCheck", "1"),
        dword(LAB, "BypassTPMCheck", "1"),
        dword("HKLM\\zSYSTEM\\Setup\\MoSetup", "AllowUpgradesWithUnsupportedTPMOrCPU", "1"),
    ],
};

const HIDE_SETTINGS_PAGES: Tweak = Tweak {
    label: "Hide Windows Update and Defender settings pages",
    ops: &[sz(EXPLORER_POLICY, "SettingsPageVisibility", "hide:virus;windowsupdate")],
};

static BASE: &[Tweak] = &[
    BYPASS_REQUIREMENTS,
    Tweak {
        label: "Disable sponsored apps",
        ops: &[
            dword(CDM, "OemPreInstalledAppsEnabled", "0"),
            dword(CDM, "PreInstalledAppsEnabled", "0"),
            dword(CDM, "SilentInstalledAppsEnabled", "0"),
            dword(CLOUD, "DisableWindowsConsumerFeatures", "1"),
            dword(CDM, "ContentDeliveryAllowed", "0"),
            sz(
                "HKLM\\zSOFTWARE\\Microsoft\\PolicyManager\\current\\device\\Start",
                "ConfigureStartPins",
                "{\"pinnedList\": [{}]}",
            ),
            dword(CDM, "FeatureManagementEnabled", "0"),
            dword(CDM, "PreInstalledAppsEverEnabled", "0"),
            dword(CDM, "SoftLandingEnabled", "0"),
            dword(CDM, "SubscribedContentEnabled", "0"),
            dword(CDM, "SubscribedContent-310093Enabled", "0"),
            dword(CDM, "SubscribedContent-338388Enabled", "0"),
            dword(CDM, "SubscribedContent-338389Enabled", "0"),
            dword(CDM, "SubscribedContent-338393Enabled", "0"),
            dword(CDM, "SubscribedContent-353694Enabled", "0"),
            dword(CDM, "SubscribedContent-353696Enabled", "0"),
            dword(CDM, "SystemPaneSuggestionsEnabled", "0"),
            dword("HKLM\\zSOFTWARE\\Policies\\Microsoft\\PushToInstall", "DisablePushToInstall", "1"),
            dword("HKLM\\zSOFTWARE\\Policies\\Microsoft\\MRT", "DontOfferThroughWUAU", "1"),
            dword(CLOUD, "DisableConsumerAccountStateContent", "1"),
            dword(CLOUD, "DisableCloudOptimizedContent", "1"),
            delete("HKLM\\zNTUSER\\Software\\Microsoft\\Windows\\CurrentVersion\\ContentDeliveryManager\\Subscriptions"),
            delete("HKLM\\zNTUSER\\Software\\Microsoft\\Windows\\CurrentVersion\\ContentDeliveryManager\\SuggestedApps"),
        ],
    },
    Tweak {
        label: "Allow local account setup",
        ops: &[dword("HKLM\\zSOFTWARE\\Microsoft\\Windows\\CurrentVersion\\OOBE", "BypassNRO", "1")],
    },
    Tweak {
        label: "Disable reserved storage",
        ops: &[dword(
            "HKLM\\zSOFTWARE\\Microsoft\\Windows\\CurrentVersion\\ReserveManager",
            "ShippedWithReserves",
            "0",
        )],
    },
    Tweak {
        label: "Disable BitLocker device encryption",
        ops: &[dword(
            "HKLM\\zSYSTEM\\ControlSet001\\Control\\BitLocker",
            "PreventDeviceEncryption",
            "1",
        )],
    },
    Tweak {
        label: "Disable chat icon",
        ops: &[
            dword("HKLM\\zSOFTWARE\\Policies\\Microsoft\\Windows\\Windows Chat", "ChatIcon", "3"),
            dword(
                "HKLM\\zNTUSER\\SOFTWARE\\Microsoft\\Windows\\CurrentVersion\\Explorer\\Advanced",
                "TaskbarMn",
                "0",
            ),
        ],
    },
    Tweak {
        label: "Remove Edge uninstall entries",
        ops: &[
            delete("HKLM\\zSOFTWARE\\WOW6432Node\\Microsoft\\Windows\\CurrentVersion\\Uninstall\\Microsoft Edge"),
            delete("HKLM\\zSOFTWARE\\WOW6432Node\\Microsoft\\Windows\\CurrentVersion\\Uninstall\\Microsoft Edge Update"),
        ],
    },
    Tweak {
        label: "Disable OneDrive folder backup",
        ops: &[dword(
            "HKLM\\zSOFTWARE\\Policies\\Microsoft\\Windows\\OneDrive",
            "DisableFileSyncNGSC",
            "1",
        )],
    },
    Tweak {
        label: "Disable telemetry",
        ops: &[
            dword("HKLM\\zNTUSER\\Software\\Microsoft\\Windows\\CurrentVersion\\AdvertisingInfo", "Enabled", "0"),
            dword(
                "HKLM\\zNTUSER\\Software\\Microsoft\\Windows\\CurrentVersion\\Privacy",
                "TailoredExperiencesWithDiagnosticDataEnabled",
                "0",
            ),
            dword(
                "HKLM\\zNTUSER\\Software\\Microsoft\\Speech_OneCore\\Settings\\OnlineSpeechPrivacy",
                "HasAccepted",
                "0",
            ),
            dword("HKLM\\zNTUSER\\Software\\Microsoft\\Input\\TIPC", "Enabled", "0"),
            dword("HKLM\\zNTUSER\\Software\\Microsoft\\InputPersonalization", "RestrictImplicitInkCollection", "1"),
            dword("HKLM\\zNTUSER\\Software\\Microsoft\\InputPersonalization", "RestrictImplicitTextCollection", "1"),
            dword(
                "HKLM\\zNTUSER\\Software\\Microsoft\\InputPersonalization\\TrainedDataStore",
                "HarvestContacts",
                "0",
            ),
            dword("HKLM\\zNTUSER\\Software\\Microsoft\\Personalization\\Settings", "AcceptedPrivacyPolicy", "0"),
            dword("HKLM\\zSOFTWARE\\Policies\\Microsoft\\Windows\\DataCollection", "AllowTelemetry", "0"),
            dword("HKLM\\zSYSTEM\\ControlSet001\\Services\\dmwappushservice", "Start", "4"),
        ],
    },
    Tweak {
        label: "Block DevHome and Outlook installs",
        ops: &[
            dword(
                "HKLM\\zSOFTWARE\\Microsoft\\Windows\\CurrentVersion\\WindowsUpdate\\Orchestrator\\UScheduler\\OutlookUpdate",
                "workCompleted",
                "1",
            ),
            dword(
                "HKLM\\zSOFTWARE\\Microsoft\\Windows\\CurrentVersion\\WindowsUpdate\\Orchestrator\\UScheduler\\DevHomeUpdate",
                "workCompleted",
                "1",
            ),
            delete("HKLM\\zSOFTWARE\\Microsoft\\WindowsUpdate\\Orchestrator\\UScheduler_Oobe\\OutlookUpdate"),
            delete("HKLM\\zSOFTWARE\\Microsoft\\WindowsUpdate\\Orchestrator\\UScheduler_Oobe\\DevHomeUpdate"),
        ],
    },
    Tweak {
        label: "Disable Copilot",
        ops: &[
            dword("HKLM\\zSOFTWARE\\Policies\\Microsoft\\Windows\\WindowsCopilot", "TurnOffWindowsCopilot", "1"),
            dword("HKLM\\zSOFTWARE\\Policies\\Microsoft\\Edge", "HubsSidebarEnabled", "0"),
            dword("HKLM\\zSOFTWARE\\Policies\\Microsoft\\Windows\\Explorer", "DisableSearchBoxSuggestions", "1"),
        ],
    },
    Tweak {
        label: "Disable Teams auto-install",
        ops: &[
            dword("HKLM\\zSOFTWARE\\Policies\\Microsoft\\Teams", "DisableInstallation", "1"),
            dword("HKLM\\zSOFTWARE\\Policies\\Microsoft\\Windows\\Windows Mail", "PreventRun", "1"),
        ],
    },
];

static CORE: &[Tweak] = &[
    Tweak {
        label: "Disable Windows Defender",
        ops: &[
            dword("HKLM\\zSYSTEM\\ControlSet001\\Services\\WinDefend", "Start", "4"),
            dword("HKLM\\zSYSTEM\\ControlSet001\\Services\\WdNisSvc", "Start", "4"),
            dword("HKLM\\zSYSTEM\\ControlSet001\\Services\\WdNisDrv", "Start", "4"),
            dword("HKLM\\zSYSTEM\\ControlSet001\\Services\\WdFilter", "Start", "4"),
            dword("HKLM\\zSYSTEM\\ControlSet001\\Services\\Sense", "Start", "4"),
            dword("HKLM\\zSOFTWARE\\Policies\\Microsoft\\Windows Defender", "DisableAntiSpyware", "1"),
            dword(DEFENDER_RTP, "DisableRealtimeMonitoring", "1"),
            dword(DEFENDER_RTP, "DisableBehaviorMonitoring", "1"),
            dword(DEFENDER_RTP, "DisableOnAccessProtection", "1"),
            dword(DEFENDER_RTP, "DisableScanOnRealtimeEnable", "1"),
        ],
    },
    Tweak {
        label: "Disable Windows Update",
        ops: &[
            dword("HKLM\\zSYSTEM\\ControlSet001\\Services\\wuauserv", "Start", "4"),
            dword(WU_POLICY, "DoNotConnectToWindowsUpdateInternetLocations", "1"),
            dword(WU_POLICY, "DisableWindowsUpdateAccess", "1"),
            sz(WU_POLICY, "WUServer", "localhost"),
            sz(WU_POLICY, "WUStatusServer", "localhost"),
            sz(WU_POLICY, "UpdateServiceUrlAlternate", "localhost"),
            dword("HKLM\\zSOFTWARE\\Policies\\Microsoft\\Windows\\WindowsUpdate\\AU", "UseWUServer", "1"),
            dword("HKLM\\zSOFTWARE\\Policies\\Microsoft\\Windows\\WindowsUpdate\\AU", "NoAutoUpdate", "1"),
            dword("HKLM\\zSOFTWARE\\Microsoft\\Windows\\CurrentVersion\\OOBE", "DisableOnline", "1"),
            delete("HKLM\\zSYSTEM\\ControlSet001\\Services\\WaaSMedicSVC"),
            delete("HKLM\\zSYSTEM\\ControlSet001\\Services\\UsoSvc"),
            sz(RUN_ONCE, "StopWUPostOOBE1", "net stop wuauserv"),
            sz(RUN_ONCE, "StopWUPostOOBE2", "sc stop wuauserv"),
            sz(RUN_ONCE, "StopWUPostOOBE3", "sc config wuauserv start= disabled"),
        ],
    },
    HIDE_SETTINGS_PAGES,
];

static NANO: &[Tweak] = &[HIDE_SETTINGS_PAGES];

static BOOT: &[Tweak] = &[BYPASS_REQUIREMENTS];

/// Hive aliases a path refers to, e.g. `zSOFTWARE`.
pub fn alias_of(path: &str) -> Option<&str> {
    path.strip_prefix("HKLM\\")?.split('\\').next()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::session::HIVES;

    #[test]
    fn test_every_path_targets_a_known_hive() {
        for set in [TweakSet::Base, TweakSet::Core, TweakSet::Nano, TweakSet::Boot] {
            for tweak in set.tweaks() {
                assert!(!tweak.ops.is_empty(), "{} has no ops", tweak.label);
                for op in tweak.ops {
                    let path = match op {
                        RegOp::Add { path, .. } | RegOp::Delete { path } => *path,
                    };
                    let alias = alias_of(path).unwrap_or_default();
                    assert!(
                        HIVES.iter().any(|h| h.alias == alias),
                        "{} uses unknown hive {}",
                        tweak.label,
                        alias
                    );
                }
            }
        }
    }

    #[test]
    fn test_boot_set_is_bypass_only() {
        let boot = TweakSet::Boot.tweaks();
        assert_eq!(boot.len(), 1);
        assert!(boot[0].ops.iter().all(|op| matches!(
            op,
            RegOp::Add { path, .. } if path.contains("zSYSTEM") || path.contains("Control Panel")
        )));
    }
}
