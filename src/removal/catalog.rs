//! What gets removed. Static data only; the removers interpret it.
//!
//! Relative paths use `/` and are joined onto the mount root. Name patterns
//! are shell-style wildcards matched case-insensitively.

/// Provisioned app name fragments removed by every variant (case-sensitive
/// substring match against the full package name).
pub const STANDARD_APPS: &[&str] = &[
    "AppUp.IntelManagementandSecurityStatus",
    "Clipchamp.Clipchamp",
    "DolbyLaboratories.DolbyAccess",
    "DolbyLaboratories.DolbyDigitalPlusDecoderOEM",
    "Microsoft.BingNews",
    "Microsoft.BingSearch",
    "Microsoft.BingWeather",
    "Microsoft.Copilot",
    "Microsoft.Windows.CrossDevice",
    "Microsoft.GamingApp",
    "Microsoft.GetHelp",
    "Microsoft.Getstarted",
    "Microsoft.Microsoft3DViewer",
    "Microsoft.MicrosoftOfficeHub",
    "Microsoft.MicrosoftSolitaireCollection",
    "Microsoft.MicrosoftStickyNotes",
    "Microsoft.MixedReality.Portal",
    "Microsoft.MSPaint",
    "Microsoft.Office.OneNote",
    "Microsoft.OfficePushNotificationUtility",
    "Microsoft.OutlookForWindows",
    "Microsoft.Paint",
    "Microsoft.People",
    "Microsoft.PowerAutomateDesktop",
    "Microsoft.SkypeApp",
    "Microsoft.StartExperiencesApp",
    "Microsoft.Todos",
    "Microsoft.Wallet",
    "Microsoft.Windows.DevHome",
    "Microsoft.Windows.Copilot",
    "Microsoft.Windows.Teams",
    "Microsoft.WindowsAlarms",
    "Microsoft.WindowsCamera",
    "microsoft.windowscommunicationsapps",
    "Microsoft.WindowsFeedbackHub",
    "Microsoft.WindowsMaps",
    "Microsoft.WindowsSoundRecorder",
    "Microsoft.WindowsTerminal",
    "Microsoft.Xbox.TCUI",
    "Microsoft.XboxApp",
    "Microsoft.XboxGameOverlay",
    "Microsoft.XboxGamingOverlay",
    "Microsoft.XboxIdentityProvider",
    "Microsoft.XboxSpeechToTextOverlay",
    "Microsoft.YourPhone",
    "Microsoft.ZuneMusic",
    "Microsoft.ZuneVideo",
    "MicrosoftCorporationII.MicrosoftFamily",
    "MicrosoftCorporationII.QuickAssist",
    "MSTeams",
    "MicrosoftTeams",
    "Microsoft.549981C3F5F10",
];

/// Extra app patterns for nano. Also used to find `WindowsApps` leftovers.
pub const NANO_APP_PATTERNS: &[&str] = &[
    "*Photos*",
    "*Camera*",
    "*Paint*",
    "*Notepad*",
    "*QuickAssist*",
    "*CoreAI*",
    "*PeopleExperienceHost*",
    "*PinningConfirmationDialog*",
    "*SecureAssessmentBrowser*",
    "*AV1VideoExtension*",
    "*AVCEncoderVideoExtension*",
    "*HEIFImageExtension*",
    "*HEVCVideoExtension*",
    "*RawImageExtension*",
    "*VP9VideoExtensions*",
    "*WebpImageExtension*",
    "*SecHealthUI*",
    "*CompatibilityEnhancements*",
];

/// System packages removed by core. `{lang}` is the image language.
pub const CORE_PACKAGES: &[&str] = &[
    "Microsoft-Windows-InternetExplorer-Optional-Package~31bf3856ad364e35",
    "Microsoft-Windows-Kernel-LA57-FoD-Package~31bf3856ad364e35~amd64",
    "Microsoft-Windows-LanguageFeatures-Handwriting-{lang}-Package~31bf3856ad364e35",
    "Microsoft-Windows-LanguageFeatures-OCR-{lang}-Package~31bf3856ad364e35",
    "Microsoft-Windows-LanguageFeatures-Speech-{lang}-Package~31bf3856ad364e35",
    "Microsoft-Windows-LanguageFeatures-TextToSpeech-{lang}-Package~31bf3856ad364e35",
    "Microsoft-Windows-MediaPlayer-Package~31bf3856ad364e35",
    "Microsoft-Windows-Wallpaper-Content-Extended-FoD-Package~31bf3856ad364e35",
    "Windows-Defender-Client-Package~31bf3856ad364e35~",
    "Microsoft-Windows-WordPad-FoD-Package~",
    "Microsoft-Windows-TabletPCMath-Package~",
    "Microsoft-Windows-StepsRecorder-Package~",
];

/// System packages removed by nano. `*x*` patterns match case-insensitively.
pub const NANO_PACKAGES: &[&str] = &[
    "Microsoft-Windows-InternetExplorer-Optional-Package~",
    "Microsoft-Windows-MediaPlayer-Package~",
    "Microsoft-Windows-WordPad-FoD-Package~",
    "Microsoft-Windows-StepsRecorder-Package~",
    "Microsoft-Windows-MSPaint-FoD-Package~",
    "Microsoft-Windows-SnippingTool-FoD-Package~",
    "Microsoft-Windows-TabletPCMath-Package~",
    "Microsoft-Windows-Xps-Xps-Viewer-Opt-Package~",
    "Microsoft-Windows-PowerShell-ISE-FOD-Package~",
    "OpenSSH-Client-Package~",
    "Microsoft-Windows-LanguageFeatures-Handwriting-{lang}-Package~",
    "Microsoft-Windows-LanguageFeatures-OCR-{lang}-Package~",
    "Microsoft-Windows-LanguageFeatures-Speech-{lang}-Package~",
    "Microsoft-Windows-LanguageFeatures-TextToSpeech-{lang}-Package~",
    "*IME-ja-jp*",
    "*IME-ko-kr*",
    "*IME-zh-cn*",
    "*IME-zh-tw*",
    "Windows-Defender-Client-Package~",
    "Microsoft-Windows-Search-Engine-Client-Package~",
    "Microsoft-Windows-Kernel-LA57-FoD-Package~",
    "Microsoft-Windows-Hello-Face-Package~",
    "Microsoft-Windows-Hello-BioEnrollment-Package~",
    "Microsoft-Windows-BitLocker-DriveEncryption-FVE-Package~",
    "Microsoft-Windows-TPM-WMI-Provider-Package~",
    "Microsoft-Windows-Narrator-App-Package~",
    "Microsoft-Windows-Magnifier-App-Package~",
    "Microsoft-Windows-Printing-PMCPPC-FoD-Package~",
    "Microsoft-Windows-WebcamExperience-Package~",
    "Microsoft-Media-MPEG2-Decoder-Package~",
    "Microsoft-Windows-Wallpaper-Content-Extended-FoD-Package~",
];

/// Substitute the image language into a package list.
pub fn with_language(patterns: &[&str], language: &str) -> Vec<String> {
    patterns
        .iter()
        .map(|p| p.replace("{lang}", language))
        .collect()
}

pub const EDGE_DIRS: &[&str] = &[
    "Program Files (x86)/Microsoft/Edge",
    "Program Files (x86)/Microsoft/EdgeUpdate",
    "Program Files (x86)/Microsoft/EdgeCore",
];

pub const EDGE_WEBVIEW: &str = "Windows/System32/Microsoft-Edge-Webview";

pub const ONEDRIVE_SETUP: &str = "Windows/System32/OneDriveSetup.exe";

/// Telemetry tasks; entries may be single task files or whole folders.
pub const SCHEDULED_TASKS: &[&str] = &[
    "Windows/System32/Tasks/Microsoft/Windows/Application Experience/Microsoft Compatibility Appraiser",
    "Windows/System32/Tasks/Microsoft/Windows/Application Experience/ProgramDataUpdater",
    "Windows/System32/Tasks/Microsoft/Windows/Customer Experience Improvement Program",
    "Windows/System32/Tasks/Microsoft/Windows/Chkdsk/Proxy",
    "Windows/System32/Tasks/Microsoft/Windows/Windows Error Reporting/QueueReporting",
];

pub const RECOVERY_DIR: &str = "Windows/System32/Recovery";

pub const WINSXS: &str = "Windows/WinSxS";
pub const WINSXS_EDIT: &str = "Windows/WinSxS_edit";

const WINSXS_COMMON: &[&str] = &["Catalogs", "FileMaps", "Fusion", "InstallTemp", "Manifests"];

const WINSXS_AMD64: &[&str] = &[
    "x86_microsoft.windows.common-controls_6595b64144ccf1df_*",
    "x86_microsoft.windows.gdiplus_6595b64144ccf1df_*",
    "x86_microsoft.windows.i..utomation.proxystub_6595b64144ccf1df_*",
    "x86_microsoft.windows.isolationautomation_6595b64144ccf1df_*",
    "x86_microsoft-windows-s..ngstack-onecorebase_31bf3856ad364e35_*",
    "x86_microsoft-windows-s..stack-termsrv-extra_31bf3856ad364e35_*",
    "x86_microsoft-windows-servicingstack_31bf3856ad364e35_*",
    "x86_microsoft-windows-servicingstack-inetsrv_*",
    "x86_microsoft-windows-servicingstack-onecore_*",
    "x86_microsoft.vc80.crt_1fc8b3b9a1e18e3b_*",
    "x86_microsoft.vc90.crt_1fc8b3b9a1e18e3b_*",
    "x86_microsoft.windows.c..-controls.resources_6595b64144ccf1df_*",
    "amd64_microsoft.vc80.crt_1fc8b3b9a1e18e3b_*",
    "amd64_microsoft.vc90.crt_1fc8b3b9a1e18e3b_*",
    "amd64_microsoft.windows.c..-controls.resources_6595b64144ccf1df_*",
    "amd64_microsoft.windows.common-controls_6595b64144ccf1df_*",
    "amd64_microsoft.windows.gdiplus_6595b64144ccf1df_*",
    "amd64_microsoft.windows.i..utomation.proxystub_6595b64144ccf1df_*",
    "amd64_microsoft.windows.isolationautomation_6595b64144ccf1df_*",
    "amd64_microsoft-windows-s..stack-inetsrv-extra_31bf3856ad364e35_*",
    "amd64_microsoft-windows-s..stack-msg.resources_31bf3856ad364e35_*",
    "amd64_microsoft-windows-s..stack-termsrv-extra_31bf3856ad364e35_*",
    "amd64_microsoft-windows-servicingstack_31bf3856ad364e35_*",
    "amd64_microsoft-windows-servicingstack-inetsrv_31bf3856ad364e35_*",
    "amd64_microsoft-windows-servicingstack-msg_31bf3856ad364e35_*",
    "amd64_microsoft-windows-servicingstack-onecore_31bf3856ad364e35_*",
];

const WINSXS_ARM64: &[&str] = &[
    "x86_microsoft.vc80.crt_1fc8b3b9a1e18e3b_*",
    "x86_microsoft.vc90.crt_1fc8b3b9a1e18e3b_*",
    "x86_microsoft.windows.c..-controls.resources_6595b64144ccf1df_*",
    "x86_microsoft.windows.common-controls_6595b64144ccf1df_*",
    "x86_microsoft.windows.gdiplus_6595b64144ccf1df_*",
    "x86_microsoft.windows.i..utomation.proxystub_6595b64144ccf1df_*",
    "x86_microsoft.windows.isolationautomation_6595b64144ccf1df_*",
    "arm_microsoft.windows.c..-controls.resources_6595b64144ccf1df_*",
    "arm_microsoft.windows.common-controls_6595b64144ccf1df_*",
    "arm_microsoft.windows.gdiplus_6595b64144ccf1df_*",
    "arm_microsoft.windows.i..utomation.proxystub_6595b64144ccf1df_*",
    "arm_microsoft.windows.isolationautomation_6595b64144ccf1df_*",
    "arm64_microsoft.vc80.crt_1fc8b3b9a1e18e3b_*",
    "arm64_microsoft.vc90.crt_1fc8b3b9a1e18e3b_*",
    "arm64_microsoft.windows.c..-controls.resources_6595b64144ccf1df_*",
    "arm64_microsoft.windows.common-controls_6595b64144ccf1df_*",
    "arm64_microsoft.windows.gdiplus_6595b64144ccf1df_*",
    "arm64_microsoft.windows.i..utomation.proxystub_6595b64144ccf1df_*",
    "arm64_microsoft.windows.isolationautomation_6595b64144ccf1df_*",
    "arm64_microsoft-windows-servicing-adm_31bf3856ad364e35_*",
    "arm64_microsoft-windows-servicingcommon_31bf3856ad364e35_*",
    "arm64_microsoft-windows-servicing-onecore-uapi_31bf3856ad364e35_*",
    "arm64_microsoft-windows-servicingstack_31bf3856ad364e35_*",
    "arm64_microsoft-windows-servicingstack-inetsrv_31bf3856ad364e35_*",
    "arm64_microsoft-windows-servicingstack-msg_31bf3856ad364e35_*",
    "arm64_microsoft-windows-servicingstack-onecore_31bf3856ad364e35_*",
];

/// WinSxS entries that survive slimming for an architecture.
pub fn winsxs_keep(arch: &str) -> Vec<&'static str> {
    let specific: &[&str] = match arch {
        "amd64" => WINSXS_AMD64,
        "arm64" => WINSXS_ARM64,
        _ => &[],
    };
    WINSXS_COMMON.iter().chain(specific).copied().collect()
}

pub const ASSEMBLY_DIR: &str = "Windows/assembly";
pub const NATIVE_IMAGES_PREFIX: &str = "NativeImages_";

pub const DRIVER_REPOSITORY: &str = "Windows/System32/DriverStore/FileRepository";

/// Driver packages dropped by nano: printers, scanners, smart cards, tape,
/// RDP bus, Bluetooth PAN.
pub const DRIVER_PATTERNS: &[&str] = &[
    "prn*",
    "scan*",
    "mfd*",
    "wscsmd.inf*",
    "tapdrv*",
    "rdpbus.inf*",
    "tdibth.inf*",
];

pub const FONTS_DIR: &str = "Windows/Fonts";

pub const FONT_KEEP: &[&str] = &[
    "segoe*",
    "tahoma*",
    "marlett.ttf",
    "8541oem.fon",
    "segui*",
    "consol*",
    "lucon*",
    "calibri*",
    "arial*",
    "times*",
    "cou*",
    "8*",
];

/// Removed even when a keep pattern matches.
pub const FONT_REMOVE: &[&str] = &[
    "mingli*",
    "msjh*",
    "msyh*",
    "malgun*",
    "meiryo*",
    "yugoth*",
    "segoeuihistoric.ttf",
];

pub const NANO_FOLDERS: &[&str] = &[
    "Windows/Speech/Engines/TTS",
    "ProgramData/Microsoft/Windows Defender/Definition Updates",
    "Windows/System32/InputMethod/CHS",
    "Windows/System32/InputMethod/CHT",
    "Windows/System32/InputMethod/JPN",
    "Windows/System32/InputMethod/KOR",
    "Windows/Temp",
    "Windows/Web",
    "Windows/Help",
    "Windows/Cursors",
];

/// Taken over up front by nano so later deletes do not hit ACLs.
pub const NANO_OWNED_DIRS: &[&str] = &[
    "Windows/System32/DriverStore/FileRepository",
    "Windows/Fonts",
    "Windows/Web",
    "Windows/Help",
    "Windows/Cursors",
    "Program Files (x86)/Microsoft",
    "Program Files/WindowsApps",
    "Windows/System32/Microsoft-Edge-Webview",
    "Windows/System32/Recovery",
    "Windows/WinSxS",
    "Windows/assembly",
    "ProgramData/Microsoft/Windows Defender",
    "Windows/System32/InputMethod",
    "Windows/Speech",
    "Windows/Temp",
];

pub const NANO_OWNED_FILES: &[&str] = &[ONEDRIVE_SETUP];

pub const WINDOWS_APPS: &str = "Program Files/WindowsApps";

/// Services deleted from `ControlSet001` by nano.
pub const NANO_SERVICES: &[&str] = &[
    "Spooler",
    "PrintNotify",
    "Fax",
    "RemoteRegistry",
    "diagsvc",
    "WerSvc",
    "PcaSvc",
    "MapsBroker",
    "WalletService",
    "BthAvctpSvc",
    "BluetoothUserService",
    "wuauserv",
    "UsoSvc",
    "WaaSMedicSvc",
];
