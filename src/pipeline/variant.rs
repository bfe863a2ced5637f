//! Variants and their step lists.
//!
//! Steps are static data. Every step lists the variants it belongs to, and
//! a variant's pipeline is the master table filtered to its members, so the
//! order is shared and `core` and `nano` extend `standard` without
//! reordering it.

use std::fmt;
use std::str::FromStr;

use super::state::BuildState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Variant {
    Standard,
    Core,
    Nano,
}

impl Variant {
    pub const ALL: [Variant; 3] = [Variant::Standard, Variant::Core, Variant::Nano];

    pub fn name(self) -> &'static str {
        match self {
            Variant::Standard => "standard",
            Variant::Core => "core",
            Variant::Nano => "nano",
        }
    }

    /// Core and nano cannot be serviced after install.
    pub fn needs_confirmation(self) -> bool {
        self != Variant::Standard
    }

    /// Whether the final export runs with `/CheckIntegrity`. The ESD export
    /// skips it.
    pub fn export_integrity(self) -> bool {
        self != Variant::Nano
    }

    /// File name the install image is exported to.
    pub fn export_target(self) -> &'static str {
        match self {
            Variant::Nano => "install.esd",
            _ => "install2.wim",
        }
    }

    /// The step list for one run.
    pub fn steps(self, netfx3: bool) -> Vec<Step> {
        STEPS
            .iter()
            .filter(|def| def.members.contains(&self))
            .filter(|def| def.id != StepId::EnableNetFx3 || netfx3)
            .enumerate()
            .map(|(i, def)| Step {
                ordinal: i + 1,
                id: def.id,
                label: def.label,
                policy: def.policy,
            })
            .collect()
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Variant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "standard" => Ok(Variant::Standard),
            "core" => Ok(Variant::Core),
            "nano" => Ok(Variant::Nano),
            other => Err(format!("unknown variant '{}' (expected standard, core or nano)", other)),
        }
    }
}

/// What a failing step does to the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    /// Abort, run emergency cleanup, return the error.
    Fatal,
    /// Warn and continue.
    Soft,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepId {
    ValidateSource,
    StageFiles,
    ConvertEsd,
    InspectImage,
    MountInstall,
    TakeOwnership,
    RemoveApps,
    RemoveExtraApps,
    RemoveSystemPackages,
    EnableNetFx3,
    RemoveNativeImages,
    RemoveDrivers,
    RemoveFonts,
    RemoveSystemFolders,
    RemoveEdge,
    RemoveOneDrive,
    RemoveScheduledTasks,
    DisableWinRe,
    CleanupImage,
    SlimWinSxS,
    StagePreinstall,
    LoadHives,
    ApplyTweaks,
    ApplyCoreTweaks,
    ApplyNanoTweaks,
    ApplyTheme,
    UnloadHives,
    RemoveServices,
    InstallAnswerFile,
    UnmountInstall,
    ExportInstall,
    ProcessBootImage,
    TrimIsoRoot,
    CreateIso,
}

impl StepId {
    /// Session state while this step runs.
    pub fn state(self) -> BuildState {
        use StepId::*;
        match self {
            ValidateSource => BuildState::Validating,
            StageFiles | ConvertEsd => BuildState::StagingFiles,
            InspectImage => BuildState::Inspecting,
            MountInstall | TakeOwnership | RemoveApps | RemoveExtraApps | RemoveSystemPackages
            | EnableNetFx3 | RemoveNativeImages | RemoveDrivers | RemoveFonts
            | RemoveSystemFolders | RemoveEdge | RemoveOneDrive | RemoveScheduledTasks
            | DisableWinRe | CleanupImage | SlimWinSxS | StagePreinstall => BuildState::Editing,
            LoadHives | ApplyTweaks | ApplyCoreTweaks | ApplyNanoTweaks | ApplyTheme
            | UnloadHives | RemoveServices | InstallAnswerFile => BuildState::RegistryPass,
            UnmountInstall => BuildState::Unmounted,
            ExportInstall => BuildState::Exporting,
            ProcessBootImage => BuildState::BootImageEditing,
            TrimIsoRoot | CreateIso => BuildState::Packaging,
        }
    }
}

/// One entry of a run's step list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    pub ordinal: usize,
    pub id: StepId,
    pub label: &'static str,
    pub policy: Policy,
}

struct StepDef {
    id: StepId,
    label: &'static str,
    policy: Policy,
    members: &'static [Variant],
}

const ALL: &[Variant] = &[Variant::Standard, Variant::Core, Variant::Nano];
const CORE_UP: &[Variant] = &[Variant::Core, Variant::Nano];
const NANO: &[Variant] = &[Variant::Nano];

const fn fatal(id: StepId, label: &'static str, members: &'static [Variant]) -> StepDef {
    StepDef {
        id,
        label,
        policy: Policy::Fatal,
        members,
    }
}

const fn soft(id: StepId, label: &'static str, members: &'static [Variant]) -> StepDef {
    StepDef {
        id,
        label,
        policy: Policy::Soft,
        members,
    }
}

static STEPS: &[StepDef] = &[
    fatal(StepId::ValidateSource, "Validate source media", ALL),
    fatal(StepId::StageFiles, "Copy source media to staging", ALL),
    fatal(StepId::ConvertEsd, "Convert install.esd", ALL),
    fatal(StepId::InspectImage, "Read image information", ALL),
    fatal(StepId::MountInstall, "Mount install image", ALL),
    soft(StepId::TakeOwnership, "Take ownership of protected folders", NANO),
    fatal(StepId::RemoveApps, "Remove provisioned apps", ALL),
    soft(StepId::RemoveExtraApps, "Remove extended app list", NANO),
    soft(StepId::RemoveSystemPackages, "Remove system packages", CORE_UP),
    soft(StepId::EnableNetFx3, "Enable .NET Framework 3.5", CORE_UP),
    soft(StepId::RemoveNativeImages, "Remove .NET native images", NANO),
    soft(StepId::RemoveDrivers, "Slim the driver store", NANO),
    soft(StepId::RemoveFonts, "Slim fonts", NANO),
    soft(StepId::RemoveSystemFolders, "Remove system folders", NANO),
    soft(StepId::RemoveEdge, "Remove Edge", ALL),
    soft(StepId::RemoveOneDrive, "Remove OneDrive", ALL),
    soft(StepId::RemoveScheduledTasks, "Remove telemetry tasks", ALL),
    soft(StepId::DisableWinRe, "Disable WinRE", CORE_UP),
    soft(StepId::CleanupImage, "Clean up component store", ALL),
    fatal(StepId::SlimWinSxS, "Slim WinSxS", CORE_UP),
    soft(StepId::StagePreinstall, "Stage preinstalled software", ALL),
    fatal(StepId::LoadHives, "Load registry hives", ALL),
    soft(StepId::ApplyTweaks, "Apply registry tweaks", ALL),
    soft(StepId::ApplyCoreTweaks, "Disable Defender and Windows Update", CORE_UP),
    soft(StepId::ApplyNanoTweaks, "Hide settings pages", NANO),
    soft(StepId::ApplyTheme, "Apply theme", ALL),
    soft(StepId::UnloadHives, "Unload registry hives", ALL),
    soft(StepId::RemoveServices, "Remove services", NANO),
    soft(StepId::InstallAnswerFile, "Install answer file", ALL),
    fatal(StepId::UnmountInstall, "Unmount and commit install image", ALL),
    fatal(StepId::ExportInstall, "Export install image", ALL),
    fatal(StepId::ProcessBootImage, "Process boot image", ALL),
    soft(StepId::TrimIsoRoot, "Trim ISO root", NANO),
    fatal(StepId::CreateIso, "Create ISO", ALL),
];

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(steps: &[Step]) -> Vec<StepId> {
        steps.iter().map(|s| s.id).collect()
    }

    fn is_subsequence(small: &[StepId], big: &[StepId]) -> bool {
        let mut it = big.iter();
        small.iter().all(|s| it.any(|b| b == s))
    }

    #[test]
    fn test_variants_extend_in_order() {
        for netfx3 in [false, true] {
            let standard = ids(&Variant::Standard.steps(netfx3));
            let core = ids(&Variant::Core.steps(netfx3));
            let nano = ids(&Variant::Nano.steps(netfx3));
            assert!(is_subsequence(&standard, &core));
            assert!(is_subsequence(&core, &nano));
            assert!(standard.len() < core.len() && core.len() < nano.len());
        }
    }

    #[test]
    fn test_ordinals_and_netfx3_toggle() {
        let steps = Variant::Core.steps(false);
        assert!(steps.iter().enumerate().all(|(i, s)| s.ordinal == i + 1));
        assert!(!ids(&steps).contains(&StepId::EnableNetFx3));
        assert!(ids(&Variant::Core.steps(true)).contains(&StepId::EnableNetFx3));
        assert!(!ids(&Variant::Standard.steps(true)).contains(&StepId::EnableNetFx3));
    }

    #[test]
    fn test_states_never_go_back() {
        for v in Variant::ALL {
            let states: Vec<_> = v.steps(true).iter().map(|s| s.id.state()).collect();
            assert!(states.windows(2).all(|w| w[0] <= w[1]), "{}", v);
        }
    }

    #[test]
    fn test_parse_and_targets() {
        assert_eq!("NANO".parse::<Variant>().unwrap(), Variant::Nano);
        assert!("tiny".parse::<Variant>().is_err());
        assert_eq!(Variant::Nano.export_target(), "install.esd");
        assert_eq!(Variant::Core.export_target(), "install2.wim");
        assert!(!Variant::Standard.needs_confirmation());
    }
}
