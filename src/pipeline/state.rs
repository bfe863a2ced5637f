//! Build session state machine.

use std::fmt;

/// Where a session is. Declaration order is progress order; `Aborted` is
/// terminal and reachable from any non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BuildState {
    Created,
    Validating,
    StagingFiles,
    Inspecting,
    Editing,
    RegistryPass,
    Unmounted,
    Exporting,
    BootImageEditing,
    Packaging,
    Cleanup,
    Done,
    Aborted,
}

impl BuildState {
    pub fn is_terminal(self) -> bool {
        matches!(self, BuildState::Done | BuildState::Aborted)
    }

    /// Whether `next` is a legal move from here.
    pub fn can_advance_to(self, next: BuildState) -> bool {
        if self.is_terminal() {
            return false;
        }
        next == BuildState::Aborted || next >= self
    }
}

impl fmt::Display for BuildState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BuildState::Created => "created",
            BuildState::Validating => "validating",
            BuildState::StagingFiles => "staging files",
            BuildState::Inspecting => "inspecting",
            BuildState::Editing => "editing",
            BuildState::RegistryPass => "registry pass",
            BuildState::Unmounted => "unmounted",
            BuildState::Exporting => "exporting",
            BuildState::BootImageEditing => "boot image editing",
            BuildState::Packaging => "packaging",
            BuildState::Cleanup => "cleanup",
            BuildState::Done => "done",
            BuildState::Aborted => "aborted",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transitions() {
        assert!(BuildState::Created.can_advance_to(BuildState::Validating));
        assert!(BuildState::Editing.can_advance_to(BuildState::Editing));
        assert!(!BuildState::Exporting.can_advance_to(BuildState::Editing));
        assert!(BuildState::Packaging.can_advance_to(BuildState::Aborted));
        assert!(!BuildState::Done.can_advance_to(BuildState::Aborted));
        assert!(!BuildState::Aborted.can_advance_to(BuildState::Cleanup));
    }
}
