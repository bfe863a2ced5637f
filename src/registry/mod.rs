//! Offline registry editing.

pub mod session;
pub mod tweaks;

pub use session::{hive, Hive, RegistryEditSession, TweakReport, HIVES};
pub use tweaks::{RegOp, Tweak, TweakSet};
