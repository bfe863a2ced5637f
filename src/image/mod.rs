//! Image lifecycle: source media, inspection, mounting, export.

pub mod export;
pub mod info;
pub mod mount;
pub mod source;

pub use export::{ExportReport, ExportRequest, ExportRetryPolicy, Finish, Fs2Probe, SpaceProbe};
pub use info::{ImageEntry, ImageInfo};
pub use mount::{ImageMountGuard, MountState};
pub use source::{validate_source, ConvertedEsd, InstallFormat, SourceLayout};
