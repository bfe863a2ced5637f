//! Typed wrappers over the Windows servicing tools.
//!
//! Each wrapper only builds argument lists and classifies failures; all
//! process spawning goes through the shared [`ToolRunner`](crate::process::ToolRunner).

pub mod acl;
pub mod dism;
pub mod parse;
pub mod reg;

pub use acl::Acl;
pub use dism::{Compression, Dism};
pub use reg::Reg;
