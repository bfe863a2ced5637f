//! tiny11 library exports.
//!
//! Every pipeline component is public so integration tests can drive it
//! with a scripted [`process::ToolRunner`].

pub mod config;
pub mod copy;
pub mod customize;
pub mod error;
pub mod image;
pub mod iso;
pub mod log;
pub mod pipeline;
pub mod preflight;
pub mod process;
pub mod registry;
pub mod removal;
pub mod timing;
pub mod tools;
