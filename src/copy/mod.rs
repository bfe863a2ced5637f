//! Bulk staging of the source tree.

pub mod buffer_pool;
pub mod engine;
pub mod progress;
pub mod verify;

pub use buffer_pool::{BufferClass, BufferPool};
pub use engine::{CopyEngine, CopySummary, CopyTask};
pub use progress::{NoProgress, ProgressSink, ProgressUpdate};
pub use verify::{tree_digest, verify_copy, TreeDiff};
