//! Concurrent directory-tree copy.
//!
//! The tree is walked once to create directories and plan file tasks, then a
//! bounded pool of scoped worker threads drains the task list. A failing file
//! never stops the other workers; the first error is returned once every task
//! has been attempted.

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use walkdir::WalkDir;

use super::buffer_pool::BufferPool;
use super::progress::{ProgressSink, ProgressTracker, ProgressUpdate, DEFAULT_INTERVAL};
use crate::error::{BuildError, ErrorKind, IoContext, Result};
use crate::log::BuildLog;

/// One file to copy. Consumed exactly once, never retried.
#[derive(Debug, Clone)]
pub struct CopyTask {
    pub src: PathBuf,
    pub dst: PathBuf,
    pub size: u64,
}

/// What a finished copy did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopySummary {
    pub files: usize,
    pub dirs: usize,
    pub bytes: u64,
    pub workers: usize,
    pub failed: usize,
}

pub struct CopyEngine {
    workers: usize,
    interval: Duration,
    pool: BufferPool,
    log: BuildLog,
}

/// Worker count for a configured cap: `min(cap, available parallelism)`.
pub fn worker_count(cap: usize) -> usize {
    let host = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    cap.min(host).max(1)
}

impl CopyEngine {
    /// Engine bounded by `min(max_workers, host parallelism)`.
    pub fn new(max_workers: usize, log: BuildLog) -> Self {
        Self::with_workers(worker_count(max_workers), log)
    }

    /// Engine with an exact worker count (at least one).
    pub fn with_workers(workers: usize, log: BuildLog) -> Self {
        Self {
            workers: workers.max(1),
            interval: DEFAULT_INTERVAL,
            pool: BufferPool::new(),
            log,
        }
    }

    pub fn progress_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Copy `src` into `dst`, creating `dst` if needed.
    pub fn copy_tree(&self, src: &Path, dst: &Path, sink: &dyn ProgressSink) -> Result<CopySummary> {
        if !src.is_dir() {
            return Err(BuildError::not_found("copy source is not a directory")
                .with_context("path", src.display()));
        }

        let plan = plan(src, dst, &self.log)?;
        let total: u64 = plan.tasks.iter().map(|t| t.size).sum();
        self.log.debug(format!(
            "copy plan: {} files, {} dirs, {} bytes, {} workers",
            plan.tasks.len(),
            plan.dirs,
            total,
            self.workers
        ));

        let tracker = ProgressTracker::new(total, plan.tasks.len(), self.interval, sink);
        let next = AtomicUsize::new(0);
        let failed = AtomicUsize::new(0);
        let first_error: Mutex<Option<BuildError>> = Mutex::new(plan.walk_error);
        let tasks = &plan.tasks;

        std::thread::scope(|scope| {
            for _ in 0..self.workers.min(tasks.len().max(1)) {
                scope.spawn(|| loop {
                    let i = next.fetch_add(1, Ordering::Relaxed);
                    let Some(task) = tasks.get(i) else {
                        break;
                    };
                    match self.copy_file(task, &tracker) {
                        Ok(()) => tracker.file_done(),
                        Err(e) => {
                            failed.fetch_add(1, Ordering::Relaxed);
                            self.log.warn(format!("copy failed: {}", e));
                            if let Ok(mut slot) = first_error.lock() {
                                slot.get_or_insert(e);
                            }
                        }
                    }
                });
            }
        });

        let ProgressUpdate { copied, .. } = tracker.finish();

        let first_error = match first_error.into_inner() {
            Ok(e) => e,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(err) = first_error {
            return Err(err.with_context("failed_files", failed.load(Ordering::Relaxed)));
        }

        Ok(CopySummary {
            files: tasks.len(),
            dirs: plan.dirs,
            bytes: copied,
            workers: self.workers,
            failed: 0,
        })
    }

    fn copy_file(&self, task: &CopyTask, tracker: &ProgressTracker<'_>) -> Result<()> {
        let mut reader = File::open(&task.src).with_path("open source file", &task.src)?;
        let mut writer = File::create(&task.dst).with_path("create destination file", &task.dst)?;
        let mut buf = self.pool.acquire(task.size);

        loop {
            let n = match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e).with_path("read source file", &task.src),
            };
            writer
                .write_all(&buf[..n])
                .with_path("write destination file", &task.dst)?;
            tracker.add_bytes(n as u64);
        }
        Ok(())
    }
}

struct Plan {
    tasks: Vec<CopyTask>,
    dirs: usize,
    walk_error: Option<BuildError>,
}

/// Walk `src` once: create every destination directory and list the files.
fn plan(src: &Path, dst: &Path, log: &BuildLog) -> Result<Plan> {
    fs::create_dir_all(dst).with_path("create destination root", dst)?;

    let mut tasks = Vec::new();
    let mut dirs = 0;
    let mut walk_error = None;

    for entry in WalkDir::new(src).min_depth(1) {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                log.warn(format!("cannot read source entry: {}", e));
                let path = e.path().map(|p| p.display().to_string()).unwrap_or_default();
                walk_error.get_or_insert(
                    BuildError::new(ErrorKind::General, format!("walk failed: {}", e))
                        .with_context("path", path),
                );
                continue;
            }
        };

        let rel = match entry.path().strip_prefix(src) {
            Ok(r) => r,
            Err(_) => continue,
        };
        let target = dst.join(rel);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target).with_path("create directory", &target)?;
            dirs += 1;
        } else if entry.file_type().is_file() {
            let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
            tasks.push(CopyTask {
                src: entry.path().to_path_buf(),
                dst: target,
                size,
            });
        } else {
            log.debug(format!("skipping special file {}", entry.path().display()));
        }
    }

    Ok(Plan {
        tasks,
        dirs,
        walk_error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::copy::progress::NoProgress;
    use tempfile::TempDir;

    fn engine(workers: usize) -> CopyEngine {
        CopyEngine::with_workers(workers, BuildLog::new("copy-test")).progress_interval(Duration::ZERO)
    }

    #[test]
    fn test_copies_nested_tree() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("src");
        fs::create_dir_all(src.join("sources/sxs")).unwrap();
        fs::create_dir_all(src.join("empty")).unwrap();
        fs::write(src.join("setup.exe"), b"MZ").unwrap();
        fs::write(src.join("sources/boot.wim"), vec![7u8; 5000]).unwrap();

        let dst = tmp.path().join("dst");
        let summary = engine(3).copy_tree(&src, &dst, &NoProgress).unwrap();

        assert_eq!(summary.files, 2);
        assert_eq!(summary.bytes, 5002);
        assert_eq!(summary.dirs, 3);
        assert!(dst.join("empty").is_dir());
        assert!(dst.join("sources/sxs").is_dir());
        assert_eq!(fs::read(dst.join("sources/boot.wim")).unwrap().len(), 5000);
    }

    #[test]
    fn test_missing_source() {
        let tmp = TempDir::new().unwrap();
        let err = engine(1)
            .copy_tree(&tmp.path().join("nope"), &tmp.path().join("dst"), &NoProgress)
            .unwrap_err();
        assert!(err.is(ErrorKind::NotFound));
    }

    #[test]
    fn test_worker_count_is_capped() {
        assert_eq!(worker_count(1), 1);
        assert!(worker_count(8) <= 8);
        assert!(worker_count(0) >= 1);
    }
}
