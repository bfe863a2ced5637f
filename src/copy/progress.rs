//! Rate-limited progress accumulation for the copy engine.

use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Default coalescing window (roughly ten updates per second).
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(100);

/// Snapshot handed to a [`ProgressSink`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressUpdate {
    /// Bytes copied so far (cumulative, never decreases).
    pub copied: u64,
    /// Total bytes planned.
    pub total: u64,
    pub files_done: usize,
    pub files_total: usize,
    /// True for the forced update emitted on completion.
    pub finished: bool,
}

impl ProgressUpdate {
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            100.0
        } else {
            self.copied as f64 * 100.0 / self.total as f64
        }
    }
}

/// Receives progress snapshots. Called with the accumulator lock held, so
/// implementations must not block.
pub trait ProgressSink: Sync {
    fn report(&self, update: ProgressUpdate);
}

/// Discards updates.
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _update: ProgressUpdate) {}
}

impl<F> ProgressSink for F
where
    F: Fn(ProgressUpdate) + Sync,
{
    fn report(&self, update: ProgressUpdate) {
        self(update)
    }
}

struct State {
    copied: u64,
    files_done: usize,
    last_emit: Option<Instant>,
}

/// Shared, mutex-guarded byte counter with throttled reporting.
pub struct ProgressTracker<'a> {
    state: Mutex<State>,
    total: u64,
    files_total: usize,
    interval: Duration,
    sink: &'a dyn ProgressSink,
}

impl<'a> ProgressTracker<'a> {
    pub fn new(total: u64, files_total: usize, interval: Duration, sink: &'a dyn ProgressSink) -> Self {
        Self {
            state: Mutex::new(State {
                copied: 0,
                files_done: 0,
                last_emit: None,
            }),
            total,
            files_total,
            interval,
            sink,
        }
    }

    /// Record copied bytes; emits if the window elapsed.
    pub fn add_bytes(&self, n: u64) {
        self.bump(n, 0);
    }

    pub fn file_done(&self) {
        self.bump(0, 1);
    }

    fn bump(&self, bytes: u64, files: usize) {
        let Ok(mut st) = self.state.lock() else {
            return;
        };
        st.copied += bytes;
        st.files_done += files;

        let now = Instant::now();
        let due = st
            .last_emit
            .map_or(true, |t| now.duration_since(t) >= self.interval);
        if due {
            st.last_emit = Some(now);
            self.sink.report(self.snapshot(&st, false));
        }
    }

    /// Emit the final update regardless of the window.
    pub fn finish(&self) -> ProgressUpdate {
        let update = match self.state.lock() {
            Ok(st) => self.snapshot(&st, true),
            Err(poisoned) => self.snapshot(&poisoned.into_inner(), true),
        };
        self.sink.report(update);
        update
    }

    fn snapshot(&self, st: &State, finished: bool) -> ProgressUpdate {
        ProgressUpdate {
            copied: st.copied,
            total: self.total,
            files_done: st.files_done,
            files_total: self.files_total,
            finished,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_throttles_and_forces_final() {
        let seen = Mutex::new(Vec::new());
        let sink = |u: ProgressUpdate| seen.lock().unwrap().push(u);
        let tracker = ProgressTracker::new(300, 3, Duration::from_secs(3600), &sink);

        tracker.add_bytes(100);
        tracker.add_bytes(100);
        tracker.add_bytes(100);
        let last = tracker.finish();

        let seen = seen.into_inner().unwrap();
        // First bump emits, the rest fall inside the window, finish forces one.
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].copied, 100);
        assert!(last.finished);
        assert_eq!(last.copied, 300);
        assert_eq!(last.percent(), 100.0);
    }

    #[test]
    fn test_zero_interval_reports_everything() {
        let seen = Mutex::new(Vec::new());
        let sink = |u: ProgressUpdate| seen.lock().unwrap().push(u.copied);
        let tracker = ProgressTracker::new(10, 1, Duration::ZERO, &sink);
        tracker.add_bytes(4);
        tracker.add_bytes(6);
        tracker.file_done();
        tracker.finish();
        assert_eq!(seen.into_inner().unwrap(), vec![4, 10, 10, 10]);
    }

    #[test]
    fn test_empty_total_is_complete() {
        let u = ProgressUpdate {
            copied: 0,
            total: 0,
            files_done: 0,
            files_total: 0,
            finished: true,
        };
        assert_eq!(u.percent(), 100.0);
    }
}
