//! Step timing.

use std::time::{Duration, Instant};

/// Measures one pipeline step.
pub struct Timer {
    name: String,
    start: Instant,
}

impl Timer {
    pub fn start(name: &str) -> Self {
        Self {
            name: name.to_string(),
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Stop the timer; returns the elapsed time and the `[1.2s] name` line.
    pub fn finish(self) -> (Duration, String) {
        let elapsed = self.start.elapsed();
        let line = format!("{} {}", format_duration(elapsed), self.name);
        (elapsed, line)
    }
}

/// `[12.3s]` under a minute, `[2.5m]` above.
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs_f64();
    if secs >= 60.0 {
        format!("[{:.1}m]", secs / 60.0)
    } else {
        format!("[{:.1}s]", secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(1500)), "[1.5s]");
        assert_eq!(format_duration(Duration::from_secs(150)), "[2.5m]");
    }

    #[test]
    fn test_finish_returns_elapsed() {
        let t = Timer::start("noop");
        let early = t.elapsed();
        let (elapsed, line) = t.finish();
        assert!(early <= elapsed);
        assert!(line.ends_with("s] noop"));
    }
}
