use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters describing pipeline activity.
#[derive(Default)]
pub struct RunMetrics {
    runs_succeeded: AtomicU64,
    runs_failed: AtomicU64,
    degraded_steps: AtomicU64,
}

impl RunMetrics {
    /// Create an empty metrics accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a run that created a note.
    pub fn record_success(&self) {
        self.runs_succeeded.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a run that aborted.
    pub fn record_failure(&self) {
        self.runs_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a best-effort step that failed without aborting its run.
    pub fn record_degraded_step(&self) {
        self.degraded_steps.fetch_add(1, Ordering::Relaxed);
    }

    /// Return a snapshot of the current counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            runs_succeeded: self.runs_succeeded.load(Ordering::Relaxed),
            runs_failed: self.runs_failed.load(Ordering::Relaxed),
            degraded_steps: self.degraded_steps.load(Ordering::Relaxed),
        }
    }
}

/// Immutable view of pipeline counters used for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct MetricsSnapshot {
    /// Runs that created a note since startup.
    pub runs_succeeded: u64,
    /// Runs that aborted since startup.
    pub runs_failed: u64,
    /// Optional steps that degraded to empty results.
    pub degraded_steps: u64,
}
