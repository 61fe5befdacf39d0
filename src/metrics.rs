// Performance metrics module
//
// Lightweight counters for operations and foreground traffic

use crate::operation::Outcome;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Process-wide operation metrics
///
/// Uses atomic operations so workers and the foreground can record without
/// locks. Logged on shutdown with [`Metrics::log_summary`].
#[derive(Debug)]
pub struct Metrics {
    /// Operations that reached Running
    pub operations_started: AtomicU64,

    pub operations_succeeded: AtomicU64,

    pub operations_failed: AtomicU64,

    pub operations_cancelled: AtomicU64,

    /// Capabilities that could not be started at all
    pub launch_failures: AtomicU64,

    /// Output lines appended to result sinks
    pub lines_appended: AtomicU64,

    /// Number of UI updates sent
    pub ui_updates: AtomicU64,

    /// Number of UI update channel full errors
    pub ui_update_channel_full: AtomicU64,

    start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            operations_started: AtomicU64::new(0),
            operations_succeeded: AtomicU64::new(0),
            operations_failed: AtomicU64::new(0),
            operations_cancelled: AtomicU64::new(0),
            launch_failures: AtomicU64::new(0),
            lines_appended: AtomicU64::new(0),
            ui_updates: AtomicU64::new(0),
            ui_update_channel_full: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn record_operation_started(&self) {
        self.operations_started.fetch_add(1, Ordering::Relaxed);
    }

    /// Record the terminal outcome of an operation
    pub fn record_outcome(&self, outcome: &Outcome) {
        let counter = match outcome {
            Outcome::Succeeded => &self.operations_succeeded,
            Outcome::Failed(_) => &self.operations_failed,
            Outcome::Cancelled => &self.operations_cancelled,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_launch_failure(&self) {
        self.launch_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_line_appended(&self) {
        self.lines_appended.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a UI update
    pub fn record_ui_update(&self) {
        self.ui_updates.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a UI update channel full error
    pub fn record_ui_channel_full(&self) {
        self.ui_update_channel_full.fetch_add(1, Ordering::Relaxed);
    }

    /// Get total uptime
    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Log metrics summary
    pub fn log_summary(&self) {
        tracing::info!("=== Operation Metrics Summary ===");
        tracing::info!("Uptime: {:.2}s", self.uptime().as_secs_f64());
        tracing::info!(
            "Operations: {} started, {} succeeded, {} failed, {} cancelled, {} launch failures",
            self.operations_started.load(Ordering::Relaxed),
            self.operations_succeeded.load(Ordering::Relaxed),
            self.operations_failed.load(Ordering::Relaxed),
            self.operations_cancelled.load(Ordering::Relaxed),
            self.launch_failures.load(Ordering::Relaxed)
        );
        tracing::info!(
            "Lines appended: {}, UI updates: {}, channel full errors: {}",
            self.lines_appended.load(Ordering::Relaxed),
            self.ui_updates.load(Ordering::Relaxed),
            self.ui_update_channel_full.load(Ordering::Relaxed)
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
