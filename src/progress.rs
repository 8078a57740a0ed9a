//! Progress reporting for import passes.
//!
//! Each pass occupies a sub-interval of the overall 0-100 range. A pass
//! knows its total record count ahead of time (from the partition counts)
//! and reports `floor(start + processed / total * (end - start))`, clamped
//! into the interval and never regressing within a single pass. A zero
//! total reports the interval start rather than dividing.

use std::sync::{Arc, Mutex};

use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

/// Receiver of progress notifications.
pub trait ProgressSink: Send {
    /// `percent` is the overall completion, 0-100.
    fn make_progress(&mut self, percent: u8, sub_task: &str, message: &str);
}

/// Discards all progress notifications.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn make_progress(&mut self, _percent: u8, _sub_task: &str, _message: &str) {}
}

/// Logs progress at `info` level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl ProgressSink for LogSink {
    fn make_progress(&mut self, percent: u8, sub_task: &str, message: &str) {
        info!(percent, sub_task, "{message}");
    }
}

/// Drives an indicatif progress bar for terminal embedders.
pub struct BarSink {
    bar: ProgressBar,
}

impl BarSink {
    #[must_use]
    pub fn new() -> Self {
        let bar = ProgressBar::new(100);
        bar.set_style(
            ProgressStyle::with_template("{bar:40} {pos:>3}% {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        Self { bar }
    }
}

impl Default for BarSink {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSink for BarSink {
    fn make_progress(&mut self, percent: u8, sub_task: &str, _message: &str) {
        self.bar.set_position(u64::from(percent));
        self.bar.set_message(sub_task.to_string());
    }
}

/// Shared handle to a sink, usable across passes and executor threads.
pub type SharedSink = Arc<Mutex<dyn ProgressSink>>;

/// Wrap a sink for sharing.
#[must_use]
pub fn shared(sink: impl ProgressSink + 'static) -> SharedSink {
    Arc::new(Mutex::new(sink))
}

/// The slice of the overall progress range a pass occupies.
#[derive(Clone)]
pub struct TaskProgressInterval {
    sink: SharedSink,
    start: u8,
    end: u8,
}

impl TaskProgressInterval {
    /// The full 0-100 range on the given sink.
    #[must_use]
    pub fn full(sink: SharedSink) -> Self {
        Self {
            sink,
            start: 0,
            end: 100,
        }
    }

    /// A nested sub-interval expressed in percent of *this* interval.
    ///
    /// `sub_interval(20, 40)` of the interval `[50, 100]` is `[60, 70]`.
    #[must_use]
    pub fn sub_interval(&self, sub_start: u8, sub_end: u8) -> Self {
        let width = u32::from(self.end - self.start);
        let start = u32::from(self.start) + u32::from(sub_start.min(100)) * width / 100;
        let end = u32::from(self.start) + u32::from(sub_end.min(100)) * width / 100;
        Self {
            sink: Arc::clone(&self.sink),
            start: start.min(100) as u8,
            end: end.min(100) as u8,
        }
    }

    fn report(&self, percent: u8, sub_task: &str, message: &str) {
        if let Ok(mut sink) = self.sink.lock() {
            sink.make_progress(percent, sub_task, message);
        }
    }
}

impl std::fmt::Debug for TaskProgressInterval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskProgressInterval")
            .field("start", &self.start)
            .field("end", &self.end)
            .finish_non_exhaustive()
    }
}

/// Per-pass progress over a known record total.
pub struct EntityCountProgress {
    interval: TaskProgressInterval,
    sub_task: String,
    total: u64,
    last_percent: u8,
}

impl EntityCountProgress {
    #[must_use]
    pub fn new(interval: TaskProgressInterval, sub_task: impl Into<String>, total: u64) -> Self {
        Self {
            interval,
            sub_task: sub_task.into(),
            total,
            last_percent: 0,
        }
    }

    /// Overall percentage for `processed` records of the total.
    #[must_use]
    pub fn overall_percent(&self, processed: u64) -> u8 {
        let start = f64::from(self.interval.start);
        let end = f64::from(self.interval.end);
        if self.total == 0 {
            return self.interval.start;
        }
        let fraction = (processed as f64 / self.total as f64).min(1.0);
        let percent = (start + fraction * (end - start)).floor();
        (percent as u8).clamp(self.interval.start, self.interval.end)
    }

    /// Tick progress after `processed` records.
    pub fn process(&mut self, current_entity: &str, processed: u64) {
        let percent = self.overall_percent(processed).max(self.last_percent);
        self.last_percent = percent;
        let message = format!("Processing {current_entity} ({processed} of {})", self.total);
        self.interval.report(percent, &self.sub_task, &message);
    }
}
