//! Elapsed-time reporting.

use std::time::{Duration, Instant};

use tracing::info;

/// Measures one piece of work and logs its duration when finished.
///
/// ```
/// use hybrid_telemetry::Stopwatch;
///
/// let sw = Stopwatch::start("kokoro");
/// let elapsed = sw.finish();
/// assert!(elapsed.as_secs() < 1);
/// ```
#[derive(Debug)]
pub struct Stopwatch {
    label: String,
    started: Instant,
}

impl Stopwatch {
    /// Start timing work identified by `label`.
    #[must_use]
    pub fn start(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            started: Instant::now(),
        }
    }

    /// Time elapsed so far.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Stop timing, log the duration, and return it.
    pub fn finish(self) -> Duration {
        let elapsed = self.started.elapsed();
        info!(
            task = %self.label,
            elapsed_secs = elapsed.as_secs_f64(),
            "Generated in {} seconds",
            format_secs(elapsed)
        );
        elapsed
    }
}

/// Format a duration as seconds with millisecond precision (`1.234`).
#[must_use]
pub fn format_secs(elapsed: Duration) -> String {
    format!("{:.3}", elapsed.as_secs_f64())
}
