//! Error handler capability.
//!
//! The sink calls [`ErrorReporter::report`] on every failed connect or send. The call is
//! synchronous and fire-and-forget: implementations must return promptly and never fail the
//! caller.

use std::sync::{Arc, Mutex, PoisonError};
use tracing::warn;

/// Receives delivery failures tagged with the sink that saw them.
pub trait ErrorReporter: Send + Sync {
    fn report(&self, message: &str, source_id: &str, drain_target: &str);
}

impl<F> ErrorReporter for F
where
    F: Fn(&str, &str, &str) + Send + Sync,
{
    fn report(&self, message: &str, source_id: &str, drain_target: &str) {
        self(message, source_id, drain_target)
    }
}

/// Reporter that emits a `warn!` line per failure.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogReporter;

impl ErrorReporter for LogReporter {
    fn report(&self, message: &str, source_id: &str, drain_target: &str) {
        warn!(app_id = source_id, drain_url = drain_target, "{message}");
    }
}

/// One recorded failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub message: String,
    pub source_id: String,
    pub drain_target: String,
}

/// Reporter that keeps every failure in memory for inspection.
#[derive(Debug, Clone, Default)]
pub struct MemoryReporter {
    reports: Arc<Mutex<Vec<Report>>>,
}

impl MemoryReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reports(&self) -> Vec<Report> {
        self.reports.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn len(&self) -> usize {
        self.reports.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ErrorReporter for MemoryReporter {
    fn report(&self, message: &str, source_id: &str, drain_target: &str) {
        self.reports.lock().unwrap_or_else(PoisonError::into_inner).push(Report {
            message: message.to_string(),
            source_id: source_id.to_string(),
            drain_target: drain_target.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn closures_are_reporters() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        let reporter = move |_: &str, app: &str, drain: &str| {
            assert_eq!(app, "app-1");
            assert_eq!(drain, "syslog://drain:514");
            seen.fetch_add(1, Ordering::SeqCst);
        };
        reporter.report("boom", "app-1", "syslog://drain:514");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn memory_reporter_records_in_order() {
        let reporter = MemoryReporter::new();
        let shared: Arc<dyn ErrorReporter> = Arc::new(reporter.clone());
        shared.report("first", "a", "d");
        shared.report("second", "a", "d");

        let reports = reporter.reports();
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].message, "first");
        assert_eq!(reports[1].message, "second");
    }

    #[test]
    fn log_reporter_does_not_panic() {
        LogReporter.report("dial failed", "app", "syslog://x:1");
    }
}
