//! Live status reporting
//!
//! Each running job shows a transient phase message ("Calling tool: …")
//! that a background ticker keeps repainting while the agent call is in
//! flight. The ticker is a guarded resource: it is started per attempt and
//! must be shut down (cancelled and awaited with a bounded timeout) on
//! every exit path. Dropping the guard aborts the task as a backstop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;

/// Sink for human-readable progress output.
///
/// `progress` lines are persistent (one per event); `phase` messages are
/// transient and may be repainted in place by the ticker.
pub trait StatusSink: Send + Sync {
    /// Emit a persistent progress line
    fn progress(&self, line: &str);

    /// Paint the current transient phase message
    fn phase(&self, message: &str);

    /// Clear any transient output
    fn clear(&self) {}

    /// Whether transient phase output should be produced at all
    fn enabled(&self) -> bool {
        true
    }
}

/// Sink that routes everything to tracing; used headless and in tests
#[derive(Debug, Default)]
pub struct LogSink;

impl StatusSink for LogSink {
    fn progress(&self, line: &str) {
        tracing::info!("{}", line);
    }

    fn phase(&self, message: &str) {
        tracing::debug!("{}", message);
    }

    fn enabled(&self) -> bool {
        false
    }
}

struct TickerShared {
    sink: Arc<dyn StatusSink>,
    message: Mutex<String>,
    active: AtomicBool,
}

/// Cheap handle for updating the current phase message.
///
/// Held by the event router; showing a message both repaints immediately
/// and updates what the background ticker keeps repainting.
#[derive(Clone)]
pub struct TickerHandle {
    shared: Arc<TickerShared>,
}

impl TickerHandle {
    /// Handle with no background task behind it, for cache hits and tests
    pub fn detached(sink: Arc<dyn StatusSink>) -> Self {
        Self {
            shared: Arc::new(TickerShared {
                sink,
                message: Mutex::new(String::new()),
                active: AtomicBool::new(false),
            }),
        }
    }

    /// Show a phase message and make it the ticker's current message
    pub fn show(&self, message: &str) {
        if let Ok(mut current) = self.shared.message.lock() {
            *current = message.to_string();
        }
        self.shared.sink.phase(message);
    }

    /// Whether a background ticker is actively repainting
    pub fn is_active(&self) -> bool {
        self.shared.active.load(Ordering::SeqCst)
    }
}

/// Guard over one attempt's background status task
pub struct StatusTicker {
    shared: Arc<TickerShared>,
    task: Option<JoinHandle<()>>,
}

impl StatusTicker {
    /// Interval between repaints of the current message
    pub const REFRESH: Duration = Duration::from_millis(150);

    /// Bound on waiting for the cancelled task to finish
    pub const CLEANUP_TIMEOUT: Duration = Duration::from_secs(1);

    /// Start the ticker. When the sink has transient output disabled the
    /// task is not spawned at all.
    pub fn start(sink: Arc<dyn StatusSink>) -> Self {
        let enabled = sink.enabled();
        let shared = Arc::new(TickerShared {
            sink,
            message: Mutex::new("Analyzing code structure...".to_string()),
            active: AtomicBool::new(enabled),
        });

        let task = if enabled {
            let loop_shared = Arc::clone(&shared);
            Some(tokio::spawn(async move {
                while loop_shared.active.load(Ordering::SeqCst) {
                    let message = loop_shared
                        .message
                        .lock()
                        .map(|m| m.clone())
                        .unwrap_or_default();
                    loop_shared.sink.phase(&message);
                    tokio::time::sleep(Self::REFRESH).await;
                }
            }))
        } else {
            None
        };

        Self { shared, task }
    }

    /// Handle for the router to update the current message
    pub fn handle(&self) -> TickerHandle {
        TickerHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Cancel the background task and wait for it, with a bounded timeout.
    ///
    /// Called on every exit path of an attempt, including retry
    /// transitions.
    pub async fn shutdown(mut self) {
        self.shared.active.store(false, Ordering::SeqCst);
        self.shared.sink.clear();
        if let Some(task) = self.task.take() {
            task.abort();
            let _ = tokio::time::timeout(Self::CLEANUP_TIMEOUT, task).await;
        }
    }
}

impl Drop for StatusTicker {
    fn drop(&mut self) {
        self.shared.active.store(false, Ordering::SeqCst);
        if let Some(task) = &self.task {
            task.abort();
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Sink recording everything it is shown, for assertions
    #[derive(Default)]
    pub struct RecordingSink {
        pub progress_lines: Mutex<Vec<String>>,
        pub phases: Mutex<Vec<String>>,
    }

    impl RecordingSink {
        pub fn phases(&self) -> Vec<String> {
            self.phases.lock().unwrap().clone()
        }

        pub fn progress(&self) -> Vec<String> {
            self.progress_lines.lock().unwrap().clone()
        }
    }

    impl StatusSink for RecordingSink {
        fn progress(&self, line: &str) {
            self.progress_lines.lock().unwrap().push(line.to_string());
        }

        fn phase(&self, message: &str) {
            self.phases.lock().unwrap().push(message.to_string());
        }
    }
}
