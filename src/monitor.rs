//! Monitoring hooks invoked around every dispatch.
//!
//! A [`MessageMonitor`] is a fire-and-forget side channel. The bus calls it
//! through [`MonitorGuard`], which contains panics so a faulty monitor can
//! never change the outcome of message processing.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

/// Observational hooks supplied by the host application.
pub trait MessageMonitor: Send + Sync {
    /// A dispatch completed successfully.
    fn handled(&self, message_type: &str);

    /// A dispatch, decode or handler lookup failed with an error.
    fn handle_exception(&self, message_type: &str);

    /// Wall time spent in one dispatch.
    fn handle_time(&self, duration: Duration);
}

/// Monitor that ignores every call.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullMonitor;

impl MessageMonitor for NullMonitor {
    fn handled(&self, _message_type: &str) {}

    fn handle_exception(&self, _message_type: &str) {}

    fn handle_time(&self, _duration: Duration) {}
}

/// Panic-isolating wrapper around a shared monitor.
#[derive(Clone)]
pub struct MonitorGuard {
    inner: Arc<dyn MessageMonitor>,
}

impl Default for MonitorGuard {
    fn default() -> Self {
        Self::new(Arc::new(NullMonitor))
    }
}

impl MonitorGuard {
    pub fn new(inner: Arc<dyn MessageMonitor>) -> Self {
        Self { inner }
    }

    pub fn handled(&self, message_type: &str) {
        self.isolate("handled", || self.inner.handled(message_type));
    }

    pub fn handle_exception(&self, message_type: &str) {
        self.isolate("handle_exception", || {
            self.inner.handle_exception(message_type)
        });
    }

    pub fn handle_time(&self, duration: Duration) {
        self.isolate("handle_time", || self.inner.handle_time(duration));
    }

    fn isolate(&self, hook: &'static str, call: impl FnOnce()) {
        if panic::catch_unwind(AssertUnwindSafe(call)).is_err() {
            warn!(hook, "Message monitor panicked; ignoring");
        }
    }
}
