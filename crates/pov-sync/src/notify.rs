//! Lifecycle notification port
//!
//! Each operation emits `started` before its first remote call and exactly
//! one of `succeeded` / `failed` when it finishes.

/// Receives operation lifecycle events
#[cfg_attr(test, mockall::automock)]
pub trait Notifier: Send + Sync {
    fn started(&self, label: &str);

    fn succeeded(&self, label: &str);

    fn failed(&self, message: &str);
}

/// Notifier that writes lifecycle events to the tracing subscriber
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn started(&self, label: &str) {
        tracing::debug!(label, "operation started");
    }

    fn succeeded(&self, label: &str) {
        tracing::info!(label, "operation succeeded");
    }

    fn failed(&self, message: &str) {
        tracing::warn!(message, "operation failed");
    }
}

/// Notifier that drops every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn started(&self, _label: &str) {}

    fn succeeded(&self, _label: &str) {}

    fn failed(&self, _message: &str) {}
}
