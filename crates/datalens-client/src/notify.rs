//! Notification sink for user-visible events.
//!
//! The gateway is the single reporting point for request failures, so each
//! failed request produces exactly one `error` notice. Stores report
//! operation successes. `session_expired` is the redirect-to-login side
//! effect and fires only when live credentials were actually dropped.

use std::sync::Mutex;

/// A single user-visible notice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Success(String),
    Error(String),
    SessionExpired,
}

/// Sink for user-visible notices. Implemented by the embedding application
/// (toast system, status bar, CLI stderr).
pub trait Notifier: Send + Sync {
    fn success(&self, message: &str);
    fn error(&self, message: &str);
    fn session_expired(&self);
}

/// Default notifier that reports through `tracing`.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn success(&self, message: &str) {
        tracing::info!(message = %message, "notice");
    }

    fn error(&self, message: &str) {
        tracing::error!(message = %message, "request failed");
    }

    fn session_expired(&self) {
        tracing::warn!("session expired, login required");
    }
}

/// Notifier that records every notice, for tests and headless embedders.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<Notice>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// All notices recorded so far, in order.
    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().expect("notifier lock poisoned").clone()
    }

    /// Number of recorded error notices.
    pub fn error_count(&self) -> usize {
        self.notices()
            .iter()
            .filter(|n| matches!(n, Notice::Error(_)))
            .count()
    }

    /// Whether a session-expired notice was recorded.
    pub fn saw_session_expired(&self) -> bool {
        self.notices().contains(&Notice::SessionExpired)
    }
}

impl Notifier for RecordingNotifier {
    fn success(&self, message: &str) {
        self.notices
            .lock()
            .expect("notifier lock poisoned")
            .push(Notice::Success(message.to_string()));
    }

    fn error(&self, message: &str) {
        self.notices
            .lock()
            .expect("notifier lock poisoned")
            .push(Notice::Error(message.to_string()));
    }

    fn session_expired(&self) {
        self.notices
            .lock()
            .expect("notifier lock poisoned")
            .push(Notice::SessionExpired);
    }
}
