use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use serde::Serialize;

pub const DEFAULT_AUTO_CLOSE: Duration = Duration::from_millis(6000);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Success,
    Error,
    Info,
    Warning,
}

/// A transient, dismissible message for the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub title: String,
    pub message: String,
    pub severity: Severity,
    /// `None` keeps the notification open until dismissed.
    pub auto_close: Option<Duration>,
}

impl Notification {
    pub fn new(title: impl Into<String>, message: impl Into<String>, severity: Severity) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            severity,
            auto_close: Some(DEFAULT_AUTO_CLOSE),
        }
    }

    pub fn success(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(title, message, Severity::Success)
    }

    pub fn error(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(title, message, Severity::Error)
    }

    pub fn info(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(title, message, Severity::Info)
    }

    pub fn sticky(mut self) -> Self {
        self.auto_close = None;
        self
    }

    pub fn with_auto_close(mut self, after: Duration) -> Self {
        self.auto_close = Some(after);
        self
    }

    /// Text copied to the clipboard when the notification is dismissed.
    pub fn clipboard_text(&self) -> String {
        format!("{}.{}", self.title, self.message)
    }
}

/// Sink for user-facing notifications. Rendering is up to the host.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Discards everything.
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn notify(&self, _notification: Notification) {}
}

/// In-memory queue of open notifications, oldest first.
#[derive(Default)]
pub struct NotificationLog {
    open: Mutex<VecDeque<Notification>>,
}

impl NotificationLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the open notifications.
    pub fn open(&self) -> Vec<Notification> {
        self.lock().iter().cloned().collect()
    }

    /// Remove and return every open notification.
    pub fn drain(&self) -> Vec<Notification> {
        self.lock().drain(..).collect()
    }

    /// Close the notification at `index`, returning its clipboard text.
    pub fn dismiss(&self, index: usize) -> Option<String> {
        self.lock().remove(index).map(|n| n.clipboard_text())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<Notification>> {
        // A poisoned queue still holds valid notifications.
        self.open.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Notifier for NotificationLog {
    fn notify(&self, notification: Notification) {
        tracing::debug!(title = %notification.title, severity = ?notification.severity, "notification");
        self.lock().push_back(notification);
    }
}
