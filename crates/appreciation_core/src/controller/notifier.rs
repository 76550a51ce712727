//! Single-slot transient notifications.
//!
//! # Invariants
//! - At most one notification is visible; a new one replaces it immediately.
//! - A notification is visible until its TTL elapses on the tokio clock.

use crate::controller::BoardError;
use crate::store::StoreError;
use log::{info, warn};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Success,
    Error,
}

/// Failure taxonomy surfaced to users.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Validation,
    StoreUnavailable,
    NotFound,
    Timeout,
}

impl ErrorClass {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorClass::Validation => "validation",
            ErrorClass::StoreUnavailable => "store_unavailable",
            ErrorClass::NotFound => "not_found",
            ErrorClass::Timeout => "timeout",
        }
    }
}

impl From<&StoreError> for ErrorClass {
    fn from(value: &StoreError) -> Self {
        match value {
            StoreError::NotFound(_) => ErrorClass::NotFound,
            _ => ErrorClass::StoreUnavailable,
        }
    }
}

impl From<&BoardError> for ErrorClass {
    fn from(value: &BoardError) -> Self {
        match value {
            BoardError::Store(err) => err.into(),
            BoardError::Timeout { .. } => ErrorClass::Timeout,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub message: String,
    pub level: NotificationLevel,
    /// Set for error notifications.
    pub error: Option<ErrorClass>,
    pub shown_at: Instant,
}

#[derive(Default)]
struct NotifierState {
    current: Option<Notification>,
    shown: u64,
}

/// Shared notification slot. Clones refer to the same slot.
#[derive(Clone)]
pub struct Notifier {
    state: Arc<Mutex<NotifierState>>,
    ttl: Duration,
}

impl Notifier {
    pub fn new(ttl: Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new(NotifierState::default())),
            ttl,
        }
    }

    pub fn success(&self, message: impl Into<String>) {
        let message = message.into();
        info!("event=notify module=controller status=ok level=success");
        self.replace(Notification {
            message,
            level: NotificationLevel::Success,
            error: None,
            shown_at: Instant::now(),
        });
    }

    pub fn error(&self, message: impl Into<String>, class: ErrorClass) {
        let message = message.into();
        warn!(
            "event=notify module=controller status=ok level=error class={}",
            class.as_str()
        );
        self.replace(Notification {
            message,
            level: NotificationLevel::Error,
            error: Some(class),
            shown_at: Instant::now(),
        });
    }

    /// Returns the visible notification, if its TTL has not elapsed.
    pub fn current(&self) -> Option<Notification> {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state
            .current
            .as_ref()
            .filter(|notification| notification.shown_at.elapsed() < self.ttl)
            .cloned()
    }

    /// Total notifications shown since creation.
    pub fn shown_count(&self) -> u64 {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .shown
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn replace(&self, notification: Notification) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.current = Some(notification);
        state.shown += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::{ErrorClass, NotificationLevel, Notifier};
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn notification_expires_after_ttl() {
        let notifier = Notifier::new(Duration::from_secs(3));
        notifier.success("saved");
        tokio::time::advance(Duration::from_millis(2_999)).await;
        assert_eq!(notifier.current().unwrap().message, "saved");
        tokio::time::advance(Duration::from_millis(1)).await;
        assert!(notifier.current().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn newer_notification_replaces_and_restarts_ttl() {
        let notifier = Notifier::new(Duration::from_secs(3));
        notifier.success("first");
        tokio::time::advance(Duration::from_secs(2)).await;
        notifier.error("second", ErrorClass::StoreUnavailable);
        tokio::time::advance(Duration::from_secs(2)).await;

        let current = notifier.current().unwrap();
        assert_eq!(current.message, "second");
        assert_eq!(current.level, NotificationLevel::Error);
        assert_eq!(current.error, Some(ErrorClass::StoreUnavailable));
        assert_eq!(notifier.shown_count(), 2);
    }
}
