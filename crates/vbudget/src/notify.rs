//! Administrative notification channel.
//!
//! Delivery is best-effort: workflow services log a failed delivery and carry on.

use std::sync::{Arc, Mutex};

use serde::Serialize;
use tracing::info;

/// Outbound hook for messages addressed to administrators (e-mail, chat, console).
pub trait Notifier: Send + Sync {
    fn notify(&self, subject: &str, message: &str) -> Result<(), NotifyError>;
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
}

/// Writes notifications to the log. Default channel for local and demo deployments.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, subject: &str, message: &str) -> Result<(), NotifyError> {
        info!(target: "vbudget::admin_notify", %subject, %message, "admin notification");
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub subject: String,
    pub message: String,
}

/// Keeps every notification in memory so callers can inspect what was sent.
#[derive(Debug, Default, Clone)]
pub struct RecordingNotifier {
    sent: Arc<Mutex<Vec<Notification>>>,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<Notification> {
        self.sent
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn last(&self) -> Option<Notification> {
        self.sent().pop()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, subject: &str, message: &str) -> Result<(), NotifyError> {
        self.sent
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(Notification {
                subject: subject.to_string(),
                message: message.to_string(),
            });
        Ok(())
    }
}
