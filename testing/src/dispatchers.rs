//! Mock notification dispatchers.

use municipal_portal_core::error::{PortalError, Result};
use municipal_portal_core::notifications::{NotificationDispatcher, NotificationMessage};
use municipal_portal_core::types::NotificationId;
use std::sync::{Arc, Mutex};

/// Records every message and reports success.
#[derive(Clone, Debug, Default)]
pub struct RecordingDispatcher {
    sent: Arc<Mutex<Vec<NotificationMessage>>>,
}

impl RecordingDispatcher {
    /// Create an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages received so far.
    #[must_use]
    pub fn sent(&self) -> Vec<NotificationMessage> {
        self.sent
            .lock()
            .map(|sent| sent.clone())
            .unwrap_or_default()
    }
}

impl NotificationDispatcher for RecordingDispatcher {
    async fn notify(&self, message: NotificationMessage) -> Result<NotificationId> {
        self.sent
            .lock()
            .map_err(|_| PortalError::dependency("recording dispatcher", "lock poisoned"))?
            .push(message);
        Ok(NotificationId::new())
    }
}

/// Refuses every notification with `DependencyFailure`.
#[derive(Clone, Copy, Debug, Default)]
pub struct FailingDispatcher;

impl NotificationDispatcher for FailingDispatcher {
    async fn notify(&self, _message: NotificationMessage) -> Result<NotificationId> {
        Err(PortalError::dependency(
            "notification dispatcher",
            "channel unavailable",
        ))
    }
}
