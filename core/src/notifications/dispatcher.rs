//! Notification dispatcher.
//!
//! `notify` persists exactly one notification row and only then signals the
//! recipient's live channels. The push is fire-and-forget: a recipient with no
//! live channel, or a channel that has gone away, is not an error.

use super::registry::{ChannelEvent, ConnectionRegistry};
use crate::environment::Clock;
use crate::error::{PortalError, Result};
use crate::metrics;
use crate::providers::NotificationStore;
use crate::types::{Notification, NotificationId, UserId};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Default event name pushed to live channels.
pub const DEFAULT_PUSH_EVENT: &str = "updates";

/// Content of a notification to deliver.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationMessage {
    /// Recipient
    pub recipient: UserId,
    /// Short title
    pub title: String,
    /// Category (request domain or free-form)
    pub category: String,
    /// Detail text
    pub details: String,
    /// Deep link
    pub link: String,
}

/// Delivers notifications to residents.
///
/// Injected into the lifecycle controller at construction.
pub trait NotificationDispatcher: Send + Sync {
    /// Persist and push one notification.
    ///
    /// # Errors
    ///
    /// Returns `DependencyFailure` if the row could not be persisted or the
    /// dispatcher has been shut down.
    fn notify(
        &self,
        message: NotificationMessage,
    ) -> impl Future<Output = Result<NotificationId>> + Send;
}

/// A recipient's notification feed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct NotificationFeed {
    /// Total notifications
    pub count: usize,
    /// Notifications not yet seen
    pub unseen: usize,
    /// Notifications, newest first
    pub list: Vec<Notification>,
}

impl NotificationFeed {
    fn from_list(list: Vec<Notification>) -> Self {
        Self {
            count: list.len(),
            unseen: list.iter().filter(|n| !n.seen).count(),
            list,
        }
    }
}

/// Store-backed dispatcher that pushes through a [`ConnectionRegistry`].
pub struct Dispatcher<S> {
    store: Arc<S>,
    registry: Arc<ConnectionRegistry>,
    clock: Arc<dyn Clock>,
    push_event: String,
    open: AtomicBool,
}

impl<S> Dispatcher<S>
where
    S: NotificationStore,
{
    /// Create a dispatcher pushing [`DEFAULT_PUSH_EVENT`].
    #[must_use]
    pub fn new(store: Arc<S>, registry: Arc<ConnectionRegistry>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            registry,
            clock,
            push_event: DEFAULT_PUSH_EVENT.to_string(),
            open: AtomicBool::new(true),
        }
    }

    /// Override the pushed event name.
    #[must_use]
    pub fn with_push_event(mut self, event: impl Into<String>) -> Self {
        self.push_event = event.into();
        self
    }

    /// Registry this dispatcher pushes through.
    #[must_use]
    pub const fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Whether `notify` is still accepted.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    /// Stop accepting notifications and close every live channel.
    pub async fn shutdown(&self) {
        self.open.store(false, Ordering::Release);
        let closed = self.registry.close_all().await;
        tracing::info!(closed, "Notification dispatcher shut down");
    }

    /// The recipient's feed, newest first.
    ///
    /// # Errors
    ///
    /// `DependencyFailure` if the store fails.
    pub async fn get_notifications(&self, recipient: UserId) -> Result<NotificationFeed> {
        let list = self.store.list_notifications(recipient).await?;
        Ok(NotificationFeed::from_list(list))
    }

    /// Mark one notification as seen.
    ///
    /// # Errors
    ///
    /// `NotFound` if the recipient owns no such notification.
    pub async fn mark_seen(&self, recipient: UserId, id: NotificationId) -> Result<()> {
        if self.store.mark_seen(recipient, id).await? {
            Ok(())
        } else {
            Err(PortalError::not_found("notification", id))
        }
    }

    /// Mark all of the recipient's notifications as seen. Returns the number changed.
    ///
    /// # Errors
    ///
    /// `DependencyFailure` if the store fails.
    pub async fn mark_all_seen(&self, recipient: UserId) -> Result<u64> {
        self.store.mark_all_seen(recipient).await
    }

    /// Delete one of the recipient's notifications.
    ///
    /// # Errors
    ///
    /// `NotFound` if the recipient owns no such notification.
    pub async fn delete_notification(&self, recipient: UserId, id: NotificationId) -> Result<()> {
        if self.store.delete_notification(recipient, id).await? {
            Ok(())
        } else {
            Err(PortalError::not_found("notification", id))
        }
    }
}

impl<S> NotificationDispatcher for Dispatcher<S>
where
    S: NotificationStore,
{
    #[tracing::instrument(skip(self, message), fields(recipient = %message.recipient, category = %message.category))]
    async fn notify(&self, message: NotificationMessage) -> Result<NotificationId> {
        if !self.is_open() {
            metrics::record_notification("rejected");
            return Err(PortalError::dependency(
                "notification dispatcher",
                "dispatcher has been shut down",
            ));
        }

        let notification = Notification {
            id: NotificationId::new(),
            recipient_id: message.recipient,
            title: message.title,
            category: message.category,
            details: message.details,
            link: message.link,
            seen: false,
            created_at: self.clock.now(),
        };

        if let Err(error) = self.store.insert_notification(&notification).await {
            metrics::record_notification("failed");
            return Err(error);
        }
        metrics::record_notification("persisted");

        let delivered = self
            .registry
            .push(notification.recipient_id, &ChannelEvent::update(&self.push_event))
            .await;
        metrics::record_pushes(delivered);
        tracing::debug!(notification = %notification.id, delivered, "Notification dispatched");

        Ok(notification.id)
    }
}
