//! Notification store.

use crate::error::Result;
use crate::types::{Notification, NotificationId, UserId};
use std::future::Future;

/// Persistence for notification rows.
///
/// Rows are created as a side effect of lifecycle transitions and are only
/// deleted by their recipient.
pub trait NotificationStore: Send + Sync {
    /// Persist a notification.
    ///
    /// # Errors
    ///
    /// Returns `DependencyFailure` if the row could not be written.
    fn insert_notification(
        &self,
        notification: &Notification,
    ) -> impl Future<Output = Result<()>> + Send;

    /// All notifications of a recipient, newest first.
    ///
    /// # Errors
    ///
    /// Returns `DependencyFailure` if the store is unreachable.
    fn list_notifications(
        &self,
        recipient_id: UserId,
    ) -> impl Future<Output = Result<Vec<Notification>>> + Send;

    /// Flag one notification as seen. Returns `false` if the recipient has no such row.
    ///
    /// # Errors
    ///
    /// Returns `DependencyFailure` if the store is unreachable.
    fn mark_seen(
        &self,
        recipient_id: UserId,
        notification_id: NotificationId,
    ) -> impl Future<Output = Result<bool>> + Send;

    /// Flag every unseen notification of a recipient as seen. Returns the number flagged.
    ///
    /// # Errors
    ///
    /// Returns `DependencyFailure` if the store is unreachable.
    fn mark_all_seen(&self, recipient_id: UserId) -> impl Future<Output = Result<u64>> + Send;

    /// Delete one of the recipient's notifications. Returns `false` if nothing matched.
    ///
    /// # Errors
    ///
    /// Returns `DependencyFailure` if the store is unreachable.
    fn delete_notification(
        &self,
        recipient_id: UserId,
        notification_id: NotificationId,
    ) -> impl Future<Output = Result<bool>> + Send;
}
