//! Notification rows.

use crate::rows::{NotificationRow, db_error};
use crate::store::PostgresPortalStore;
use municipal_portal_core::error::Result;
use municipal_portal_core::providers::NotificationStore;
use municipal_portal_core::types::{Notification, NotificationId, UserId};

impl NotificationStore for PostgresPortalStore {
    async fn insert_notification(&self, notification: &Notification) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO notifications (
                id, recipient_id, title, category, details, link, seen, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ",
        )
        .bind(notification.id.as_uuid())
        .bind(notification.recipient_id.as_uuid())
        .bind(&notification.title)
        .bind(&notification.category)
        .bind(&notification.details)
        .bind(&notification.link)
        .bind(notification.seen)
        .bind(notification.created_at)
        .execute(&self.pool)
        .await
        .map_err(db_error("Failed to insert notification"))?;
        Ok(())
    }

    async fn list_notifications(&self, recipient_id: UserId) -> Result<Vec<Notification>> {
        // seq breaks ties between rows written within the same instant
        let rows = sqlx::query_as::<_, NotificationRow>(
            r"
            SELECT id, recipient_id, title, category, details, link, seen, created_at
            FROM notifications
            WHERE recipient_id = $1
            ORDER BY created_at DESC, seq DESC
            ",
        )
        .bind(recipient_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to list notifications"))?;

        Ok(rows.into_iter().map(Notification::from).collect())
    }

    async fn mark_seen(&self, recipient_id: UserId, notification_id: NotificationId) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE notifications SET seen = TRUE WHERE id = $1 AND recipient_id = $2",
        )
        .bind(notification_id.as_uuid())
        .bind(recipient_id.as_uuid())
        .execute(&self.pool)
        .await
        .map_err(db_error("Failed to mark notification seen"))?;

        Ok(result.rows_affected() > 0)
    }

    async fn mark_all_seen(&self, recipient_id: UserId) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE notifications SET seen = TRUE WHERE recipient_id = $1 AND NOT seen",
        )
        .bind(recipient_id.as_uuid())
        .execute(&self.pool)
        .await
        .map_err(db_error("Failed to mark notifications seen"))?;

        Ok(result.rows_affected())
    }

    async fn delete_notification(
        &self,
        recipient_id: UserId,
        notification_id: NotificationId,
    ) -> Result<bool> {
        let result = sqlx::query("DELETE FROM notifications WHERE id = $1 AND recipient_id = $2")
            .bind(notification_id.as_uuid())
            .bind(recipient_id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(db_error("Failed to delete notification"))?;

        Ok(result.rows_affected() > 0)
    }
}
