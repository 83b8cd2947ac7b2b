//! Item reservations with the transactional capacity recheck.

use crate::rows::{ReservationRow, db_error, to_column, to_units};
use crate::store::PostgresPortalStore;
use municipal_portal_core::availability::units_available;
use municipal_portal_core::error::{PortalError, Result};
use municipal_portal_core::providers::{ReservationChange, ReservationStore, WriteOutcome};
use municipal_portal_core::types::{
    DateWindow, ReservationId, ReservationRequest, ReservationStatus, ResourceId,
};

const RESERVATION_COLUMNS: &str = "id, resource_id, resident_id, requested_units, start_date, \
     end_date, status, remarks, created_at, updated_at";

fn binding_statuses() -> Vec<&'static str> {
    ReservationStatus::ALL
        .iter()
        .filter(|status| status.is_binding())
        .map(|status| status.as_str())
        .collect()
}

impl PostgresPortalStore {
    async fn binding_rows<'e, E>(
        executor: E,
        resource_id: ResourceId,
        window: DateWindow,
        exclude: Option<ReservationId>,
    ) -> Result<Vec<ReservationRequest>>
    where
        E: sqlx::PgExecutor<'e>,
    {
        let rows = sqlx::query_as::<_, ReservationRow>(&format!(
            r"
            SELECT {RESERVATION_COLUMNS}
            FROM reservation_requests
            WHERE resource_id = $1
              AND status = ANY($2)
              AND LEAST(start_date, end_date) <= $4
              AND GREATEST(start_date, end_date) >= $3
              AND ($5::UUID IS NULL OR id <> $5)
            "
        ))
        .bind(resource_id.as_uuid())
        .bind(binding_statuses())
        .bind(window.start())
        .bind(window.end())
        .bind(exclude.map(|id| *id.as_uuid()))
        .fetch_all(executor)
        .await
        .map_err(db_error("Failed to load binding reservations"))?;

        rows.into_iter().map(ReservationRequest::try_from).collect()
    }
}

impl ReservationStore for PostgresPortalStore {
    async fn get_reservation(&self, id: ReservationId) -> Result<Option<ReservationRequest>> {
        sqlx::query_as::<_, ReservationRow>(&format!(
            "SELECT {RESERVATION_COLUMNS} FROM reservation_requests WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("Failed to get reservation"))?
        .map(ReservationRequest::try_from)
        .transpose()
    }

    async fn insert_reservation(&self, reservation: &ReservationRequest) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO reservation_requests (
                id, resource_id, resident_id, requested_units, start_date, end_date,
                status, remarks, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ",
        )
        .bind(reservation.id.as_uuid())
        .bind(reservation.resource_id.as_uuid())
        .bind(reservation.resident_id.as_uuid())
        .bind(to_column(reservation.requested_units)?)
        .bind(reservation.start_date)
        .bind(reservation.end_date)
        .bind(reservation.status.as_str())
        .bind(&reservation.remarks)
        .bind(reservation.created_at)
        .bind(reservation.updated_at)
        .execute(&self.pool)
        .await
        .map_err(db_error("Failed to insert reservation"))?;
        Ok(())
    }

    async fn binding_reservations(
        &self,
        resource_id: ResourceId,
        window: DateWindow,
        exclude: Option<ReservationId>,
    ) -> Result<Vec<ReservationRequest>> {
        Self::binding_rows(&self.pool, resource_id, window, exclude).await
    }

    #[tracing::instrument(skip(self, change), fields(reservation = %change.id))]
    async fn apply_reservation_change(&self, change: &ReservationChange) -> Result<WriteOutcome> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(db_error("Failed to start transaction"))?;

        // Lock the resource first so approvals on it are serialized
        let total_units = match &change.capacity_guard {
            Some(guard) => {
                let row: Option<(i32,)> = sqlx::query_as(
                    "SELECT total_units FROM bookable_resources WHERE id = $1 FOR UPDATE",
                )
                .bind(guard.resource_id.as_uuid())
                .fetch_optional(&mut *tx)
                .await
                .map_err(db_error("Failed to lock resource"))?;
                let Some((total,)) = row else {
                    let _ = tx.rollback().await;
                    return Err(PortalError::not_found("bookable resource", guard.resource_id));
                };
                Some(to_units("bookable_resources", *guard.resource_id.as_uuid(), total)?)
            }
            None => None,
        };

        let current: Option<(String,)> =
            sqlx::query_as("SELECT status FROM reservation_requests WHERE id = $1 FOR UPDATE")
                .bind(change.id.as_uuid())
                .fetch_optional(&mut *tx)
                .await
                .map_err(db_error("Failed to lock reservation"))?;
        let Some((actual,)) = current else {
            let _ = tx.rollback().await;
            return Ok(WriteOutcome::Missing);
        };
        if actual != change.expected_status.as_str() {
            let _ = tx.rollback().await;
            return Ok(WriteOutcome::StatusMismatch { actual });
        }

        if let (Some(guard), Some(total)) = (&change.capacity_guard, total_units) {
            let competing =
                Self::binding_rows(&mut *tx, guard.resource_id, guard.window, Some(change.id))
                    .await?;
            let available = units_available(total, &guard.window, &competing, Some(change.id));
            if guard.requested_units > available {
                let _ = tx.rollback().await;
                tracing::debug!(available, "Capacity recheck failed");
                return Ok(WriteOutcome::CapacityExceeded { available });
            }
        }

        sqlx::query(
            r"
            UPDATE reservation_requests
            SET status = COALESCE($2, status),
                remarks = COALESCE($3, remarks),
                updated_at = $4
            WHERE id = $1 AND status = $5
            ",
        )
        .bind(change.id.as_uuid())
        .bind(change.status.map(ReservationStatus::as_str))
        .bind(&change.remarks)
        .bind(change.updated_at)
        .bind(change.expected_status.as_str())
        .execute(&mut *tx)
        .await
        .map_err(db_error("Failed to update reservation"))?;

        tx.commit()
            .await
            .map_err(db_error("Failed to commit transaction"))?;
        Ok(WriteOutcome::Applied)
    }
}
