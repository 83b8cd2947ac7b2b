//! Service, document and event registration requests.

use crate::rows::{
    DocumentRow, EventRegistrationRow, ServiceRequestRow, db_error, to_column, to_units,
};
use crate::store::PostgresPortalStore;
use municipal_portal_core::error::{PortalError, Result};
use municipal_portal_core::providers::{
    DocumentChange, DocumentStore, EventRegistrationChange, EventRegistrationStore,
    ServiceChange, ServiceRequestStore, WriteOutcome,
};
use municipal_portal_core::types::{
    DocumentRequest, DocumentRequestId, DocumentStage, DocumentStatus, EventRegistration,
    EventRegistrationId, EventRegistrationStatus, ServiceRequest, ServiceRequestId, ServiceStatus,
};
use uuid::Uuid;

impl PostgresPortalStore {
    /// Distinguish "row missing" from "status moved on" after a conditional
    /// update matched zero rows.
    async fn explain_miss(&self, table: &'static str, id: Uuid) -> Result<WriteOutcome> {
        let row: Option<(String,)> = sqlx::query_as(&format!("SELECT status FROM {table} WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("Failed to read status"))?;
        Ok(row.map_or(WriteOutcome::Missing, |(actual,)| {
            WriteOutcome::StatusMismatch { actual }
        }))
    }
}

// ============================================================================
// Services
// ============================================================================

impl ServiceRequestStore for PostgresPortalStore {
    async fn get_service_request(&self, id: ServiceRequestId) -> Result<Option<ServiceRequest>> {
        sqlx::query_as::<_, ServiceRequestRow>(
            r"
            SELECT id, service_id, resident_id, status, scheduled_date, remarks,
                   created_at, updated_at
            FROM service_requests
            WHERE id = $1
            ",
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("Failed to get service request"))?
        .map(ServiceRequest::try_from)
        .transpose()
    }

    async fn insert_service_request(&self, request: &ServiceRequest) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO service_requests (
                id, service_id, resident_id, status, scheduled_date, remarks,
                created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ",
        )
        .bind(request.id.as_uuid())
        .bind(request.service_id.as_uuid())
        .bind(request.resident_id.as_uuid())
        .bind(request.status.as_str())
        .bind(request.scheduled_date)
        .bind(&request.remarks)
        .bind(request.created_at)
        .bind(request.updated_at)
        .execute(&self.pool)
        .await
        .map_err(db_error("Failed to insert service request"))?;
        Ok(())
    }

    #[tracing::instrument(skip(self, change), fields(request = %change.id))]
    async fn apply_service_change(&self, change: &ServiceChange) -> Result<WriteOutcome> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(db_error("Failed to start transaction"))?;

        let current: Option<(String,)> =
            sqlx::query_as("SELECT status FROM service_requests WHERE id = $1 FOR UPDATE")
                .bind(change.id.as_uuid())
                .fetch_optional(&mut *tx)
                .await
                .map_err(db_error("Failed to lock service request"))?;
        let Some((actual,)) = current else {
            let _ = tx.rollback().await;
            return Ok(WriteOutcome::Missing);
        };
        if actual != change.expected_status.as_str() {
            let _ = tx.rollback().await;
            return Ok(WriteOutcome::StatusMismatch { actual });
        }

        if let Some(adjustment) = &change.slot_adjustment {
            let service_id = *adjustment.service_id().as_uuid();
            let row: Option<(i32,)> =
                sqlx::query_as("SELECT slots FROM service_slot_resources WHERE id = $1 FOR UPDATE")
                    .bind(service_id)
                    .fetch_optional(&mut *tx)
                    .await
                    .map_err(db_error("Failed to lock service resource"))?;
            let Some((slots,)) = row else {
                let _ = tx.rollback().await;
                return Err(PortalError::not_found("service resource", adjustment.service_id()));
            };
            let slots = to_units("service_slot_resources", service_id, slots)?;
            let Ok(next) = adjustment.apply_to(slots) else {
                let _ = tx.rollback().await;
                return Ok(WriteOutcome::SlotsExhausted);
            };
            sqlx::query("UPDATE service_slot_resources SET slots = $2 WHERE id = $1")
                .bind(service_id)
                .bind(to_column(next)?)
                .execute(&mut *tx)
                .await
                .map_err(db_error("Failed to move slot ledger"))?;
        }

        sqlx::query(
            r"
            UPDATE service_requests
            SET status = COALESCE($2, status),
                scheduled_date = COALESCE($3, scheduled_date),
                remarks = COALESCE($4, remarks),
                updated_at = $5
            WHERE id = $1
            ",
        )
        .bind(change.id.as_uuid())
        .bind(change.status.map(ServiceStatus::as_str))
        .bind(change.scheduled_date)
        .bind(&change.remarks)
        .bind(change.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(db_error("Failed to update service request"))?;

        tx.commit()
            .await
            .map_err(db_error("Failed to commit transaction"))?;
        Ok(WriteOutcome::Applied)
    }
}

// ============================================================================
// Documents
// ============================================================================

impl DocumentStore for PostgresPortalStore {
    async fn get_document_request(&self, id: DocumentRequestId) -> Result<Option<DocumentRequest>> {
        sqlx::query_as::<_, DocumentRow>(
            r"
            SELECT id, resident_id, document_type, purpose, status, remarks,
                   requested_at, released_at, handed_over_at, received_at,
                   created_at, updated_at
            FROM document_requests
            WHERE id = $1
            ",
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("Failed to get document request"))?
        .map(DocumentRequest::try_from)
        .transpose()
    }

    async fn insert_document_request(&self, request: &DocumentRequest) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO document_requests (
                id, resident_id, document_type, purpose, status, remarks,
                requested_at, released_at, handed_over_at, received_at,
                created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ",
        )
        .bind(request.id.as_uuid())
        .bind(request.resident_id.as_uuid())
        .bind(&request.document_type)
        .bind(&request.purpose)
        .bind(request.status.as_str())
        .bind(&request.remarks)
        .bind(request.stages.requested_at)
        .bind(request.stages.released_at)
        .bind(request.stages.handed_over_at)
        .bind(request.stages.received_at)
        .bind(request.created_at)
        .bind(request.updated_at)
        .execute(&self.pool)
        .await
        .map_err(db_error("Failed to insert document request"))?;
        Ok(())
    }

    async fn apply_document_change(&self, change: &DocumentChange) -> Result<WriteOutcome> {
        // A stage column is only filled while still NULL
        let result = sqlx::query(
            r"
            UPDATE document_requests
            SET status = COALESCE($2, status),
                remarks = COALESCE($3, remarks),
                updated_at = $4,
                requested_at = CASE WHEN $5 = 'requested' THEN COALESCE(requested_at, $6) ELSE requested_at END,
                released_at = CASE WHEN $5 = 'released' THEN COALESCE(released_at, $6) ELSE released_at END,
                handed_over_at = CASE WHEN $5 = 'handed_over' THEN COALESCE(handed_over_at, $6) ELSE handed_over_at END,
                received_at = CASE WHEN $5 = 'received' THEN COALESCE(received_at, $6) ELSE received_at END
            WHERE id = $1 AND status = $7
            ",
        )
        .bind(change.id.as_uuid())
        .bind(change.status.map(DocumentStatus::as_str))
        .bind(&change.remarks)
        .bind(change.updated_at)
        .bind(change.stage.map(|(stage, _)| DocumentStage::as_str(stage)))
        .bind(change.stage.map(|(_, at)| at))
        .bind(change.expected_status.as_str())
        .execute(&self.pool)
        .await
        .map_err(db_error("Failed to update document request"))?;

        if result.rows_affected() == 0 {
            return self.explain_miss("document_requests", *change.id.as_uuid()).await;
        }
        Ok(WriteOutcome::Applied)
    }
}

// ============================================================================
// Event registrations
// ============================================================================

impl EventRegistrationStore for PostgresPortalStore {
    async fn get_event_registration(
        &self,
        id: EventRegistrationId,
    ) -> Result<Option<EventRegistration>> {
        sqlx::query_as::<_, EventRegistrationRow>(
            r"
            SELECT id, event_id, resident_id, status, remarks, created_at, updated_at
            FROM event_registrations
            WHERE id = $1
            ",
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("Failed to get event registration"))?
        .map(EventRegistration::try_from)
        .transpose()
    }

    async fn insert_event_registration(&self, registration: &EventRegistration) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO event_registrations (
                id, event_id, resident_id, status, remarks, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            ",
        )
        .bind(registration.id.as_uuid())
        .bind(registration.event_id.as_uuid())
        .bind(registration.resident_id.as_uuid())
        .bind(registration.status.as_str())
        .bind(&registration.remarks)
        .bind(registration.created_at)
        .bind(registration.updated_at)
        .execute(&self.pool)
        .await
        .map_err(db_error("Failed to insert event registration"))?;
        Ok(())
    }

    async fn apply_event_registration_change(
        &self,
        change: &EventRegistrationChange,
    ) -> Result<WriteOutcome> {
        let result = sqlx::query(
            r"
            UPDATE event_registrations
            SET status = COALESCE($2, status),
                remarks = COALESCE($3, remarks),
                updated_at = $4
            WHERE id = $1 AND status = $5
            ",
        )
        .bind(change.id.as_uuid())
        .bind(change.status.map(EventRegistrationStatus::as_str))
        .bind(&change.remarks)
        .bind(change.updated_at)
        .bind(change.expected_status.as_str())
        .execute(&self.pool)
        .await
        .map_err(db_error("Failed to update event registration"))?;

        if result.rows_affected() == 0 {
            return self
                .explain_miss("event_registrations", *change.id.as_uuid())
                .await;
        }
        Ok(WriteOutcome::Applied)
    }
}
