//! Row types and their conversion into domain entities.
//!
//! Statuses are stored as free text and parsed here; an unknown value is a
//! corrupt row and surfaces as `DependencyFailure`.

use chrono::{DateTime, NaiveDate, Utc};
use municipal_portal_core::error::{PortalError, Result};
use municipal_portal_core::types::{
    BookableResource, DocumentRequest, DocumentRequestId, EventId, EventRegistration,
    EventRegistrationId, Notification, NotificationId, ReservationId, ReservationRequest,
    ResourceId, ServiceId, ServiceRequest, ServiceRequestId, ServiceSlotResource,
    StageTimestamps, UserId,
};
use std::str::FromStr;
use uuid::Uuid;

pub(crate) fn db_error(context: &'static str) -> impl FnOnce(sqlx::Error) -> PortalError {
    move |e| PortalError::dependency("postgres", format!("{context}: {e}"))
}

fn parse_status<T>(table: &'static str, id: Uuid, value: &str) -> Result<T>
where
    T: FromStr<Err = PortalError>,
{
    value.parse().map_err(|_| {
        PortalError::dependency("postgres", format!("{table} {id} has unknown status '{value}'"))
    })
}

pub(crate) fn to_units(table: &'static str, id: Uuid, value: i32) -> Result<u32> {
    u32::try_from(value).map_err(|_| {
        PortalError::dependency("postgres", format!("{table} {id} has negative units {value}"))
    })
}

pub(crate) fn to_column(value: u32) -> Result<i32> {
    i32::try_from(value)
        .map_err(|_| PortalError::validation(format!("{value} does not fit a database integer")))
}

#[derive(sqlx::FromRow)]
pub(crate) struct ResourceRow {
    id: Uuid,
    name: String,
    description: Option<String>,
    total_units: i32,
    created_at: DateTime<Utc>,
}

impl TryFrom<ResourceRow> for BookableResource {
    type Error = PortalError;

    fn try_from(row: ResourceRow) -> Result<Self> {
        Ok(Self {
            id: ResourceId::from_uuid(row.id),
            total_units: to_units("bookable_resources", row.id, row.total_units)?,
            name: row.name,
            description: row.description,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct ServiceSlotRow {
    id: Uuid,
    name: String,
    slots: i32,
}

impl TryFrom<ServiceSlotRow> for ServiceSlotResource {
    type Error = PortalError;

    fn try_from(row: ServiceSlotRow) -> Result<Self> {
        Ok(Self {
            id: ServiceId::from_uuid(row.id),
            slots: to_units("service_slot_resources", row.id, row.slots)?,
            name: row.name,
        })
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct ReservationRow {
    id: Uuid,
    resource_id: Uuid,
    resident_id: Uuid,
    requested_units: i32,
    start_date: NaiveDate,
    end_date: NaiveDate,
    status: String,
    remarks: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ReservationRow> for ReservationRequest {
    type Error = PortalError;

    fn try_from(row: ReservationRow) -> Result<Self> {
        Ok(Self {
            id: ReservationId::from_uuid(row.id),
            resource_id: ResourceId::from_uuid(row.resource_id),
            resident_id: UserId::from_uuid(row.resident_id),
            requested_units: to_units("reservation_requests", row.id, row.requested_units)?,
            start_date: row.start_date,
            end_date: row.end_date,
            status: parse_status("reservation_requests", row.id, &row.status)?,
            remarks: row.remarks,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct ServiceRequestRow {
    id: Uuid,
    service_id: Uuid,
    resident_id: Uuid,
    status: String,
    scheduled_date: Option<NaiveDate>,
    remarks: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ServiceRequestRow> for ServiceRequest {
    type Error = PortalError;

    fn try_from(row: ServiceRequestRow) -> Result<Self> {
        Ok(Self {
            id: ServiceRequestId::from_uuid(row.id),
            service_id: ServiceId::from_uuid(row.service_id),
            resident_id: UserId::from_uuid(row.resident_id),
            status: parse_status("service_requests", row.id, &row.status)?,
            scheduled_date: row.scheduled_date,
            remarks: row.remarks,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct DocumentRow {
    id: Uuid,
    resident_id: Uuid,
    document_type: String,
    purpose: Option<String>,
    status: String,
    remarks: Option<String>,
    requested_at: Option<DateTime<Utc>>,
    released_at: Option<DateTime<Utc>>,
    handed_over_at: Option<DateTime<Utc>>,
    received_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<DocumentRow> for DocumentRequest {
    type Error = PortalError;

    fn try_from(row: DocumentRow) -> Result<Self> {
        Ok(Self {
            id: DocumentRequestId::from_uuid(row.id),
            resident_id: UserId::from_uuid(row.resident_id),
            status: parse_status("document_requests", row.id, &row.status)?,
            document_type: row.document_type,
            purpose: row.purpose,
            remarks: row.remarks,
            stages: StageTimestamps {
                requested_at: row.requested_at,
                released_at: row.released_at,
                handed_over_at: row.handed_over_at,
                received_at: row.received_at,
            },
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct EventRegistrationRow {
    id: Uuid,
    event_id: Uuid,
    resident_id: Uuid,
    status: String,
    remarks: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<EventRegistrationRow> for EventRegistration {
    type Error = PortalError;

    fn try_from(row: EventRegistrationRow) -> Result<Self> {
        Ok(Self {
            id: EventRegistrationId::from_uuid(row.id),
            event_id: EventId::from_uuid(row.event_id),
            resident_id: UserId::from_uuid(row.resident_id),
            status: parse_status("event_registrations", row.id, &row.status)?,
            remarks: row.remarks,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct NotificationRow {
    id: Uuid,
    recipient_id: Uuid,
    title: String,
    category: String,
    details: String,
    link: String,
    seen: bool,
    created_at: DateTime<Utc>,
}

impl From<NotificationRow> for Notification {
    fn from(row: NotificationRow) -> Self {
        Self {
            id: NotificationId::from_uuid(row.id),
            recipient_id: UserId::from_uuid(row.recipient_id),
            title: row.title,
            category: row.category,
            details: row.details,
            link: row.link,
            seen: row.seen,
            created_at: row.created_at,
        }
    }
}
