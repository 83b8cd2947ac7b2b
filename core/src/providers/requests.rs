//! Request stores: reads, inserts and conditional writes for the four request domains.
//!
//! Every change struct carries the status the caller observed
//! (`expected_status`). Stores apply the change only if the stored status still
//! matches, and report the reason otherwise through [`WriteOutcome`].

use super::WriteOutcome;
use crate::error::Result;
use crate::ledger::SlotAdjustment;
use crate::types::{
    DateWindow, DocumentRequest, DocumentRequestId, DocumentStage, DocumentStatus,
    EventRegistration, EventRegistrationId, EventRegistrationStatus, ReservationId,
    ReservationRequest, ReservationStatus, ResourceId, ServiceRequest, ServiceRequestId,
    ServiceStatus,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::future::Future;

// ============================================================================
// Change sets
// ============================================================================

/// Capacity precondition evaluated inside a reservation write.
///
/// The store sums the binding reservations of `resource_id` overlapping `window`
/// (excluding the reservation being written) and refuses the write if
/// `requested_units` no longer fits.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct CapacityGuard {
    /// Resource whose capacity is checked
    pub resource_id: ResourceId,
    /// Window of the reservation
    pub window: DateWindow,
    /// Units the reservation binds
    pub requested_units: u32,
}

/// Conditional write of a reservation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ReservationChange {
    /// Reservation to write
    pub id: ReservationId,
    /// Status the caller observed
    pub expected_status: ReservationStatus,
    /// New status, if it changes
    pub status: Option<ReservationStatus>,
    /// New remarks, if they change
    pub remarks: Option<String>,
    /// Present when the reservation newly enters a binding status
    pub capacity_guard: Option<CapacityGuard>,
    /// Modification time
    pub updated_at: DateTime<Utc>,
}

/// Conditional write of a service request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ServiceChange {
    /// Request to write
    pub id: ServiceRequestId,
    /// Status the caller observed
    pub expected_status: ServiceStatus,
    /// New status
    pub status: Option<ServiceStatus>,
    /// New scheduled date
    pub scheduled_date: Option<NaiveDate>,
    /// New remarks
    pub remarks: Option<String>,
    /// Ledger movement committed with the status flip
    pub slot_adjustment: Option<SlotAdjustment>,
    /// Modification time
    pub updated_at: DateTime<Utc>,
}

/// Conditional write of a document request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DocumentChange {
    /// Request to write
    pub id: DocumentRequestId,
    /// Status the caller observed
    pub expected_status: DocumentStatus,
    /// New status
    pub status: Option<DocumentStatus>,
    /// New remarks
    pub remarks: Option<String>,
    /// Stage to stamp; stores only fill it if still null
    pub stage: Option<(DocumentStage, DateTime<Utc>)>,
    /// Modification time
    pub updated_at: DateTime<Utc>,
}

/// Conditional write of an event registration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct EventRegistrationChange {
    /// Registration to write
    pub id: EventRegistrationId,
    /// Status the caller observed
    pub expected_status: EventRegistrationStatus,
    /// New status
    pub status: Option<EventRegistrationStatus>,
    /// New remarks
    pub remarks: Option<String>,
    /// Modification time
    pub updated_at: DateTime<Utc>,
}

// ============================================================================
// Stores
// ============================================================================

/// Item reservation persistence.
pub trait ReservationStore: Send + Sync {
    /// Load a reservation.
    ///
    /// # Errors
    ///
    /// Returns `DependencyFailure` if the store is unreachable.
    fn get_reservation(
        &self,
        id: ReservationId,
    ) -> impl Future<Output = Result<Option<ReservationRequest>>> + Send;

    /// Persist a newly filed reservation.
    ///
    /// # Errors
    ///
    /// Returns `DependencyFailure` if the row could not be written.
    fn insert_reservation(
        &self,
        reservation: &ReservationRequest,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Binding reservations of `resource_id` overlapping `window`, minus `exclude`.
    ///
    /// # Errors
    ///
    /// Returns `DependencyFailure` if the store is unreachable.
    fn binding_reservations(
        &self,
        resource_id: ResourceId,
        window: DateWindow,
        exclude: Option<ReservationId>,
    ) -> impl Future<Output = Result<Vec<ReservationRequest>>> + Send;

    /// Apply a reservation change as one conditional write.
    ///
    /// # Errors
    ///
    /// Returns `DependencyFailure` if the store is unreachable, and `NotFound`
    /// if the capacity guard names a resource that does not exist. Precondition
    /// failures are reported through the returned [`WriteOutcome`].
    fn apply_reservation_change(
        &self,
        change: &ReservationChange,
    ) -> impl Future<Output = Result<WriteOutcome>> + Send;
}

/// Service booking persistence.
pub trait ServiceRequestStore: Send + Sync {
    /// Load a service request.
    ///
    /// # Errors
    ///
    /// Returns `DependencyFailure` if the store is unreachable.
    fn get_service_request(
        &self,
        id: ServiceRequestId,
    ) -> impl Future<Output = Result<Option<ServiceRequest>>> + Send;

    /// Persist a newly filed service request.
    ///
    /// # Errors
    ///
    /// Returns `DependencyFailure` if the row could not be written.
    fn insert_service_request(
        &self,
        request: &ServiceRequest,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Apply a service change and its slot adjustment as one conditional write.
    ///
    /// # Errors
    ///
    /// Returns `DependencyFailure` if the store is unreachable.
    fn apply_service_change(
        &self,
        change: &ServiceChange,
    ) -> impl Future<Output = Result<WriteOutcome>> + Send;
}

/// Document request persistence.
pub trait DocumentStore: Send + Sync {
    /// Load a document request.
    ///
    /// # Errors
    ///
    /// Returns `DependencyFailure` if the store is unreachable.
    fn get_document_request(
        &self,
        id: DocumentRequestId,
    ) -> impl Future<Output = Result<Option<DocumentRequest>>> + Send;

    /// Persist a newly filed document request.
    ///
    /// # Errors
    ///
    /// Returns `DependencyFailure` if the row could not be written.
    fn insert_document_request(
        &self,
        request: &DocumentRequest,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Apply a document change as one conditional write.
    ///
    /// # Errors
    ///
    /// Returns `DependencyFailure` if the store is unreachable.
    fn apply_document_change(
        &self,
        change: &DocumentChange,
    ) -> impl Future<Output = Result<WriteOutcome>> + Send;
}

/// Event registration persistence.
pub trait EventRegistrationStore: Send + Sync {
    /// Load an event registration.
    ///
    /// # Errors
    ///
    /// Returns `DependencyFailure` if the store is unreachable.
    fn get_event_registration(
        &self,
        id: EventRegistrationId,
    ) -> impl Future<Output = Result<Option<EventRegistration>>> + Send;

    /// Persist a new registration.
    ///
    /// # Errors
    ///
    /// Returns `DependencyFailure` if the row could not be written.
    fn insert_event_registration(
        &self,
        registration: &EventRegistration,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Apply a registration change as one conditional write.
    ///
    /// # Errors
    ///
    /// Returns `DependencyFailure` if the store is unreachable.
    fn apply_event_registration_change(
        &self,
        change: &EventRegistrationChange,
    ) -> impl Future<Output = Result<WriteOutcome>> + Send;
}
