//! Request lifecycle controller.
//!
//! Drives every request through its domain status machine:
//!
//! 1. load the entity (`NotFound` if absent)
//! 2. validate the status change (`ValidationFailed`)
//! 3. compute the net diff; an empty diff returns `modified_count = 0`
//! 4. reservations newly entering a binding status: capacity check
//! 5. service status changes: derive the slot ledger adjustment
//! 6. one conditional write keyed by id and expected prior status
//! 7. notify the resident if requested
//!
//! Validation and capacity errors happen before any mutation. A notification
//! failure after the write is logged and reported as a partial success.

use super::machine::StatusMachine;
use super::updates::{
    DocumentUpdate, EventRegistrationUpdate, NotificationOutcome, NotifyConfig, RequestUpdate,
    ReservationUpdate, ServiceUpdate, UpdateOutcome,
};
use crate::availability::{Availability, AvailabilityCalculator};
use crate::environment::Clock;
use crate::error::{PortalError, Result};
use crate::ledger::SlotAdjustment;
use crate::metrics;
use crate::notifications::{NotificationDispatcher, NotificationMessage};
use crate::providers::{
    CapacityGuard, DocumentChange, EventRegistrationChange, PortalStore, ReservationChange,
    ServiceChange, WriteOutcome,
};
use crate::types::{
    DateWindow, DocumentRequest, DocumentRequestId, DocumentStage, DocumentStatus, EventId,
    EventRegistration, EventRegistrationId, EventRegistrationStatus, RequestKind, ReservationId,
    ReservationRequest, ReservationStatus, ResourceId, ServiceId, ServiceRequest,
    ServiceRequestId, ServiceStatus, StageTimestamps, UserId,
};
use chrono::NaiveDate;
use std::fmt;
use std::sync::Arc;

/// Applies status transitions and their side effects.
pub struct LifecycleController<S, D> {
    store: Arc<S>,
    dispatcher: Arc<D>,
    availability: AvailabilityCalculator<S>,
    clock: Arc<dyn Clock>,
    link_base: String,
}

impl<S, D> LifecycleController<S, D>
where
    S: PortalStore,
    D: NotificationDispatcher,
{
    /// Create a controller.
    #[must_use]
    pub fn new(store: Arc<S>, dispatcher: Arc<D>, clock: Arc<dyn Clock>) -> Self {
        Self {
            availability: AvailabilityCalculator::new(Arc::clone(&store)),
            store,
            dispatcher,
            clock,
            link_base: String::new(),
        }
    }

    /// Prefix for deep links in notifications (e.g. `https://portal.example.gov`).
    #[must_use]
    pub fn with_link_base(mut self, link_base: impl Into<String>) -> Self {
        self.link_base = link_base.into().trim_end_matches('/').to_string();
        self
    }

    /// Underlying store.
    #[must_use]
    pub const fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Injected dispatcher.
    #[must_use]
    pub const fn dispatcher(&self) -> &Arc<D> {
        &self.dispatcher
    }

    /// Free units of a resource over `[start, end]`.
    ///
    /// # Errors
    ///
    /// `ValidationFailed` if `start > end`, `NotFound` for an unknown resource.
    pub async fn check_availability(
        &self,
        resource_id: ResourceId,
        start: NaiveDate,
        end: NaiveDate,
        exclude: Option<ReservationId>,
    ) -> Result<Availability> {
        self.availability
            .available(resource_id, start, end, exclude)
            .await
    }

    // ========================================================================
    // Resident actions
    // ========================================================================

    /// File a pending reservation. Pending requests consume no capacity.
    ///
    /// # Errors
    ///
    /// - `ValidationFailed` for zero units, an inverted window, or more units than the resource owns
    /// - `NotFound` for an unknown resource
    #[tracing::instrument(skip(self))]
    pub async fn submit_reservation(
        &self,
        resident_id: UserId,
        resource_id: ResourceId,
        requested_units: u32,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<ReservationRequest> {
        if requested_units == 0 {
            return Err(PortalError::validation(
                "requested units must be greater than zero",
            ));
        }
        DateWindow::new(start_date, end_date)?;

        let resource = self
            .store
            .get_resource(resource_id)
            .await?
            .ok_or_else(|| PortalError::not_found("bookable resource", resource_id))?;
        if requested_units > resource.total_units {
            return Err(PortalError::validation(format!(
                "requested {requested_units} units but '{}' only has {}",
                resource.name, resource.total_units
            )));
        }

        let now = self.clock.now();
        let reservation = ReservationRequest {
            id: ReservationId::new(),
            resource_id,
            resident_id,
            requested_units,
            start_date,
            end_date,
            status: ReservationStatus::Pending,
            remarks: None,
            created_at: now,
            updated_at: now,
        };
        self.store.insert_reservation(&reservation).await?;
        tracing::info!(reservation = %reservation.id, "Reservation submitted");
        Ok(reservation)
    }

    /// File a pending service request.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown service.
    #[tracing::instrument(skip(self))]
    pub async fn submit_service_request(
        &self,
        resident_id: UserId,
        service_id: ServiceId,
        scheduled_date: Option<NaiveDate>,
    ) -> Result<ServiceRequest> {
        self.store
            .get_service_resource(service_id)
            .await?
            .ok_or_else(|| PortalError::not_found("service resource", service_id))?;

        let now = self.clock.now();
        let request = ServiceRequest {
            id: ServiceRequestId::new(),
            service_id,
            resident_id,
            status: ServiceStatus::Pending,
            scheduled_date,
            remarks: None,
            created_at: now,
            updated_at: now,
        };
        self.store.insert_service_request(&request).await?;
        tracing::info!(request = %request.id, "Service request submitted");
        Ok(request)
    }

    /// File a pending document request, stamping its `requested` stage.
    ///
    /// # Errors
    ///
    /// `ValidationFailed` for a blank document type.
    #[tracing::instrument(skip(self))]
    pub async fn submit_document_request(
        &self,
        resident_id: UserId,
        document_type: String,
        purpose: Option<String>,
    ) -> Result<DocumentRequest> {
        if document_type.trim().is_empty() {
            return Err(PortalError::validation("document type is required"));
        }

        let now = self.clock.now();
        let mut stages = StageTimestamps::default();
        stages.set(DocumentStage::Requested, now);
        let request = DocumentRequest {
            id: DocumentRequestId::new(),
            resident_id,
            document_type,
            purpose,
            status: DocumentStatus::Pending,
            remarks: None,
            stages,
            created_at: now,
            updated_at: now,
        };
        self.store.insert_document_request(&request).await?;
        tracing::info!(request = %request.id, "Document request submitted");
        Ok(request)
    }

    /// Register a resident for an event.
    ///
    /// # Errors
    ///
    /// `DependencyFailure` if the store fails.
    #[tracing::instrument(skip(self))]
    pub async fn register_for_event(
        &self,
        resident_id: UserId,
        event_id: EventId,
    ) -> Result<EventRegistration> {
        let now = self.clock.now();
        let registration = EventRegistration {
            id: EventRegistrationId::new(),
            event_id,
            resident_id,
            status: EventRegistrationStatus::Pending,
            remarks: None,
            created_at: now,
            updated_at: now,
        };
        self.store.insert_event_registration(&registration).await?;
        Ok(registration)
    }

    /// Withdraw one's own reservation.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the reservation does not exist
    /// - `ValidationFailed` if `resident_id` does not own it or it can no longer be cancelled
    #[tracing::instrument(skip(self))]
    pub async fn cancel_reservation(
        &self,
        resident_id: UserId,
        id: ReservationId,
    ) -> Result<UpdateOutcome> {
        let current = self.load_reservation(id).await?;
        if current.resident_id != resident_id {
            return Err(PortalError::validation(
                "only the resident who filed a reservation can cancel it",
            ));
        }
        let update = ReservationUpdate {
            status: Some(ReservationStatus::Cancelled),
            remarks: None,
        };
        self.apply_reservation_update(current, update, &NotifyConfig::silent())
            .await
    }

    // ========================================================================
    // Administrator updates
    // ========================================================================

    /// Apply an update to any request domain.
    ///
    /// # Errors
    ///
    /// See the per-domain update methods.
    pub async fn update_request(
        &self,
        update: RequestUpdate,
        notify: &NotifyConfig,
    ) -> Result<UpdateOutcome> {
        match update {
            RequestUpdate::Document { id, fields } => {
                self.update_document_request(id, fields, notify).await
            }
            RequestUpdate::Reservation { id, fields } => {
                self.update_reservation(id, fields, notify).await
            }
            RequestUpdate::Service { id, fields } => {
                self.update_service_request(id, fields, notify).await
            }
            RequestUpdate::Event { id, fields } => {
                self.update_event_registration(id, fields, notify).await
            }
        }
    }

    /// Update an item reservation.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the reservation is absent
    /// - `ValidationFailed` for a transition the workflow does not allow
    /// - `CapacityExceeded` if approving would over-book the resource
    /// - `Conflict` if the reservation changed concurrently
    #[tracing::instrument(skip(self, update, notify))]
    pub async fn update_reservation(
        &self,
        id: ReservationId,
        update: ReservationUpdate,
        notify: &NotifyConfig,
    ) -> Result<UpdateOutcome> {
        let current = self.load_reservation(id).await?;
        self.apply_reservation_update(current, update, notify).await
    }

    /// Update a service request, moving the slot ledger with it.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the request or its service is absent
    /// - `ValidationFailed` for a transition the workflow does not allow
    /// - `CapacityExceeded` if re-opening would drive the slot counter below zero
    /// - `Conflict` if the request changed concurrently
    #[tracing::instrument(skip(self, update, notify))]
    pub async fn update_service_request(
        &self,
        id: ServiceRequestId,
        update: ServiceUpdate,
        notify: &NotifyConfig,
    ) -> Result<UpdateOutcome> {
        let current = self
            .store
            .get_service_request(id)
            .await?
            .ok_or_else(|| PortalError::not_found("service request", id))?;

        let target = update.status.unwrap_or(current.status);
        current.status.validate_transition(target)?;

        let status = (target != current.status).then_some(target);
        let scheduled_date = update
            .scheduled_date
            .filter(|date| current.scheduled_date != Some(*date));
        let remarks = changed_remarks(update.remarks, current.remarks.as_ref());
        if status.is_none() && scheduled_date.is_none() && remarks.is_none() {
            tracing::debug!("No net change, skipping write");
            return Ok(UpdateOutcome::unchanged());
        }

        let slot_adjustment = status
            .and_then(|to| SlotAdjustment::for_transition(current.service_id, current.status, to));
        if let Some(adjustment) = &slot_adjustment {
            let service = self
                .store
                .get_service_resource(current.service_id)
                .await?
                .ok_or_else(|| PortalError::not_found("service resource", current.service_id))?;
            if let Err(error) = adjustment.apply_to(service.slots) {
                metrics::record_capacity_rejection(RequestKind::Service);
                return Err(error);
            }
        }

        let change = ServiceChange {
            id,
            expected_status: current.status,
            status,
            scheduled_date,
            remarks,
            slot_adjustment,
            updated_at: self.clock.now(),
        };
        let outcome = self.store.apply_service_change(&change).await?;
        if outcome == WriteOutcome::SlotsExhausted {
            metrics::record_capacity_rejection(RequestKind::Service);
        }
        resolve_write(outcome, "service request", id, current.status.as_str(), 1)?;

        Ok(self
            .committed(
                RequestKind::Service,
                current.resident_id,
                id,
                status.map(ServiceStatus::as_str),
                notify,
            )
            .await)
    }

    /// Update a document request, stamping a hand-off stage if requested.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the request is absent
    /// - `ValidationFailed` for a transition the workflow does not allow
    /// - `Conflict` if the request changed concurrently
    #[tracing::instrument(skip(self, update, notify))]
    pub async fn update_document_request(
        &self,
        id: DocumentRequestId,
        update: DocumentUpdate,
        notify: &NotifyConfig,
    ) -> Result<UpdateOutcome> {
        let current = self
            .store
            .get_document_request(id)
            .await?
            .ok_or_else(|| PortalError::not_found("document request", id))?;

        let target = update.status.unwrap_or(current.status);
        current.status.validate_transition(target)?;

        let now = self.clock.now();
        let status = (target != current.status).then_some(target);
        let remarks = changed_remarks(update.remarks, current.remarks.as_ref());
        let stage = update
            .stage
            .filter(|stage| current.stages.get(*stage).is_none())
            .map(|stage| (stage, now));
        if status.is_none() && remarks.is_none() && stage.is_none() {
            tracing::debug!("No net change, skipping write");
            return Ok(UpdateOutcome::unchanged());
        }

        let change = DocumentChange {
            id,
            expected_status: current.status,
            status,
            remarks,
            stage,
            updated_at: now,
        };
        let outcome = self.store.apply_document_change(&change).await?;
        resolve_write(outcome, "document request", id, current.status.as_str(), 0)?;

        Ok(self
            .committed(
                RequestKind::Document,
                current.resident_id,
                id,
                status.map(DocumentStatus::as_str),
                notify,
            )
            .await)
    }

    /// Update an event registration.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the registration is absent
    /// - `ValidationFailed` for a transition the workflow does not allow
    /// - `Conflict` if the registration changed concurrently
    #[tracing::instrument(skip(self, update, notify))]
    pub async fn update_event_registration(
        &self,
        id: EventRegistrationId,
        update: EventRegistrationUpdate,
        notify: &NotifyConfig,
    ) -> Result<UpdateOutcome> {
        let current = self
            .store
            .get_event_registration(id)
            .await?
            .ok_or_else(|| PortalError::not_found("event registration", id))?;

        let target = update.status.unwrap_or(current.status);
        current.status.validate_transition(target)?;

        let status = (target != current.status).then_some(target);
        let remarks = changed_remarks(update.remarks, current.remarks.as_ref());
        if status.is_none() && remarks.is_none() {
            tracing::debug!("No net change, skipping write");
            return Ok(UpdateOutcome::unchanged());
        }

        let change = EventRegistrationChange {
            id,
            expected_status: current.status,
            status,
            remarks,
            updated_at: self.clock.now(),
        };
        let outcome = self.store.apply_event_registration_change(&change).await?;
        resolve_write(outcome, "event registration", id, current.status.as_str(), 0)?;

        Ok(self
            .committed(
                RequestKind::Event,
                current.resident_id,
                id,
                status.map(EventRegistrationStatus::as_str),
                notify,
            )
            .await)
    }

    // ========================================================================
    // Internals
    // ========================================================================

    async fn load_reservation(&self, id: ReservationId) -> Result<ReservationRequest> {
        self.store
            .get_reservation(id)
            .await?
            .ok_or_else(|| PortalError::not_found("reservation", id))
    }

    async fn apply_reservation_update(
        &self,
        current: ReservationRequest,
        update: ReservationUpdate,
        notify: &NotifyConfig,
    ) -> Result<UpdateOutcome> {
        let target = update.status.unwrap_or(current.status);
        current.status.validate_transition(target)?;

        let status = (target != current.status).then_some(target);
        let remarks = changed_remarks(update.remarks, current.remarks.as_ref());
        if status.is_none() && remarks.is_none() {
            tracing::debug!(reservation = %current.id, "No net change, skipping write");
            return Ok(UpdateOutcome::unchanged());
        }

        let capacity_guard = if target.is_binding() && !current.is_binding() {
            let window = current.window();
            let availability = self
                .availability
                .available_in(current.resource_id, window, Some(current.id))
                .await?;
            if current.requested_units > availability.available {
                metrics::record_capacity_rejection(RequestKind::Reservation);
                tracing::info!(
                    reservation = %current.id,
                    requested = current.requested_units,
                    available = availability.available,
                    "Approval refused, not enough capacity"
                );
                return Err(PortalError::CapacityExceeded {
                    requested: current.requested_units,
                    available: availability.available,
                });
            }
            Some(CapacityGuard {
                resource_id: current.resource_id,
                window,
                requested_units: current.requested_units,
            })
        } else {
            None
        };

        let change = ReservationChange {
            id: current.id,
            expected_status: current.status,
            status,
            remarks,
            capacity_guard,
            updated_at: self.clock.now(),
        };
        let outcome = self.store.apply_reservation_change(&change).await?;
        if matches!(outcome, WriteOutcome::CapacityExceeded { .. }) {
            metrics::record_capacity_rejection(RequestKind::Reservation);
        }
        resolve_write(
            outcome,
            "reservation",
            current.id,
            current.status.as_str(),
            current.requested_units,
        )?;

        Ok(self
            .committed(
                RequestKind::Reservation,
                current.resident_id,
                current.id,
                status.map(ReservationStatus::as_str),
                notify,
            )
            .await)
    }

    /// Post-commit bookkeeping and the optional notification.
    async fn committed(
        &self,
        kind: RequestKind,
        resident_id: UserId,
        id: impl fmt::Display,
        status: Option<&'static str>,
        notify: &NotifyConfig,
    ) -> UpdateOutcome {
        if let Some(status) = status {
            metrics::record_transition(kind, status);
            tracing::info!(domain = kind.as_str(), %id, status, "Status transition committed");
        }

        let notification = if notify.send_notif {
            let message = self.message(kind, resident_id, &id.to_string(), status, notify);
            match self.dispatcher.notify(message).await {
                Ok(notification_id) => NotificationOutcome::Sent(notification_id),
                Err(error) => {
                    tracing::warn!(
                        domain = kind.as_str(),
                        %id,
                        %error,
                        "Update committed but notification failed"
                    );
                    NotificationOutcome::Failed(error.to_string())
                }
            }
        } else {
            NotificationOutcome::NotSent
        };

        UpdateOutcome {
            modified_count: 1,
            notification,
        }
    }

    fn message(
        &self,
        kind: RequestKind,
        recipient: UserId,
        id: &str,
        status: Option<&str>,
        notify: &NotifyConfig,
    ) -> NotificationMessage {
        let title = notify
            .title
            .clone()
            .unwrap_or_else(|| format!("{} update", capitalize(kind.noun())));
        let details = notify.details.clone().unwrap_or_else(|| match status {
            Some(status) => format!(
                "Your {} {id} is now {}.",
                kind.noun(),
                status.replace('_', " ")
            ),
            None => format!("Your {} {id} has been updated.", kind.noun()),
        });
        NotificationMessage {
            recipient,
            title,
            category: kind.as_str().to_string(),
            details,
            link: format!("{}/{}/{id}", self.link_base, kind.path_segment()),
        }
    }
}

/// `Some(new)` only if it differs from what is stored.
fn changed_remarks(update: Option<String>, current: Option<&String>) -> Option<String> {
    update.filter(|remarks| current != Some(remarks))
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}

/// Map a conditional write outcome to the caller-facing result.
fn resolve_write(
    outcome: WriteOutcome,
    entity: &'static str,
    id: impl fmt::Display,
    expected: &str,
    requested: u32,
) -> Result<()> {
    match outcome {
        WriteOutcome::Applied => Ok(()),
        WriteOutcome::Missing => Err(PortalError::not_found(entity, id)),
        WriteOutcome::StatusMismatch { actual } => Err(PortalError::Conflict {
            entity,
            id: id.to_string(),
            expected: expected.to_string(),
            actual,
        }),
        WriteOutcome::CapacityExceeded { available } => {
            Err(PortalError::CapacityExceeded { requested, available })
        }
        WriteOutcome::SlotsExhausted => Err(PortalError::CapacityExceeded {
            requested: 1,
            available: 0,
        }),
    }
}
