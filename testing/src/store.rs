//! In-memory portal store for fast, deterministic testing.
//!
//! Every conditional write runs inside a single mutex critical section, so the
//! capacity recheck (or slot adjustment) and the status flip are atomic with
//! respect to every other write.

use crate::mocks::test_clock;
use municipal_portal_core::availability::units_available;
use municipal_portal_core::environment::Clock;
use municipal_portal_core::error::{PortalError, Result};
use municipal_portal_core::ledger::SlotLedger;
use municipal_portal_core::providers::{
    DocumentChange, DocumentStore, EventRegistrationChange, EventRegistrationStore,
    NotificationStore, ReservationChange, ReservationStore, ResourceStore, ServiceChange,
    ServiceRequestStore, WriteOutcome,
};
use municipal_portal_core::types::{
    BookableResource, DateWindow, DocumentRequest, DocumentRequestId, EventRegistration,
    EventRegistrationId, Notification, NotificationId, ReservationId, ReservationRequest,
    ResourceId, ServiceId, ServiceRequest, ServiceRequestId, ServiceSlotResource, UserId,
};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct Inner {
    resources: HashMap<ResourceId, BookableResource>,
    services: HashMap<ServiceId, String>,
    ledger: SlotLedger,
    reservations: HashMap<ReservationId, ReservationRequest>,
    service_requests: HashMap<ServiceRequestId, ServiceRequest>,
    documents: HashMap<DocumentRequestId, DocumentRequest>,
    registrations: HashMap<EventRegistrationId, EventRegistration>,
    // insertion order
    notifications: Vec<Notification>,
}

/// Action run once, just before the next conditional reservation or service write.
#[derive(Default)]
struct WriteHook(Option<Box<dyn FnOnce() + Send>>);

impl fmt::Debug for WriteHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("WriteHook").field(&self.0.is_some()).finish()
    }
}

/// HashMap-backed implementation of every portal store trait.
///
/// Cloning shares the underlying state.
///
/// # Example
///
/// ```
/// use municipal_portal_testing::InMemoryPortalStore;
/// use municipal_portal_core::providers::ResourceStore;
///
/// # async fn example() -> municipal_portal_core::Result<()> {
/// let store = InMemoryPortalStore::new();
/// let tents = store.add_resource("Tents", 4);
/// assert_eq!(store.get_resource(tents.id).await?, Some(tents));
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug, Default)]
pub struct InMemoryPortalStore {
    inner: Arc<Mutex<Inner>>,
    fail_notifications: Arc<AtomicBool>,
    before_write: Arc<Mutex<WriteHook>>,
}

impl InMemoryPortalStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| PortalError::dependency("in-memory store", "lock poisoned"))
    }

    // Seeding helpers never fail in practice; a poisoned lock is recovered.
    fn lock_for_seeding(&self) -> MutexGuard<'_, Inner> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn run_write_hook(&self) {
        let hook = self
            .before_write
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .0
            .take();
        if let Some(hook) = hook {
            hook();
        }
    }

    /// Register a bookable resource.
    pub fn add_resource(&self, name: &str, total_units: u32) -> BookableResource {
        let resource = BookableResource::new(name, total_units, test_clock().now());
        self.lock_for_seeding()
            .resources
            .insert(resource.id, resource.clone());
        resource
    }

    /// Register a service with an opening slot balance.
    pub fn add_service_resource(&self, name: &str, slots: u32) -> ServiceSlotResource {
        let service = ServiceSlotResource {
            id: ServiceId::new(),
            name: name.to_string(),
            slots,
        };
        let mut inner = self.lock_for_seeding();
        inner.services.insert(service.id, service.name.clone());
        inner.ledger.open(service.id, slots);
        service
    }

    /// Insert a reservation as-is, bypassing every check.
    pub fn seed_reservation(&self, reservation: ReservationRequest) {
        self.lock_for_seeding()
            .reservations
            .insert(reservation.id, reservation);
    }

    /// Insert a service request as-is.
    pub fn seed_service_request(&self, request: ServiceRequest) {
        self.lock_for_seeding()
            .service_requests
            .insert(request.id, request);
    }

    /// Snapshot of a reservation.
    #[must_use]
    pub fn reservation(&self, id: ReservationId) -> Option<ReservationRequest> {
        self.lock_for_seeding().reservations.get(&id).cloned()
    }

    /// Current slot balance of a service.
    #[must_use]
    pub fn service_slots(&self, id: ServiceId) -> Option<u32> {
        self.lock_for_seeding().ledger.available(id)
    }

    /// Every notification ever stored, in insertion order.
    #[must_use]
    pub fn notifications(&self) -> Vec<Notification> {
        self.lock_for_seeding().notifications.clone()
    }

    /// Number of stored notifications.
    #[must_use]
    pub fn notification_count(&self) -> usize {
        self.lock_for_seeding().notifications.len()
    }

    /// Overwrite the slot balance of a registered service.
    pub fn set_service_slots(&self, id: ServiceId, slots: u32) {
        self.lock_for_seeding().ledger.open(id, slots);
    }

    /// Run `hook` right before the next reservation or service conditional write.
    ///
    /// Lets a test commit a competing change between the controller's
    /// pre-check and the store's atomic recheck.
    pub fn before_next_write(&self, hook: impl FnOnce() + Send + 'static) {
        self.before_write
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .0 = Some(Box::new(hook));
    }

    /// Make `insert_notification` fail with `DependencyFailure`.
    pub fn fail_notifications(&self, fail: bool) {
        self.fail_notifications.store(fail, Ordering::SeqCst);
    }
}

impl ResourceStore for InMemoryPortalStore {
    async fn get_resource(&self, resource_id: ResourceId) -> Result<Option<BookableResource>> {
        Ok(self.lock()?.resources.get(&resource_id).cloned())
    }

    async fn get_service_resource(
        &self,
        service_id: ServiceId,
    ) -> Result<Option<ServiceSlotResource>> {
        let inner = self.lock()?;
        Ok(inner.services.get(&service_id).map(|name| ServiceSlotResource {
            id: service_id,
            name: name.clone(),
            slots: inner.ledger.available(service_id).unwrap_or(0),
        }))
    }
}

impl ReservationStore for InMemoryPortalStore {
    async fn get_reservation(&self, id: ReservationId) -> Result<Option<ReservationRequest>> {
        Ok(self.lock()?.reservations.get(&id).cloned())
    }

    async fn insert_reservation(&self, reservation: &ReservationRequest) -> Result<()> {
        self.lock()?
            .reservations
            .insert(reservation.id, reservation.clone());
        Ok(())
    }

    async fn binding_reservations(
        &self,
        resource_id: ResourceId,
        window: DateWindow,
        exclude: Option<ReservationId>,
    ) -> Result<Vec<ReservationRequest>> {
        Ok(self
            .lock()?
            .reservations
            .values()
            .filter(|r| r.resource_id == resource_id)
            .filter(|r| r.is_binding())
            .filter(|r| Some(r.id) != exclude)
            .filter(|r| r.window().overlaps(&window))
            .cloned()
            .collect())
    }

    async fn apply_reservation_change(&self, change: &ReservationChange) -> Result<WriteOutcome> {
        self.run_write_hook();
        let mut inner = self.lock()?;

        let current_status = match inner.reservations.get(&change.id) {
            Some(reservation) => reservation.status,
            None => return Ok(WriteOutcome::Missing),
        };
        if current_status != change.expected_status {
            return Ok(WriteOutcome::StatusMismatch {
                actual: current_status.as_str().to_string(),
            });
        }

        if let Some(guard) = &change.capacity_guard {
            let Some(total) = inner
                .resources
                .get(&guard.resource_id)
                .map(|resource| resource.total_units)
            else {
                return Err(PortalError::not_found("bookable resource", guard.resource_id));
            };
            let competing: Vec<ReservationRequest> = inner
                .reservations
                .values()
                .filter(|r| r.resource_id == guard.resource_id)
                .cloned()
                .collect();
            let available = units_available(total, &guard.window, &competing, Some(change.id));
            if guard.requested_units > available {
                tracing::debug!(reservation = %change.id, available, "Capacity recheck failed");
                return Ok(WriteOutcome::CapacityExceeded { available });
            }
        }

        let Some(reservation) = inner.reservations.get_mut(&change.id) else {
            return Ok(WriteOutcome::Missing);
        };
        if let Some(status) = change.status {
            reservation.status = status;
        }
        if let Some(remarks) = &change.remarks {
            reservation.remarks = Some(remarks.clone());
        }
        reservation.updated_at = change.updated_at;
        Ok(WriteOutcome::Applied)
    }
}

impl ServiceRequestStore for InMemoryPortalStore {
    async fn get_service_request(&self, id: ServiceRequestId) -> Result<Option<ServiceRequest>> {
        Ok(self.lock()?.service_requests.get(&id).cloned())
    }

    async fn insert_service_request(&self, request: &ServiceRequest) -> Result<()> {
        self.lock()?
            .service_requests
            .insert(request.id, request.clone());
        Ok(())
    }

    async fn apply_service_change(&self, change: &ServiceChange) -> Result<WriteOutcome> {
        self.run_write_hook();
        let mut inner = self.lock()?;

        let current_status = match inner.service_requests.get(&change.id) {
            Some(request) => request.status,
            None => return Ok(WriteOutcome::Missing),
        };
        if current_status != change.expected_status {
            return Ok(WriteOutcome::StatusMismatch {
                actual: current_status.as_str().to_string(),
            });
        }

        if let Some(adjustment) = &change.slot_adjustment {
            match inner.ledger.apply(adjustment) {
                Ok(_) => {}
                Err(PortalError::CapacityExceeded { .. }) => return Ok(WriteOutcome::SlotsExhausted),
                Err(error) => return Err(error),
            }
        }

        let Some(request) = inner.service_requests.get_mut(&change.id) else {
            return Ok(WriteOutcome::Missing);
        };
        if let Some(status) = change.status {
            request.status = status;
        }
        if let Some(date) = change.scheduled_date {
            request.scheduled_date = Some(date);
        }
        if let Some(remarks) = &change.remarks {
            request.remarks = Some(remarks.clone());
        }
        request.updated_at = change.updated_at;
        Ok(WriteOutcome::Applied)
    }
}

impl DocumentStore for InMemoryPortalStore {
    async fn get_document_request(&self, id: DocumentRequestId) -> Result<Option<DocumentRequest>> {
        Ok(self.lock()?.documents.get(&id).cloned())
    }

    async fn insert_document_request(&self, request: &DocumentRequest) -> Result<()> {
        self.lock()?.documents.insert(request.id, request.clone());
        Ok(())
    }

    async fn apply_document_change(&self, change: &DocumentChange) -> Result<WriteOutcome> {
        let mut inner = self.lock()?;
        let Some(request) = inner.documents.get_mut(&change.id) else {
            return Ok(WriteOutcome::Missing);
        };
        if request.status != change.expected_status {
            return Ok(WriteOutcome::StatusMismatch {
                actual: request.status.as_str().to_string(),
            });
        }

        if let Some(status) = change.status {
            request.status = status;
        }
        if let Some(remarks) = &change.remarks {
            request.remarks = Some(remarks.clone());
        }
        if let Some((stage, at)) = change.stage {
            if request.stages.get(stage).is_none() {
                request.stages.set(stage, at);
            }
        }
        request.updated_at = change.updated_at;
        Ok(WriteOutcome::Applied)
    }
}

impl EventRegistrationStore for InMemoryPortalStore {
    async fn get_event_registration(
        &self,
        id: EventRegistrationId,
    ) -> Result<Option<EventRegistration>> {
        Ok(self.lock()?.registrations.get(&id).cloned())
    }

    async fn insert_event_registration(&self, registration: &EventRegistration) -> Result<()> {
        self.lock()?
            .registrations
            .insert(registration.id, registration.clone());
        Ok(())
    }

    async fn apply_event_registration_change(
        &self,
        change: &EventRegistrationChange,
    ) -> Result<WriteOutcome> {
        let mut inner = self.lock()?;
        let Some(registration) = inner.registrations.get_mut(&change.id) else {
            return Ok(WriteOutcome::Missing);
        };
        if registration.status != change.expected_status {
            return Ok(WriteOutcome::StatusMismatch {
                actual: registration.status.as_str().to_string(),
            });
        }

        if let Some(status) = change.status {
            registration.status = status;
        }
        if let Some(remarks) = &change.remarks {
            registration.remarks = Some(remarks.clone());
        }
        registration.updated_at = change.updated_at;
        Ok(WriteOutcome::Applied)
    }
}

impl NotificationStore for InMemoryPortalStore {
    async fn insert_notification(&self, notification: &Notification) -> Result<()> {
        if self.fail_notifications.load(Ordering::SeqCst) {
            return Err(PortalError::dependency(
                "notification store",
                "simulated write failure",
            ));
        }
        self.lock()?.notifications.push(notification.clone());
        Ok(())
    }

    async fn list_notifications(&self, recipient_id: UserId) -> Result<Vec<Notification>> {
        let mut list: Vec<Notification> = self
            .lock()?
            .notifications
            .iter()
            .rev()
            .filter(|n| n.recipient_id == recipient_id)
            .cloned()
            .collect();
        // stable: equal timestamps keep reverse insertion order
        list.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(list)
    }

    async fn mark_seen(&self, recipient_id: UserId, notification_id: NotificationId) -> Result<bool> {
        let mut inner = self.lock()?;
        let Some(notification) = inner
            .notifications
            .iter_mut()
            .find(|n| n.id == notification_id && n.recipient_id == recipient_id)
        else {
            return Ok(false);
        };
        notification.seen = true;
        Ok(true)
    }

    async fn mark_all_seen(&self, recipient_id: UserId) -> Result<u64> {
        let mut inner = self.lock()?;
        let mut changed = 0;
        for notification in inner
            .notifications
            .iter_mut()
            .filter(|n| n.recipient_id == recipient_id && !n.seen)
        {
            notification.seen = true;
            changed += 1;
        }
        Ok(changed)
    }

    async fn delete_notification(
        &self,
        recipient_id: UserId,
        notification_id: NotificationId,
    ) -> Result<bool> {
        let mut inner = self.lock()?;
        let before = inner.notifications.len();
        inner
            .notifications
            .retain(|n| !(n.id == notification_id && n.recipient_id == recipient_id));
        Ok(inner.notifications.len() != before)
    }
}
