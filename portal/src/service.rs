//! `PortalService`: the surface handed to the thin request layer.
//!
//! Wraps the lifecycle controller and the notification dispatcher behind
//! serialisable response bodies. Every failure maps to an [`ErrorBody`] with a
//! stable code, so a transport can turn any result into JSON with [`to_json_body`].

use crate::config::PortalSettings;
use municipal_portal_core::environment::Clock;
use municipal_portal_core::error::{PortalError, Result};
use municipal_portal_core::lifecycle::{
    DocumentUpdate, EventRegistrationUpdate, LifecycleController, NotificationOutcome,
    NotifyConfig, RequestUpdate, ReservationUpdate, ServiceUpdate, UpdateOutcome,
};
use municipal_portal_core::notifications::{
    ConnectionRegistry, Dispatcher, NotificationDispatcher, NotificationFeed, NotificationMessage,
};
use municipal_portal_core::providers::PortalStore;
use municipal_portal_core::types::{
    DocumentRequestId, EventRegistrationId, NotificationId, ReservationId, ResourceId,
    ServiceRequestId, UserId,
};
use chrono::NaiveDate;
use serde::Serialize;
use std::sync::Arc;

/// Controller type wired by [`PortalService`].
pub type PortalController<S> = LifecycleController<S, Dispatcher<S>>;

/// `{available}`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct AvailabilityResponse {
    /// Free units over the requested window
    pub available: u32,
}

/// `{success, modified_count}` plus what happened to the notification.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct UpdateResponse {
    /// The update was accepted
    pub success: bool,
    /// 1 if the row was written, 0 for a no-op
    pub modified_count: u64,
    /// Notification outcome
    pub notification: NotificationOutcome,
}

impl From<UpdateOutcome> for UpdateResponse {
    fn from(outcome: UpdateOutcome) -> Self {
        Self {
            success: true,
            modified_count: outcome.modified_count,
            notification: outcome.notification,
        }
    }
}

/// `{success}`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Ack {
    /// The operation succeeded
    pub success: bool,
}

impl Ack {
    const OK: Self = Self { success: true };
}

/// Error body returned to callers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    /// Always `false`
    pub success: bool,
    /// Stable machine-readable code
    pub code: &'static str,
    /// Human-readable message
    pub message: String,
    /// Whether the caller may retry
    pub retryable: bool,
    /// Remaining capacity, for `CAPACITY_EXCEEDED`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available: Option<u32>,
}

impl From<&PortalError> for ErrorBody {
    fn from(error: &PortalError) -> Self {
        let available = match error {
            PortalError::CapacityExceeded { available, .. } => Some(*available),
            _ => None,
        };
        Self {
            success: false,
            code: error.code(),
            message: error.to_string(),
            retryable: error.is_retryable(),
            available,
        }
    }
}

/// Serialise a facade result as a JSON body.
#[must_use]
pub fn to_json_body<T: Serialize>(result: &Result<T>) -> serde_json::Value {
    let body = match result {
        Ok(value) => serde_json::to_value(value),
        Err(error) => serde_json::to_value(ErrorBody::from(error)),
    };
    body.unwrap_or_else(|e| {
        serde_json::json!({
            "success": false,
            "code": "DEPENDENCY_FAILURE",
            "message": format!("response serialization failed: {e}"),
            "retryable": false,
        })
    })
}

/// Facade over the lifecycle controller and the notification dispatcher.
pub struct PortalService<S> {
    controller: PortalController<S>,
    dispatcher: Arc<Dispatcher<S>>,
}

impl<S> PortalService<S>
where
    S: PortalStore + 'static,
{
    /// Wire a controller and a dispatcher over `store`.
    #[must_use]
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>, settings: &PortalSettings) -> Self {
        let registry = Arc::new(ConnectionRegistry::new());
        let dispatcher = Arc::new(
            Dispatcher::new(Arc::clone(&store), registry, Arc::clone(&clock))
                .with_push_event(settings.push_event.clone()),
        );
        let controller = LifecycleController::new(store, Arc::clone(&dispatcher), clock)
            .with_link_base(settings.link_base.clone());
        Self {
            controller,
            dispatcher,
        }
    }

    /// Underlying controller, for submissions.
    #[must_use]
    pub const fn controller(&self) -> &PortalController<S> {
        &self.controller
    }

    /// Registry of live channels; the transport registers connections here.
    #[must_use]
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        self.dispatcher.registry()
    }

    /// Stop accepting notifications and close every live channel.
    pub async fn shutdown(&self) {
        self.dispatcher.shutdown().await;
    }

    /// `check_availability(resource, start, end, exclude?) -> {available}`
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
    ) -> Result<AvailabilityResponse> {
        let availability = self
            .controller
            .check_availability(resource_id, start, end, exclude)
            .await?;
        Ok(AvailabilityResponse {
            available: availability.available,
        })
    }

    /// Update an item reservation.
    ///
    /// # Errors
    ///
    /// See [`LifecycleController::update_reservation`].
    pub async fn update_reservation(
        &self,
        id: ReservationId,
        fields: ReservationUpdate,
        notify: &NotifyConfig,
    ) -> Result<UpdateResponse> {
        self.controller
            .update_reservation(id, fields, notify)
            .await
            .map(UpdateResponse::from)
    }

    /// Update a service request.
    ///
    /// # Errors
    ///
    /// See [`LifecycleController::update_service_request`].
    pub async fn update_service_request(
        &self,
        id: ServiceRequestId,
        fields: ServiceUpdate,
        notify: &NotifyConfig,
    ) -> Result<UpdateResponse> {
        self.controller
            .update_service_request(id, fields, notify)
            .await
            .map(UpdateResponse::from)
    }

    /// Update a document request.
    ///
    /// # Errors
    ///
    /// See [`LifecycleController::update_document_request`].
    pub async fn update_document_request(
        &self,
        id: DocumentRequestId,
        fields: DocumentUpdate,
        notify: &NotifyConfig,
    ) -> Result<UpdateResponse> {
        self.controller
            .update_document_request(id, fields, notify)
            .await
            .map(UpdateResponse::from)
    }

    /// Update an event registration.
    ///
    /// # Errors
    ///
    /// See [`LifecycleController::update_event_registration`].
    pub async fn update_event_registration(
        &self,
        id: EventRegistrationId,
        fields: EventRegistrationUpdate,
        notify: &NotifyConfig,
    ) -> Result<UpdateResponse> {
        self.controller
            .update_event_registration(id, fields, notify)
            .await
            .map(UpdateResponse::from)
    }

    /// Apply an update addressed by request kind.
    ///
    /// # Errors
    ///
    /// See [`LifecycleController::update_request`].
    pub async fn update_request(
        &self,
        update: RequestUpdate,
        notify: &NotifyConfig,
    ) -> Result<UpdateResponse> {
        self.controller
            .update_request(update, notify)
            .await
            .map(UpdateResponse::from)
    }

    /// Persist a free-form notification and signal the recipient.
    ///
    /// # Errors
    ///
    /// `DependencyFailure` if the row could not be persisted.
    pub async fn create_notification(
        &self,
        recipient: UserId,
        title: impl Into<String>,
        category: impl Into<String>,
        details: impl Into<String>,
        link: impl Into<String>,
    ) -> Result<Ack> {
        self.dispatcher
            .notify(NotificationMessage {
                recipient,
                title: title.into(),
                category: category.into(),
                details: details.into(),
                link: link.into(),
            })
            .await?;
        Ok(Ack::OK)
    }

    /// `get_notifications(recipient) -> {count, unseen, list}`
    ///
    /// # Errors
    ///
    /// `DependencyFailure` if the store is unreachable.
    pub async fn get_notifications(&self, recipient: UserId) -> Result<NotificationFeed> {
        self.dispatcher.get_notifications(recipient).await
    }

    /// Flag one notification as seen.
    ///
    /// # Errors
    ///
    /// `NotFound` if the recipient has no such notification.
    pub async fn mark_seen(&self, recipient: UserId, id: NotificationId) -> Result<Ack> {
        self.dispatcher.mark_seen(recipient, id).await?;
        Ok(Ack::OK)
    }

    /// Flag all of a recipient's notifications as seen.
    ///
    /// # Errors
    ///
    /// `DependencyFailure` if the store is unreachable.
    pub async fn mark_all_seen(&self, recipient: UserId) -> Result<UpdateResponse> {
        let modified_count = self.dispatcher.mark_all_seen(recipient).await?;
        Ok(UpdateResponse {
            success: true,
            modified_count,
            notification: NotificationOutcome::NotSent,
        })
    }

    /// Delete one of the recipient's notifications.
    ///
    /// # Errors
    ///
    /// `NotFound` if the recipient has no such notification.
    pub async fn delete_notification(&self, recipient: UserId, id: NotificationId) -> Result<Ack> {
        self.dispatcher.delete_notification(recipient, id).await?;
        Ok(Ack::OK)
    }
}
