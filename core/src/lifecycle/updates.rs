//! Field updates accepted by the lifecycle controller.
//!
//! Every field is optional: `None` means "leave as is". A field equal to the
//! stored value is not a change, so re-issuing an update is a no-op.

use crate::types::{
    DocumentRequestId, DocumentStage, DocumentStatus, EventRegistrationId,
    EventRegistrationStatus, NotificationId, ReservationId, ReservationStatus, ServiceRequestId,
    ServiceStatus,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Fields of an item reservation an administrator may change.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationUpdate {
    /// Target status
    pub status: Option<ReservationStatus>,
    /// Remarks
    pub remarks: Option<String>,
}

/// Fields of a service request an administrator may change.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceUpdate {
    /// Target status
    pub status: Option<ServiceStatus>,
    /// New scheduled date
    pub scheduled_date: Option<NaiveDate>,
    /// Remarks
    pub remarks: Option<String>,
}

/// Fields of a document request an administrator may change.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentUpdate {
    /// Target status
    pub status: Option<DocumentStatus>,
    /// Remarks
    pub remarks: Option<String>,
    /// Stage to stamp with the current time, if not yet stamped
    pub stage: Option<DocumentStage>,
}

/// Fields of an event registration an administrator may change.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRegistrationUpdate {
    /// Target status
    pub status: Option<EventRegistrationStatus>,
    /// Remarks
    pub remarks: Option<String>,
}

/// Whether and how to notify the resident after a committed update.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// Send a notification
    #[serde(default)]
    pub send_notif: bool,
    /// Title override
    pub title: Option<String>,
    /// Detail text override
    pub details: Option<String>,
}

impl NotifyConfig {
    /// Notify with generated title and details.
    #[must_use]
    pub const fn send() -> Self {
        Self {
            send_notif: true,
            title: None,
            details: None,
        }
    }

    /// Do not notify.
    #[must_use]
    pub const fn silent() -> Self {
        Self {
            send_notif: false,
            title: None,
            details: None,
        }
    }
}

/// An update addressed to one request of one domain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RequestUpdate {
    /// Document request update
    Document {
        /// Target request
        id: DocumentRequestId,
        /// Changed fields
        fields: DocumentUpdate,
    },
    /// Item reservation update
    Reservation {
        /// Target reservation
        id: ReservationId,
        /// Changed fields
        fields: ReservationUpdate,
    },
    /// Service request update
    Service {
        /// Target request
        id: ServiceRequestId,
        /// Changed fields
        fields: ServiceUpdate,
    },
    /// Event registration update
    Event {
        /// Target registration
        id: EventRegistrationId,
        /// Changed fields
        fields: EventRegistrationUpdate,
    },
}

/// What happened to the notification of an update.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "detail", rename_all = "snake_case")]
pub enum NotificationOutcome {
    /// No notification was requested, or nothing changed
    NotSent,
    /// Notification persisted (and pushed to any live channel)
    Sent(NotificationId),
    /// The update committed but the notification failed
    Failed(String),
}

/// Result of a lifecycle update.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct UpdateOutcome {
    /// 1 if the row was written, 0 for a no-op update
    pub modified_count: u64,
    /// Notification outcome
    pub notification: NotificationOutcome,
}

impl UpdateOutcome {
    /// An update that changed nothing.
    #[must_use]
    pub const fn unchanged() -> Self {
        Self {
            modified_count: 0,
            notification: NotificationOutcome::NotSent,
        }
    }

    /// Whether the update committed but its notification failed.
    #[must_use]
    pub const fn is_partial(&self) -> bool {
        matches!(self.notification, NotificationOutcome::Failed(_))
    }
}
