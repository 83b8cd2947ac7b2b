//! Domain types for the municipal service portal.
//!
//! Identifiers, per-domain status enums, the inclusive date window used for
//! overlap detection, and the persisted entities the lifecycle controller reads
//! and conditionally writes.

use crate::error::{PortalError, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new random identifier
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Create from an existing `Uuid`
            #[must_use]
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Get the inner UUID
            #[must_use]
            pub const fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

uuid_id!(
    /// A portal account: a resident filing requests or an administrator.
    ///
    /// Notifications are addressed to a `UserId`.
    UserId
);
uuid_id!(
    /// A bookable inventory item (chairs, tents, sound systems, ...)
    ResourceId
);
uuid_id!(
    /// An item reservation request
    ReservationId
);
uuid_id!(
    /// A service offering with a slot counter
    ServiceId
);
uuid_id!(
    /// A service booking request
    ServiceRequestId
);
uuid_id!(
    /// A document request
    DocumentRequestId
);
uuid_id!(
    /// A community event residents can register for
    EventId
);
uuid_id!(
    /// A resident's registration for an event
    EventRegistrationId
);
uuid_id!(
    /// A persisted notification row
    NotificationId
);
uuid_id!(
    /// A live real-time channel
    ChannelId
);

// ============================================================================
// Statuses
// ============================================================================

/// Generates the text mapping shared by every status enum.
///
/// Statuses are free text in storage; parsing happens at the entry boundary.
macro_rules! status_text {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            /// Every status of this workflow, in declaration order.
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            /// Storage and wire representation.
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = PortalError;

            fn from_str(value: &str) -> Result<Self> {
                match value {
                    $($text => Ok(Self::$variant),)+
                    other => Err(PortalError::validation(format!(
                        "unknown {} '{other}'",
                        stringify!($name)
                    ))),
                }
            }
        }
    };
}

/// Item reservation workflow.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReservationStatus {
    /// Filed by a resident, not yet reviewed
    Pending,
    /// Approved by an administrator; consumes capacity
    Approved,
    /// Items handed to the resident; consumes capacity
    PickedUp,
    /// Items returned
    Completed,
    /// Declined by an administrator
    Rejected,
    /// Withdrawn before pickup
    Cancelled,
}

status_text!(ReservationStatus {
    Pending => "pending",
    Approved => "approved",
    PickedUp => "picked_up",
    Completed => "completed",
    Rejected => "rejected",
    Cancelled => "cancelled",
});

impl ReservationStatus {
    /// Whether a reservation in this status consumes capacity.
    #[must_use]
    pub const fn is_binding(self) -> bool {
        matches!(self, Self::Approved | Self::PickedUp)
    }
}

/// Service booking workflow.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceStatus {
    /// Filed by a resident
    Pending,
    /// Accepted by an administrator
    Confirmed,
    /// Service rendered
    Completed,
    /// Moved to another date
    Rescheduled,
}

status_text!(ServiceStatus {
    Pending => "pending",
    Confirmed => "confirmed",
    Completed => "completed",
    Rescheduled => "rescheduled",
});

/// Document request workflow.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    /// Filed by a resident
    Pending,
    /// Being prepared by the office
    Processing,
    /// Released to the resident
    Completed,
    /// Declined
    Rejected,
}

status_text!(DocumentStatus {
    Pending => "pending",
    Processing => "processing",
    Completed => "completed",
    Rejected => "rejected",
});

/// Event registration workflow.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventRegistrationStatus {
    /// Registered, awaiting the event
    Pending,
    /// Attended
    Completed,
    /// Withdrawn
    Cancelled,
}

status_text!(EventRegistrationStatus {
    Pending => "pending",
    Completed => "completed",
    Cancelled => "cancelled",
});

/// The four request domains handled by the lifecycle controller.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    /// Document requests
    Document,
    /// Item reservations
    Reservation,
    /// Service bookings
    Service,
    /// Event registrations
    Event,
}

status_text!(RequestKind {
    Document => "document",
    Reservation => "reservation",
    Service => "service",
    Event => "event",
});

impl RequestKind {
    /// Path segment used when building deep links.
    #[must_use]
    pub const fn path_segment(self) -> &'static str {
        match self {
            Self::Document => "documents",
            Self::Reservation => "reservations",
            Self::Service => "services",
            Self::Event => "events",
        }
    }

    /// Human-readable noun for notification text.
    #[must_use]
    pub const fn noun(self) -> &'static str {
        match self {
            Self::Document => "document request",
            Self::Reservation => "reservation",
            Self::Service => "service request",
            Self::Event => "event registration",
        }
    }
}

// ============================================================================
// Date windows
// ============================================================================

/// Inclusive calendar-date range of a reservation.
///
/// Both ends are inclusive, so a reservation ending on the day another starts
/// overlaps it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct DateWindow {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateWindow {
    /// Create a window.
    ///
    /// # Errors
    ///
    /// Returns `ValidationFailed` if `start` is after `end`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start > end {
            return Err(PortalError::validation(format!(
                "window start {start} is after end {end}"
            )));
        }
        Ok(Self { start, end })
    }

    /// Window covering a single day.
    #[must_use]
    pub const fn single_day(day: NaiveDate) -> Self {
        Self {
            start: day,
            end: day,
        }
    }

    /// First day of the window.
    #[must_use]
    pub const fn start(&self) -> NaiveDate {
        self.start
    }

    /// Last day of the window.
    #[must_use]
    pub const fn end(&self) -> NaiveDate {
        self.end
    }

    /// Inclusive overlap test: `s1 <= e2 && e1 >= s2`.
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.start <= other.end && self.end >= other.start
    }

    /// Number of calendar days covered.
    #[must_use]
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }
}

impl fmt::Display for DateWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} to {}", self.start, self.end)
    }
}

// ============================================================================
// Entities
// ============================================================================

/// A finite-quantity physical item available for time-boxed reservation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookableResource {
    /// Resource identifier
    pub id: ResourceId,
    /// Display name
    pub name: String,
    /// Optional description
    pub description: Option<String>,
    /// Total units owned by the municipality
    pub total_units: u32,
    /// When the resource was registered
    pub created_at: DateTime<Utc>,
}

impl BookableResource {
    /// Creates a new resource with a fresh id.
    #[must_use]
    pub fn new(name: impl Into<String>, total_units: u32, created_at: DateTime<Utc>) -> Self {
        Self {
            id: ResourceId::new(),
            name: name.into(),
            description: None,
            total_units,
            created_at,
        }
    }
}

/// A resident's request to borrow units of a [`BookableResource`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationRequest {
    /// Reservation identifier
    pub id: ReservationId,
    /// Reserved resource
    pub resource_id: ResourceId,
    /// Resident who filed the request
    pub resident_id: UserId,
    /// Number of units requested
    pub requested_units: u32,
    /// First day (inclusive)
    pub start_date: NaiveDate,
    /// Last day (inclusive)
    pub end_date: NaiveDate,
    /// Current workflow status
    pub status: ReservationStatus,
    /// Administrator remarks
    pub remarks: Option<String>,
    /// When the request was filed
    pub created_at: DateTime<Utc>,
    /// Last modification
    pub updated_at: DateTime<Utc>,
}

impl ReservationRequest {
    /// The reservation's date window.
    ///
    /// Windows are validated when the request is filed; rows written by other
    /// tools with inverted dates are normalised rather than rejected.
    #[must_use]
    pub fn window(&self) -> DateWindow {
        DateWindow {
            start: self.start_date.min(self.end_date),
            end: self.start_date.max(self.end_date),
        }
    }

    /// Whether the reservation currently consumes capacity.
    #[must_use]
    pub const fn is_binding(&self) -> bool {
        self.status.is_binding()
    }
}

/// A service offering whose free units are tracked by the slot ledger.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceSlotResource {
    /// Service identifier
    pub id: ServiceId,
    /// Display name
    pub name: String,
    /// Free units
    pub slots: u32,
}

/// A resident's booking of a service.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceRequest {
    /// Request identifier
    pub id: ServiceRequestId,
    /// Booked service
    pub service_id: ServiceId,
    /// Resident who filed the request
    pub resident_id: UserId,
    /// Current workflow status
    pub status: ServiceStatus,
    /// Requested or rescheduled date
    pub scheduled_date: Option<NaiveDate>,
    /// Administrator remarks
    pub remarks: Option<String>,
    /// When the request was filed
    pub created_at: DateTime<Utc>,
    /// Last modification
    pub updated_at: DateTime<Utc>,
}

/// Hand-off stages of a document request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStage {
    /// Request received by the office
    Requested,
    /// Document released by the issuing desk
    Released,
    /// Document handed over at the counter
    HandedOver,
    /// Resident confirmed receipt
    Received,
}

status_text!(DocumentStage {
    Requested => "requested",
    Released => "released",
    HandedOver => "handed_over",
    Received => "received",
});

/// Four independently nullable stage timestamps of a document request.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageTimestamps {
    /// When the request was received
    pub requested_at: Option<DateTime<Utc>>,
    /// When the document was released
    pub released_at: Option<DateTime<Utc>>,
    /// When the document was handed over
    pub handed_over_at: Option<DateTime<Utc>>,
    /// When the resident confirmed receipt
    pub received_at: Option<DateTime<Utc>>,
}

impl StageTimestamps {
    /// Timestamp recorded for `stage`, if any.
    #[must_use]
    pub const fn get(&self, stage: DocumentStage) -> Option<DateTime<Utc>> {
        match stage {
            DocumentStage::Requested => self.requested_at,
            DocumentStage::Released => self.released_at,
            DocumentStage::HandedOver => self.handed_over_at,
            DocumentStage::Received => self.received_at,
        }
    }

    /// Record `at` for `stage`, overwriting any previous value.
    pub fn set(&mut self, stage: DocumentStage, at: DateTime<Utc>) {
        let slot = match stage {
            DocumentStage::Requested => &mut self.requested_at,
            DocumentStage::Released => &mut self.released_at,
            DocumentStage::HandedOver => &mut self.handed_over_at,
            DocumentStage::Received => &mut self.received_at,
        };
        *slot = Some(at);
    }
}

/// A resident's request for an official document.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRequest {
    /// Request identifier
    pub id: DocumentRequestId,
    /// Resident who filed the request
    pub resident_id: UserId,
    /// Kind of document (clearance, certificate, ...)
    pub document_type: String,
    /// Stated purpose
    pub purpose: Option<String>,
    /// Current workflow status
    pub status: DocumentStatus,
    /// Administrator remarks
    pub remarks: Option<String>,
    /// Stage timestamps
    pub stages: StageTimestamps,
    /// When the request was filed
    pub created_at: DateTime<Utc>,
    /// Last modification
    pub updated_at: DateTime<Utc>,
}

/// A resident's registration for a community event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRegistration {
    /// Registration identifier
    pub id: EventRegistrationId,
    /// Event registered for
    pub event_id: EventId,
    /// Registered resident
    pub resident_id: UserId,
    /// Current workflow status
    pub status: EventRegistrationStatus,
    /// Administrator remarks
    pub remarks: Option<String>,
    /// When the registration was filed
    pub created_at: DateTime<Utc>,
    /// Last modification
    pub updated_at: DateTime<Utc>,
}

/// A persisted notification addressed to one recipient.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Notification identifier
    pub id: NotificationId,
    /// Recipient
    pub recipient_id: UserId,
    /// Short title
    pub title: String,
    /// Category (the request domain, or a free-form category for ad-hoc notices)
    pub category: String,
    /// Human-readable detail text
    pub details: String,
    /// Deep link into the portal
    pub link: String,
    /// Whether the recipient has seen it
    pub seen: bool,
    /// When it was created
    pub created_at: DateTime<Utc>,
}
