//! Storage provider traits.
//!
//! The lifecycle controller talks to persistence exclusively through these
//! traits. Two implementations exist:
//!
//! - `InMemoryPortalStore` (in `municipal-portal-testing`): one mutex per store
//! - `PostgresPortalStore` (in `municipal-portal-postgres`): sqlx
//!
//! # Conditional writes
//!
//! Every `apply_*` method is a single conditional write keyed by the request id
//! and its expected prior status. Implementations must evaluate the attached
//! capacity guard or slot adjustment atomically with the status flip, scoped by
//! the resource, so two concurrent approvals cannot both pass the check.

pub mod notifications;
pub mod requests;
pub mod resources;

pub use notifications::NotificationStore;
pub use requests::{
    CapacityGuard, DocumentChange, DocumentStore, EventRegistrationChange,
    EventRegistrationStore, ReservationChange, ReservationStore, ServiceChange,
    ServiceRequestStore,
};
pub use resources::ResourceStore;

use serde::Serialize;

/// Result of a conditional write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum WriteOutcome {
    /// The row matched and was updated.
    Applied,
    /// No row with that id exists.
    Missing,
    /// The row exists but its status no longer matches the expected one.
    StatusMismatch {
        /// Status currently stored (free text)
        actual: String,
    },
    /// The capacity guard failed inside the write.
    CapacityExceeded {
        /// Units still free for the guarded window
        available: u32,
    },
    /// The slot adjustment would drive the ledger below zero.
    SlotsExhausted,
}

/// Everything the lifecycle controller and notification dispatcher need from storage.
pub trait PortalStore:
    ResourceStore
    + ReservationStore
    + ServiceRequestStore
    + DocumentStore
    + EventRegistrationStore
    + NotificationStore
{
}

impl<T> PortalStore for T where
    T: ResourceStore
        + ReservationStore
        + ServiceRequestStore
        + DocumentStore
        + EventRegistrationStore
        + NotificationStore
{
}
