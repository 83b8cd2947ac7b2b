//! # Municipal Portal Core
//!
//! Reservation and request-lifecycle engine of the municipal service portal.
//!
//! Residents request documents, borrow inventory items, book services and
//! register for events; administrators move those requests through their
//! workflows. This crate owns the parts that must stay correct under
//! concurrency:
//!
//! - **Availability**: free units of a bookable resource over an inclusive date window
//! - **Lifecycle**: per-domain status machines and the controller applying them
//! - **Slot ledger**: free units per service, moved only inside a conditional write
//! - **Notifications**: persisted rows fanned out to live channels
//!
//! ## Architecture
//!
//! ```text
//! update ──▶ LifecycleController ──▶ AvailabilityCalculator / SlotAdjustment
//!                    │
//!                    ▼
//!          PortalStore (conditional write)
//!                    │
//!                    ▼
//!          NotificationDispatcher ──▶ NotificationStore ──▶ ConnectionRegistry
//! ```
//!
//! Storage is reached only through the traits in [`providers`]; the
//! `municipal-portal-testing` crate provides an in-memory implementation and
//! `municipal-portal-postgres` a sqlx one.
//!
//! ## Example
//!
//! ```ignore
//! use municipal_portal_core::lifecycle::{LifecycleController, NotifyConfig, ReservationUpdate};
//! use municipal_portal_core::types::ReservationStatus;
//!
//! let outcome = controller
//!     .update_reservation(
//!         reservation_id,
//!         ReservationUpdate { status: Some(ReservationStatus::Approved), remarks: None },
//!         &NotifyConfig::send(),
//!     )
//!     .await?;
//! assert_eq!(outcome.modified_count, 1);
//! ```

pub mod availability;
pub mod environment;
pub mod error;
pub mod ledger;
pub mod lifecycle;
pub mod metrics;
pub mod notifications;
pub mod providers;
pub mod types;

pub use availability::{Availability, AvailabilityCalculator};
pub use error::{PortalError, Result};
pub use lifecycle::{LifecycleController, NotifyConfig, UpdateOutcome};
pub use notifications::{ConnectionRegistry, Dispatcher, NotificationDispatcher};

// Re-export commonly used types
pub use chrono::{DateTime, NaiveDate, Utc};
