//! `PostgreSQL` store for the municipal service portal.
//!
//! [`PostgresPortalStore`] implements every store trait of
//! `municipal-portal-core` on top of a sqlx connection pool:
//!
//! - Bookable resources and service slot counters
//! - Reservation, service, document and event registration requests
//! - Notification rows
//!
//! Conditional writes never read-then-write across statements without a lock.
//! Reservation approvals lock the resource row and recount committed units in
//! the same transaction; slot movements lock the service row. Document and
//! event updates are a single `UPDATE ... WHERE status = expected`.
//!
//! # Example
//!
//! ```ignore
//! use municipal_portal_postgres::PostgresPortalStore;
//! use std::time::Duration;
//!
//! async fn example() -> municipal_portal_core::Result<()> {
//!     let store = PostgresPortalStore::connect(
//!         "postgres://localhost/portal",
//!         10,
//!         1,
//!         Duration::from_secs(5),
//!     )
//!     .await?;
//!     store.migrate().await?;
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod notifications;
mod requests;
mod reservations;
mod rows;
mod store;

pub use store::PostgresPortalStore;
