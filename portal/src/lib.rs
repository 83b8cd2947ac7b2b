//! Municipal service portal.
//!
//! Ties the engine in `municipal-portal-core` to its outer edges:
//!
//! - [`config`]: environment-driven configuration
//! - [`telemetry`]: tracing subscriber and Prometheus exporter setup
//! - [`service`]: the [`PortalService`] facade and its response bodies
//! - [`bootstrap`]: wiring the facade over `PostgreSQL`

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod bootstrap;
pub mod config;
pub mod service;
pub mod telemetry;

pub use config::PortalConfig;
pub use service::{Ack, AvailabilityResponse, ErrorBody, PortalService, UpdateResponse, to_json_body};
