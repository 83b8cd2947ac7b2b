//! Business metrics for the portal.
//!
//! Recorded through the `metrics` facade; without an installed recorder every
//! call is a no-op. The binary installs a Prometheus exporter.
//!
//! # Exported Metrics
//!
//! ## Counters
//! - `portal_transitions_total{domain,status}` - Committed status transitions
//! - `portal_capacity_rejections_total{domain}` - Updates refused for lack of capacity
//! - `portal_notifications_total{outcome}` - Notifications by outcome (persisted, failed, rejected)
//! - `portal_pushes_total` - Live channel deliveries

use crate::types::RequestKind;
use metrics::describe_counter;

/// Register all metric descriptions.
///
/// Call once at startup, before anything is recorded.
pub fn register_metrics() {
    describe_counter!(
        "portal_transitions_total",
        "Committed status transitions by request domain and target status"
    );
    describe_counter!(
        "portal_capacity_rejections_total",
        "Updates refused because the resource or service had no capacity left"
    );
    describe_counter!(
        "portal_notifications_total",
        "Notifications by outcome (persisted, failed, rejected)"
    );
    describe_counter!("portal_pushes_total", "Events delivered to live channels");

    tracing::info!("Portal metrics registered");
}

/// Record a committed status transition.
pub fn record_transition(domain: RequestKind, status: &'static str) {
    metrics::counter!(
        "portal_transitions_total",
        "domain" => domain.as_str(),
        "status" => status
    )
    .increment(1);
}

/// Record an update refused for lack of capacity.
pub fn record_capacity_rejection(domain: RequestKind) {
    metrics::counter!("portal_capacity_rejections_total", "domain" => domain.as_str()).increment(1);
    tracing::debug!(domain = domain.as_str(), "Recorded capacity_rejection metric");
}

/// Record a notification outcome.
pub fn record_notification(outcome: &'static str) {
    metrics::counter!("portal_notifications_total", "outcome" => outcome).increment(1);
}

/// Record live channel deliveries.
pub fn record_pushes(delivered: usize) {
    metrics::counter!("portal_pushes_total").increment(u64::try_from(delivered).unwrap_or(u64::MAX));
}
