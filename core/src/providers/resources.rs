//! Resource catalogue store.

use crate::error::Result;
use crate::types::{BookableResource, ResourceId, ServiceId, ServiceSlotResource};
use std::future::Future;

/// Read access to bookable resources and service slot resources.
pub trait ResourceStore: Send + Sync {
    /// Load a bookable resource.
    ///
    /// # Errors
    ///
    /// Returns `DependencyFailure` if the store is unreachable.
    fn get_resource(
        &self,
        resource_id: ResourceId,
    ) -> impl Future<Output = Result<Option<BookableResource>>> + Send;

    /// Load a service slot resource with its current ledger balance.
    ///
    /// # Errors
    ///
    /// Returns `DependencyFailure` if the store is unreachable.
    fn get_service_resource(
        &self,
        service_id: ServiceId,
    ) -> impl Future<Output = Result<Option<ServiceSlotResource>>> + Send;
}
