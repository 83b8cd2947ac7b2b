//! Availability calculator.
//!
//! Free units of a bookable resource over an inclusive date window:
//!
//! ```text
//! available = max(0, total_units - Σ requested_units)
//! ```
//!
//! where the sum runs over reservations of the resource that are binding
//! (`approved` or `picked_up`) and overlap the window. The reservation being
//! evaluated can be excluded so that re-approving it does not count against itself.

use crate::error::{PortalError, Result};
use crate::providers::{ReservationStore, ResourceStore};
use crate::types::{DateWindow, ReservationId, ReservationRequest, ResourceId};
use chrono::NaiveDate;
use serde::Serialize;
use std::sync::Arc;

/// Units committed by `reservations` to `window`, ignoring `exclude`.
#[must_use]
pub fn committed_units(
    window: &DateWindow,
    reservations: &[ReservationRequest],
    exclude: Option<ReservationId>,
) -> u64 {
    reservations
        .iter()
        .filter(|r| r.is_binding())
        .filter(|r| Some(r.id) != exclude)
        .filter(|r| r.window().overlaps(window))
        .map(|r| u64::from(r.requested_units))
        .sum()
}

/// Free units for `window`, clamped at zero.
#[must_use]
pub fn units_available(
    total_units: u32,
    window: &DateWindow,
    reservations: &[ReservationRequest],
    exclude: Option<ReservationId>,
) -> u32 {
    let committed = committed_units(window, reservations, exclude);
    let free = u64::from(total_units).saturating_sub(committed);
    // free <= total_units, so this never truncates
    u32::try_from(free).unwrap_or(0)
}

/// Availability of a resource over a window.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Availability {
    /// Resource evaluated
    pub resource_id: ResourceId,
    /// Window evaluated
    pub window: DateWindow,
    /// Units owned
    pub total_units: u32,
    /// Units held by overlapping binding reservations
    pub committed_units: u64,
    /// Units still free
    pub available: u32,
}

/// Computes [`Availability`] against a store.
pub struct AvailabilityCalculator<S> {
    store: Arc<S>,
}

impl<S> Clone for AvailabilityCalculator<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S> AvailabilityCalculator<S>
where
    S: ResourceStore + ReservationStore,
{
    /// Create a calculator over `store`.
    #[must_use]
    pub const fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Free units of `resource_id` between `start` and `end` (inclusive).
    ///
    /// # Errors
    ///
    /// - `ValidationFailed` if `start > end`
    /// - `NotFound` if the resource does not exist
    /// - `DependencyFailure` if the store fails
    pub async fn available(
        &self,
        resource_id: ResourceId,
        start: NaiveDate,
        end: NaiveDate,
        exclude: Option<ReservationId>,
    ) -> Result<Availability> {
        let window = DateWindow::new(start, end)?;
        self.available_in(resource_id, window, exclude).await
    }

    /// Same as [`AvailabilityCalculator::available`] for an already validated window.
    ///
    /// # Errors
    ///
    /// `NotFound` if the resource does not exist, `DependencyFailure` if the store fails.
    #[tracing::instrument(skip(self), name = "availability")]
    pub async fn available_in(
        &self,
        resource_id: ResourceId,
        window: DateWindow,
        exclude: Option<ReservationId>,
    ) -> Result<Availability> {
        let resource = self
            .store
            .get_resource(resource_id)
            .await?
            .ok_or_else(|| PortalError::not_found("bookable resource", resource_id))?;

        let reservations = self
            .store
            .binding_reservations(resource_id, window, exclude)
            .await?;

        let committed = committed_units(&window, &reservations, exclude);
        let available = units_available(resource.total_units, &window, &reservations, exclude);

        tracing::debug!(total = resource.total_units, committed, available, "Computed availability");

        Ok(Availability {
            resource_id,
            window,
            total_units: resource.total_units,
            committed_units: committed,
            available,
        })
    }
}


#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code
mod proptests {
    use super::*;
    use crate::types::{ReservationStatus, UserId};
    use chrono::{Days, Utc};
    use proptest::prelude::*;

    fn base() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 1).expect("valid date")
    }

    fn window_strategy() -> impl Strategy<Value = DateWindow> {
        (0u64..60, 0u64..15).prop_map(|(offset, length)| {
            let start = base() + Days::new(offset);
            DateWindow::new(start, start + Days::new(length)).unwrap()
        })
    }

    fn reservation_strategy() -> impl Strategy<Value = ReservationRequest> {
        (
            window_strategy(),
            0u32..50,
            prop::sample::select(ReservationStatus::ALL.to_vec()),
        )
            .prop_map(|(window, units, status)| {
                let now = Utc::now();
                ReservationRequest {
                    id: ReservationId::new(),
                    resource_id: ResourceId::new(),
                    resident_id: UserId::new(),
                    requested_units: units,
                    start_date: window.start(),
                    end_date: window.end(),
                    status,
                    remarks: None,
                    created_at: now,
                    updated_at: now,
                }
            })
    }

    proptest! {
        /// Availability never exceeds the resource total.
        #[test]
        fn available_is_bounded_by_total(
            total in 0u32..500,
            window in window_strategy(),
            reservations in prop::collection::vec(reservation_strategy(), 0..20),
        ) {
            prop_assert!(units_available(total, &window, &reservations, None) <= total);
        }

        /// Non-binding reservations never change availability.
        #[test]
        fn non_binding_reservations_are_ignored(
            total in 0u32..500,
            window in window_strategy(),
            reservations in prop::collection::vec(reservation_strategy(), 0..20),
        ) {
            let binding: Vec<_> = reservations.iter().filter(|r| r.is_binding()).cloned().collect();
            prop_assert_eq!(
                units_available(total, &window, &reservations, None),
                units_available(total, &window, &binding, None)
            );
        }

        /// Overlap is symmetric and a window always overlaps itself.
        #[test]
        fn overlap_is_symmetric(a in window_strategy(), b in window_strategy()) {
            prop_assert_eq!(a.overlaps(&b), b.overlaps(&a));
            prop_assert!(a.overlaps(&a));
        }

        /// When binding units fit, availability is exactly the difference.
        #[test]
        fn available_is_total_minus_committed_when_it_fits(
            window in window_strategy(),
            reservations in prop::collection::vec(reservation_strategy(), 0..20),
        ) {
            let committed = committed_units(&window, &reservations, None);
            let total = u32::try_from(committed).unwrap() + 7;
            prop_assert_eq!(units_available(total, &window, &reservations, None), 7);
        }
    }
}
