//! proptest strategies for domain types.

use crate::mocks::test_clock;
use chrono::{Days, NaiveDate};
use municipal_portal_core::environment::Clock;
use municipal_portal_core::types::{
    DateWindow, ReservationId, ReservationRequest, ReservationStatus, ResourceId, UserId,
};
use proptest::prelude::*;

fn epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, 1).unwrap_or_default()
}

/// Windows of up to two weeks within the first quarter of 2025.
pub fn date_window() -> impl Strategy<Value = DateWindow> {
    (0u64..75, 0u64..14).prop_map(|(offset, length)| {
        let start = epoch() + Days::new(offset);
        DateWindow::new(start, start + Days::new(length))
            .unwrap_or(DateWindow::single_day(start))
    })
}

/// Reservations of `resource_id` in any status.
pub fn reservation_for(resource_id: ResourceId) -> impl Strategy<Value = ReservationRequest> {
    (
        date_window(),
        1u32..20,
        prop::sample::select(ReservationStatus::ALL),
    )
        .prop_map(move |(window, units, status)| {
            let now = test_clock().now();
            ReservationRequest {
                id: ReservationId::new(),
                resource_id,
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
