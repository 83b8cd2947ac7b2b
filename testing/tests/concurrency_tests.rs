//! Concurrent approvals and conditional writes against the in-memory store.

#![allow(clippy::unwrap_used)] // Tests can unwrap
#![allow(clippy::expect_used)] // Tests can expect

use futures::future::join_all;
use municipal_portal_core::availability::committed_units;
use municipal_portal_core::environment::Clock;
use municipal_portal_core::error::PortalError;
use municipal_portal_core::lifecycle::{NotifyConfig, ReservationUpdate, ServiceUpdate};
use municipal_portal_core::providers::{
    CapacityGuard, ReservationChange, ReservationStore, WriteOutcome,
};
use municipal_portal_core::types::{
    DateWindow, ReservationId, ReservationStatus, ResourceId, ServiceRequest, ServiceRequestId, ServiceStatus,
    UserId,
};
use municipal_portal_testing::{PortalHarness, march, test_clock};
use std::sync::Arc;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_approvals_never_overbook() {
    let harness = Arc::new(PortalHarness::new());
    let chairs = harness.store.add_resource("Chairs", 5);
    let pending: Vec<_> = (0..12)
        .map(|i| {
            harness.seed_reservation(
                chairs.id,
                2,
                march(1 + i % 3),
                march(10),
                ReservationStatus::Pending,
            )
        })
        .collect();

    let tasks = pending.iter().map(|reservation| {
        let harness = Arc::clone(&harness);
        let id = reservation.id;
        tokio::spawn(async move {
            harness
                .controller
                .update_reservation(
                    id,
                    ReservationUpdate {
                        status: Some(ReservationStatus::Approved),
                        remarks: None,
                    },
                    &NotifyConfig::silent(),
                )
                .await
        })
    });
    let results: Vec<_> = join_all(tasks)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    let approved = results.iter().filter(|r| r.is_ok()).count();
    let refused = results
        .iter()
        .filter(|r| matches!(r, Err(PortalError::CapacityExceeded { .. })))
        .count();
    assert_eq!(approved, 2);
    assert_eq!(approved + refused, pending.len());

    let window = DateWindow::new(march(1), march(10)).unwrap();
    let stored: Vec<_> = pending
        .iter()
        .map(|r| harness.store.reservation(r.id).unwrap())
        .collect();
    assert!(committed_units(&window, &stored, None) <= 5);
}

#[tokio::test]
async fn test_stale_expected_status_is_reported() {
    let harness = PortalHarness::new();
    let chairs = harness.store.add_resource("Chairs", 5);
    let reservation = harness.seed_reservation(
        chairs.id,
        1,
        march(1),
        march(2),
        ReservationStatus::Approved,
    );

    let outcome = harness
        .store
        .apply_reservation_change(&ReservationChange {
            id: reservation.id,
            expected_status: ReservationStatus::Pending,
            status: Some(ReservationStatus::Rejected),
            remarks: None,
            capacity_guard: None,
            updated_at: test_clock().now(),
        })
        .await
        .unwrap();

    assert_eq!(
        outcome,
        WriteOutcome::StatusMismatch {
            actual: "approved".to_string()
        }
    );
    assert_eq!(
        harness.store.reservation(reservation.id).unwrap().status,
        ReservationStatus::Approved
    );
}

fn approve() -> ReservationUpdate {
    ReservationUpdate {
        status: Some(ReservationStatus::Approved),
        remarks: None,
    }
}

#[tokio::test]
async fn test_store_recheck_refuses_an_overbooking_approval() {
    let harness = PortalHarness::new();
    let chairs = harness.store.add_resource("Chairs", 5);
    harness.seed_reservation(chairs.id, 3, march(1), march(10), ReservationStatus::Approved);
    let pending =
        harness.seed_reservation(chairs.id, 3, march(5), march(7), ReservationStatus::Pending);
    let window = DateWindow::new(march(5), march(7)).unwrap();

    let outcome = harness
        .store
        .apply_reservation_change(&ReservationChange {
            id: pending.id,
            expected_status: ReservationStatus::Pending,
            status: Some(ReservationStatus::Approved),
            remarks: Some("approved at the desk".to_string()),
            capacity_guard: Some(CapacityGuard {
                resource_id: chairs.id,
                window,
                requested_units: 3,
            }),
            updated_at: test_clock().now(),
        })
        .await
        .unwrap();

    assert_eq!(outcome, WriteOutcome::CapacityExceeded { available: 2 });
    assert_eq!(harness.store.reservation(pending.id).unwrap(), pending);
}

#[tokio::test]
async fn test_store_recheck_requires_the_guarded_resource() {
    let harness = PortalHarness::new();
    let chairs = harness.store.add_resource("Chairs", 5);
    let pending =
        harness.seed_reservation(chairs.id, 1, march(5), march(7), ReservationStatus::Pending);

    let result = harness
        .store
        .apply_reservation_change(&ReservationChange {
            id: pending.id,
            expected_status: ReservationStatus::Pending,
            status: Some(ReservationStatus::Approved),
            remarks: None,
            capacity_guard: Some(CapacityGuard {
                resource_id: ResourceId::new(),
                window: DateWindow::new(march(5), march(7)).unwrap(),
                requested_units: 1,
            }),
            updated_at: test_clock().now(),
        })
        .await;

    assert!(matches!(result, Err(PortalError::NotFound { .. })));
    assert_eq!(harness.store.reservation(pending.id).unwrap(), pending);
}

#[tokio::test]
async fn test_approval_loses_to_a_competing_commit_after_the_precheck() {
    let harness = PortalHarness::new();
    let chairs = harness.store.add_resource("Chairs", 5);
    let pending =
        harness.seed_reservation(chairs.id, 3, march(5), march(7), ReservationStatus::Pending);

    // Lands between the controller's availability read and the store write
    let store = Arc::clone(&harness.store);
    let mut rival = pending.clone();
    rival.id = ReservationId::new();
    rival.status = ReservationStatus::Approved;
    harness
        .store
        .before_next_write(move || store.seed_reservation(rival));

    let result = harness
        .controller
        .update_reservation(pending.id, approve(), &NotifyConfig::send())
        .await;

    assert_eq!(
        result,
        Err(PortalError::CapacityExceeded {
            requested: 3,
            available: 2
        })
    );
    assert_eq!(
        harness.store.reservation(pending.id).unwrap().status,
        ReservationStatus::Pending
    );
    assert_eq!(harness.store.notification_count(), 0);
}

#[tokio::test]
async fn test_status_changed_after_the_read_is_a_conflict() {
    let harness = PortalHarness::new();
    let chairs = harness.store.add_resource("Chairs", 5);
    let pending =
        harness.seed_reservation(chairs.id, 1, march(5), march(7), ReservationStatus::Pending);

    let store = Arc::clone(&harness.store);
    let mut rejected = pending.clone();
    rejected.status = ReservationStatus::Rejected;
    harness
        .store
        .before_next_write(move || store.seed_reservation(rejected));

    let result = harness
        .controller
        .update_reservation(pending.id, approve(), &NotifyConfig::send())
        .await;

    assert_eq!(
        result,
        Err(PortalError::Conflict {
            entity: "reservation",
            id: pending.id.to_string(),
            expected: "pending".to_string(),
            actual: "rejected".to_string(),
        })
    );
    assert_eq!(
        harness.store.reservation(pending.id).unwrap().status,
        ReservationStatus::Rejected
    );
}

#[tokio::test]
async fn test_reopening_loses_the_last_slot_to_a_competing_write() {
    let harness = PortalHarness::new();
    let service = harness.store.add_service_resource("Tree trimming", 1);
    let clock = test_clock();
    let completed = ServiceRequest {
        id: ServiceRequestId::new(),
        service_id: service.id,
        resident_id: UserId::new(),
        status: ServiceStatus::Completed,
        scheduled_date: None,
        remarks: None,
        created_at: clock.now(),
        updated_at: clock.now(),
    };
    harness.store.seed_service_request(completed.clone());

    let store = Arc::clone(&harness.store);
    let service_id = service.id;
    harness
        .store
        .before_next_write(move || store.set_service_slots(service_id, 0));

    let result = harness
        .controller
        .update_service_request(
            completed.id,
            ServiceUpdate {
                status: Some(ServiceStatus::Confirmed),
                ..ServiceUpdate::default()
            },
            &NotifyConfig::send(),
        )
        .await;

    assert_eq!(
        result,
        Err(PortalError::CapacityExceeded {
            requested: 1,
            available: 0
        })
    );
    assert_eq!(harness.store.service_slots(service.id), Some(0));
    assert_eq!(harness.store.notification_count(), 0);
}
