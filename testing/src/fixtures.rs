//! Fixtures and a wired-up test harness.

use crate::mocks::test_clock;
use crate::store::InMemoryPortalStore;
use chrono::NaiveDate;
use municipal_portal_core::environment::Clock;
use municipal_portal_core::lifecycle::LifecycleController;
use municipal_portal_core::notifications::{ConnectionRegistry, Dispatcher};
use municipal_portal_core::types::{
    ReservationId, ReservationRequest, ReservationStatus, ResourceId, UserId,
};
use std::sync::Arc;

/// A day in March 2025.
///
/// # Panics
///
/// Panics if `day` is not a valid March day.
#[must_use]
#[allow(clippy::expect_used)]
pub fn march(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, day).expect("day must exist in March 2025")
}

/// Install a test-friendly tracing subscriber honouring `RUST_LOG`.
///
/// Safe to call from every test; only the first call installs.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Controller type used by the harness.
pub type HarnessController =
    LifecycleController<InMemoryPortalStore, Dispatcher<InMemoryPortalStore>>;

/// Store, registry, dispatcher and controller wired together in memory.
pub struct PortalHarness {
    /// Shared in-memory store
    pub store: Arc<InMemoryPortalStore>,
    /// Live channel registry
    pub registry: Arc<ConnectionRegistry>,
    /// Store-backed dispatcher
    pub dispatcher: Arc<Dispatcher<InMemoryPortalStore>>,
    /// Controller under test
    pub controller: HarnessController,
    clock: Arc<dyn Clock>,
}

impl Default for PortalHarness {
    fn default() -> Self {
        Self::new()
    }
}

impl PortalHarness {
    /// Harness on the fixed test clock.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(test_clock()))
    }

    /// Harness on a custom clock.
    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        let store = Arc::new(InMemoryPortalStore::new());
        let registry = Arc::new(ConnectionRegistry::new());
        let dispatcher = Arc::new(Dispatcher::new(
            Arc::clone(&store),
            Arc::clone(&registry),
            Arc::clone(&clock),
        ));
        let controller = LifecycleController::new(
            Arc::clone(&store),
            Arc::clone(&dispatcher),
            Arc::clone(&clock),
        )
        .with_link_base("https://portal.test");
        Self {
            store,
            registry,
            dispatcher,
            controller,
            clock,
        }
    }

    /// Seed a reservation directly in `status`, bypassing the controller.
    pub fn seed_reservation(
        &self,
        resource_id: ResourceId,
        units: u32,
        start: NaiveDate,
        end: NaiveDate,
        status: ReservationStatus,
    ) -> ReservationRequest {
        let now = self.clock.now();
        let reservation = ReservationRequest {
            id: ReservationId::new(),
            resource_id,
            resident_id: UserId::new(),
            requested_units: units,
            start_date: start,
            end_date: end,
            status,
            remarks: None,
            created_at: now,
            updated_at: now,
        };
        self.store.seed_reservation(reservation.clone());
        reservation
    }
}
