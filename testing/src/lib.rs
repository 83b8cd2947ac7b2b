//! # Municipal Portal Testing
//!
//! Testing utilities for the municipal service portal.
//!
//! This crate provides:
//! - [`FixedClock`] and [`test_clock`] for deterministic timestamps
//! - [`InMemoryPortalStore`]: a complete in-memory `PortalStore`
//! - Mock dispatchers that record or refuse notifications
//! - [`PortalHarness`]: store, registry, dispatcher and controller wired together
//! - proptest strategies for domain types
//!
//! ## Example
//!
//! ```ignore
//! use municipal_portal_testing::{PortalHarness, march};
//!
//! #[tokio::test]
//! async fn test_approval() {
//!     let harness = PortalHarness::new();
//!     let chairs = harness.store.add_resource("Monobloc chairs", 5);
//!     let reservation = harness
//!         .controller
//!         .submit_reservation(resident, chairs.id, 2, march(5), march(7))
//!         .await?;
//! }
//! ```

use chrono::{DateTime, Utc};
use municipal_portal_core::environment::Clock;

/// Mock implementations of environment traits.
pub mod mocks {
    use super::{Clock, DateTime, Utc};
    use std::sync::Mutex;

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use municipal_portal_testing::mocks::FixedClock;
    /// use municipal_portal_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// assert_eq!(clock.now(), clock.now());
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Clock that advances one second on every reading.
    ///
    /// Gives rows strictly increasing timestamps, so "newest first" ordering
    /// is observable in tests.
    #[derive(Debug)]
    pub struct TickingClock {
        next: Mutex<DateTime<Utc>>,
    }

    impl TickingClock {
        /// Start ticking from `start`.
        #[must_use]
        pub const fn new(start: DateTime<Utc>) -> Self {
            Self {
                next: Mutex::new(start),
            }
        }
    }

    impl Clock for TickingClock {
        fn now(&self) -> DateTime<Utc> {
            let mut next = self
                .next
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            let now = *next;
            *next = now + chrono::Duration::seconds(1);
            now
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// This function will panic if the hardcoded timestamp fails to parse,
    /// which should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }
}

pub mod dispatchers;
pub mod fixtures;
pub mod store;
pub mod strategies;

// Re-export commonly used items
pub use dispatchers::{FailingDispatcher, RecordingDispatcher};
pub use fixtures::{PortalHarness, init_test_tracing, march};
pub use mocks::{FixedClock, TickingClock, test_clock};
pub use store::InMemoryPortalStore;
