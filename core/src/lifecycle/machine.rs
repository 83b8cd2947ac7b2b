//! Per-domain status machines.
//!
//! Each request domain enumerates its valid transitions explicitly. A
//! self-transition is always allowed and is treated as "no change".

use crate::error::{PortalError, Result};
use crate::types::{
    DocumentStatus, EventRegistrationStatus, RequestKind, ReservationStatus, ServiceStatus,
};
use std::fmt;

/// A status workflow with an enumerated transition table.
pub trait StatusMachine: Copy + Eq + fmt::Display + Send + Sync + 'static {
    /// Request domain this workflow belongs to.
    const DOMAIN: RequestKind;

    /// Every status of the workflow.
    fn all() -> &'static [Self];

    /// Whether `self -> next` is a listed transition. Does not consider self-transitions.
    fn has_edge(self, next: Self) -> bool;

    /// Whether moving to `next` is allowed. Self-transitions always are.
    fn can_transition_to(self, next: Self) -> bool {
        self == next || self.has_edge(next)
    }

    /// Whether no other status is reachable from `self`.
    fn is_terminal(self) -> bool {
        Self::all().iter().all(|next| !self.has_edge(*next))
    }

    /// Reject transitions the workflow does not list.
    ///
    /// # Errors
    ///
    /// Returns `ValidationFailed` naming the domain and both statuses.
    fn validate_transition(self, next: Self) -> Result<()> {
        if self.can_transition_to(next) {
            Ok(())
        } else {
            Err(PortalError::validation(format!(
                "{} cannot move from '{self}' to '{next}'",
                Self::DOMAIN.noun()
            )))
        }
    }
}

impl StatusMachine for DocumentStatus {
    const DOMAIN: RequestKind = RequestKind::Document;

    fn all() -> &'static [Self] {
        Self::ALL
    }

    fn has_edge(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Processing | Self::Rejected)
                | (Self::Processing, Self::Completed | Self::Rejected)
        )
    }
}

impl StatusMachine for ReservationStatus {
    const DOMAIN: RequestKind = RequestKind::Reservation;

    fn all() -> &'static [Self] {
        Self::ALL
    }

    fn has_edge(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Approved)
                | (Self::Approved, Self::PickedUp)
                | (Self::PickedUp, Self::Completed)
                | (Self::Pending | Self::Approved, Self::Rejected | Self::Cancelled)
        )
    }
}

impl StatusMachine for ServiceStatus {
    const DOMAIN: RequestKind = RequestKind::Service;

    fn all() -> &'static [Self] {
        Self::ALL
    }

    fn has_edge(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Confirmed)
                | (Self::Confirmed, Self::Completed)
                | (Self::Pending | Self::Confirmed, Self::Rescheduled)
                | (Self::Rescheduled, Self::Confirmed)
                | (Self::Completed, Self::Confirmed)
        )
    }
}

impl StatusMachine for EventRegistrationStatus {
    const DOMAIN: RequestKind = RequestKind::Event;

    fn all() -> &'static [Self] {
        Self::ALL
    }

    fn has_edge(self, next: Self) -> bool {
        matches!((self, next), (Self::Pending, Self::Completed | Self::Cancelled))
    }
}
