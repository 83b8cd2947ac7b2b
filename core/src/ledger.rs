//! Slot ledger: the authoritative count of free units per service resource.
//!
//! The ledger is never incremented or decremented directly. The lifecycle
//! controller derives a [`SlotAdjustment`] from a service status change and
//! hands it to the store together with the status flip, so the counter and the
//! request move in the same conditional write. Outside this crate an adjustment
//! can only be read, never constructed.
//!
//! # Slot direction
//!
//! A service request *entering* `completed` releases one slot back to the
//! ledger; *leaving* `completed` reserves one again. Confirmation and
//! rescheduling do not move the counter.

use crate::error::{PortalError, Result};
use crate::types::{ServiceId, ServiceStatus};
use serde::Serialize;
use std::collections::HashMap;

/// Direction of a ledger movement.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotMovement {
    /// One slot returns to the free pool
    Release,
    /// One slot is taken from the free pool
    Reserve,
}

/// A one-unit movement of a service's slot counter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct SlotAdjustment {
    service_id: ServiceId,
    movement: SlotMovement,
}

impl SlotAdjustment {
    /// Derive the adjustment implied by a service status change, if any.
    pub(crate) fn for_transition(
        service_id: ServiceId,
        from: ServiceStatus,
        to: ServiceStatus,
    ) -> Option<Self> {
        let movement = match (from, to) {
            (from, to) if from == to => return None,
            (_, ServiceStatus::Completed) => SlotMovement::Release,
            (ServiceStatus::Completed, _) => SlotMovement::Reserve,
            _ => return None,
        };
        Some(Self {
            service_id,
            movement,
        })
    }

    /// Service whose counter moves.
    #[must_use]
    pub const fn service_id(&self) -> ServiceId {
        self.service_id
    }

    /// Direction of the movement.
    #[must_use]
    pub const fn movement(&self) -> SlotMovement {
        self.movement
    }

    /// Signed change to apply to the counter.
    #[must_use]
    pub const fn delta(&self) -> i64 {
        match self.movement {
            SlotMovement::Release => 1,
            SlotMovement::Reserve => -1,
        }
    }

    /// Counter value after applying this adjustment to `slots`.
    ///
    /// # Errors
    ///
    /// Returns `CapacityExceeded` when a reservation would drive the counter
    /// below zero.
    pub fn apply_to(&self, slots: u32) -> Result<u32> {
        match self.movement {
            SlotMovement::Release => Ok(slots.saturating_add(1)),
            SlotMovement::Reserve => slots.checked_sub(1).ok_or(PortalError::CapacityExceeded {
                requested: 1,
                available: 0,
            }),
        }
    }
}

/// In-process ledger of free service slots.
///
/// Used by stores that keep state in memory; persistent stores keep the same
/// counter as a column and apply [`SlotAdjustment::delta`] in SQL.
#[derive(Debug, Clone, Default)]
pub struct SlotLedger {
    balances: HashMap<ServiceId, u32>,
}

impl SlotLedger {
    /// Create an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Open (or reset) the balance of a service.
    pub fn open(&mut self, service_id: ServiceId, slots: u32) {
        self.balances.insert(service_id, slots);
    }

    /// Free slots of a service, if it is tracked.
    #[must_use]
    pub fn available(&self, service_id: ServiceId) -> Option<u32> {
        self.balances.get(&service_id).copied()
    }

    /// Check that `adjustment` can be applied without mutating anything.
    ///
    /// # Errors
    ///
    /// `NotFound` for an untracked service, `CapacityExceeded` if no slot is left
    /// to reserve.
    pub fn check(&self, adjustment: &SlotAdjustment) -> Result<u32> {
        let current = self
            .available(adjustment.service_id)
            .ok_or_else(|| PortalError::not_found("service resource", adjustment.service_id))?;
        adjustment.apply_to(current)
    }

    /// Apply `adjustment` and return the new balance.
    ///
    /// # Errors
    ///
    /// Same as [`SlotLedger::check`]; the balance is untouched on error.
    pub fn apply(&mut self, adjustment: &SlotAdjustment) -> Result<u32> {
        let next = self.check(adjustment)?;
        self.balances.insert(adjustment.service_id, next);
        Ok(next)
    }
}
