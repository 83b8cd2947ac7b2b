//! Error taxonomy for the reservation and request-lifecycle engine.

use std::fmt;
use thiserror::Error;

/// Result type alias for portal operations.
pub type Result<T> = std::result::Result<T, PortalError>;

/// Errors surfaced by the lifecycle controller, the availability calculator and the
/// notification dispatcher.
///
/// Capacity and validation errors are always produced before any mutation. A
/// `DependencyFailure` raised after a committed mutation is never rolled back; the
/// controller downgrades it to a partial success instead of returning it.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PortalError {
    /// The addressed entity does not exist.
    #[error("{entity} with id {id} not found")]
    NotFound {
        /// Entity kind (e.g. "reservation", "bookable resource")
        entity: &'static str,
        /// Identifier that was looked up
        id: String,
    },

    /// Malformed caller input or a transition the state machine does not allow.
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    /// Approving the request would over-book the resource.
    ///
    /// `available` is the remaining capacity so the caller can offer a reduced quantity.
    #[error("Capacity exceeded: requested {requested}, available {available}")]
    CapacityExceeded {
        /// Units the request asked for
        requested: u32,
        /// Units still free for the window
        available: u32,
    },

    /// A conditional write matched zero rows because the caller's view was stale.
    #[error("Conflict on {entity} {id}: expected status '{expected}', found '{actual}'")]
    Conflict {
        /// Entity kind
        entity: &'static str,
        /// Identifier of the entity
        id: String,
        /// Status the write was conditioned on
        expected: String,
        /// Status observed in the store
        actual: String,
    },

    /// A collaborator (store, notification channel) failed.
    #[error("{dependency} failure: {message}")]
    DependencyFailure {
        /// Which collaborator failed
        dependency: &'static str,
        /// Failure detail
        message: String,
    },
}

impl PortalError {
    /// Create a `NotFound` error.
    #[must_use]
    pub fn not_found(entity: &'static str, id: impl fmt::Display) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Create a `ValidationFailed` error.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationFailed(message.into())
    }

    /// Create a `DependencyFailure` error.
    #[must_use]
    pub fn dependency(dependency: &'static str, message: impl fmt::Display) -> Self {
        Self::DependencyFailure {
            dependency,
            message: message.to_string(),
        }
    }

    /// Stable machine-readable code for the thin request layer.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "NOT_FOUND",
            Self::ValidationFailed(_) => "VALIDATION_FAILED",
            Self::CapacityExceeded { .. } => "CAPACITY_EXCEEDED",
            Self::Conflict { .. } => "CONFLICT",
            Self::DependencyFailure { .. } => "DEPENDENCY_FAILURE",
        }
    }

    /// Whether a caller may reasonably retry the same operation.
    ///
    /// Nothing inside the engine retries; this only informs the caller.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict { .. } | Self::DependencyFailure { .. })
    }
}
