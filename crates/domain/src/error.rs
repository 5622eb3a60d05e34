//! Domain error taxonomy.

use thiserror::Error;
use uuid::Uuid;

use crate::models::consultation::BusyInterval;

/// Failure reported by a backing store.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Store backend error: {0}")]
    Backend(String),

    /// The store's own integrity rules refused the write.
    #[error("Write rejected by store: {0}")]
    Rejected(String),

    #[error("Corrupt record {id}: {reason}")]
    Corrupt { id: String, reason: String },
}

/// Why a consultation write collided with existing state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConflictDetail {
    /// The candidate slot overlaps an approved consultation of the same teacher.
    Overlap {
        consultation_id: Uuid,
        interval: BusyInterval,
    },
    /// The record changed between the read and the conditional write.
    StaleWrite { consultation_id: Uuid },
}

impl std::fmt::Display for ConflictDetail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConflictDetail::Overlap {
                consultation_id,
                interval,
            } => write!(
                f,
                "Time slot conflicts with approved consultation {} ({})",
                consultation_id, interval
            ),
            ConflictDetail::StaleWrite { consultation_id } => write!(
                f,
                "Consultation {} was modified concurrently",
                consultation_id
            ),
        }
    }
}

/// Error type for domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Not permitted: {0}")]
    Authorization(String),

    #[error("Invalid state: {0}")]
    State(String),

    #[error("{0}")]
    Conflict(ConflictDetail),

    #[error("{0} not found")]
    NotFound(String),

    /// An external provider could not be reached or failed.
    #[error("Upstream service unavailable: {0}")]
    Upstream(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl DomainError {
    pub fn validation(message: impl Into<String>) -> Self {
        DomainError::Validation(message.into())
    }

    pub fn authorization(message: impl Into<String>) -> Self {
        DomainError::Authorization(message.into())
    }

    pub fn state(message: impl Into<String>) -> Self {
        DomainError::State(message.into())
    }

    /// Short machine-readable kind, used as a metrics label.
    pub fn kind(&self) -> &'static str {
        match self {
            DomainError::Validation(_) => "validation",
            DomainError::Authorization(_) => "authorization",
            DomainError::State(_) => "state",
            DomainError::Conflict(_) => "conflict",
            DomainError::NotFound(_) => "not_found",
            DomainError::Upstream(_) => "upstream",
            DomainError::Store(_) => "store",
        }
    }
}
