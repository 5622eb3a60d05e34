//! Repository implementations for database operations.
//!
//! Each repository implements one of the domain store traits over a
//! PostgreSQL pool.

pub mod chat;
pub mod consultation;
pub mod user;

pub use chat::ChatRepository;
pub use consultation::ConsultationRepository;
pub use user::UserRepository;

use domain::StoreError;

/// Exclusion constraint violation.
const EXCLUSION_VIOLATION: &str = "23P01";
const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";
const CHECK_VIOLATION: &str = "23514";

/// Maps a driver error onto the store taxonomy. Integrity violations become
/// [`StoreError::Rejected`] so callers can tell them apart from outages.
pub(crate) fn map_error(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        let rejected = matches!(
            db_err.code().as_deref(),
            Some(EXCLUSION_VIOLATION | UNIQUE_VIOLATION | FOREIGN_KEY_VIOLATION | CHECK_VIOLATION)
        );
        if rejected {
            let constraint = db_err.constraint().unwrap_or("unknown");
            tracing::debug!(constraint = %constraint, "Write rejected by database constraint");
            return StoreError::Rejected(format!("{} ({})", db_err.message(), constraint));
        }
    }
    tracing::error!(error = %err, "Database error");
    StoreError::Backend(err.to_string())
}
