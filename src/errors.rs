//! Unified error type for the ledger core.
//!
//! `NotFound`, `Forbidden` and `InvalidInput` are expected conditions the caller can
//! act on. `ConsistencyFailure` means a balance adjustment could not be completed
//! together with its transaction write; the enclosing database transaction has
//! been rolled back and the operation must not be retried automatically.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Referenced record does not exist or does not belong to the caller.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// The caller may not perform this operation on the record.
    #[error("Forbidden: {reason}")]
    Forbidden { reason: String },

    /// Malformed amount, unknown period token, unknown transaction type, etc.
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    /// The atomic balance adjustment for an account could not complete.
    #[error("Consistency failure on account {account_id}: {reason}")]
    ConsistencyFailure { account_id: i64, reason: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),
}

impl Error {
    pub(crate) fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Whether the caller can recover by changing its request.
    ///
    /// Everything else is a hard failure and is never retried here, since
    /// replaying a balance delta could apply it twice.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. } | Self::Forbidden { .. } | Self::InvalidInput { .. }
        )
    }
}

// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
