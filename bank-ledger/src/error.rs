//! Error types for the ledger

use crate::types::AccountId;
use thiserror::Error;

/// Result type for ledger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Ledger errors
#[derive(Error, Debug)]
pub enum Error {
    /// Account does not exist in storage
    #[error("Account '{0}' was not found")]
    AccountNotFound(AccountId),

    /// Account was already created
    #[error("Account '{0}' already exists")]
    AccountAlreadyExists(AccountId),

    /// Stored balance moved below what the caller's snapshot predicted
    #[error(
        "Tried to perform transaction with stale account data: old balance {old_balance} \
         plus change {change} does not equal new balance {new_balance} for account {account}"
    )]
    StaleBalance {
        /// Account the transaction was performed on
        account: AccountId,
        /// Balance the caller believed was current
        old_balance: i64,
        /// Requested change
        change: i64,
        /// Stored balance after the increment
        new_balance: i64,
    },

    /// A reserved money checker failed
    #[error("Reserved money checker '{checker}' failed: {reason}")]
    ReservationCheck {
        /// Name of the failing checker
        checker: String,
        /// Failure description
        reason: String,
    },

    /// Operation was cancelled before commit
    #[error("Operation cancelled")]
    Cancelled,

    /// Balance arithmetic overflowed
    #[error("Balance overflow for account {0}")]
    Overflow(AccountId),

    /// Storage error (RocksDB)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Binary serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// JSON serialization error (transaction logs)
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Concurrency error (blocking task panicked or was aborted)
    #[error("Concurrency error: {0}")]
    Concurrency(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether the error is a stale-balance conflict the caller may retry
    /// after re-reading balances.
    pub fn is_stale_balance(&self) -> bool {
        matches!(self, Error::StaleBalance { .. })
    }
}

impl From<rocksdb::Error> for Error {
    fn from(err: rocksdb::Error) -> Self {
        Error::Storage(err.to_string())
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(err: tokio::task::JoinError) -> Self {
        Error::Concurrency(err.to_string())
    }
}
