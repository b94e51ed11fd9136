//! Bank Ledger
//!
//! Transactional multi-currency account ledger.
//!
//! # Architecture
//!
//! - **Atomic batches**: A batch of balance changes commits entirely or not at all
//! - **Row locks**: Concurrent batches are serialized per account by storage locks, never globally
//! - **Stale detection**: Changes decided on an outdated balance are rejected
//! - **Reserved money**: Pluggable checkers report funds held by other features
//!
//! # Invariants
//!
//! - Every applied change has exactly one log entry, committed with it
//! - `new_balance >= old_balance + change` for every log entry, equal when
//!   the caller's snapshot was current
//! - available = total - Σ(reserved) at query time

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, clippy::all)]

pub mod types;
pub mod storage;
pub mod ledger;
pub mod reservation;
pub mod error;
pub mod config;
pub mod metrics;

// Re-exports
pub use error::{Error, Result};
pub use types::{
    Account, AccountId, AccountSnapshot, Currency, Metadata, Transaction, TransactionLog,
    TransactionType,
};
pub use ledger::Ledger;
pub use reservation::{PersistedReservations, ReservationRegistry, ReservedMoneyChecker};
pub use config::Config;
pub use tokio_util::sync::CancellationToken;
