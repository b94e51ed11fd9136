//! Error types for betting

use crate::period::PeriodState;
use crate::shop::PlaceBetFailure;
use crate::types::MatchId;
use thiserror::Error;

/// Result type for betting operations
pub type Result<T> = std::result::Result<T, Error>;

/// Betting errors
#[derive(Error, Debug)]
pub enum Error {
    /// Ledger error
    #[error("Ledger error: {0}")]
    Ledger(#[from] bank_ledger::Error),

    /// Bet was refused by the betting shop
    #[error("Bet refused: {0}")]
    BetRefused(#[from] PlaceBetFailure),

    /// Operation not allowed in the period's current state
    #[error("Betting period for match {match_id} is {state}")]
    InvalidState {
        /// Match the period belongs to
        match_id: MatchId,
        /// State the period was in
        state: PeriodState,
    },

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),
}

