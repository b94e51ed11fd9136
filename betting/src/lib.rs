//! Betting
//!
//! Pari-mutuel betting on two-sided matches, settled through the bank ledger.
//!
//! # Lifecycle
//!
//! 1. **Start**: A [`BettingPeriod`] registers a reserved money checker so
//!    stakes cannot be spent elsewhere
//! 2. **Bets**: Accounts place or raise bets against their available money
//! 3. **Close**: Bets are frozen, stakes stay reserved
//! 4. **Resolve**: Winners are paid and losers charged in one atomic ledger
//!    batch, then the reservation is released
//!
//! # Example
//!
//! ```no_run
//! use bank_ledger::{CancellationToken, Config, Currency, Ledger};
//! use betting::{BettingConfig, BettingPeriod, MatchResult, Side};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> betting::Result<()> {
//!     let ledger = Arc::new(Ledger::open(Config::default(), Currency::Pokeyen).await?);
//!     let period = BettingPeriod::new(ledger, 1234, &BettingConfig::default())?;
//!
//!     period.start().await?;
//!     period.place_bet(&"alice".into(), Side::Blue, 100).await?;
//!     period.close().await?;
//!
//!     let changes = period.resolve(MatchResult::Blue, &CancellationToken::new()).await?;
//!     println!("{} bettors settled", changes.len());
//!
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod types;
pub mod shop;
pub mod payout;
pub mod period;
pub mod error;
pub mod config;

// Re-exports
pub use error::{Error, Result};
pub use types::{MatchId, MatchResult, Side};
pub use shop::{Bets, BettingShop, PlaceBetFailure};
pub use payout::compute_payouts;
pub use period::{BettingPeriod, PeriodState};
pub use config::BettingConfig;
