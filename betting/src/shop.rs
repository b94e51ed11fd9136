//! Betting shop
//!
//! Holds the bets of one match, one amount per account on at most one side,
//! and derives pari-mutuel odds from them. The shop itself never touches the
//! ledger: callers pass in the money an account has available, with the
//! account's current bet already subtracted as reserved money.

use crate::{config::BettingConfig, types::Side, Result};
use bank_ledger::AccountId;
use std::collections::BTreeMap;
use thiserror::Error;

/// Bets per side and per account
pub type Bets = BTreeMap<Side, BTreeMap<AccountId, i64>>;

/// Reason a bet was refused
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceBetFailure {
    /// Account already bet more, and bets cannot be lowered
    #[error("bets cannot be lowered, existing bet is {0}")]
    CannotLowerBet(i64),

    /// Account already bet on the other side
    #[error("already bet on {0}")]
    CannotChangeSide(Side),

    /// Account cannot afford the bet
    #[error("insufficient funds, at most {0} can be bet")]
    InsufficientFunds(i64),

    /// Bet is below the minimum
    #[error("bet too low, minimum is {0}")]
    BetTooLow(i64),

    /// Bet is above the maximum
    #[error("bet too high, maximum is {0}")]
    BetTooHigh(i64),
}

/// Bets placed on one match
#[derive(Debug, Clone)]
pub struct BettingShop {
    min_bet: i64,
    max_bet: i64,
    bets: Bets,
}

impl BettingShop {
    /// Create empty shop with the given policy
    pub fn new(config: &BettingConfig) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            min_bet: config.min_bet,
            max_bet: config.max_bet,
            bets: Side::ALL.iter().map(|side| (*side, BTreeMap::new())).collect(),
        })
    }

    /// Place or raise a bet
    ///
    /// `available` is the money the account may spend, with its current bet
    /// already counted as reserved. A raised bet replaces the old one, so
    /// the old amount is added back before checking funds.
    pub fn place_bet(
        &mut self,
        account: &AccountId,
        side: Side,
        amount: i64,
        available: i64,
    ) -> std::result::Result<(), PlaceBetFailure> {
        if amount < self.min_bet {
            return Err(PlaceBetFailure::BetTooLow(self.min_bet));
        }
        if amount > self.max_bet {
            return Err(PlaceBetFailure::BetTooHigh(self.max_bet));
        }

        for (bet_side, side_bets) in &self.bets {
            if *bet_side == side {
                let existing = side_bets.get(account).copied().unwrap_or(0);
                if existing > amount {
                    return Err(PlaceBetFailure::CannotLowerBet(existing));
                }
            } else if side_bets.contains_key(account) {
                return Err(PlaceBetFailure::CannotChangeSide(*bet_side));
            }
        }

        let current = self.bet_on(side, account);
        let available_for_bet = available.saturating_add(current);
        if amount > available_for_bet {
            return Err(PlaceBetFailure::InsufficientFunds(available_for_bet));
        }

        self.bets
            .entry(side)
            .or_default()
            .insert(account.clone(), amount);
        Ok(())
    }

    /// Payout ratio per side if that side wins
    ///
    /// Twice as much money on blue as on red gives blue 0.5 and red 2.0. A
    /// side without bets gets 1.0 when nobody bet at all, otherwise infinity.
    pub fn odds(&self) -> BTreeMap<Side, f64> {
        let sums: BTreeMap<Side, i64> = self
            .bets
            .iter()
            .map(|(side, side_bets)| (*side, side_bets.values().sum()))
            .collect();

        sums.iter()
            .map(|(side, own)| {
                let others: i64 = sums
                    .iter()
                    .filter(|(other, _)| *other != side)
                    .map(|(_, sum)| sum)
                    .sum();
                let odds = if *own == 0 {
                    if others == 0 {
                        1.0
                    } else {
                        f64::INFINITY
                    }
                } else {
                    others as f64 / *own as f64
                };
                (*side, odds)
            })
            .collect()
    }

    /// All bets; every side is present, possibly empty
    pub fn bets(&self) -> &Bets {
        &self.bets
    }

    /// An account's bet per side; every side is present, possibly zero
    pub fn bets_for_account(&self, account: &AccountId) -> BTreeMap<Side, i64> {
        Side::ALL
            .iter()
            .map(|side| (*side, self.bet_on(*side, account)))
            .collect()
    }

    /// Sum of an account's bets, the money the shop reserves for it
    pub fn total_bet(&self, account: &AccountId) -> i64 {
        self.bets
            .values()
            .filter_map(|side_bets| side_bets.get(account))
            .sum()
    }

    fn bet_on(&self, side: Side, account: &AccountId) -> i64 {
        self.bets
            .get(&side)
            .and_then(|side_bets| side_bets.get(account))
            .copied()
            .unwrap_or(0)
    }
}
