//! Betting period lifecycle
//!
//! ```text
//! Pending --start--> Open --close--> Closed --resolve--> Resolved
//!    \                 \                \
//!     +-----------------+----------------+--cancel--> Cancelled
//! ```
//!
//! While a period is open or closed, a reserved money checker reports each
//! bettor's stake, so bet money cannot be spent elsewhere before the match
//! is settled. Resolving pays winners and charges losers in one ledger
//! batch, then releases the reservation.

use crate::{
    config::BettingConfig,
    payout::compute_payouts,
    shop::{Bets, BettingShop},
    types::{MatchId, MatchResult, Side},
    Error, Result,
};
use async_trait::async_trait;
use bank_ledger::{
    AccountId, CancellationToken, Ledger, ReservedMoneyChecker, Transaction, TransactionType,
};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Lifecycle state of a betting period
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeriodState {
    /// Created, not yet accepting bets
    Pending,
    /// Accepting bets
    Open,
    /// Bets frozen, awaiting the result
    Closed,
    /// Settled
    Resolved,
    /// Abandoned without settlement
    Cancelled,
}

impl fmt::Display for PeriodState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PeriodState::Pending => "pending",
            PeriodState::Open => "open",
            PeriodState::Closed => "closed",
            PeriodState::Resolved => "resolved",
            PeriodState::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// Reports each account's total stake in one betting shop as reserved
struct BettingChecker {
    name: String,
    shop: Arc<RwLock<BettingShop>>,
}

#[async_trait]
impl ReservedMoneyChecker for BettingChecker {
    fn name(&self) -> &str {
        &self.name
    }

    async fn reserved(&self, account: &AccountId) -> bank_ledger::Result<i64> {
        Ok(self.shop.read().total_bet(account))
    }
}

/// Betting period for one match
pub struct BettingPeriod {
    match_id: MatchId,
    ledger: Arc<Ledger>,
    shop: Arc<RwLock<BettingShop>>,
    checker_name: String,

    /// Held across every transition and bet placement
    state: Mutex<PeriodState>,
}

impl fmt::Debug for BettingPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BettingPeriod")
            .field("match_id", &self.match_id)
            .field("checker_name", &self.checker_name)
            .finish()
    }
}

impl BettingPeriod {
    /// Create a pending period with an empty betting shop
    pub fn new(ledger: Arc<Ledger>, match_id: MatchId, config: &BettingConfig) -> Result<Self> {
        let shop = BettingShop::new(config)?;

        Ok(Self {
            match_id,
            ledger,
            shop: Arc::new(RwLock::new(shop)),
            checker_name: format!("betting:{}", match_id),
            state: Mutex::new(PeriodState::Pending),
        })
    }

    /// Match this period belongs to
    pub fn match_id(&self) -> MatchId {
        self.match_id
    }

    /// Name of the reserved money checker this period registers
    pub fn checker_name(&self) -> &str {
        &self.checker_name
    }

    /// Current state
    pub async fn state(&self) -> PeriodState {
        *self.state.lock().await
    }

    /// Whether bets are accepted
    pub async fn is_open(&self) -> bool {
        self.state().await == PeriodState::Open
    }

    /// Start accepting bets and reserve bet money
    pub async fn start(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        self.expect_state(*state, &[PeriodState::Pending])?;

        self.ledger.add_reserved_money_checker(Arc::new(BettingChecker {
            name: self.checker_name.clone(),
            shop: self.shop.clone(),
        }));
        *state = PeriodState::Open;

        tracing::info!(match_id = self.match_id, "Betting opened");
        Ok(())
    }

    /// Place or raise a bet
    ///
    /// Available money is read through the ledger, so it already accounts
    /// for the account's current bet and any other reservation.
    pub async fn place_bet(&self, account: &AccountId, side: Side, amount: i64) -> Result<()> {
        let state = self.state.lock().await;
        self.expect_state(*state, &[PeriodState::Open])?;

        let available = self.ledger.get_available_money(account).await?;
        self.shop.write().place_bet(account, side, amount, available)?;

        tracing::debug!(
            match_id = self.match_id,
            account_id = %account,
            side = %side,
            amount,
            "Bet placed"
        );
        Ok(())
    }

    /// Stop accepting bets; bet money stays reserved
    pub async fn close(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        self.expect_state(*state, &[PeriodState::Open])?;
        *state = PeriodState::Closed;

        tracing::info!(match_id = self.match_id, "Betting closed");
        Ok(())
    }

    /// Settle all bets for the result and release the reservation
    ///
    /// Returns the change per bettor, including zero changes on a draw. If
    /// the ledger refuses the batch nothing is settled: the period stays
    /// closed with its reservation in place and can be resolved again.
    pub async fn resolve(
        &self,
        result: MatchResult,
        cancel: &CancellationToken,
    ) -> Result<BTreeMap<AccountId, i64>> {
        let mut state = self.state.lock().await;
        self.expect_state(*state, &[PeriodState::Open, PeriodState::Closed])?;
        *state = PeriodState::Closed;

        let (bets, odds) = {
            let shop = self.shop.read();
            (shop.bets().clone(), shop.odds())
        };
        let changes = compute_payouts(&bets, &odds, result);

        let mut transactions = Vec::new();
        for (account, change) in changes.iter().filter(|(_, change)| **change != 0) {
            let snapshot = self.ledger.snapshot(account).await?;
            transactions.push(
                Transaction::new(snapshot, *change, TransactionType::Match)
                    .with_metadata("match", self.match_id),
            );
        }

        let settled = transactions.len();
        if settled > 0 {
            self.ledger.perform_transactions(transactions, cancel).await?;
        }

        self.ledger.remove_reserved_money_checker(&self.checker_name);
        *state = PeriodState::Resolved;

        tracing::info!(
            match_id = self.match_id,
            result = ?result,
            bettors = changes.len(),
            settled,
            "Betting resolved"
        );
        Ok(changes)
    }

    /// Abandon the period without settling; bet money is released
    pub async fn cancel(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        self.expect_state(
            *state,
            &[PeriodState::Pending, PeriodState::Open, PeriodState::Closed],
        )?;

        self.ledger.remove_reserved_money_checker(&self.checker_name);
        *state = PeriodState::Cancelled;

        tracing::info!(match_id = self.match_id, "Betting cancelled");
        Ok(())
    }

    /// All bets placed so far
    pub fn bets(&self) -> Bets {
        self.shop.read().bets().clone()
    }

    /// Current odds per side
    pub fn odds(&self) -> BTreeMap<Side, f64> {
        self.shop.read().odds()
    }

    /// An account's bet per side
    pub fn bets_for_account(&self, account: &AccountId) -> BTreeMap<Side, i64> {
        self.shop.read().bets_for_account(account)
    }

    fn expect_state(&self, state: PeriodState, allowed: &[PeriodState]) -> Result<()> {
        if allowed.contains(&state) {
            Ok(())
        } else {
            Err(Error::InvalidState {
                match_id: self.match_id,
                state,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bank_ledger::{Config, Currency};

    async fn create_test_period(match_id: MatchId) -> (BettingPeriod, Arc<Ledger>, tempfile::TempDir) {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.data_dir = temp_dir.path().to_path_buf();
        let ledger = Arc::new(Ledger::open(config, Currency::Pokeyen).await.unwrap());

        let period = BettingPeriod::new(ledger.clone(), match_id, &BettingConfig::default()).unwrap();
        (period, ledger, temp_dir)
    }

    #[tokio::test]
    async fn test_bets_rejected_unless_open() {
        let (period, ledger, _temp) = create_test_period(1).await;
        ledger.open_account("user".into(), 100).await.unwrap();
        let user = AccountId::new("user");

        let err = period.place_bet(&user, Side::Blue, 10).await.unwrap_err();
        assert!(matches!(err, Error::InvalidState { state: PeriodState::Pending, .. }));

        period.start().await.unwrap();
        period.place_bet(&user, Side::Blue, 10).await.unwrap();
        period.close().await.unwrap();

        let err = period.place_bet(&user, Side::Blue, 20).await.unwrap_err();
        assert!(matches!(err, Error::InvalidState { state: PeriodState::Closed, .. }));
        assert_eq!(period.bets_for_account(&user)[&Side::Blue], 10);
    }

    #[tokio::test]
    async fn test_checker_registered_until_resolved() {
        let (period, ledger, _temp) = create_test_period(7).await;
        assert_eq!(period.checker_name(), "betting:7");

        period.start().await.unwrap();
        assert!(ledger.reservations().contains("betting:7"));
        period.close().await.unwrap();
        assert!(ledger.reservations().contains("betting:7"));

        period.resolve(MatchResult::Draw, &CancellationToken::new()).await.unwrap();
        assert!(!ledger.reservations().contains("betting:7"));
        assert_eq!(period.state().await, PeriodState::Resolved);
    }

    #[tokio::test]
    async fn test_resolve_twice_fails() {
        let (period, _ledger, _temp) = create_test_period(2).await;
        period.start().await.unwrap();
        period.resolve(MatchResult::Blue, &CancellationToken::new()).await.unwrap();

        let err = period
            .resolve(MatchResult::Blue, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidState { state: PeriodState::Resolved, .. }));
    }

    #[tokio::test]
    async fn test_cancel_releases_reservation() {
        let (period, ledger, _temp) = create_test_period(3).await;
        ledger.open_account("user".into(), 100).await.unwrap();
        let user = AccountId::new("user");

        period.start().await.unwrap();
        period.place_bet(&user, Side::Red, 40).await.unwrap();
        assert_eq!(ledger.get_available_money(&user).await.unwrap(), 60);

        period.cancel().await.unwrap();
        assert_eq!(ledger.get_available_money(&user).await.unwrap(), 100);
        assert_eq!(ledger.get_total_money(&user).await.unwrap(), 100);
        assert!(period.start().await.is_err());
    }

    #[tokio::test]
    async fn test_place_bet_on_unknown_account() {
        let (period, _ledger, _temp) = create_test_period(4).await;
        period.start().await.unwrap();

        let err = period
            .place_bet(&AccountId::new("ghost"), Side::Blue, 1)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Ledger(bank_ledger::Error::AccountNotFound(_))));
    }
}
