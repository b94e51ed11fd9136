//! Reserved money
//!
//! Reserved money is not yet spent, but may have to be spent later and so
//! must stay available: an open bet, a pending buy offer. Features register
//! a [`ReservedMoneyChecker`] while they hold such funds, and the ledger
//! subtracts the sum of all checkers from an account's total to get what it
//! may spend.
//!
//! The registry is read far more often than it changes. Readers clone an
//! `Arc` of the current checker list and release the lock before awaiting
//! anything; writers swap in a new list.

use crate::{
    error::{Error, Result},
    storage::Storage,
    types::{AccountId, Currency},
};
use async_trait::async_trait;
use futures::future::try_join_all;
use parking_lot::RwLock;
use std::sync::Arc;

/// Reports how much of an account's money a feature is holding
///
/// Return 0 for accounts the checker knows nothing about. Errors are never
/// treated as zero: the whole reserved money query fails instead.
#[async_trait]
pub trait ReservedMoneyChecker: Send + Sync {
    /// Unique name, used for replacement and removal
    fn name(&self) -> &str;

    /// Amount reserved for the account
    async fn reserved(&self, account: &AccountId) -> Result<i64>;
}

type CheckerList = Arc<Vec<Arc<dyn ReservedMoneyChecker>>>;

/// Process-wide set of reserved money checkers for one currency ledger
#[derive(Default)]
pub struct ReservationRegistry {
    checkers: RwLock<CheckerList>,
}

impl std::fmt::Debug for ReservationRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReservationRegistry")
            .field("checkers", &self.names())
            .finish()
    }
}

impl ReservationRegistry {
    /// Create empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a checker, replacing any checker with the same name
    pub fn add(&self, checker: Arc<dyn ReservedMoneyChecker>) {
        let mut guard = self.checkers.write();
        let mut next: Vec<_> = guard
            .iter()
            .filter(|existing| existing.name() != checker.name())
            .cloned()
            .collect();

        tracing::info!(checker = checker.name(), "Reserved money checker registered");

        next.push(checker);
        *guard = Arc::new(next);
    }

    /// Deregister a checker by name, returning whether it was registered
    pub fn remove(&self, name: &str) -> bool {
        let mut guard = self.checkers.write();
        if !guard.iter().any(|existing| existing.name() == name) {
            return false;
        }

        let next: Vec<_> = guard
            .iter()
            .filter(|existing| existing.name() != name)
            .cloned()
            .collect();
        *guard = Arc::new(next);

        tracing::info!(checker = name, "Reserved money checker removed");
        true
    }

    /// Names of all registered checkers
    pub fn names(&self) -> Vec<String> {
        self.snapshot().iter().map(|c| c.name().to_string()).collect()
    }

    /// Whether a checker with this name is registered
    pub fn contains(&self, name: &str) -> bool {
        self.snapshot().iter().any(|c| c.name() == name)
    }

    fn snapshot(&self) -> CheckerList {
        self.checkers.read().clone()
    }

    /// Sum of all checkers for the account, evaluated concurrently
    pub async fn get_reserved_money(&self, account: &AccountId) -> Result<i64> {
        let checkers = self.snapshot();

        let amounts = try_join_all(checkers.iter().map(|checker| async move {
            checker
                .reserved(account)
                .await
                .map_err(|e| match e {
                    Error::ReservationCheck { .. } => e,
                    other => Error::ReservationCheck {
                        checker: checker.name().to_string(),
                        reason: other.to_string(),
                    },
                })
        }))
        .await?;

        amounts.into_iter().try_fold(0i64, |total, amount| {
            total
                .checked_add(amount)
                .ok_or_else(|| Error::Overflow(account.clone()))
        })
    }
}

/// Soft holds persisted in the account store
///
/// Holds survive restarts and are visible to every process sharing the
/// store, unlike in-memory checkers.
#[derive(Debug, Clone)]
pub struct PersistedReservations {
    storage: Arc<Storage>,
    currency: Currency,
    name: String,
}

impl PersistedReservations {
    /// Create checker over the store's holds for one currency
    pub fn new(storage: Arc<Storage>, currency: Currency) -> Self {
        Self {
            name: format!("persisted:{}", currency),
            storage,
            currency,
        }
    }

    /// Place or replace the hold `key` on an account
    pub async fn hold(&self, account: &AccountId, key: &str, amount: i64) -> Result<()> {
        if amount < 0 {
            return Err(Error::Other(format!(
                "Hold amount must not be negative, got {}",
                amount
            )));
        }

        let storage = self.storage.clone();
        let currency = self.currency;
        let account = account.clone();
        let key = key.to_string();
        tokio::task::spawn_blocking(move || storage.put_hold(currency, &account, &key, amount))
            .await??;
        Ok(())
    }

    /// Release the hold `key`, returning whether it existed
    pub async fn release(&self, account: &AccountId, key: &str) -> Result<bool> {
        let storage = self.storage.clone();
        let currency = self.currency;
        let account = account.clone();
        let key = key.to_string();
        tokio::task::spawn_blocking(move || storage.remove_hold(currency, &account, &key)).await?
    }
}

#[async_trait]
impl ReservedMoneyChecker for PersistedReservations {
    fn name(&self) -> &str {
        &self.name
    }

    async fn reserved(&self, account: &AccountId) -> Result<i64> {
        let storage = self.storage.clone();
        let currency = self.currency;
        let account = account.clone();
        tokio::task::spawn_blocking(move || storage.sum_holds(currency, &account)).await?
    }
}
