//! Main ledger orchestration layer
//!
//! A [`Ledger`] manages one currency over a shared [`Storage`]. It applies
//! batches of balance changes all-or-nothing, logs every applied change,
//! detects changes decided on stale balances, and answers how much money
//! an account may spend given everything currently reserved.
//!
//! # Example
//!
//! ```no_run
//! use bank_ledger::{Config, Currency, Ledger, Transaction, TransactionType};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> bank_ledger::Result<()> {
//!     let ledger = Ledger::open(Config::default(), Currency::Pokeyen).await?;
//!
//!     let account = ledger.open_account("alice".into(), 100).await?;
//!     let snapshot = account.snapshot(Currency::Pokeyen);
//!
//!     let tx = Transaction::new(snapshot, -25, TransactionType::SecondaryColorUnlock);
//!     let log = ledger.perform_transaction(tx, &CancellationToken::new()).await?;
//!     assert_eq!(log.new_balance, 75);
//!
//!     Ok(())
//! }
//! ```

use crate::{
    metrics::Metrics,
    reservation::{ReservationRegistry, ReservedMoneyChecker},
    storage::Storage,
    types::{Account, AccountId, AccountSnapshot, Currency, Transaction, TransactionLog},
    Config, Error, Result,
};
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Transactional ledger for one currency
pub struct Ledger {
    /// Shared account store
    storage: Arc<Storage>,

    /// Currency this ledger manages
    currency: Currency,

    /// Reserved money checkers
    reservations: ReservationRegistry,

    /// Prometheus metrics
    metrics: Metrics,
}

impl std::fmt::Debug for Ledger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ledger")
            .field("currency", &self.currency)
            .field("storage", &self.storage)
            .field("reservations", &self.reservations)
            .finish()
    }
}

impl Ledger {
    /// Open ledger with its own storage
    pub async fn open(config: Config, currency: Currency) -> Result<Self> {
        let storage = Arc::new(Storage::open(&config)?);
        Self::with_storage(storage, currency)
    }

    /// Create ledger over existing storage, sharing it with other currencies
    pub fn with_storage(storage: Arc<Storage>, currency: Currency) -> Result<Self> {
        let metrics = Metrics::new(currency.code())
            .map_err(|e| Error::Config(format!("Failed to create metrics: {}", e)))?;

        Ok(Self {
            storage,
            currency,
            reservations: ReservationRegistry::new(),
            metrics,
        })
    }

    /// Currency this ledger manages
    pub fn currency(&self) -> Currency {
        self.currency
    }

    /// Underlying storage
    pub fn storage(&self) -> &Arc<Storage> {
        &self.storage
    }

    /// Ledger metrics
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    // Accounts

    /// Create an account holding `initial` in this ledger's currency
    pub async fn open_account(&self, id: AccountId, initial: i64) -> Result<Account> {
        let storage = self.storage.clone();
        let balances: BTreeMap<_, _> = [(self.currency, initial)].into_iter().collect();
        tokio::task::spawn_blocking(move || storage.create_account(id, balances)).await?
    }

    /// Read the stored account record
    pub async fn get_account(&self, id: &AccountId) -> Result<Account> {
        let storage = self.storage.clone();
        let id = id.clone();
        tokio::task::spawn_blocking(move || storage.get_account(&id)).await?
    }

    /// Fresh snapshot of the account's balance, for building transactions
    pub async fn snapshot(&self, id: &AccountId) -> Result<AccountSnapshot> {
        Ok(self.get_account(id).await?.snapshot(self.currency))
    }

    // Money

    /// Live stored balance
    ///
    /// This ignores reserved money; spending up to this amount may
    /// overspend. See [`Ledger::get_available_money`].
    pub async fn get_total_money(&self, id: &AccountId) -> Result<i64> {
        Ok(self.get_account(id).await?.balance(self.currency))
    }

    /// Sum of all registered reserved money checkers for the account
    pub async fn get_reserved_money(&self, id: &AccountId) -> Result<i64> {
        self.reservations.get_reserved_money(id).await
    }

    /// Money the account may spend without risk of overspending
    pub async fn get_available_money(&self, id: &AccountId) -> Result<i64> {
        let total = self.get_total_money(id).await?;
        let reserved = self.get_reserved_money(id).await?;
        total
            .checked_sub(reserved)
            .ok_or_else(|| Error::Overflow(id.clone()))
    }

    // Reservations

    /// Register a reserved money checker
    pub fn add_reserved_money_checker(&self, checker: Arc<dyn ReservedMoneyChecker>) {
        self.reservations.add(checker);
    }

    /// Deregister a reserved money checker by name
    pub fn remove_reserved_money_checker(&self, name: &str) -> bool {
        self.reservations.remove(name)
    }

    /// Reserved money checker registry
    pub fn reservations(&self) -> &ReservationRegistry {
        &self.reservations
    }

    // Transactions

    /// Perform a single transaction atomically
    pub async fn perform_transaction(
        &self,
        transaction: Transaction,
        cancel: &CancellationToken,
    ) -> Result<TransactionLog> {
        self.perform_transactions(vec![transaction], cancel)
            .await?
            .pop()
            .ok_or_else(|| Error::Other("Batch of one produced no log entry".to_string()))
    }

    /// Perform multiple transactions atomically: either all succeed or none do
    ///
    /// Returns one log entry per transaction, in order. Each entry's
    /// `new_balance` is the authoritative balance after the change.
    pub async fn perform_transactions(
        &self,
        transactions: Vec<Transaction>,
        cancel: &CancellationToken,
    ) -> Result<Vec<TransactionLog>> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        if transactions.is_empty() {
            return Ok(Vec::new());
        }

        let started = Instant::now();
        let batch_size = transactions.len();
        let storage = self.storage.clone();
        let currency = self.currency;
        let cancel = cancel.clone();

        let result = tokio::task::spawn_blocking(move || {
            apply_batch(&storage, currency, &transactions, &cancel)
        })
        .await?;

        match &result {
            Ok(logs) => {
                self.metrics
                    .record_commit(batch_size, started.elapsed().as_secs_f64());
                for log in logs {
                    tracing::debug!(
                        log_id = %log.id,
                        account_id = %log.account_id,
                        currency = %log.currency,
                        old_balance = log.old_balance,
                        new_balance = log.new_balance,
                        change = log.change,
                        kind = %log.kind,
                        "Balance change applied"
                    );
                }
            }
            Err(e) => {
                self.metrics.record_failure(e.is_stale_balance());
                tracing::warn!(
                    currency = %self.currency,
                    batch_size,
                    error = %e,
                    "Transaction batch rolled back"
                );
            }
        }

        result
    }

    // History

    /// All logged changes for an account in this currency, oldest first
    pub async fn transaction_history(&self, id: &AccountId) -> Result<Vec<TransactionLog>> {
        let storage = self.storage.clone();
        let currency = self.currency;
        let id = id.clone();
        tokio::task::spawn_blocking(move || storage.logs_for_account(currency, &id)).await?
    }

    /// Log entry by ID
    pub async fn get_transaction(&self, id: Uuid) -> Result<Option<TransactionLog>> {
        let storage = self.storage.clone();
        tokio::task::spawn_blocking(move || storage.get_log(id)).await?
    }
}

/// Apply a batch inside one storage transaction
///
/// Any error returns before commit, so the dropped storage transaction
/// rolls back every increment made so far.
fn apply_batch(
    storage: &Storage,
    currency: Currency,
    transactions: &[Transaction],
    cancel: &CancellationToken,
) -> Result<Vec<TransactionLog>> {
    let txn = storage.begin();
    let mut logs = Vec::with_capacity(transactions.len());

    for transaction in transactions {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let account = &transaction.account;
        let (stored_old, actual_new) =
            txn.increment_balance(currency, &account.id, transaction.change)?;

        let expected_new = account
            .balance
            .checked_add(transaction.change)
            .ok_or_else(|| Error::Overflow(account.id.clone()))?;

        // The increment itself is always correct. A lower than expected
        // result means someone spent concurrently and the caller's decision
        // may allow overspending; a higher one is harmless.
        if actual_new < expected_new {
            return Err(Error::StaleBalance {
                account: account.id.clone(),
                old_balance: account.balance,
                change: transaction.change,
                new_balance: actual_new,
            });
        }

        if stored_old != account.balance {
            tracing::debug!(
                account_id = %account.id,
                snapshot_balance = account.balance,
                stored_balance = stored_old,
                "Balance moved since snapshot"
            );
        }

        // logged against the balance the change was decided on
        let log = TransactionLog {
            id: Uuid::now_v7(),
            account_id: account.id.clone(),
            currency,
            old_balance: account.balance,
            new_balance: actual_new,
            change: transaction.change,
            kind: transaction.kind.clone(),
            timestamp: Utc::now(),
            metadata: transaction.metadata.clone(),
        };
        txn.append_log(&log)?;
        logs.push(log);
    }

    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }
    txn.commit()?;

    Ok(logs)
}
