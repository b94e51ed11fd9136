//! Storage layer using RocksDB
//!
//! # Column Families
//!
//! - `accounts` - Account records (key: account_id)
//! - `transactions` - Append-only transaction log (key: log_id)
//! - `indices` - Log entries per account (key: currency || account_id || log_id)
//! - `reservations` - Persisted soft holds (key: currency || account_id || hold key)
//!
//! Balance changes go through a [`StorageTxn`]: a pessimistic RocksDB
//! transaction that row-locks each account it increments. Concurrent writers
//! to the same account are serialized by those locks, and an uncommitted
//! transaction leaves nothing behind when dropped.

use crate::{
    config::Config,
    error::{Error, Result},
    types::{Account, AccountId, Currency, TransactionLog},
};
use rocksdb::{
    ColumnFamily, ColumnFamilyDescriptor, Direction, IteratorMode, Options, TransactionDB,
    TransactionDBOptions, TransactionOptions, WriteOptions,
};
use std::collections::BTreeMap;
use std::path::PathBuf;
use uuid::Uuid;

/// Column family names
const CF_ACCOUNTS: &str = "accounts";
const CF_TRANSACTIONS: &str = "transactions";
const CF_INDICES: &str = "indices";
const CF_RESERVATIONS: &str = "reservations";

/// Storage wrapper for RocksDB
pub struct Storage {
    db: TransactionDB,
    path: PathBuf,
    lock_timeout_ms: i64,
    deadlock_detect: bool,
}

impl std::fmt::Debug for Storage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storage")
            .field("path", &self.path)
            .field("lock_timeout_ms", &self.lock_timeout_ms)
            .finish()
    }
}

impl Storage {
    /// Open or create database
    pub fn open(config: &Config) -> Result<Self> {
        let path = &config.data_dir;

        std::fs::create_dir_all(path)?;

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);
        db_opts.set_write_buffer_size(config.rocksdb.write_buffer_size_mb * 1024 * 1024);
        db_opts.set_max_write_buffer_number(config.rocksdb.max_write_buffer_number);
        db_opts.set_max_background_jobs(config.rocksdb.max_background_jobs);
        if config.rocksdb.enable_statistics {
            db_opts.enable_statistics();
        }

        let mut txn_db_opts = TransactionDBOptions::default();
        txn_db_opts.set_txn_lock_timeout(config.transactions.lock_timeout_ms);

        let cf_descriptors = vec![
            ColumnFamilyDescriptor::new(CF_ACCOUNTS, Self::cf_options_lz4()),
            ColumnFamilyDescriptor::new(CF_TRANSACTIONS, Self::cf_options_zstd()),
            ColumnFamilyDescriptor::new(CF_INDICES, Self::cf_options_indices()),
            ColumnFamilyDescriptor::new(CF_RESERVATIONS, Self::cf_options_lz4()),
        ];

        let db: TransactionDB =
            TransactionDB::open_cf_descriptors(&db_opts, &txn_db_opts, path, cf_descriptors)?;

        tracing::info!(path = ?path, "Opened account store");

        Ok(Self {
            db,
            path: path.clone(),
            lock_timeout_ms: config.transactions.lock_timeout_ms,
            deadlock_detect: config.transactions.deadlock_detect,
        })
    }

    // Column family options

    fn cf_options_lz4() -> Options {
        let mut opts = Options::default();
        // Frequently read, use LZ4 for speed
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        opts
    }

    fn cf_options_zstd() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Zstd);
        opts.set_bottommost_compression_type(rocksdb::DBCompressionType::Zstd);
        opts
    }

    fn cf_options_indices() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        let mut block_opts = rocksdb::BlockBasedOptions::default();
        block_opts.set_bloom_filter(10.0, false);
        opts.set_block_based_table_factory(&block_opts);
        opts
    }

    fn cf_handle(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| Error::Storage(format!("Column family {} not found", name)))
    }

    // Account operations

    /// Create a new account with initial balances
    pub fn create_account(&self, id: AccountId, balances: BTreeMap<Currency, i64>) -> Result<Account> {
        let cf = self.cf_handle(CF_ACCOUNTS)?;
        let txn = self.db.transaction_opt(&WriteOptions::default(), &self.txn_options());

        if txn.get_for_update_cf(cf, id.as_str().as_bytes(), true)?.is_some() {
            return Err(Error::AccountAlreadyExists(id));
        }

        let account = Account::new(id, balances);
        txn.put_cf(cf, account.id.as_str().as_bytes(), bincode::serialize(&account)?)?;
        txn.commit()?;

        tracing::info!(account_id = %account.id, "Account created");

        Ok(account)
    }

    /// Get account by ID
    pub fn get_account(&self, id: &AccountId) -> Result<Account> {
        let cf = self.cf_handle(CF_ACCOUNTS)?;

        let value = self
            .db
            .get_cf(cf, id.as_str().as_bytes())?
            .ok_or_else(|| Error::AccountNotFound(id.clone()))?;

        Ok(bincode::deserialize(&value)?)
    }

    /// Begin an atomic context for balance changes
    pub fn begin(&self) -> StorageTxn<'_> {
        StorageTxn {
            storage: self,
            txn: self.db.transaction_opt(&WriteOptions::default(), &self.txn_options()),
        }
    }

    fn txn_options(&self) -> TransactionOptions {
        let mut opts = TransactionOptions::default();
        opts.set_lock_timeout(self.lock_timeout_ms);
        opts.set_deadlock_detect(self.deadlock_detect);
        opts
    }

    // Transaction log operations

    /// Get log entry by ID
    pub fn get_log(&self, id: Uuid) -> Result<Option<TransactionLog>> {
        let cf = self.cf_handle(CF_TRANSACTIONS)?;

        match self.db.get_cf(cf, id.as_bytes())? {
            Some(value) => Ok(Some(serde_json::from_slice(&value)?)),
            None => Ok(None),
        }
    }

    /// Get all log entries for an account in one currency, oldest first
    pub fn logs_for_account(&self, currency: Currency, id: &AccountId) -> Result<Vec<TransactionLog>> {
        let cf_indices = self.cf_handle(CF_INDICES)?;
        let prefix = account_prefix(currency, id);

        let mut logs = Vec::new();
        let iter = self
            .db
            .iterator_cf(cf_indices, IteratorMode::From(&prefix, Direction::Forward));
        for item in iter {
            let (key, _) = item?;
            if !key.starts_with(&prefix) {
                break;
            }

            let log_id_bytes: [u8; 16] = key[prefix.len()..]
                .try_into()
                .map_err(|_| Error::Storage("Malformed log index key".to_string()))?;
            let log_id = Uuid::from_bytes(log_id_bytes);

            let log = self
                .get_log(log_id)?
                .ok_or_else(|| Error::Storage(format!("Index points to missing log {}", log_id)))?;
            logs.push(log);
        }

        Ok(logs)
    }

    // Reservation operations

    /// Set a persisted hold, replacing any hold with the same key
    pub fn put_hold(&self, currency: Currency, id: &AccountId, key: &str, amount: i64) -> Result<()> {
        let cf = self.cf_handle(CF_RESERVATIONS)?;
        self.db.put_cf(cf, hold_key(currency, id, key), amount.to_be_bytes())?;
        Ok(())
    }

    /// Remove a persisted hold, returning whether it existed
    pub fn remove_hold(&self, currency: Currency, id: &AccountId, key: &str) -> Result<bool> {
        let cf = self.cf_handle(CF_RESERVATIONS)?;
        let hold_key = hold_key(currency, id, key);

        let txn = self.db.transaction_opt(&WriteOptions::default(), &self.txn_options());
        let existed = txn.get_for_update_cf(cf, &hold_key, true)?.is_some();
        if existed {
            txn.delete_cf(cf, &hold_key)?;
        }
        txn.commit()?;

        Ok(existed)
    }

    /// Sum of all persisted holds for an account in one currency
    pub fn sum_holds(&self, currency: Currency, id: &AccountId) -> Result<i64> {
        let cf = self.cf_handle(CF_RESERVATIONS)?;
        let prefix = account_prefix(currency, id);

        let mut total = 0i64;
        let iter = self
            .db
            .iterator_cf(cf, IteratorMode::From(&prefix, Direction::Forward));
        for item in iter {
            let (key, value) = item?;
            if !key.starts_with(&prefix) {
                break;
            }
            total = total
                .checked_add(decode_i64(&value)?)
                .ok_or_else(|| Error::Overflow(id.clone()))?;
        }

        Ok(total)
    }
}

/// Atomic context over the account store
///
/// Every write made through it becomes visible on [`StorageTxn::commit`];
/// dropping it without committing rolls all of them back.
pub struct StorageTxn<'a> {
    storage: &'a Storage,
    txn: rocksdb::Transaction<'a, TransactionDB>,
}

impl<'a> StorageTxn<'a> {
    /// Atomically increment a balance and read back the result
    ///
    /// Returns `(stored_old, stored_new)`. The account row stays locked
    /// until commit or rollback.
    pub fn increment_balance(
        &self,
        currency: Currency,
        id: &AccountId,
        delta: i64,
    ) -> Result<(i64, i64)> {
        let cf = self.storage.cf_handle(CF_ACCOUNTS)?;
        let key = id.as_str().as_bytes();

        let value = self
            .txn
            .get_for_update_cf(cf, key, true)?
            .ok_or_else(|| Error::AccountNotFound(id.clone()))?;
        let mut account: Account = bincode::deserialize(&value)?;

        let old = account.balance(currency);
        let new = old
            .checked_add(delta)
            .ok_or_else(|| Error::Overflow(id.clone()))?;
        account.balances.insert(currency, new);

        self.txn.put_cf(cf, key, bincode::serialize(&account)?)?;

        Ok((old, new))
    }

    /// Append a log entry and index it by account
    pub fn append_log(&self, log: &TransactionLog) -> Result<()> {
        let cf_transactions = self.storage.cf_handle(CF_TRANSACTIONS)?;
        let cf_indices = self.storage.cf_handle(CF_INDICES)?;

        self.txn
            .put_cf(cf_transactions, log.id.as_bytes(), serde_json::to_vec(log)?)?;

        let mut index_key = account_prefix(log.currency, &log.account_id);
        index_key.extend_from_slice(log.id.as_bytes());
        self.txn.put_cf(cf_indices, &index_key, b"")?;

        Ok(())
    }

    /// Commit all writes atomically
    pub fn commit(self) -> Result<()> {
        self.txn.commit()?;
        Ok(())
    }
}

// Key helpers

/// `currency || 0x00 || len(account_id) || account_id`
///
/// The length prefix keeps one account's keys from matching another
/// account whose ID extends it.
fn account_prefix(currency: Currency, id: &AccountId) -> Vec<u8> {
    let id_bytes = id.as_str().as_bytes();
    let mut key = Vec::with_capacity(currency.code().len() + 5 + id_bytes.len() + 16);
    key.extend_from_slice(currency.code().as_bytes());
    key.push(0);
    key.extend_from_slice(&(id_bytes.len() as u32).to_be_bytes());
    key.extend_from_slice(id_bytes);
    key
}

fn hold_key(currency: Currency, id: &AccountId, key: &str) -> Vec<u8> {
    let mut hold_key = account_prefix(currency, id);
    hold_key.extend_from_slice(key.as_bytes());
    hold_key
}

fn decode_i64(bytes: &[u8]) -> Result<i64> {
    let raw: [u8; 8] = bytes
        .try_into()
        .map_err(|_| Error::Storage("Malformed hold amount".to_string()))?;
    Ok(i64::from_be_bytes(raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TransactionType;
    use chrono::Utc;
    use tempfile::TempDir;

    fn test_storage() -> (Storage, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.data_dir = temp_dir.path().to_path_buf();
        (Storage::open(&config).unwrap(), temp_dir)
    }

    fn pokeyen(amount: i64) -> BTreeMap<Currency, i64> {
        [(Currency::Pokeyen, amount)].into_iter().collect()
    }

    fn test_log(id: &AccountId, old: i64, new: i64) -> TransactionLog {
        TransactionLog {
            id: Uuid::now_v7(),
            account_id: id.clone(),
            currency: Currency::Pokeyen,
            old_balance: old,
            new_balance: new,
            change: new - old,
            kind: TransactionType::Other("test".to_string()),
            timestamp: Utc::now(),
            metadata: Default::default(),
        }
    }

    #[test]
    fn test_create_and_get_account() {
        let (storage, _temp) = test_storage();
        let id = AccountId::new("alice");

        storage.create_account(id.clone(), pokeyen(10)).unwrap();

        let account = storage.get_account(&id).unwrap();
        assert_eq!(account.balance(Currency::Pokeyen), 10);
        assert_eq!(account.balance(Currency::Tokens), 0);
    }

    #[test]
    fn test_create_account_twice_fails() {
        let (storage, _temp) = test_storage();
        let id = AccountId::new("alice");

        storage.create_account(id.clone(), pokeyen(10)).unwrap();
        let err = storage.create_account(id.clone(), pokeyen(99)).unwrap_err();

        assert!(matches!(err, Error::AccountAlreadyExists(ref existing) if *existing == id));
        assert_eq!(storage.get_account(&id).unwrap().balance(Currency::Pokeyen), 10);
    }

    #[test]
    fn test_get_missing_account() {
        let (storage, _temp) = test_storage();
        let err = storage.get_account(&AccountId::new("ghost")).unwrap_err();
        assert!(matches!(err, Error::AccountNotFound(_)));
    }

    #[test]
    fn test_increment_commit() {
        let (storage, _temp) = test_storage();
        let id = AccountId::new("alice");
        storage.create_account(id.clone(), pokeyen(10)).unwrap();

        let txn = storage.begin();
        assert_eq!(txn.increment_balance(Currency::Pokeyen, &id, 5).unwrap(), (10, 15));
        assert_eq!(txn.increment_balance(Currency::Tokens, &id, 3).unwrap(), (0, 3));
        txn.commit().unwrap();

        let account = storage.get_account(&id).unwrap();
        assert_eq!(account.balance(Currency::Pokeyen), 15);
        assert_eq!(account.balance(Currency::Tokens), 3);
    }

    #[test]
    fn test_dropped_txn_rolls_back() {
        let (storage, _temp) = test_storage();
        let id = AccountId::new("alice");
        storage.create_account(id.clone(), pokeyen(10)).unwrap();

        {
            let txn = storage.begin();
            txn.increment_balance(Currency::Pokeyen, &id, -7).unwrap();
            txn.append_log(&test_log(&id, 10, 3)).unwrap();
        }

        assert_eq!(storage.get_account(&id).unwrap().balance(Currency::Pokeyen), 10);
        assert!(storage.logs_for_account(Currency::Pokeyen, &id).unwrap().is_empty());
    }

    #[test]
    fn test_logs_for_account_are_isolated() {
        let (storage, _temp) = test_storage();
        let short = AccountId::new("al");
        let long = AccountId::new("alice");
        storage.create_account(short.clone(), pokeyen(0)).unwrap();
        storage.create_account(long.clone(), pokeyen(0)).unwrap();

        let txn = storage.begin();
        let first = test_log(&short, 0, 1);
        let second = test_log(&short, 1, 2);
        txn.append_log(&first).unwrap();
        txn.append_log(&test_log(&long, 0, 5)).unwrap();
        txn.append_log(&second).unwrap();
        txn.commit().unwrap();

        let logs = storage.logs_for_account(Currency::Pokeyen, &short).unwrap();
        assert_eq!(logs.len(), 2);
        assert!(logs.iter().any(|log| log.id == first.id));
        assert!(logs.iter().any(|log| log.id == second.id));
        assert!(storage.logs_for_account(Currency::Tokens, &short).unwrap().is_empty());
        assert_eq!(storage.get_log(first.id).unwrap(), Some(first));
    }

    #[test]
    fn test_holds() {
        let (storage, _temp) = test_storage();
        let id = AccountId::new("alice");

        storage.put_hold(Currency::Pokeyen, &id, "offer-1", 30).unwrap();
        storage.put_hold(Currency::Pokeyen, &id, "offer-2", 12).unwrap();
        storage.put_hold(Currency::Tokens, &id, "offer-3", 99).unwrap();
        storage.put_hold(Currency::Pokeyen, &AccountId::new("alicex"), "offer-4", 7).unwrap();
        assert_eq!(storage.sum_holds(Currency::Pokeyen, &id).unwrap(), 42);

        storage.put_hold(Currency::Pokeyen, &id, "offer-1", 10).unwrap();
        assert_eq!(storage.sum_holds(Currency::Pokeyen, &id).unwrap(), 22);

        assert!(storage.remove_hold(Currency::Pokeyen, &id, "offer-2").unwrap());
        assert!(!storage.remove_hold(Currency::Pokeyen, &id, "offer-2").unwrap());
        assert_eq!(storage.sum_holds(Currency::Pokeyen, &id).unwrap(), 10);
    }
}
