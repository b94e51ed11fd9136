//! Core types for the ledger
//!
//! Balances are whole currency units held as `i64`. A balance may go
//! negative: overspend prevention is the caller's job, expressed through
//! reserved money checks before a [`Transaction`] is built.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Metadata attached to a transaction and copied into its log entry
pub type Metadata = BTreeMap<String, serde_json::Value>;

/// Stable opaque account identifier
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AccountId(String);

impl AccountId {
    /// Create new account ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for AccountId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Named currency ledger over the shared account ID space
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[non_exhaustive]
pub enum Currency {
    /// Main chat currency
    Pokeyen,
    /// Premium currency
    Tokens,
}

impl Currency {
    /// Storage code
    pub fn code(&self) -> &'static str {
        match self {
            Currency::Pokeyen => "pokeyen",
            Currency::Tokens => "tokens",
        }
    }

    /// Parse from string
    pub fn from_code(s: &str) -> Option<Self> {
        match s {
            "pokeyen" => Some(Currency::Pokeyen),
            "tokens" => Some(Currency::Tokens),
            _ => None,
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Stored account record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Account ID
    pub id: AccountId,

    /// One balance per currency; a missing currency reads as zero
    pub balances: BTreeMap<Currency, i64>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl Account {
    /// Create account with initial balances
    pub fn new(id: AccountId, balances: BTreeMap<Currency, i64>) -> Self {
        Self {
            id,
            balances,
            created_at: Utc::now(),
        }
    }

    /// Balance in the given currency
    pub fn balance(&self, currency: Currency) -> i64 {
        self.balances.get(&currency).copied().unwrap_or(0)
    }

    /// Snapshot of one currency balance, for building transactions
    pub fn snapshot(&self, currency: Currency) -> AccountSnapshot {
        AccountSnapshot {
            id: self.id.clone(),
            balance: self.balance(currency),
        }
    }
}

/// The caller's last-known view of an account's balance
///
/// The ledger compares it against storage to detect decisions made on
/// stale information.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountSnapshot {
    /// Account ID
    pub id: AccountId,
    /// Balance the caller believes is current
    pub balance: i64,
}

impl AccountSnapshot {
    /// Create snapshot
    pub fn new(id: impl Into<String>, balance: i64) -> Self {
        Self {
            id: AccountId::new(id),
            balance,
        }
    }
}

/// What a balance change is for
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TransactionType {
    /// Unlocking a secondary chat color
    SecondaryColorUnlock,
    /// Operator correction
    ManualAdjustment,
    /// Donor reward
    DonationGive,
    /// Donation recipient reward
    DonationReceive,
    /// Bet settlement
    Match,
    /// Subscription reward
    Subscription,
    /// Gifted subscription reward
    SubscriptionGift,
    /// Welfare top-up
    Welfare,
    /// Badge transmutation cost
    Transmutation,
    /// Any other code
    Other(String),
}

impl TransactionType {
    /// Code stored in transaction logs
    pub fn code(&self) -> &str {
        match self {
            TransactionType::SecondaryColorUnlock => "secondary_color_unlock",
            TransactionType::ManualAdjustment => "manual_adjustment",
            TransactionType::DonationGive => "donation_give",
            // historic spelling, existing logs depend on it
            TransactionType::DonationReceive => "donation_recieve",
            TransactionType::Match => "match",
            TransactionType::Subscription => "subscription",
            TransactionType::SubscriptionGift => "subscription gift",
            TransactionType::Welfare => "welfare",
            TransactionType::Transmutation => "transmutation",
            TransactionType::Other(code) => code,
        }
    }

    /// Parse from a stored code
    pub fn from_code(code: &str) -> Self {
        match code {
            "secondary_color_unlock" => TransactionType::SecondaryColorUnlock,
            "manual_adjustment" => TransactionType::ManualAdjustment,
            "donation_give" => TransactionType::DonationGive,
            "donation_recieve" => TransactionType::DonationReceive,
            "match" => TransactionType::Match,
            "subscription" => TransactionType::Subscription,
            "subscription gift" => TransactionType::SubscriptionGift,
            "welfare" => TransactionType::Welfare,
            "transmutation" => TransactionType::Transmutation,
            other => TransactionType::Other(other.to_string()),
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl Serialize for TransactionType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.code())
    }
}

impl<'de> Deserialize<'de> for TransactionType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = String::deserialize(deserializer)?;
        Ok(TransactionType::from_code(&code))
    }
}

/// A caller's intended balance change
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    /// Account with the balance the change was decided against
    pub account: AccountSnapshot,

    /// Delta to apply, negative for deductions
    pub change: i64,

    /// What the change is for
    pub kind: TransactionType,

    /// Additional data stored with the log entry
    pub metadata: Metadata,
}

impl Transaction {
    /// Create transaction without metadata
    pub fn new(account: AccountSnapshot, change: i64, kind: TransactionType) -> Self {
        Self {
            account,
            change,
            kind,
            metadata: Metadata::new(),
        }
    }

    /// Attach a metadata entry
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Durable record of one applied balance change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionLog {
    /// Unique log ID (UUIDv7 for time-ordering)
    pub id: Uuid,

    /// Account the change was applied to
    pub account_id: AccountId,

    /// Currency ledger the change belongs to
    pub currency: Currency,

    /// Balance the caller's snapshot reported before the change
    pub old_balance: i64,

    /// Stored balance after the change
    pub new_balance: i64,

    /// Applied delta
    pub change: i64,

    /// Transaction type
    #[serde(rename = "type")]
    pub kind: TransactionType,

    /// When the change was applied
    pub timestamp: DateTime<Utc>,

    /// Copy of the transaction metadata
    #[serde(default)]
    pub metadata: Metadata,
}

impl TransactionLog {
    /// Authoritative snapshot of the account after this change
    pub fn updated_snapshot(&self) -> AccountSnapshot {
        AccountSnapshot {
            id: self.account_id.clone(),
            balance: self.new_balance,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_currency_from_code() {
        assert_eq!(Currency::from_code("pokeyen"), Some(Currency::Pokeyen));
        assert_eq!(Currency::from_code("tokens"), Some(Currency::Tokens));
        assert_eq!(Currency::from_code("USD"), None);
    }

    #[test]
    fn test_missing_currency_reads_zero() {
        let mut balances = BTreeMap::new();
        balances.insert(Currency::Pokeyen, 42);
        let account = Account::new(AccountId::new("alice"), balances);

        assert_eq!(account.balance(Currency::Pokeyen), 42);
        assert_eq!(account.balance(Currency::Tokens), 0);
        assert_eq!(account.snapshot(Currency::Pokeyen), AccountSnapshot::new("alice", 42));
    }

    #[test]
    fn test_transaction_type_codes() {
        assert_eq!(TransactionType::DonationReceive.code(), "donation_recieve");
        assert_eq!(TransactionType::from_code("subscription gift"), TransactionType::SubscriptionGift);
        assert_eq!(
            TransactionType::from_code("pinball"),
            TransactionType::Other("pinball".to_string())
        );
        assert_eq!(serde_json::to_value(TransactionType::Match).unwrap(), json!("match"));
    }

    #[test]
    fn test_log_json_layout() {
        let log = TransactionLog {
            id: Uuid::now_v7(),
            account_id: AccountId::new("bob"),
            currency: Currency::Tokens,
            old_balance: 25,
            new_balance: 16,
            change: -9,
            kind: TransactionType::Match,
            timestamp: Utc::now(),
            metadata: [("match".to_string(), json!(35510))].into_iter().collect(),
        };

        let value = serde_json::to_value(&log).unwrap();
        assert_eq!(value["type"], json!("match"));
        assert_eq!(value["currency"], json!("tokens"));
        assert_eq!(value["metadata"]["match"], json!(35510));

        let back: TransactionLog = serde_json::from_value(value).unwrap();
        assert_eq!(back, log);
        assert_eq!(back.updated_snapshot(), AccountSnapshot::new("bob", 16));
    }
}
