//! Ledger administration binary
//!
//! Usage:
//!
//! ```text
//! ledger-admin open <account> [balance]
//! ledger-admin balance <account>
//! ledger-admin adjust <account> <delta> <reason...>
//! ledger-admin history <account>
//! ```
//!
//! Storage location comes from `LEDGER_DATA_DIR`, the currency from
//! `LEDGER_CURRENCY` (default `pokeyen`), and the service name tagged on
//! log output from `LEDGER_SERVICE_NAME`.

use anyhow::{bail, Context};
use bank_ledger::{
    AccountId, CancellationToken, Config, Currency, Ledger, Transaction, TransactionType,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some((command, rest)) = args.split_first() else {
        bail!("usage: ledger-admin <open|balance|adjust|history> <account> ...");
    };

    let currency_code = std::env::var("LEDGER_CURRENCY").unwrap_or_else(|_| "pokeyen".to_string());
    let currency = Currency::from_code(&currency_code)
        .with_context(|| format!("unknown currency '{}'", currency_code))?;

    let config = Config::from_env().context("failed to load configuration")?;
    let service_name = config.service_name.clone();
    let ledger = Ledger::open(config, currency).await?;

    tracing::info!(
        service = %service_name,
        currency = %currency,
        command = %command,
        "Ledger opened"
    );

    let account = rest
        .first()
        .map(|id| AccountId::new(id.as_str()))
        .context("missing account argument")?;

    match command.as_str() {
        "open" => {
            let initial = match rest.get(1) {
                Some(raw) => raw.parse().with_context(|| format!("invalid balance '{}'", raw))?,
                None => 0,
            };
            let created = ledger.open_account(account, initial).await?;
            println!("{} {}", created.id, created.balance(currency));
        }
        "balance" => {
            let total = ledger.get_total_money(&account).await?;
            let available = ledger.get_available_money(&account).await?;
            println!("total {} available {}", total, available);
        }
        "adjust" => {
            let raw = rest.get(1).context("missing delta argument")?;
            let delta: i64 = raw.parse().with_context(|| format!("invalid delta '{}'", raw))?;
            let reason = rest[2..].join(" ");
            if reason.is_empty() {
                bail!("manual adjustments need a reason");
            }

            let snapshot = ledger.snapshot(&account).await?;
            let tx = Transaction::new(snapshot, delta, TransactionType::ManualAdjustment)
                .with_metadata("reason", reason);
            let log = ledger.perform_transaction(tx, &CancellationToken::new()).await?;
            println!("{} {} -> {}", log.id, log.old_balance, log.new_balance);
        }
        "history" => {
            for log in ledger.transaction_history(&account).await? {
                println!(
                    "{} {} {:+} {} -> {}",
                    log.timestamp.to_rfc3339(),
                    log.kind,
                    log.change,
                    log.old_balance,
                    log.new_balance
                );
            }
        }
        other => bail!("unknown command '{}'", other),
    }

    Ok(())
}
