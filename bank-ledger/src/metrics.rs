//! Metrics collection for observability
//!
//! This module provides Prometheus metrics for monitoring a ledger.
//!
//! # Metrics
//!
//! - `ledger_transactions_total` - Balance changes applied
//! - `ledger_batches_total` - Batches committed
//! - `ledger_stale_conflicts_total` - Batches rejected for stale balances
//! - `ledger_batch_failures_total` - Batches rolled back for any reason
//! - `ledger_batch_size` - Histogram of batch sizes
//! - `ledger_commit_duration_seconds` - Histogram of batch latencies
//!
//! Every [`Metrics`] owns its registry, so several ledgers in one process
//! (one per currency) never collide on registration.

use prometheus::{Histogram, HistogramOpts, IntCounter, Opts, Registry};
use std::sync::Arc;

/// Metrics collector
#[derive(Clone)]
pub struct Metrics {
    /// Balance changes applied
    pub transactions_total: IntCounter,

    /// Batches committed
    pub batches_total: IntCounter,

    /// Stale-balance conflicts
    pub stale_conflicts_total: IntCounter,

    /// Batches rolled back
    pub batch_failures_total: IntCounter,

    /// Batch size histogram
    pub batch_size: Histogram,

    /// Commit duration histogram
    pub commit_duration: Histogram,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl Metrics {
    /// Create new metrics collector, labelled with the currency it tracks
    pub fn new(currency: &str) -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());
        let opts = |name: &str, help: &str| Opts::new(name, help).const_label("currency", currency);

        let transactions_total = IntCounter::with_opts(opts(
            "ledger_transactions_total",
            "Total number of balance changes applied",
        ))?;
        registry.register(Box::new(transactions_total.clone()))?;

        let batches_total = IntCounter::with_opts(opts(
            "ledger_batches_total",
            "Total number of batches committed",
        ))?;
        registry.register(Box::new(batches_total.clone()))?;

        let stale_conflicts_total = IntCounter::with_opts(opts(
            "ledger_stale_conflicts_total",
            "Batches rejected because a caller snapshot was stale",
        ))?;
        registry.register(Box::new(stale_conflicts_total.clone()))?;

        let batch_failures_total = IntCounter::with_opts(opts(
            "ledger_batch_failures_total",
            "Batches rolled back for any reason",
        ))?;
        registry.register(Box::new(batch_failures_total.clone()))?;

        let batch_size = Histogram::with_opts(
            HistogramOpts::new("ledger_batch_size", "Histogram of batch sizes")
                .const_label("currency", currency)
                .buckets(vec![1.0, 2.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0]),
        )?;
        registry.register(Box::new(batch_size.clone()))?;

        let commit_duration = Histogram::with_opts(
            HistogramOpts::new("ledger_commit_duration_seconds", "Histogram of batch latencies")
                .const_label("currency", currency)
                .buckets(vec![0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0]),
        )?;
        registry.register(Box::new(commit_duration.clone()))?;

        Ok(Self {
            transactions_total,
            batches_total,
            stale_conflicts_total,
            batch_failures_total,
            batch_size,
            commit_duration,
            registry,
        })
    }

    /// Record a committed batch
    pub fn record_commit(&self, batch_size: usize, duration_seconds: f64) {
        self.batches_total.inc();
        self.transactions_total.inc_by(batch_size as u64);
        self.batch_size.observe(batch_size as f64);
        self.commit_duration.observe(duration_seconds);
    }

    /// Record a rolled back batch
    pub fn record_failure(&self, stale: bool) {
        self.batch_failures_total.inc();
        if stale {
            self.stale_conflicts_total.inc();
        }
    }

    /// Get metrics registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}
