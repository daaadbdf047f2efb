//! Prometheus Metrics Registry - Ledger Observability
//!
//! Registers the engine's counters and gauges. All metrics follow the
//! naming convention `mining_ledger_*`. Rendering happens on `/metrics`
//! in the health server.

use prometheus::{Encoder, Gauge, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

use crate::usecases::deposit_monitor::TickReport;
use crate::usecases::price_oracle::OracleStats;

pub struct MetricsRegistry {
    registry: Registry,
    /// Deposits credited to user balances.
    pub deposits_credited: IntCounter,
    /// Deposits recorded from unlinked wallets.
    pub deposits_unclaimed: IntCounter,
    /// Last head block seen by the deposit monitor.
    pub deposit_head_block: IntGauge,
    /// Reconciliation passes by result (`ok`, error code).
    pub reconciliation_passes: IntCounterVec,
    /// Ledger total of the last successful pass, in human token units.
    pub ledger_total_tokens: Gauge,
    /// Oracle live fetches (mirrors `OracleStats`).
    pub oracle_live_fetches: IntGauge,
    /// Oracle answers served from a stale quote.
    pub oracle_stale_fallbacks: IntGauge,
    /// Float top-ups planned, and blocked by the reserve.
    pub float_checks: IntCounterVec,
}

impl MetricsRegistry {
    /// Create and register all metrics.
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let deposits_credited = IntCounter::new(
            "mining_ledger_deposits_credited_total",
            "Deposits credited to user balances",
        )?;
        let deposits_unclaimed = IntCounter::new(
            "mining_ledger_deposits_unclaimed_total",
            "Deposits recorded from wallets not linked to any user",
        )?;
        let deposit_head_block = IntGauge::new(
            "mining_ledger_deposit_head_block",
            "Last head block seen by the deposit monitor",
        )?;
        let reconciliation_passes = IntCounterVec::new(
            Opts::new(
                "mining_ledger_reconciliation_passes_total",
                "Reconciliation passes by result",
            ),
            &["result"],
        )?;
        let ledger_total_tokens = Gauge::new(
            "mining_ledger_total_tokens",
            "Sum of user balances at the last successful reconciliation (display only)",
        )?;
        let oracle_live_fetches = IntGauge::new(
            "mining_ledger_oracle_live_fetches",
            "Live exchange rate fetches",
        )?;
        let oracle_stale_fallbacks = IntGauge::new(
            "mining_ledger_oracle_stale_fallbacks",
            "Exchange rate requests answered from a stale quote",
        )?;
        let float_checks = IntCounterVec::new(
            Opts::new("mining_ledger_float_checks_total", "Float checks by outcome"),
            &["outcome"],
        )?;

        registry.register(Box::new(deposits_credited.clone()))?;
        registry.register(Box::new(deposits_unclaimed.clone()))?;
        registry.register(Box::new(deposit_head_block.clone()))?;
        registry.register(Box::new(reconciliation_passes.clone()))?;
        registry.register(Box::new(ledger_total_tokens.clone()))?;
        registry.register(Box::new(oracle_live_fetches.clone()))?;
        registry.register(Box::new(oracle_stale_fallbacks.clone()))?;
        registry.register(Box::new(float_checks.clone()))?;

        Ok(Self {
            registry,
            deposits_credited,
            deposits_unclaimed,
            deposit_head_block,
            reconciliation_passes,
            ledger_total_tokens,
            oracle_live_fetches,
            oracle_stale_fallbacks,
            float_checks,
        })
    }

    pub fn record_deposit_tick(&self, report: &TickReport) {
        self.deposit_head_block
            .set(i64::try_from(report.head).unwrap_or(i64::MAX));
        self.deposits_credited.inc_by(report.credit.credited as u64);
        self.deposits_unclaimed.inc_by(report.scan.unclaimed as u64);
    }

    pub fn record_oracle(&self, stats: OracleStats) {
        self.oracle_live_fetches
            .set(i64::try_from(stats.live_fetches).unwrap_or(i64::MAX));
        self.oracle_stale_fallbacks
            .set(i64::try_from(stats.stale_fallbacks).unwrap_or(i64::MAX));
    }

    /// Text exposition format.
    pub fn render(&self) -> anyhow::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}
