//! Mining Ledger - Entry Point
//!
//! Initializes configuration, logging, chain connections and the
//! settlement loops. Runs until SIGINT.
//!
//! Wiring sequence:
//! 1. Load config.toml + env overrides + validate
//! 2. Init tracing (JSON structured logging)
//! 3. Connect settlement and oracle RPCs, validate contracts
//! 4. Open the JSON ledger store
//! 5. Build oracle, reservations, deposit monitor, auditor, float manager
//! 6. Spawn health/metrics server (/live, /ready, /metrics)
//! 7. Spawn deposit, reconciliation and float loops
//! 8. Wait for SIGINT -> graceful shutdown (stop loops -> unready -> exit)

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::signal;
use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use mining_ledger::adapters::chain::{
    ContractValidator, RpcChainClient, RpcProvider, UniswapV2PriceSource, WalletAddresses,
};
use mining_ledger::adapters::metrics::{HealthServer, HealthState, MetricsRegistry};
use mining_ledger::adapters::persistence::JsonLedgerStore;
use mining_ledger::config;
use mining_ledger::domain::amount::format_units18;
use mining_ledger::ports::chain_client::ChainClient;
use mining_ledger::ports::ledger_store::LedgerStore;
use mining_ledger::usecases::{
    BalanceReservations, DepositMonitor, FloatManager, LedgerAuditor, PriceOracle,
};

#[tokio::main]
async fn main() -> Result<()> {
    // ── 1. Load configuration ───────────────────────────────
    let config_path = std::env::args().nth(1).unwrap_or_else(|| "config.toml".to_string());
    let config = config::loader::load_config(&config_path).context("Failed to load configuration")?;

    // ── 2. Initialize structured JSON logging ───────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.service.log_level)),
        )
        .json()
        .init();

    info!(
        name = %config.service.name,
        version = env!("CARGO_PKG_VERSION"),
        chain_id = config.chain.chain_id,
        confirmations = config.deposits.required_confirmations,
        "Starting Mining Ledger"
    );

    // ── 3. Chain connections ────────────────────────────────
    let settlement_rpc = Arc::new(
        RpcProvider::connect("settlement", &config.chain.rpc_url, Some(config.chain.chain_id))
            .await
            .context("Failed to connect settlement RPC")?,
    );
    let oracle_rpc = Arc::new(
        RpcProvider::connect("oracle", &config.oracle.rpc_url, None)
            .await
            .context("Failed to connect oracle RPC")?,
    );

    ContractValidator::new(settlement_rpc.inner())
        .require_code(&[("token", config.chain.token_address)])
        .await?;
    ContractValidator::new(oracle_rpc.inner())
        .require_code(&[("pair", config.oracle.pair_address)])
        .await?;

    let chain = Arc::new(RpcChainClient::new(
        Arc::clone(&settlement_rpc),
        WalletAddresses::from(&config.chain),
    ));
    let price_source = Arc::new(UniswapV2PriceSource::new(Arc::clone(&oracle_rpc), &config.oracle));

    // ── 4. Ledger store ─────────────────────────────────────
    let store = Arc::new(
        JsonLedgerStore::open(&config.persistence.data_dir)
            .await
            .context("Failed to open ledger store")?,
    );

    // ── 5. Use cases ────────────────────────────────────────
    let oracle = Arc::new(PriceOracle::from_config(price_source, &config.oracle));
    let reservations = Arc::new(BalanceReservations::new(
        Arc::clone(&store),
        config.billing.lock_timeout(),
    ));
    let monitor = Arc::new(DepositMonitor::new(
        Arc::clone(&chain),
        Arc::clone(&reservations),
        &config.deposits,
    ));
    let auditor = Arc::new(LedgerAuditor::new(Arc::clone(&chain), Arc::clone(&store)));
    let float = Arc::new(
        FloatManager::new(Arc::clone(&chain), Arc::clone(&oracle), &config.reserve)
            .context("Invalid reserve configuration")?,
    );

    // ── 6. Health + metrics server ──────────────────────────
    let (shutdown_tx, _shutdown_rx) = broadcast::channel::<()>(1);
    let health = Arc::new(HealthState::new());
    let metrics = Arc::new(MetricsRegistry::new().context("Failed to register metrics")?);

    let server = HealthServer::new(
        Arc::clone(&health),
        Arc::clone(&metrics),
        config.metrics.bind_address.clone(),
    );
    let server_shutdown = shutdown_tx.subscribe();
    let health_handle = tokio::spawn(async move {
        if let Err(e) = server.run(server_shutdown).await {
            error!(error = %e, "Health server failed");
        }
    });

    // ── 7. Background loops ─────────────────────────────────
    let deposit_handle = {
        let (monitor, chain, store) = (Arc::clone(&monitor), Arc::clone(&chain), Arc::clone(&store));
        let (health, metrics) = (Arc::clone(&health), Arc::clone(&metrics));
        tokio::spawn(every(
            "deposit_monitor",
            Duration::from_millis(config.deposits.poll_interval_ms),
            shutdown_tx.subscribe(),
            move || {
                let (monitor, chain, store) = (Arc::clone(&monitor), Arc::clone(&chain), Arc::clone(&store));
                let (health, metrics) = (Arc::clone(&health), Arc::clone(&metrics));
                async move {
                    health.chain_healthy.store(chain.is_healthy().await, Ordering::Relaxed);
                    health.store_healthy.store(store.is_healthy().await, Ordering::Relaxed);
                    match monitor.tick().await {
                        Ok(report) => metrics.record_deposit_tick(&report),
                        Err(e) => error!(error = %e, code = e.code(), "Deposit poll failed"),
                    }
                }
            },
        ))
    };

    let reconcile_handle = {
        let (auditor, metrics) = (Arc::clone(&auditor), Arc::clone(&metrics));
        tokio::spawn(every(
            "reconciler",
            Duration::from_secs(config.reconciliation.interval_secs),
            shutdown_tx.subscribe(),
            move || {
                let (auditor, metrics) = (Arc::clone(&auditor), Arc::clone(&metrics));
                async move {
                    match auditor.run_pass().await {
                        Ok(snapshot) => {
                            metrics.reconciliation_passes.with_label_values(&["ok"]).inc();
                            if let Ok(total) = format_units18(&snapshot.total).parse::<f64>() {
                                metrics.ledger_total_tokens.set(total);
                            }
                        }
                        Err(e) => {
                            metrics.reconciliation_passes.with_label_values(&[e.code()]).inc();
                        }
                    }
                }
            },
        ))
    };

    let float_handle = {
        let (float, oracle, metrics) = (Arc::clone(&float), Arc::clone(&oracle), Arc::clone(&metrics));
        tokio::spawn(every(
            "float_manager",
            Duration::from_secs(config.reserve.check_interval_secs),
            shutdown_tx.subscribe(),
            move || {
                let (float, oracle, metrics) = (Arc::clone(&float), Arc::clone(&oracle), Arc::clone(&metrics));
                async move {
                    let outcome = match float.plan_top_up().await {
                        Ok(Some(_plan)) => "planned",
                        Ok(None) => "not_needed",
                        Err(e) => e.code(),
                    };
                    metrics.float_checks.with_label_values(&[outcome]).inc();
                    metrics.record_oracle(oracle.stats());
                }
            },
        ))
    };

    info!("All tasks spawned - ledger is running");

    // ── 8. Wait for SIGINT ──────────────────────────────────
    signal::ctrl_c().await.context("Failed to listen for SIGINT")?;
    info!("SIGINT received, initiating graceful shutdown");

    // Readiness goes 503 first so no new work is routed here.
    health.accepting.store(false, Ordering::Relaxed);
    let _ = shutdown_tx.send(());

    for (name, handle) in [
        ("deposit_monitor", deposit_handle),
        ("reconciler", reconcile_handle),
        ("float_manager", float_handle),
    ] {
        if tokio::time::timeout(Duration::from_secs(30), handle).await.is_err() {
            warn!(task = name, "Task did not stop within 30s");
        }
    }

    let _ = tokio::time::timeout(Duration::from_secs(5), health_handle).await;

    info!("Shutdown complete");
    Ok(())
}

/// Run `job` every `period` until shutdown. A tick never overlaps the previous one.
async fn every<F, Fut>(
    name: &'static str,
    period: Duration,
    mut shutdown_rx: broadcast::Receiver<()>,
    mut job: F,
) where
    F: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = shutdown_rx.recv() => {
                info!(task = name, "Received shutdown signal");
                break;
            }
            _ = ticker.tick() => job().await,
        }
    }
}
