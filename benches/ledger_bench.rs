//! Ledger Benchmarks - Settlement Hot Paths
//!
//! Benchmarks the arithmetic that runs on every billed task and every
//! reconciliation pass, plus one reservation round-trip through the
//! per-user lock.
//!
//! Run with: cargo bench --bench ledger_bench

use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::U256;
use criterion::{Criterion, black_box, criterion_group, criterion_main};

use mining_ledger::adapters::persistence::JsonLedgerStore;
use mining_ledger::domain::ledger::{EntryKind, sum_balances};
use mining_ledger::domain::{
    GasReceipt, check_swap_possible, compute_cost, rate_from_reserves, reconcile, should_credit,
};
use mining_ledger::usecases::BalanceReservations;

const WEI: u128 = 1_000_000_000_000_000_000;

/// Ten thousand balances of ~1.23e24 each; the total is far beyond f64 precision.
fn balance_book() -> Vec<String> {
    (0..10_000u128)
        .map(|i| (1_234_567_890_123_456_789_012_345u128 + i).to_string())
        .collect()
}

fn bench_sum_balances(c: &mut Criterion) {
    let book = balance_book();

    c.bench_function("sum_balances_10k", |b| {
        b.iter(|| {
            let _total = sum_balances(black_box(&book));
        });
    });
}

fn bench_reconcile(c: &mut Criterion) {
    let book = balance_book();
    let expected = sum_balances(&book).unwrap_or_default();

    c.bench_function("reconcile_10k", |b| {
        b.iter(|| {
            let _snapshot = reconcile(black_box(&book), black_box(expected));
        });
    });
}

/// Gas cost from an EIP-1559 receipt.
fn bench_compute_cost(c: &mut Criterion) {
    let receipt = GasReceipt {
        gas_used: U256::from(184_302u64),
        effective_gas_price: Some(U256::from(31_000_000_000u64)),
        gas_price: Some(U256::from(40_000_000_000u64)),
    };

    c.bench_function("gas_compute_cost", |b| {
        b.iter(|| {
            let _cost = compute_cost(black_box(&receipt));
        });
    });
}

fn bench_rate_from_reserves(c: &mut Criterion) {
    let token_reserve = U256::from(8_412_993u128 * WEI);
    let native_reserve = U256::from(841u128 * WEI);

    c.bench_function("pool_rate_from_reserves", |b| {
        b.iter(|| {
            let _rate = rate_from_reserves(black_box(token_reserve), black_box(native_reserve));
        });
    });
}

fn bench_swap_guard(c: &mut Criterion) {
    let balance = U256::from(5_000u128 * WEI);
    let amount = U256::from(450u128 * WEI);
    let reserve = U256::from(1_000u128 * WEI);

    c.bench_function("swap_guard_check", |b| {
        b.iter(|| {
            let _available =
                check_swap_possible(black_box(balance), black_box(amount), black_box(reserve));
        });
    });
}

fn bench_confirmation_gate(c: &mut Criterion) {
    c.bench_function("confirmation_gate", |b| {
        b.iter(|| {
            let _ok = should_credit(black_box(19_000_000), black_box(19_000_012), black_box(12));
        });
    });
}

/// Uncontended reserve-and-debit on the in-memory store.
fn bench_reservation_round_trip(c: &mut Criterion) {
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => panic!("tokio runtime: {e}"),
    };
    let reservations = Arc::new(BalanceReservations::new(
        Arc::new(JsonLedgerStore::in_memory()),
        Duration::from_secs(5),
    ));

    let seeded = tokio_test::block_on(reservations.credit(
        1,
        U256::from(1_000_000u128 * WEI),
        EntryKind::AdminCredit,
        |entry| entry.with_memo("bench seed"),
    ));
    if let Err(e) = seeded {
        panic!("seed credit: {e}");
    }

    c.bench_function("reservation_round_trip", |b| {
        b.to_async(&runtime).iter(|| {
            let reservations = Arc::clone(&reservations);
            async move {
                let _ = reservations
                    .submit_with_reserved_funds(1, black_box(U256::from(1u64)), |reservation| async move {
                        Ok::<_, anyhow::Error>(reservation.id)
                    })
                    .await;
            }
        });
    });
}

criterion_group!(
    benches,
    bench_sum_balances,
    bench_reconcile,
    bench_compute_cost,
    bench_rate_from_reserves,
    bench_swap_guard,
    bench_confirmation_gate,
    bench_reservation_round_trip,
);
criterion_main!(benches);
