//! Property-based Tests - Domain Invariants
//!
//! Uses proptest to check the settlement rules hold across wide input
//! ranges, including amounts far beyond 2^53.

use alloy::primitives::U256;
use proptest::prelude::*;

use mining_ledger::domain::amount::WAD;
use mining_ledger::domain::ledger::sum_balances;
use mining_ledger::domain::{
    GasReceipt, SettlementError, check_swap_possible, compute_cost, rate_from_reserves, reconcile,
    should_credit,
};

fn u256(v: u128) -> U256 {
    U256::from(v)
}

// ---- Swap guard ----

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn swap_guard_never_touches_reserve(
        balance in any::<u128>(),
        amount in any::<u128>(),
        reserve in any::<u128>(),
    ) {
        match check_swap_possible(u256(balance), u256(amount), u256(reserve)) {
            Ok(available) => {
                prop_assert!(u256(balance) - u256(amount) >= u256(reserve));
                prop_assert_eq!(available, u256(balance) - u256(reserve));
            }
            Err(SettlementError::BelowMinimumReserve { shortfall, .. }) => {
                prop_assert!(balance < reserve);
                prop_assert_eq!(shortfall, u256(reserve - balance));
            }
            Err(SettlementError::InsufficientAvailableAfterReserve { available, requested }) => {
                prop_assert!(balance >= reserve);
                prop_assert!(available < requested);
            }
            Err(other) => prop_assert!(false, "unexpected error: {other}"),
        }
    }

    #[test]
    fn swap_guard_exact_boundary_passes(reserve in any::<u64>(), amount in any::<u64>()) {
        let balance = u256(u128::from(reserve) + u128::from(amount));
        prop_assert!(check_swap_possible(balance, u256(amount.into()), u256(reserve.into())).is_ok());
    }
}

// ---- Confirmation gate ----

proptest! {
    #[test]
    fn gate_matches_depth(deposit in 0u64..u64::MAX / 2, depth in 0u64..1_000, required in 1u64..100) {
        prop_assert_eq!(should_credit(deposit, deposit + depth, required), depth >= required);
    }

    #[test]
    fn gate_monotonic_in_head(deposit in 0u64..1_000_000, head in 0u64..1_000_000, required in 0u64..64) {
        if should_credit(deposit, head, required) {
            prop_assert!(should_credit(deposit, head + 1, required));
        }
    }

    #[test]
    fn gate_rejects_head_behind_deposit(deposit in 1u64..u64::MAX, lag in 1u64..1_000) {
        prop_assert!(!should_credit(deposit, deposit.saturating_sub(lag), 0));
    }
}

// ---- Exact sums ----

proptest! {
    #[test]
    fn sum_is_exact_for_any_order(values in prop::collection::vec(any::<u128>(), 0..32)) {
        let strings: Vec<String> = values.iter().map(u128::to_string).collect();
        let expected = values.iter().fold(U256::ZERO, |acc, v| acc + u256(*v));

        prop_assert_eq!(sum_balances(&strings).unwrap(), expected);

        let mut reversed = strings.clone();
        reversed.reverse();
        prop_assert_eq!(sum_balances(&reversed).unwrap(), expected);

        let snapshot = reconcile(&strings, expected).unwrap();
        prop_assert_eq!(snapshot.accounts, strings.len());
    }

    #[test]
    fn zero_terms_do_not_change_sum(values in prop::collection::vec(any::<u64>(), 1..16), zeros in 0usize..8) {
        let mut strings: Vec<String> = values.iter().map(u64::to_string).collect();
        let before = sum_balances(&strings).unwrap();
        strings.extend(std::iter::repeat_n("0".to_string(), zeros));
        prop_assert_eq!(sum_balances(&strings).unwrap(), before);
    }

    #[test]
    fn reconcile_detects_any_offset(values in prop::collection::vec(any::<u64>(), 1..16), delta in 1u64..1_000) {
        let strings: Vec<String> = values.iter().map(u64::to_string).collect();
        let total = sum_balances(&strings).unwrap();
        let is_mismatch = matches!(
            reconcile(&strings, total + U256::from(delta)),
            Err(SettlementError::ReconciliationMismatch { .. })
        );
        prop_assert!(is_mismatch);
    }
}

// ---- Gas ----

proptest! {
    #[test]
    fn effective_price_always_wins(gas in 1u64.., effective in 1u64.., legacy in any::<Option<u64>>()) {
        let receipt = GasReceipt {
            gas_used: U256::from(gas),
            effective_gas_price: Some(U256::from(effective)),
            gas_price: legacy.map(U256::from),
        };
        prop_assert_eq!(compute_cost(&receipt).unwrap(), U256::from(gas) * U256::from(effective));
    }

    #[test]
    fn missing_prices_never_cost_zero(gas in 1u64..) {
        let receipt = GasReceipt {
            gas_used: U256::from(gas),
            effective_gas_price: None,
            gas_price: None,
        };
        let is_indeterminate = matches!(
            compute_cost(&receipt),
            Err(SettlementError::IndeterminateGasPrice { .. })
        );
        prop_assert!(is_indeterminate);
    }
}

// ---- Pool rate ----

proptest! {
    #[test]
    fn rate_defined_iff_both_reserves_nonzero(token in any::<u64>(), native in any::<u64>()) {
        let result = rate_from_reserves(U256::from(token), U256::from(native));
        if token == 0 || native == 0 {
            let is_no_liquidity = matches!(result, Err(SettlementError::NoLiquidity { .. }));
            prop_assert!(is_no_liquidity);
        } else {
            prop_assert_eq!(result.unwrap(), U256::from(token) * WAD / U256::from(native));
        }
    }
}
