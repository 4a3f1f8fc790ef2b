//! AMM invariant coverage (SPEC_FULL.md §8 scenario 5, §4.2).

use town_arena_core::amm;
use town_arena_core::config::FourWaySplitBps;
use town_arena_core::models::{EconomyPool, SwapSide};

fn default_split() -> FourWaySplitBps {
    FourWaySplitBps {
        a: 5000,
        b: 2500,
        c: 1500,
        d: 1000,
    }
}

#[test]
fn k_is_preserved_modulo_fees_across_a_buy_then_sell() {
    let mut pool = EconomyPool::new(1_000_000, 1_000_000, 30);
    let k_before = pool.k();

    let quote = amm::quote(&pool, SwapSide::BuyArena, 10_000).unwrap();
    amm::apply_swap(&mut pool, SwapSide::BuyArena, quote, 0, default_split()).unwrap();
    assert!(pool.invariant_holds());
    // k can only grow (or stay equal) once a fee is taken out of the input side.
    assert!(pool.k() >= k_before);

    let quote = amm::quote(&pool, SwapSide::SellArena, 5_000).unwrap();
    amm::apply_swap(&mut pool, SwapSide::SellArena, quote, 0, default_split()).unwrap();
    assert!(pool.invariant_holds());
}

#[test]
fn pool_balances_never_go_negative_under_repeated_swaps() {
    let mut pool = EconomyPool::new(10_000, 10_000, 30);
    for _ in 0..20 {
        if let Ok(quote) = amm::quote(&pool, SwapSide::BuyArena, 500) {
            let _ = amm::apply_swap(&mut pool, SwapSide::BuyArena, quote, 0, default_split());
        }
        assert!(pool.reserve_balance >= 0);
        assert!(pool.arena_balance >= 0);
    }
}

#[test]
fn slippage_guard_blocks_a_quote_worse_than_min_out() {
    let pool = EconomyPool::new(1_000_000, 1_000_000, 30);
    let quote = amm::quote(&pool, SwapSide::BuyArena, 10_000).unwrap();
    let mut pool = pool;
    let err = amm::apply_swap(&mut pool, SwapSide::BuyArena, quote.clone(), quote.amount_out + 1, default_split())
        .unwrap_err();
    assert_eq!(err.code(), "PRECONDITION");
}

#[test]
fn fee_split_sums_to_the_full_fee_collected_by_the_swap() {
    let mut pool = EconomyPool::new(1_000_000, 1_000_000, 30);
    let quote = amm::quote(&pool, SwapSide::BuyArena, 10_000).unwrap();
    let fee = quote.fee;
    amm::apply_swap(&mut pool, SwapSide::BuyArena, quote, 0, default_split()).unwrap();
    assert_eq!(
        pool.budget_ops + pool.budget_pvp + pool.budget_insurance,
        fee
    );
}

#[test]
fn buy_arena_moves_reserve_up_and_arena_down() {
    let mut pool = EconomyPool::new(1_000_000, 1_000_000, 30);
    let quote = amm::quote(&pool, SwapSide::BuyArena, 10_000).unwrap();
    amm::apply_swap(&mut pool, SwapSide::BuyArena, quote, 0, default_split()).unwrap();
    assert!(pool.reserve_balance > 1_000_000);
    assert!(pool.arena_balance < 1_000_000);
}
