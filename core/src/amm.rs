//! Constant-product reserve/ARENA pool (C2, SPEC_FULL.md §4.2).
//!
//! `x * y = k` pricing with a basis-point fee skimmed from the input side
//! before the swap, then split four ways into town/ops/pvp/insurance
//! budget buckets. The pool itself lives in [`crate::store::Store`]; this
//! module only computes quotes and produces the mutation to apply under a
//! `Store::transaction`.

use thiserror::Error;

use crate::config::FourWaySplitBps;
use crate::models::{AgentError, EconomyLedgerEntry, EconomyPool, EconomySwap, SwapSide};
use crate::store::{Store, StoreError};

#[derive(Debug, Error, PartialEq)]
pub enum AmmError {
    #[error("swap amount must be positive, got {0}")]
    NonPositiveAmount(i64),
    #[error("swap would drain the pool: amount_in {amount_in} against balance {balance}")]
    InsufficientLiquidity { amount_in: i64, balance: i64 },
    #[error("quoted amount_out {amount_out} is below minimum {min_out}")]
    SlippageExceeded { amount_out: i64, min_out: i64 },
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Agent(#[from] AgentError),
}

impl AmmError {
    pub fn code(&self) -> &'static str {
        match self {
            AmmError::NonPositiveAmount(_) => "VALIDATION",
            AmmError::InsufficientLiquidity { .. } => "PRECONDITION",
            AmmError::SlippageExceeded { .. } => "PRECONDITION",
            AmmError::Store(e) => e.code(),
            AmmError::Agent(_) => "PRECONDITION",
        }
    }
}

/// Result of [`quote`]: everything a caller needs to apply the swap and to
/// split the collected fee across budget buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quote {
    pub amount_in: i64,
    pub amount_out: i64,
    pub fee: i64,
    pub price_before: f64,
    pub price_after_x1e9: i64,
}

/// Quote a swap against the pool's current reserves without mutating it.
///
/// `side` determines which reserve absorbs `amount_in`: [`SwapSide::BuyArena`]
/// pays in reserve token and receives ARENA; [`SwapSide::SellArena`] is the
/// mirror image.
pub fn quote(pool: &EconomyPool, side: SwapSide, amount_in: i64) -> Result<Quote, AmmError> {
    if amount_in <= 0 {
        return Err(AmmError::NonPositiveAmount(amount_in));
    }

    let (reserve_in, reserve_out) = match side {
        SwapSide::BuyArena => (pool.reserve_balance, pool.arena_balance),
        SwapSide::SellArena => (pool.arena_balance, pool.reserve_balance),
    };

    let price_before = reserve_in as f64 / reserve_out as f64;

    let fee = amount_in * pool.fee_bps / 10_000;
    let net_in = amount_in - fee;

    let k = reserve_in as i128 * reserve_out as i128;
    let new_reserve_in = reserve_in as i128 + net_in as i128;
    let new_reserve_out = k / new_reserve_in;
    let amount_out = (reserve_out as i128 - new_reserve_out) as i64;

    if amount_out <= 0 || amount_out >= reserve_out {
        return Err(AmmError::InsufficientLiquidity {
            amount_in,
            balance: reserve_out,
        });
    }

    let price_after = new_reserve_in as f64 / new_reserve_out as f64;

    Ok(Quote {
        amount_in,
        amount_out,
        fee,
        price_before,
        price_after_x1e9: (price_after * 1e9) as i64,
    })
}

/// Apply a previously computed [`Quote`] to `pool` in place, enforcing a
/// caller-supplied minimum output (slippage guard), and route the fee into
/// the four budget buckets per `split`.
pub fn apply_swap(
    pool: &mut EconomyPool,
    side: SwapSide,
    quote: Quote,
    min_out: i64,
    split: FourWaySplitBps,
) -> Result<(), AmmError> {
    if quote.amount_out < min_out {
        return Err(AmmError::SlippageExceeded {
            amount_out: quote.amount_out,
            min_out,
        });
    }

    match side {
        SwapSide::BuyArena => {
            pool.reserve_balance += quote.amount_in - quote.fee;
            pool.arena_balance -= quote.amount_out;
            pool.cumulative_fees_reserve += quote.fee;
        }
        SwapSide::SellArena => {
            pool.arena_balance += quote.amount_in - quote.fee;
            pool.reserve_balance -= quote.amount_out;
            pool.cumulative_fees_arena += quote.fee;
        }
    }

    split_fee_into_buckets(pool, quote.fee, split);
    Ok(())
}

/// Distribute a collected fee across the pool's four budget buckets
/// according to `split` (town bucket is tracked externally via the ledger;
/// here we fold it into `budget_ops` since the pool itself has no "town"
/// bucket — see SPEC_FULL.md §4.2 Open Question decision).
fn split_fee_into_buckets(pool: &mut EconomyPool, fee: i64, split: FourWaySplitBps) {
    if fee <= 0 {
        return;
    }
    let ops = fee * split.b / 10_000;
    let pvp = fee * split.c / 10_000;
    let insurance = fee * split.d / 10_000;
    let town = fee - ops - pvp - insurance;

    pool.budget_ops += ops + town;
    pool.budget_pvp += pvp;
    pool.budget_insurance += insurance;
}

/// Swap an agent's own balance against the pool: debit the caller's side,
/// quote and apply against the shared pool under its lock, credit the
/// opposite side, and append the swap/ledger rows. The caller's `Agent` is
/// only written back to the store once the quote and pool mutation both
/// succeed, so a rejected swap never leaves a partial debit behind.
pub async fn swap(
    store: &Store,
    agent_id: &str,
    side: SwapSide,
    amount_in: i64,
    min_amount_out: i64,
    split: FourWaySplitBps,
    tick: u64,
) -> Result<EconomySwap, AmmError> {
    let mut agent = store.get_agent(agent_id)?;
    match side {
        SwapSide::BuyArena => agent.debit_reserve(amount_in)?,
        SwapSide::SellArena => agent.debit_bankroll(amount_in)?,
    }

    let (quote, price_after) = {
        let mut pool = store.economy_pool.lock().await;
        let q = quote(&pool, side, amount_in)?;
        apply_swap(&mut pool, side, q, min_amount_out, split)?;
        (q, q.price_after_x1e9 as f64 / 1e9)
    };

    match side {
        SwapSide::BuyArena => agent.credit_bankroll(quote.amount_out),
        SwapSide::SellArena => agent.credit_reserve(quote.amount_out),
    }
    store.agents.insert(agent_id.to_string(), agent);

    let swap_record = EconomySwap {
        agent_id: agent_id.to_string(),
        side,
        amount_in: quote.amount_in,
        amount_out: quote.amount_out,
        fee: quote.fee,
        price_before: quote.price_before,
        price_after,
        tick,
    };
    store.economy_swaps.lock().push(swap_record.clone());

    let (debit_account, credit_account) = match side {
        SwapSide::BuyArena => ("agent_reserve", "pool_reserve"),
        SwapSide::SellArena => ("agent_bankroll", "pool_arena"),
    };
    store.economy_ledger.lock().push(EconomyLedgerEntry {
        description: format!("{side:?} swap for {agent_id}"),
        debit_account: debit_account.to_string(),
        credit_account: credit_account.to_string(),
        amount: amount_in,
        tick,
    });

    Ok(swap_record)
}

/// Direct agent-to-agent bankroll transfer (e.g. `transfer_arena`):
/// validates both agents first, then debits the sender and credits the
/// recipient, mirroring `arena::create_match`'s non-transactional
/// two-agent debit/credit pattern (DashMap handles per-key concurrency, so
/// no `Store::transaction` is needed for a single balance move).
pub fn transfer(store: &Store, from_agent_id: &str, to_agent_id: &str, amount: i64) -> Result<(), AmmError> {
    if amount <= 0 {
        return Err(AmmError::NonPositiveAmount(amount));
    }
    let mut from = store.get_agent(from_agent_id)?;
    let to_exists = store.get_agent(to_agent_id)?;
    from.debit_bankroll(amount)?;

    let mut to = to_exists;
    to.credit_bankroll(amount);

    store.agents.insert(from_agent_id.to_string(), from);
    store.agents.insert(to_agent_id.to_string(), to);
    Ok(())
}
