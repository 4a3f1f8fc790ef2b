//! Off-chain constant-product pool and its append-only logs (SPEC_FULL.md
//! §3 "EconomyPool" / "EconomySwap" / "EconomyLedger").

use serde::{Deserialize, Serialize};

use super::AgentId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SwapSide {
    BuyArena,
    SellArena,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EconomyPool {
    pub reserve_balance: i64,
    pub arena_balance: i64,
    pub fee_bps: i64,
    pub budget_ops: i64,
    pub budget_pvp: i64,
    pub budget_rescue: i64,
    pub budget_insurance: i64,
    pub cumulative_fees_arena: i64,
    pub cumulative_fees_reserve: i64,
}

impl EconomyPool {
    pub fn new(init_reserve: i64, init_arena: i64, fee_bps: i64) -> Self {
        assert!(init_reserve > 0 && init_arena > 0, "pool must start positive");
        Self {
            reserve_balance: init_reserve,
            arena_balance: init_arena,
            fee_bps,
            budget_ops: 0,
            budget_pvp: 0,
            budget_rescue: 0,
            budget_insurance: 0,
            cumulative_fees_arena: 0,
            cumulative_fees_reserve: 0,
        }
    }

    pub fn k(&self) -> i128 {
        self.reserve_balance as i128 * self.arena_balance as i128
    }

    pub fn invariant_holds(&self) -> bool {
        self.reserve_balance > 0
            && self.arena_balance > 0
            && self.budget_ops >= 0
            && self.budget_pvp >= 0
            && self.budget_rescue >= 0
            && self.budget_insurance >= 0
            && (0..=1000).contains(&self.fee_bps)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EconomySwap {
    pub agent_id: AgentId,
    pub side: SwapSide,
    pub amount_in: i64,
    pub amount_out: i64,
    pub fee: i64,
    pub price_before: f64,
    pub price_after: f64,
    pub tick: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EconomyLedgerEntry {
    pub description: String,
    pub debit_account: String,
    pub credit_account: String,
    pub amount: i64,
    pub tick: u64,
}
