//! Match and Move models (SPEC_FULL.md §3 "Match"/"Move").
//!
//! `gameState` stays an opaque `serde_json::Value` at this layer — only the
//! game engine (C6) that owns a given `GameType` parses it, per the "Opaque
//! JSON fields" design note.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::AgentId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameType {
    Poker,
    Rps,
    Battleship,
    SplitOrSteal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchStatus {
    Waiting,
    Active,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Match {
    pub id: String,
    pub game_type: GameType,
    pub player1_id: AgentId,
    pub player2_id: Option<AgentId>,
    pub wager_amount: i64,
    pub status: MatchStatus,
    pub current_turn_id: Option<AgentId>,
    pub turn_number: u32,
    pub game_state: Value,
    pub winner_id: Option<AgentId>,
    pub created_at_tick: u64,
    pub completed_at_tick: Option<u64>,
    pub skip_prediction_market: bool,
}

impl Match {
    pub const RAKE_BPS: i64 = 500; // 5%

    pub fn total_pot(&self) -> i64 {
        2 * self.wager_amount
    }

    pub fn rake_amount(&self) -> i64 {
        (self.total_pot() * Self::RAKE_BPS) / 10_000
    }

    pub fn payout(&self) -> i64 {
        self.total_pot() - self.rake_amount()
    }

    pub fn invariant_holds(&self) -> bool {
        let pot_ok = self.total_pot() == 2 * self.wager_amount;
        let rake_ok = self.rake_amount() <= self.total_pot();
        let status_ok = match self.status {
            MatchStatus::Waiting => self.player2_id.is_none(),
            MatchStatus::Active => self.player2_id.is_some(),
            MatchStatus::Completed => true,
            MatchStatus::Cancelled => true,
        };
        pot_ok && rake_ok && status_ok
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Move {
    pub match_id: String,
    pub turn_number: u32,
    pub agent_id: AgentId,
    pub action: Value,
    pub reasoning: String,
    pub cost_cents: f64,
    pub latency_ms: u64,
    pub game_state_before: Value,
}
