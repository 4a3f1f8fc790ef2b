//! Agent (bank-of-one AI citizen) model.
//!
//! CRITICAL: `bankroll` and `reserveBalance` are i64 token-unit counters,
//! never floats — the same discipline the teacher applies to settlement
//! cents.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::AgentId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Archetype {
    Shark,
    Rock,
    Chameleon,
    Degen,
    Grinder,
}

#[derive(Debug, Error, PartialEq)]
pub enum AgentError {
    #[error("insufficient bankroll: required {required}, available {available}")]
    InsufficientBankroll { required: i64, available: i64 },
    #[error("insufficient reserve: required {required}, available {available}")]
    InsufficientReserve { required: i64, available: i64 },
    #[error("agent already in match {0}")]
    AlreadyInMatch(String),
    #[error("agent is not in a match")]
    NotInMatch,
}

/// A bounded, rolling journal of the agent's recent actions (SPEC_FULL.md
/// glossary: "Scratchpad").
const SCRATCHPAD_MAX_LINES: usize = 20;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    id: AgentId,
    pub name: String,
    pub owner_wallet: Option<String>,
    pub api_key: String,
    pub archetype: Archetype,
    pub model_id: String,

    bankroll: i64,
    reserve_balance: i64,
    health: i64,
    elo: i64,

    pub wins: u32,
    pub losses: u32,
    pub draws: u32,
    pub total_won: i64,
    pub total_wagered: i64,
    pub total_llm_cost_cents: f64,

    pub risk_tolerance: f64,
    pub max_wager_percent: f64,

    pub is_active: bool,
    is_in_match: bool,
    current_match_id: Option<String>,

    scratchpad: Vec<String>,
    pub last_action_type: Option<String>,
    pub last_reasoning: Option<String>,
    pub last_narrative: Option<String>,
    pub last_target_plot: Option<u32>,
    pub last_tick_at: Option<u64>,
    pub last_blocked_reason: Option<String>,
}

impl Agent {
    /// System-agent defaults: `reserve = 10000, bankroll = 0`.
    pub fn new_system(id: AgentId, name: String, archetype: Archetype, model_id: String) -> Self {
        Self::new(id, name, archetype, model_id, 0, 10_000, None, String::new())
    }

    /// User-spawned-agent defaults: `reserve = 100, bankroll = 50`.
    pub fn new_user_spawned(
        id: AgentId,
        name: String,
        archetype: Archetype,
        model_id: String,
        owner_wallet: String,
        api_key: String,
    ) -> Self {
        Self::new(
            id,
            name,
            archetype,
            model_id,
            50,
            100,
            Some(owner_wallet),
            api_key,
        )
    }

    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: AgentId,
        name: String,
        archetype: Archetype,
        model_id: String,
        bankroll: i64,
        reserve_balance: i64,
        owner_wallet: Option<String>,
        api_key: String,
    ) -> Self {
        assert!(bankroll >= 0, "bankroll must be non-negative");
        assert!(reserve_balance >= 0, "reserve_balance must be non-negative");
        Self {
            id,
            name,
            owner_wallet,
            api_key,
            archetype,
            model_id,
            bankroll,
            reserve_balance,
            health: 100,
            elo: 1500,
            wins: 0,
            losses: 0,
            draws: 0,
            total_won: 0,
            total_wagered: 0,
            total_llm_cost_cents: 0.0,
            risk_tolerance: 0.3,
            max_wager_percent: 0.2,
            is_active: true,
            is_in_match: false,
            current_match_id: None,
            scratchpad: Vec::new(),
            last_action_type: None,
            last_reasoning: None,
            last_narrative: None,
            last_target_plot: None,
            last_tick_at: None,
            last_blocked_reason: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn bankroll(&self) -> i64 {
        self.bankroll
    }

    pub fn reserve_balance(&self) -> i64 {
        self.reserve_balance
    }

    pub fn health(&self) -> i64 {
        self.health
    }

    pub fn elo(&self) -> i64 {
        self.elo
    }

    pub fn is_in_match(&self) -> bool {
        self.is_in_match
    }

    pub fn current_match_id(&self) -> Option<&str> {
        self.current_match_id.as_deref()
    }

    pub fn profit(&self) -> i64 {
        self.total_won - self.total_wagered
    }

    pub fn credit_bankroll(&mut self, amount: i64) {
        assert!(amount >= 0);
        self.bankroll += amount;
    }

    pub fn debit_bankroll(&mut self, amount: i64) -> Result<(), AgentError> {
        assert!(amount >= 0);
        if amount > self.bankroll {
            return Err(AgentError::InsufficientBankroll {
                required: amount,
                available: self.bankroll,
            });
        }
        self.bankroll -= amount;
        Ok(())
    }

    pub fn credit_reserve(&mut self, amount: i64) {
        assert!(amount >= 0);
        self.reserve_balance += amount;
    }

    pub fn debit_reserve(&mut self, amount: i64) -> Result<(), AgentError> {
        assert!(amount >= 0);
        if amount > self.reserve_balance {
            return Err(AgentError::InsufficientReserve {
                required: amount,
                available: self.reserve_balance,
            });
        }
        self.reserve_balance -= amount;
        Ok(())
    }

    /// Clamp health into `[0, 100]` after a delta.
    pub fn adjust_health(&mut self, delta: i64) {
        self.health = (self.health + delta).clamp(0, 100);
    }

    pub fn set_elo(&mut self, elo: i64) {
        self.elo = elo.max(100);
    }

    pub fn record_llm_cost(&mut self, cost_cents: f64) {
        self.total_llm_cost_cents += cost_cents;
    }

    pub fn enter_match(&mut self, match_id: String) -> Result<(), AgentError> {
        if self.is_in_match {
            return Err(AgentError::AlreadyInMatch(
                self.current_match_id.clone().unwrap_or_default(),
            ));
        }
        self.is_in_match = true;
        self.current_match_id = Some(match_id);
        Ok(())
    }

    pub fn leave_match(&mut self) {
        self.is_in_match = false;
        self.current_match_id = None;
    }

    /// Append a line to the bounded scratchpad, trimming to the last
    /// `SCRATCHPAD_MAX_LINES` entries.
    pub fn push_scratchpad(&mut self, line: String) {
        self.scratchpad.push(line);
        if self.scratchpad.len() > SCRATCHPAD_MAX_LINES {
            let overflow = self.scratchpad.len() - SCRATCHPAD_MAX_LINES;
            self.scratchpad.drain(0..overflow);
        }
    }

    pub fn scratchpad(&self) -> &[String] {
        &self.scratchpad
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agent() -> Agent {
        Agent::new_system(
            "a1".into(),
            "Bank A".into(),
            Archetype::Grinder,
            "test-model".into(),
        )
    }

    #[test]
    fn debit_bankroll_rejects_overdraft() {
        let mut a = agent();
        assert_eq!(
            a.debit_bankroll(1),
            Err(AgentError::InsufficientBankroll {
                required: 1,
                available: 0
            })
        );
    }

    #[test]
    fn enter_match_twice_errors() {
        let mut a = agent();
        a.enter_match("m1".into()).unwrap();
        assert_eq!(
            a.enter_match("m2".into()),
            Err(AgentError::AlreadyInMatch("m1".into()))
        );
    }

    #[test]
    fn scratchpad_trims_to_twenty_lines() {
        let mut a = agent();
        for i in 0..25 {
            a.push_scratchpad(format!("line {i}"));
        }
        assert_eq!(a.scratchpad().len(), 20);
        assert_eq!(a.scratchpad()[0], "line 5");
    }

    #[test]
    fn health_clamps_to_bounds() {
        let mut a = agent();
        a.adjust_health(-1000);
        assert_eq!(a.health(), 0);
        a.adjust_health(1000);
        assert_eq!(a.health(), 100);
    }
}
