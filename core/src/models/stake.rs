//! External-contract stand-ins consumed by the backer-yield hook
//! (SPEC_FULL.md §3 "AgentStake"). Staking and prediction-market settlement
//! themselves are delegated systems; the core only reads/writes the fields
//! named here.

use serde::{Deserialize, Serialize};

use super::AgentId;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentStake {
    pub id: String,
    pub backer_id: AgentId,
    pub staked_agent_id: AgentId,
    pub amount: i64,
    pub total_yield_earned: i64,
    pub is_active: bool,
}
