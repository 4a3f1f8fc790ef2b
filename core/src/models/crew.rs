//! Crew orders overlay model (SPEC_FULL.md §4.9).

use serde::{Deserialize, Serialize};

use super::AgentId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CrewStrategy {
    Raid,
    Defend,
    Farm,
    Trade,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CrewOrderStatus {
    Queued,
    Resolved,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrewOrder {
    pub id: String,
    pub crew_id: String,
    pub agent_id: AgentId,
    pub strategy: CrewStrategy,
    pub intensity: u8,
    pub status: CrewOrderStatus,
    pub spawned_command_id: Option<String>,
    pub created_tick: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Crew {
    pub id: String,
    pub name: String,
    pub territory: i64,
    pub treasury: i64,
    pub momentum: i64,
    pub war_score: i64,
    pub last_epoch_tick: u64,
}

impl Crew {
    pub fn new(id: String, name: String) -> Self {
        Self {
            id,
            name,
            territory: 10,
            treasury: 500,
            momentum: 0,
            war_score: 0,
            last_epoch_tick: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrewBattleEvent {
    pub winner_crew_id: String,
    pub loser_crew_id: String,
    pub territory_swing: i64,
    pub treasury_swing: i64,
    pub epoch_tick: u64,
}
