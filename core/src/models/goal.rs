//! Persistent per-agent goal stack model (SPEC_FULL.md §4.4).

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::AgentId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GoalHorizon {
    Short,
    Mid,
    Long,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GoalMetric {
    ClaimedOrUcTotal,
    BuiltInZone,
    BuiltTotal,
    Bankroll,
    WinsTotal,
    ApiCallsTotal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GoalStatus {
    Active,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistentGoal {
    pub agent_id: AgentId,
    pub horizon: GoalHorizon,
    pub template_key: String,
    pub metric: GoalMetric,
    pub target_value: i64,
    pub progress_value: i64,
    pub started_tick: u64,
    pub deadline_tick: Option<u64>,
    pub status: GoalStatus,
    pub reward_profile: Value,
    pub penalty_profile: Value,
}

impl PersistentGoal {
    pub fn is_terminal(&self) -> bool {
        matches!(self.status, GoalStatus::Completed | GoalStatus::Failed)
    }
}
