//! Append-only town event log (consumed by the agent loop, conversation
//! engine, and arena orchestrator to record history).

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    TownCreated,
    PlotClaimed,
    BuildStarted,
    BuildCompleted,
    TownCompleted,
    AgentChat,
    MatchCreated,
    MatchResolved,
    CrewBattle,
    Custom(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TownEvent {
    pub town_id: String,
    pub kind: EventKind,
    pub tick: u64,
    pub metadata: Value,
}
