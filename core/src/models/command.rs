//! Operator command queue model (SPEC_FULL.md §4.8).

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::AgentId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IssuerType {
    Telegram,
    System,
    Crew,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandMode {
    Suggest,
    Strong,
    Override,
}

impl CommandMode {
    /// Default priority per mode (SPEC_FULL.md §4.8).
    pub fn base_priority(self) -> u8 {
        match self {
            CommandMode::Suggest => 50,
            CommandMode::Strong => 80,
            CommandMode::Override => 95,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandIntent {
    ClaimPlot,
    StartBuild,
    DoWork,
    CompleteBuild,
    BuyArena,
    SellArena,
    PlayArena,
    TransferArena,
    BuySkill,
    Rest,
    Trade,
    CrewRaid,
    CrewDefend,
    CrewFarm,
    CrewTrade,
}

impl CommandIntent {
    /// The action type C10 step 5 (validate) expects for this intent.
    pub fn expected_action_type(self) -> &'static str {
        match self {
            CommandIntent::ClaimPlot => "claim_plot",
            CommandIntent::StartBuild => "start_build",
            CommandIntent::DoWork => "do_work",
            CommandIntent::CompleteBuild => "complete_build",
            CommandIntent::BuyArena => "buy_arena",
            CommandIntent::SellArena => "sell_arena",
            CommandIntent::PlayArena => "play_arena",
            CommandIntent::TransferArena => "transfer_arena",
            CommandIntent::BuySkill => "buy_skill",
            CommandIntent::Rest => "rest",
            CommandIntent::Trade => "trade",
            CommandIntent::CrewRaid => "crew_raid",
            CommandIntent::CrewDefend => "crew_defend",
            CommandIntent::CrewFarm => "crew_farm",
            CommandIntent::CrewTrade => "crew_trade",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandStatus {
    Queued,
    Accepted,
    Executed,
    Rejected,
    Expired,
    Cancelled,
}

impl CommandStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            CommandStatus::Executed
                | CommandStatus::Rejected
                | CommandStatus::Expired
                | CommandStatus::Cancelled
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentCommand {
    pub id: String,
    pub agent_id: AgentId,
    pub issuer_type: IssuerType,
    pub issuer_telegram_user_id: Option<String>,
    pub mode: CommandMode,
    pub intent: CommandIntent,
    pub params: Value,
    pub constraints: Value,
    pub audit_meta: Value,
    pub priority: u8,
    pub created_tick: u64,
    pub created_seq: u64,
    pub expires_at_tick: Option<u64>,
    pub status: CommandStatus,
    pub audit_result: Option<Value>,
}
