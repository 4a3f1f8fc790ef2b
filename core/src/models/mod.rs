//! Domain entities (SPEC_FULL.md §3).
//!
//! Each submodule owns one entity family, its invariants, and its
//! `thiserror` error enum — mirroring the teacher's `models::agent`,
//! `models::transaction` split. Persisted opaque JSON blobs (`params`,
//! `gameState`, `rewardProfile`, ...) are kept as `serde_json::Value` and are
//! never parsed outside the module that owns the contract for them.

pub mod agent;
pub mod command;
pub mod crew;
pub mod economy;
pub mod event;
pub mod goal;
pub mod match_entity;
pub mod plot;
pub mod relationship;
pub mod stake;
pub mod town;

pub use agent::{Agent, AgentError, Archetype};
pub use command::{AgentCommand, CommandIntent, CommandMode, CommandStatus, IssuerType};
pub use crew::{Crew, CrewBattleEvent, CrewOrder, CrewOrderStatus, CrewStrategy};
pub use economy::{EconomyLedgerEntry, EconomyPool, EconomySwap, SwapSide};
pub use event::{EventKind, TownEvent};
pub use goal::{GoalHorizon, GoalMetric, GoalStatus, PersistentGoal};
pub use match_entity::{GameType, Match, MatchStatus, Move};
pub use plot::{Plot, PlotStatus, Zone};
pub use relationship::{Relationship, RelationshipStatus};
pub use stake::AgentStake;
pub use town::{Town, TownStatus};

pub type AgentId = String;
pub type TownId = String;
pub type MatchId = String;
pub type CommandId = String;
pub type CrewId = String;
pub type CrewOrderId = String;
pub type StakeId = String;
