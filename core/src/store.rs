//! Transactional key-entity store (C1, SPEC_FULL.md §4.1).
//!
//! Database schema/backing-store choice is explicitly delegated (§1); this
//! is the final in-memory persistence layer for the crate, sized for a
//! single simulation process. Each entity family lives in its own
//! `DashMap` for concurrent reads and per-key writes; any mutation that
//! touches more than one entity goes through [`Store::transaction`], which
//! serializes against every other multi-entity mutation via a single
//! `tokio::sync::Mutex` — the async analogue of the teacher's "all debits
//! and credits commit together" rule for `SimulationState`.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use parking_lot::Mutex as SyncMutex;
use thiserror::Error;
use tokio::sync::Mutex as AsyncMutex;

use crate::models::{
    Agent, AgentCommand, AgentId, AgentStake, Crew, CrewBattleEvent, CrewId, CrewOrder,
    CrewOrderId, EconomyLedgerEntry, EconomyPool, EconomySwap, Match, MatchId, Move, Plot,
    Relationship, StakeId, Town, TownEvent, TownId,
};
use crate::models::goal::{GoalHorizon, PersistentGoal};

#[derive(Debug, Error, PartialEq)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("aborted (retryable): {0}")]
    Aborted(String),
}

impl StoreError {
    pub fn code(&self) -> &'static str {
        match self {
            StoreError::NotFound(_) => "NOT_FOUND",
            StoreError::Conflict(_) => "CONFLICT",
            StoreError::Aborted(_) => "ABORTED",
        }
    }
}

/// Opponent head-to-head record, keyed one row per (agent, opponent)
/// direction, updated by the arena orchestrator's resolve step.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct OpponentRecord {
    pub matches_played: u32,
    pub wins: u32,
    pub losses: u32,
    pub draws: u32,
    pub last_played_at_tick: Option<u64>,
}

pub struct Store {
    pub agents: DashMap<AgentId, Agent>,
    pub towns: DashMap<TownId, Town>,
    pub plots: DashMap<(TownId, u32), Plot>,
    pub matches: DashMap<MatchId, Match>,
    pub moves: DashMap<MatchId, Vec<Move>>,
    pub relationships: DashMap<(AgentId, AgentId), Relationship>,
    pub goals: DashMap<(AgentId, GoalHorizon), PersistentGoal>,
    pub commands: DashMap<String, AgentCommand>,
    pub crews: DashMap<CrewId, Crew>,
    pub crew_orders: DashMap<CrewOrderId, CrewOrder>,
    pub stakes: DashMap<StakeId, AgentStake>,
    pub opponent_records: DashMap<(AgentId, AgentId), OpponentRecord>,

    pub economy_pool: AsyncMutex<EconomyPool>,
    pub economy_swaps: SyncMutex<Vec<EconomySwap>>,
    pub economy_ledger: SyncMutex<Vec<EconomyLedgerEntry>>,
    pub events: SyncMutex<Vec<TownEvent>>,
    pub crew_battle_events: SyncMutex<Vec<CrewBattleEvent>>,

    tx_lock: AsyncMutex<()>,
    id_seq: AtomicU64,
}

impl Store {
    pub fn new(economy_pool: EconomyPool) -> Self {
        Self {
            agents: DashMap::new(),
            towns: DashMap::new(),
            plots: DashMap::new(),
            matches: DashMap::new(),
            moves: DashMap::new(),
            relationships: DashMap::new(),
            goals: DashMap::new(),
            commands: DashMap::new(),
            crews: DashMap::new(),
            crew_orders: DashMap::new(),
            stakes: DashMap::new(),
            opponent_records: DashMap::new(),
            economy_pool: AsyncMutex::new(economy_pool),
            economy_swaps: SyncMutex::new(Vec::new()),
            economy_ledger: SyncMutex::new(Vec::new()),
            events: SyncMutex::new(Vec::new()),
            crew_battle_events: SyncMutex::new(Vec::new()),
            tx_lock: AsyncMutex::new(()),
            id_seq: AtomicU64::new(0),
        }
    }

    /// Monotonic counter for tie-breaking same-tick inserts (e.g. command
    /// `createdAt` ordering) without depending on wall-clock resolution.
    pub fn next_seq(&self) -> u64 {
        self.id_seq.fetch_add(1, Ordering::Relaxed)
    }

    pub fn new_id(&self, prefix: &str) -> String {
        format!("{prefix}_{}", uuid::Uuid::new_v4())
    }

    /// Run `f` under the store's single cross-entity transaction lock.
    ///
    /// Callers must validate every precondition *before* performing their
    /// first mutation inside `f` (the teacher's `try_settle` idiom of
    /// "check `can_pay`, then debit, then credit" generalizes directly):
    /// because this store has no physical undo log, the only way to honor
    /// "all mutations commit together, or none do" is to never fail after
    /// the first write.
    pub async fn transaction<F, Fut, T, E>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let _guard = self.tx_lock.lock().await;
        f().await
    }

    pub fn get_agent(&self, id: &str) -> Result<Agent, StoreError> {
        self.agents
            .get(id)
            .map(|a| a.clone())
            .ok_or_else(|| StoreError::NotFound(format!("agent {id}")))
    }

    pub fn get_match(&self, id: &str) -> Result<Match, StoreError> {
        self.matches
            .get(id)
            .map(|m| m.clone())
            .ok_or_else(|| StoreError::NotFound(format!("match {id}")))
    }

    pub fn log_event(&self, event: TownEvent) {
        self.events.lock().push(event);
    }

    pub fn recent_events(&self, town_id: &str, limit: usize) -> Vec<TownEvent> {
        let events = self.events.lock();
        events
            .iter()
            .rev()
            .filter(|e| e.town_id == town_id)
            .take(limit)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn transaction_serializes_concurrent_mutators() {
        let store = Store::new(EconomyPool::new(1000, 1000, 30));
        store.agents.insert(
            "a".into(),
            Agent::new_system("a".into(), "A".into(), crate::models::Archetype::Rock, "m".into()),
        );

        let result: Result<(), StoreError> = store
            .transaction(|| async {
                let mut agent = store.get_agent("a")?;
                agent.credit_bankroll(10);
                store.agents.insert("a".into(), agent);
                Ok(())
            })
            .await;

        assert!(result.is_ok());
        assert_eq!(store.get_agent("a").unwrap().bankroll(), 10);
    }

    #[test]
    fn get_agent_not_found_uses_not_found_code() {
        let store = Store::new(EconomyPool::new(1000, 1000, 30));
        let err = store.get_agent("missing").unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");
    }
}
