//! Autonomous background loops (C11, SPEC_FULL.md §4.11).
//!
//! Each loop is a `tokio::spawn`ed task driven by `tokio::time::interval`,
//! observing a shared `CancellationToken` for graceful shutdown. The
//! "single-flight boolean guard" mentioned in the spec is an `AtomicBool`
//! checked (and set) at the top of every tick, mirroring the teacher's
//! uncontended-lock idiom for its own background workers.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::arena;
use crate::commands;
use crate::games::{self, GameKind};
use crate::models::{Agent, AgentId, GameType, MatchStatus};
use crate::store::Store;

pub const PAIRING_INTERVAL: Duration = Duration::from_secs(75);
pub const TURN_INTERVAL: Duration = Duration::from_millis(300);
pub const CLEANUP_INTERVAL: Duration = Duration::from_secs(30);
pub const MATCH_WAGER: i64 = 200;
pub const PAIRING_MIN_BANKROLL: i64 = 200;
pub const MAX_TURNS: u32 = 20;
const MAX_AGE_TICKS: u64 = 300;

/// Guards one loop against overlapping ticks; a tick that finds the guard
/// already held skips itself rather than queuing up.
#[derive(Default)]
pub struct SingleFlightGuard(AtomicBool);

impl SingleFlightGuard {
    pub fn new() -> Self {
        Self(AtomicBool::new(false))
    }

    /// Attempt to take the flight slot; returns `false` (and leaves the
    /// guard untouched) if a tick is already in progress.
    fn try_enter(&self) -> bool {
        self.0
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn leave(&self) {
        self.0.store(false, Ordering::Release);
    }
}

fn eligible_for_pairing(agent: &Agent) -> bool {
    agent.is_active && !agent.is_in_match() && agent.bankroll() >= PAIRING_MIN_BANKROLL
}

/// Shuffle candidates deterministically per tick using `rand`'s thread RNG
/// (SPEC_FULL.md §4.15: scheduler shuffles are the one place randomness is
/// non-deterministic by design).
fn shuffle_pair(mut candidates: Vec<AgentId>) -> Option<(AgentId, AgentId)> {
    use rand::seq::SliceRandom;
    candidates.shuffle(&mut rand::thread_rng());
    if candidates.len() < 2 {
        return None;
    }
    Some((candidates[0].clone(), candidates[1].clone()))
}

/// Choose a default move for the scheduler-driven quick match: the first
/// legal action for the current mover, wrapped in the shape each engine's
/// `process_action` expects. This loop never calls the LLM port (C12) — it
/// exists purely to close the economic loop end to end without requiring a
/// human or model turn. Only RPS is ever scheduled here today, but the
/// mapping covers every engine so the loop stays correct if that changes.
pub(crate) fn pick_default_action(kind: GameKind, state: &Value, player_id: &str) -> Option<Value> {
    let raw = games::valid_actions(kind, state, player_id).into_iter().next()?;
    Some(match kind {
        GameKind::Rps => serde_json::json!({ "move": raw }),
        GameKind::Poker => serde_json::json!({ "action": raw }),
        GameKind::SplitOrSteal => serde_json::json!({ "decision": raw }),
        GameKind::Battleship => {
            let mut parts = raw.split(',');
            let row: i64 = parts.next()?.parse().ok()?;
            let col: i64 = parts.next()?.parse().ok()?;
            serde_json::json!({ "row": row, "col": col })
        }
    })
}

/// Drive one RPS match to completion or `MAX_TURNS`, whichever first.
/// Cancels (refunding both wagers) on hitting the safety cap.
async fn drive_match_to_completion(store: &Arc<Store>, match_id: &str, tick: u64) {
    let mut turns = 0u32;
    loop {
        let m = match store.get_match(match_id) {
            Ok(m) => m,
            Err(_) => return,
        };
        if m.status != MatchStatus::Active {
            return;
        }
        if turns >= MAX_TURNS {
            warn!(match_id, "pairing scheduler hit MAX_TURNS, cancelling match");
            let mover = m.current_turn_id.clone().unwrap_or_else(|| m.player1_id.clone());
            let _ = arena::cancel_match(store, match_id, &mover);
            return;
        }

        let kind = GameKind::from(m.game_type);
        let movers: Vec<String> = match m.current_turn_id.clone() {
            Some(id) => vec![id],
            // Simultaneous-move engines (RPS) report no single mover; both
            // participants submit independently each turn.
            None => [Some(m.player1_id.clone()), m.player2_id.clone()]
                .into_iter()
                .flatten()
                .collect(),
        };

        let mut moved = false;
        for mover_id in movers {
            let Some(action) = pick_default_action(kind, &m.game_state, &mover_id) else {
                continue;
            };
            if arena::submit_move(store, match_id, &mover_id, &action, tick).await.is_ok() {
                moved = true;
            }
        }
        if !moved {
            return;
        }
        turns += 1;
        tokio::time::sleep(TURN_INTERVAL).await;
    }
}

/// One pairing-scheduler tick: find eligible agents, pair one pair,
/// create an RPS match at `MATCH_WAGER`, and drive it to completion.
pub async fn pairing_tick(store: &Arc<Store>, guard: &SingleFlightGuard, tick: u64) {
    if !guard.try_enter() {
        return;
    }

    let candidates: Vec<AgentId> = store
        .agents
        .iter()
        .filter(|a| eligible_for_pairing(&a))
        .map(|a| a.id().to_string())
        .collect();

    if let Some((a, b)) = shuffle_pair(candidates) {
        match arena::create_match(store, &a, GameType::Rps, MATCH_WAGER, Some(&b), false, tick) {
            Ok(m) => {
                info!(match_id = %m.id, %a, %b, "pairing scheduler started a match");
                drive_match_to_completion(store, &m.id, tick).await;
            }
            Err(e) => warn!(error = %e, "pairing scheduler failed to create match"),
        }
    }

    guard.leave();
}

/// Periodic cleanup tick: expire stale matches and queued commands for
/// every agent with at least one QUEUED command.
pub fn cleanup_tick(store: &Arc<Store>, tick: u64) {
    let cancelled = arena::cleanup_stale_matches(store, tick, MAX_AGE_TICKS);
    if !cancelled.is_empty() {
        info!(count = cancelled.len(), "cleaned up stale matches");
    }

    let agent_ids: Vec<AgentId> = store
        .commands
        .iter()
        .map(|c| c.agent_id.clone())
        .collect::<std::collections::HashSet<_>>()
        .into_iter()
        .collect();
    for agent_id in agent_ids {
        commands::expire_queued_commands(store, &agent_id, tick);
    }
}

/// Spawn the pairing scheduler as a background task. The returned handle
/// can be awaited for a clean join after `token` is cancelled.
pub fn spawn_pairing_scheduler(store: Arc<Store>, token: CancellationToken, tick_source: Arc<dyn Fn() -> u64 + Send + Sync>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let guard = SingleFlightGuard::new();
        let mut interval = tokio::time::interval(PAIRING_INTERVAL);
        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    info!("pairing scheduler shutting down");
                    return;
                }
                _ = interval.tick() => {
                    pairing_tick(&store, &guard, tick_source()).await;
                }
            }
        }
    })
}

/// Spawn the cleanup/market-maker-poke loop as a background task.
pub fn spawn_cleanup_scheduler(store: Arc<Store>, token: CancellationToken, tick_source: Arc<dyn Fn() -> u64 + Send + Sync>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(CLEANUP_INTERVAL);
        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    info!("cleanup scheduler shutting down");
                    return;
                }
                _ = interval.tick() => {
                    cleanup_tick(&store, tick_source());
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Archetype, EconomyPool};

    fn store_with_two_ready_agents() -> Arc<Store> {
        let store = Store::new(EconomyPool::new(1000, 1000, 30));
        let mut a = Agent::new_system("a".into(), "A".into(), Archetype::Shark, "m".into());
        a.credit_bankroll(500);
        let mut b = Agent::new_system("b".into(), "B".into(), Archetype::Rock, "m".into());
        b.credit_bankroll(500);
        store.agents.insert("a".into(), a);
        store.agents.insert("b".into(), b);
        Arc::new(store)
    }

    #[test]
    fn single_flight_guard_rejects_reentry() {
        let guard = SingleFlightGuard::new();
        assert!(guard.try_enter());
        assert!(!guard.try_enter());
        guard.leave();
        assert!(guard.try_enter());
    }

    /// `pick_default_action` always picks the first legal action for every
    /// mover, so both sides of an RPS match throw the same move every
    /// round and the match runs out the clock as a draw at the safety cap
    /// (`games::rps::MAX_ROUNDS_SAFETY_CAP`), never hitting `MAX_TURNS`.
    #[tokio::test(start_paused = true)]
    async fn pairing_tick_creates_and_resolves_a_match() {
        let store = store_with_two_ready_agents();
        let guard = SingleFlightGuard::new();
        pairing_tick(&store, &guard, 1).await;

        assert_eq!(store.matches.len(), 1);
        let m = store.matches.iter().next().unwrap().clone();
        assert_eq!(m.status, MatchStatus::Completed);
        assert_eq!(m.winner_id, None);

        let a = store.get_agent("a").unwrap();
        let b = store.get_agent("b").unwrap();
        assert!(!a.is_in_match());
        assert!(!b.is_in_match());
        assert_eq!(a.draws, 1);
        assert_eq!(b.draws, 1);
        // wager 200 each, rake 5% of the 400 pot, draw splits the remainder evenly.
        assert_eq!(a.bankroll(), 500 - 200 + 190);
        assert_eq!(b.bankroll(), 500 - 200 + 190);
    }

    #[test]
    fn cleanup_tick_expires_stale_commands() {
        let store = store_with_two_ready_agents();
        let cmd = commands::build_command(
            &store,
            "a".into(),
            crate::models::IssuerType::System,
            None,
            crate::models::CommandMode::Suggest,
            crate::models::CommandIntent::Rest,
            serde_json::json!({}),
            serde_json::json!({}),
            None,
            0,
            Some(5),
        );
        store.commands.insert(cmd.id.clone(), cmd.clone());
        cleanup_tick(&store, 10);
        assert_eq!(
            store.commands.get(&cmd.id).unwrap().status,
            crate::models::CommandStatus::Expired
        );
    }
}
