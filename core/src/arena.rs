//! Match orchestration (C7, SPEC_FULL.md §4.7).
//!
//! Uniform lifecycle around the C6 game engines: create/join/submit-move/
//! resolve, with per-match serialization and an information-hiding view
//! layer. The per-match lock registry is a `DashMap<MatchId,
//! Arc<tokio::sync::Mutex<()>>>`, evicted once a match is terminal and the
//! registry grows past 100 entries — the async analogue of the teacher's
//! FIFO retry-queue idiom.

use std::sync::Arc;

use dashmap::DashMap;
use serde_json::{json, Value};
use thiserror::Error;
use tokio::sync::Mutex as AsyncMutex;

use crate::games::{self, GameError, GameKind};
use crate::llm::{ChatMessage, LlmError, LlmPort, ModelRegistry};
use crate::models::{Agent, Archetype, GameType, Match, MatchId, MatchStatus, Move};
use crate::schedulers::pick_default_action;
use crate::store::{OpponentRecord, Store, StoreError};

pub const MIN_WAGER: i64 = 10;
const LOCK_EVICTION_THRESHOLD: usize = 100;
const BACKER_SHARE_NUMERATOR: i64 = 3; // 0.3 == 3/10
const BACKER_SHARE_DENOMINATOR: i64 = 10;

#[derive(Debug, Error, PartialEq)]
pub enum ArenaError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Game(#[from] GameError),
    #[error("agent already in a match")]
    AlreadyInMatch,
    #[error("wager {wager} is below the minimum {min}")]
    WagerTooLow { wager: i64, min: i64 },
    #[error("insufficient bankroll: required {required}, available {available}")]
    InsufficientBankroll { required: i64, available: i64 },
    #[error("match {0} is not in WAITING state")]
    NotWaiting(MatchId),
    #[error("creator cannot join their own match")]
    SelfJoin,
    #[error("match {0} is not ACTIVE")]
    NotActive(MatchId),
    #[error("agent {agent_id} is not a participant in match {match_id}")]
    NotAParticipant { match_id: MatchId, agent_id: String },
    #[error("match {0} is not COMPLETED")]
    NotCompleted(MatchId),
    #[error(transparent)]
    Llm(#[from] LlmError),
}

impl ArenaError {
    pub fn code(&self) -> &'static str {
        match self {
            ArenaError::Store(e) => e.code(),
            ArenaError::Game(e) => e.code(),
            ArenaError::AlreadyInMatch => "PRECONDITION",
            ArenaError::WagerTooLow { .. } => "VALIDATION",
            ArenaError::InsufficientBankroll { .. } => "PRECONDITION",
            ArenaError::NotWaiting(_) => "PRECONDITION",
            ArenaError::SelfJoin => "VALIDATION",
            ArenaError::NotActive(_) => "PRECONDITION",
            ArenaError::NotAParticipant { .. } => "VALIDATION",
            ArenaError::NotCompleted(_) => "PRECONDITION",
            ArenaError::Llm(e) => e.code(),
        }
    }
}

/// Filtered view returned by `get_match_state`, per the information-hiding
/// policy in SPEC_FULL.md §4.7.
#[derive(Debug, Clone)]
pub struct MatchView {
    pub match_id: MatchId,
    pub status: MatchStatus,
    pub game_state: Value,
    pub current_turn_id: Option<String>,
    pub winner_id: Option<String>,
}

/// Keeps the per-match mutex registry alive across calls. Owned by the
/// agent-loop/service wiring layer, constructed once per process.
pub struct MatchLockRegistry {
    locks: DashMap<MatchId, Arc<AsyncMutex<()>>>,
}

impl Default for MatchLockRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MatchLockRegistry {
    pub fn new() -> Self {
        Self {
            locks: DashMap::new(),
        }
    }

    pub fn entry(&self, match_id: &str) -> Arc<AsyncMutex<()>> {
        self.locks
            .entry(match_id.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    /// Drop lock entries whose match is no longer ACTIVE, once the
    /// registry has grown past the eviction threshold.
    pub fn evict_terminal(&self, store: &Store) {
        if self.locks.len() <= LOCK_EVICTION_THRESHOLD {
            return;
        }
        self.locks.retain(|match_id, _| {
            store
                .matches
                .get(match_id)
                .map(|m| m.status == MatchStatus::Active || m.status == MatchStatus::Waiting)
                .unwrap_or(false)
        });
    }
}

fn game_type_from_kind(kind: GameType) -> GameKind {
    GameKind::from(kind)
}

#[allow(clippy::too_many_arguments)]
pub fn create_match(
    store: &Store,
    creator_id: &str,
    game_type: GameType,
    wager_amount: i64,
    opponent_id: Option<&str>,
    skip_prediction_market: bool,
    tick: u64,
) -> Result<Match, ArenaError> {
    if wager_amount < MIN_WAGER {
        return Err(ArenaError::WagerTooLow {
            wager: wager_amount,
            min: MIN_WAGER,
        });
    }

    let mut creator = store.get_agent(creator_id)?;
    if creator.is_in_match() {
        return Err(ArenaError::AlreadyInMatch);
    }
    if creator.bankroll() < wager_amount {
        return Err(ArenaError::InsufficientBankroll {
            required: wager_amount,
            available: creator.bankroll(),
        });
    }

    // Validate the opponent (if provided) *before* mutating anything, so
    // a bad opponent never requires a rollback.
    let mut opponent: Option<Agent> = None;
    if let Some(opp_id) = opponent_id {
        let opp = store.get_agent(opp_id)?;
        if opp.is_in_match() || opp.bankroll() < wager_amount {
            return Err(ArenaError::InsufficientBankroll {
                required: wager_amount,
                available: opp.bankroll(),
            });
        }
        opponent = Some(opp);
    }

    creator.debit_bankroll(wager_amount).map_err(|_| ArenaError::InsufficientBankroll {
        required: wager_amount,
        available: creator.bankroll(),
    })?;

    let match_id = store.new_id("match");
    let (status, game_state, current_turn_id) = if let Some(opp) = opponent.as_mut() {
        opp.debit_bankroll(wager_amount).unwrap();
        opp.enter_match(match_id.clone()).unwrap();
        let state = games::init_state(game_type_from_kind(game_type), creator_id, opp.id());
        let turn = games::current_turn(game_type_from_kind(game_type), &state);
        (MatchStatus::Active, state, turn)
    } else {
        (MatchStatus::Waiting, json!({}), None)
    };

    creator.enter_match(match_id.clone()).unwrap();

    let m = Match {
        id: match_id.clone(),
        game_type,
        player1_id: creator_id.to_string(),
        player2_id: opponent.as_ref().map(|o| o.id().to_string()),
        wager_amount,
        status,
        current_turn_id,
        turn_number: 0,
        game_state,
        winner_id: None,
        created_at_tick: tick,
        completed_at_tick: None,
        skip_prediction_market,
    };

    store.agents.insert(creator_id.to_string(), creator);
    if let Some(opp) = opponent {
        store.agents.insert(opp.id().to_string(), opp);
    }
    store.matches.insert(match_id.clone(), m.clone());
    Ok(m)
}

pub fn join_match(store: &Store, match_id: &str, agent_id: &str, _tick: u64) -> Result<Match, ArenaError> {
    let mut m = store.get_match(match_id)?;
    if m.status != MatchStatus::Waiting {
        return Err(ArenaError::NotWaiting(match_id.to_string()));
    }
    if m.player1_id == agent_id {
        return Err(ArenaError::SelfJoin);
    }

    let mut opponent = store.get_agent(agent_id)?;
    if opponent.is_in_match() {
        return Err(ArenaError::AlreadyInMatch);
    }
    if opponent.bankroll() < m.wager_amount {
        return Err(ArenaError::InsufficientBankroll {
            required: m.wager_amount,
            available: opponent.bankroll(),
        });
    }

    opponent.debit_bankroll(m.wager_amount).unwrap();
    opponent.enter_match(match_id.to_string()).unwrap();

    let game_state = games::init_state(game_type_from_kind(m.game_type), &m.player1_id, agent_id);
    let current_turn = games::current_turn(game_type_from_kind(m.game_type), &game_state);

    m.player2_id = Some(agent_id.to_string());
    m.status = MatchStatus::Active;
    m.game_state = game_state;
    m.current_turn_id = current_turn;

    store.agents.insert(agent_id.to_string(), opponent);
    store.matches.insert(match_id.to_string(), m.clone());
    Ok(m)
}

/// Compute the view for `viewer_id` (`None` == spectator/anonymous).
/// Completed matches always get the full state; live matches hide
/// opponent-private fields for the mover and *everything* private for
/// spectators. The concrete private keys a game hides are engine-specific
/// ("holeCards", "ships", ...); this generic filter strips any top-level
/// object keyed by the non-viewer's agent id, which covers every engine's
/// per-player private sub-state in this crate.
pub fn get_match_state(m: &Match, viewer_id: Option<&str>) -> MatchView {
    let filtered_state = if m.status == MatchStatus::Completed {
        m.game_state.clone()
    } else {
        filter_private_state(&m.game_state, m, viewer_id)
    };

    MatchView {
        match_id: m.id.clone(),
        status: m.status,
        game_state: filtered_state,
        current_turn_id: m.current_turn_id.clone(),
        winner_id: m.winner_id.clone(),
    }
}

fn filter_private_state(state: &Value, m: &Match, viewer_id: Option<&str>) -> Value {
    let mut state = state.clone();
    let is_player = viewer_id.map(|v| v == m.player1_id || Some(v.to_string()) == m.player2_id).unwrap_or(false);

    if let Some(obj) = state.as_object_mut() {
        for key in ["ships", "decisions", "pendingMoves"] {
            if let Some(sub) = obj.get_mut(key).and_then(Value::as_object_mut) {
                let ids: Vec<String> = sub.keys().cloned().collect();
                for id in ids {
                    let is_viewer = viewer_id.map(|v| v == id).unwrap_or(false);
                    if !is_viewer || !is_player {
                        sub.insert(id, json!("hidden"));
                    }
                }
            }
        }
    }
    state
}

pub fn cancel_match(store: &Store, match_id: &str, agent_id: &str) -> Result<Match, ArenaError> {
    let mut m = store.get_match(match_id)?;
    let is_participant = m.player1_id == agent_id || m.player2_id.as_deref() == Some(agent_id);
    if !is_participant {
        return Err(ArenaError::NotAParticipant {
            match_id: match_id.to_string(),
            agent_id: agent_id.to_string(),
        });
    }
    if matches!(m.status, MatchStatus::Completed | MatchStatus::Cancelled) {
        return Err(ArenaError::NotActive(match_id.to_string()));
    }

    refund_and_clear(store, &m);
    m.status = MatchStatus::Cancelled;
    store.matches.insert(match_id.to_string(), m.clone());
    Ok(m)
}

fn refund_and_clear(store: &Store, m: &Match) {
    for pid in [Some(m.player1_id.clone()), m.player2_id.clone()].into_iter().flatten() {
        if let Some(mut agent) = store.agents.get(&pid).map(|a| a.clone()) {
            agent.credit_bankroll(m.wager_amount);
            agent.leave_match();
            store.agents.insert(pid, agent);
        }
    }
}

pub fn cleanup_stale_matches(store: &Store, current_tick: u64, max_age_ticks: u64) -> Vec<MatchId> {
    let mut cancelled = Vec::new();
    let stale_ids: Vec<MatchId> = store
        .matches
        .iter()
        .filter(|m| {
            matches!(m.status, MatchStatus::Active | MatchStatus::Waiting)
                && current_tick.saturating_sub(m.created_at_tick) > max_age_ticks
        })
        .map(|m| m.id.clone())
        .collect();

    for id in stale_ids {
        if let Some(mut m) = store.matches.get(&id).map(|m| m.clone()) {
            refund_and_clear(store, &m);
            m.status = MatchStatus::Cancelled;
            store.matches.insert(id.clone(), m);
            cancelled.push(id);
        }
    }
    cancelled
}

pub async fn submit_move(
    store: &Store,
    match_id: &str,
    agent_id: &str,
    action: &Value,
    tick: u64,
) -> Result<Match, ArenaError> {
    let mut m = store.get_match(match_id)?;
    if m.status != MatchStatus::Active {
        return Err(ArenaError::NotActive(match_id.to_string()));
    }
    let is_participant = m.player1_id == agent_id || m.player2_id.as_deref() == Some(agent_id);
    if !is_participant {
        return Err(ArenaError::NotAParticipant {
            match_id: match_id.to_string(),
            agent_id: agent_id.to_string(),
        });
    }
    // `current_turn_id == None` means the engine is a simultaneous-move
    // game (e.g. RPS): any participant may submit. Turn-based engines
    // always report a concrete mover here.
    if let Some(turn_id) = m.current_turn_id.as_deref() {
        if turn_id != agent_id {
            return Err(ArenaError::Game(GameError::NotYourTurn {
                player_id: agent_id.to_string(),
            }));
        }
    }

    let kind = game_type_from_kind(m.game_type);
    let normalized_action = normalize_action(kind, action);
    let game_state_before = m.game_state.clone();
    let new_state = games::process_action(kind, &m.game_state, agent_id, &normalized_action)?;

    let move_record = Move {
        match_id: match_id.to_string(),
        turn_number: m.turn_number,
        agent_id: agent_id.to_string(),
        action: normalized_action,
        reasoning: action.get("reasoning").and_then(Value::as_str).unwrap_or("").to_string(),
        cost_cents: 0.0,
        latency_ms: 0,
        game_state_before,
    };
    store.moves.entry(match_id.to_string()).or_default().push(move_record);

    m.turn_number += 1;
    m.current_turn_id = games::current_turn(kind, &new_state);
    m.game_state = new_state.clone();

    if games::is_complete(kind, &new_state) {
        m.status = MatchStatus::Completed;
        m.winner_id = games::winner(kind, &new_state);
        m.completed_at_tick = Some(tick);
        store.matches.insert(match_id.to_string(), m.clone());
        return resolve_match(store, match_id, tick).await;
    }

    store.matches.insert(match_id.to_string(), m.clone());
    Ok(m)
}

/// Apply the resolve contract to a just-completed match: credit the
/// winner's bankroll and Elo, debit nothing further from the loser (the
/// wager already left both bankrolls in `create_match`/`join_match`),
/// upsert both directions of the head-to-head record, route backer yield
/// to any active stakes on the winner, and fold the rake into the pool's
/// arena fee bucket. Runs under `Store::transaction` since it touches more
/// than one agent plus the economy pool.
pub async fn resolve_match(store: &Store, match_id: &str, tick: u64) -> Result<Match, ArenaError> {
    let m = store.get_match(match_id)?;
    if m.status != MatchStatus::Completed {
        return Err(ArenaError::NotCompleted(match_id.to_string()));
    }
    let outcome = resolve(&m);

    store
        .transaction(|| async {
            if outcome.is_draw {
                for pid in [Some(m.player1_id.clone()), m.player2_id.clone()].into_iter().flatten() {
                    let mut agent = store.get_agent(&pid)?;
                    agent.credit_bankroll(outcome.payout);
                    agent.draws += 1;
                    agent.leave_match();
                    store.agents.insert(pid, agent);
                }
            } else {
                let winner_id = outcome.winner_id.clone().expect("non-draw outcome carries a winner");
                let loser_id = outcome.loser_id.clone().expect("non-draw outcome carries a loser");

                let mut winner = store.get_agent(&winner_id)?;
                let mut loser = store.get_agent(&loser_id)?;

                winner.credit_bankroll(outcome.payout);
                winner.total_won += outcome.payout;
                winner.wins += 1;
                winner.leave_match();
                loser.losses += 1;
                loser.leave_match();

                let (winner_elo, loser_elo) = elo_update(winner.elo(), loser.elo());
                winner.set_elo(winner_elo);
                loser.set_elo(loser_elo);

                store.agents.insert(winner_id.clone(), winner);
                store.agents.insert(loser_id.clone(), loser);

                let forward = store.opponent_records.get(&(winner_id.clone(), loser_id.clone())).map(|r| r.clone()).unwrap_or_default();
                let backward = store.opponent_records.get(&(loser_id.clone(), winner_id.clone())).map(|r| r.clone()).unwrap_or_default();
                store.opponent_records.insert((winner_id.clone(), loser_id.clone()), upsert_opponent_record(forward, &outcome, true, tick));
                store.opponent_records.insert((loser_id.clone(), winner_id.clone()), upsert_opponent_record(backward, &outcome, false, tick));

                if outcome.backer_share > 0 {
                    let stakes: Vec<(String, i64)> = store
                        .stakes
                        .iter()
                        .filter(|s| s.is_active && s.staked_agent_id == winner_id)
                        .map(|s| (s.id.clone(), s.amount))
                        .collect();
                    for (stake_id, yield_amount) in distribute_backer_yield(outcome.backer_share, &stakes) {
                        if yield_amount <= 0 {
                            continue;
                        }
                        if let Some(mut stake) = store.stakes.get(&stake_id).map(|s| s.clone()) {
                            stake.total_yield_earned += yield_amount;
                            store.stakes.insert(stake_id, stake);
                        }
                    }
                }
            }

            let mut pool = store.economy_pool.lock().await;
            pool.cumulative_fees_arena += outcome.rake;
            Ok::<(), ArenaError>(())
        })
        .await?;

    store.get_match(match_id).map_err(ArenaError::from)
}

/// One agent's archetype-flavored turn at an AI-vs-AI match: build an LLM
/// request from the filtered view plus opponent scouting, call the model,
/// apply the archetype's action bias, normalize any illegal result to the
/// first legal action, record the call's cost, and submit the move.
pub async fn play_ai_turn(
    store: &Store,
    llm: &dyn LlmPort,
    model_registry: &ModelRegistry,
    match_id: &str,
    agent_id: &str,
    tick: u64,
) -> Result<Match, ArenaError> {
    let m = store.get_match(match_id)?;
    if m.status != MatchStatus::Active {
        return Err(ArenaError::NotActive(match_id.to_string()));
    }
    let opponent_id = match (&m.player1_id, &m.player2_id) {
        (p1, Some(p2)) if p1 == agent_id => p2.clone(),
        (p1, _) if p1 != agent_id => p1.clone(),
        _ => {
            return Err(ArenaError::NotAParticipant {
                match_id: match_id.to_string(),
                agent_id: agent_id.to_string(),
            })
        }
    };

    let agent = store.get_agent(agent_id)?;
    let kind = game_type_from_kind(m.game_type);
    let view = get_match_state(&m, Some(agent_id));
    let record = store
        .opponent_records
        .get(&(agent_id.to_string(), opponent_id.clone()))
        .map(|r| r.clone())
        .unwrap_or_default();

    let system_prompt = archetype_system_prompt(agent.archetype);
    let user_prompt = format!(
        "Match {match_id} vs {opponent_id}. Head-to-head: {}W {}L {}D. Current state: {}",
        record.wins, record.losses, record.draws, view.game_state
    );
    let messages = vec![
        ChatMessage { role: "system".to_string(), content: system_prompt.to_string() },
        ChatMessage { role: "user".to_string(), content: user_prompt },
    ];

    let response = llm.call(&agent.model_id, &messages, 0.7).await?;
    let parsed = crate::llm::repair_json(&response.content).unwrap_or_else(|| json!({}));
    let action_name = parsed.get("action").and_then(Value::as_str).unwrap_or("check").to_string();
    let reasoning = parsed.get("reasoning").and_then(Value::as_str).unwrap_or("").to_string();
    let confidence = parsed.get("confidence").and_then(Value::as_f64).unwrap_or(0.5);

    let action = if kind == GameKind::Poker {
        let pot = m.game_state["pot"].as_i64().unwrap_or(0);
        let aggression = opponent_poker_aggression(store, match_id, &opponent_id);
        let amount = parsed.get("amount").and_then(Value::as_i64);
        let biased = biased_poker_action(agent.archetype, &action_name, confidence, pot, aggression, amount);
        let legal = games::valid_actions(kind, &m.game_state, agent_id);
        if legal.iter().any(|a| a == &biased.0) {
            wrap_poker_action(&biased.0, biased.1)
        } else {
            pick_default_action(kind, &m.game_state, agent_id).unwrap_or_else(|| json!({"action": "fold"}))
        }
    } else {
        let legal = games::valid_actions(kind, &m.game_state, agent_id);
        if legal.iter().any(|a| a == &action_name) {
            wrap_action(kind, &action_name)
        } else {
            pick_default_action(kind, &m.game_state, agent_id).unwrap_or_else(|| json!({}))
        }
    };

    let mut action_with_reasoning = action.clone();
    if let Some(obj) = action_with_reasoning.as_object_mut() {
        obj.insert("reasoning".to_string(), json!(reasoning));
    }

    let cost = model_registry.calculate_cost(&agent.model_id, response.input_tokens, response.output_tokens, 0);
    let result = submit_move(store, match_id, agent_id, &action_with_reasoning, tick).await?;

    if let Some(mut moves) = store.moves.get_mut(match_id) {
        if let Some(last) = moves.last_mut() {
            last.cost_cents = cost.cost_cents;
        }
    }
    if let Some(mut billed) = store.agents.get(agent_id).map(|a| a.clone()) {
        billed.record_llm_cost(cost.cost_cents);
        store.agents.insert(agent_id.to_string(), billed);
    }

    Ok(result)
}

fn archetype_system_prompt(archetype: Archetype) -> &'static str {
    match archetype {
        Archetype::Shark => "You are a SHARK: aggressive, presses every edge, rarely checks when ahead.",
        Archetype::Rock => "You are a ROCK: tight and risk-averse, folds rather than bleeds chips on a weak hand.",
        Archetype::Chameleon => "You are a CHAMELEON: mirror the table's tempo, matching your opponent's aggression.",
        Archetype::Degen => "You are a DEGEN: loves variance, goes big when the moment allows it.",
        Archetype::Grinder => "You are a GRINDER: plays small-ball, sizes bets to a steady fraction of the pot.",
    }
}

/// Scan this match's recorded moves for `opponent_id`'s raise/all-in rate,
/// the CHAMELEON archetype's mirroring signal.
fn opponent_poker_aggression(store: &Store, match_id: &str, opponent_id: &str) -> f64 {
    let Some(moves) = store.moves.get(match_id) else {
        return 0.0;
    };
    let opponent_moves: Vec<&Move> = moves.iter().filter(|mv| mv.agent_id == opponent_id).collect();
    if opponent_moves.is_empty() {
        return 0.0;
    }
    let aggressive = opponent_moves
        .iter()
        .filter(|mv| matches!(mv.action.get("action").and_then(Value::as_str), Some("raise") | Some("all-in")))
        .count();
    aggressive as f64 / opponent_moves.len() as f64
}

/// Apply the archetype's action bias to the model's proposed POKER action,
/// returning `(action, amount)`. Biases use `rand`'s thread RNG, not the
/// deterministic RNG, since they are cosmetic flavor rather than
/// settlement-affecting randomness.
fn biased_poker_action(
    archetype: Archetype,
    action: &str,
    confidence: f64,
    pot: i64,
    opponent_aggression: f64,
    amount: Option<i64>,
) -> (String, Option<i64>) {
    use rand::Rng;
    let mut rng = rand::thread_rng();

    match archetype {
        Archetype::Shark if action == "check" && rng.gen_bool(0.4) => ("raise".to_string(), amount),
        Archetype::Rock if action == "raise" && confidence < 0.5 && rng.gen_bool(0.3) => ("fold".to_string(), None),
        Archetype::Degen if rng.gen_bool(0.15) => ("all-in".to_string(), None),
        Archetype::Chameleon if opponent_aggression > 0.5 && action != "fold" => ("raise".to_string(), amount),
        Archetype::Grinder if action == "raise" => {
            let fraction = rng.gen_range(0.60..=0.75);
            (action.to_string(), Some(((pot as f64) * fraction).round() as i64))
        }
        _ => (action.to_string(), amount),
    }
}

fn wrap_poker_action(action: &str, amount: Option<i64>) -> Value {
    match amount {
        Some(a) => json!({ "action": action, "amount": a }),
        None => json!({ "action": action }),
    }
}

/// Wrap a bare action name into the shape each engine's `process_action`
/// expects, mirroring `schedulers::pick_default_action`'s table.
fn wrap_action(kind: GameKind, raw: &str) -> Value {
    match kind {
        GameKind::Rps => json!({ "move": raw }),
        GameKind::Poker => json!({ "action": raw }),
        GameKind::SplitOrSteal => json!({ "decision": raw }),
        GameKind::Battleship => {
            let mut parts = raw.split(',');
            let row: i64 = parts.next().and_then(|s| s.parse().ok()).unwrap_or(0);
            let col: i64 = parts.next().and_then(|s| s.parse().ok()).unwrap_or(0);
            json!({ "row": row, "col": col })
        }
    }
}

/// POKER alias normalization (`allin -> all-in`, `bet -> raise`, `call ->
/// check` when there's nothing to call) lives in the engine; other games
/// pass the action through untouched.
fn normalize_action(kind: GameKind, action: &Value) -> Value {
    if kind != GameKind::Poker {
        return action.clone();
    }
    let mut action = action.clone();
    if let Some(raw) = action.get("action").and_then(Value::as_str) {
        let normalized = games::normalize_alias(kind, raw);
        action["action"] = json!(normalized);
    }
    action
}

/// Outcome of resolving a completed match: the deltas this function
/// computed, for the caller to persist under one transaction alongside
/// the agent records and economy pool.
#[derive(Debug, Clone)]
pub struct ResolveOutcome {
    pub winner_id: Option<String>,
    pub loser_id: Option<String>,
    pub is_draw: bool,
    pub payout: i64,
    pub rake: i64,
    pub backer_share: i64,
}

/// Pure computation of the resolve contract (SPEC_FULL.md §4.7 "Resolve
/// contract"). Callers apply the returned deltas to `Agent`/`EconomyPool`
/// rows inside a `Store::transaction`.
pub fn resolve(m: &Match) -> ResolveOutcome {
    let rake = m.rake_amount();
    let payout = m.payout();

    match (&m.winner_id, &m.player2_id) {
        (Some(winner), Some(p2)) => {
            let loser = if winner == &m.player1_id { p2.clone() } else { m.player1_id.clone() };
            let backer_share = payout * BACKER_SHARE_NUMERATOR / BACKER_SHARE_DENOMINATOR;
            ResolveOutcome {
                winner_id: Some(winner.clone()),
                loser_id: Some(loser),
                is_draw: false,
                payout,
                rake,
                backer_share,
            }
        }
        _ => ResolveOutcome {
            winner_id: None,
            loser_id: None,
            is_draw: true,
            payout: m.wager_amount - rake / 2,
            rake,
            backer_share: 0,
        },
    }
}

/// Elo update with K=32 (SPEC_FULL.md §4.7), floored at 100.
pub fn elo_update(winner_elo: i64, loser_elo: i64) -> (i64, i64) {
    const K: f64 = 32.0;
    let exp_w = 1.0 / (1.0 + 10f64.powf((loser_elo - winner_elo) as f64 / 400.0));
    let winner_new = winner_elo + (K * (1.0 - exp_w)).round() as i64;
    let loser_new = loser_elo + (K * (0.0 - (1.0 - exp_w))).round() as i64;
    (winner_new.max(100), loser_new.max(100))
}

/// Distribute `backer_share` across `stakes` proportionally to
/// `stake.amount`, flooring each allocation; the remainder stays
/// unallocated per SPEC_FULL.md §4.7.
pub fn distribute_backer_yield(backer_share: i64, stakes: &[(String, i64)]) -> Vec<(String, i64)> {
    let total: i64 = stakes.iter().map(|(_, amt)| *amt).sum();
    if total <= 0 || backer_share <= 0 {
        return stakes.iter().map(|(id, _)| (id.clone(), 0)).collect();
    }
    stakes
        .iter()
        .map(|(id, amt)| (id.clone(), (backer_share * amt) / total))
        .collect()
}

pub fn upsert_opponent_record(
    mut record: OpponentRecord,
    outcome: &ResolveOutcome,
    viewer_is_winner: bool,
    tick: u64,
) -> OpponentRecord {
    record.matches_played += 1;
    if outcome.is_draw {
        record.draws += 1;
    } else if viewer_is_winner {
        record.wins += 1;
    } else {
        record.losses += 1;
    }
    record.last_played_at_tick = Some(tick);
    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Archetype;

    fn store_with_two_agents() -> Store {
        let store = Store::new(crate::models::EconomyPool::new(1000, 1000, 30));
        store.agents.insert(
            "a".into(),
            Agent::new_system("a".into(), "A".into(), Archetype::Shark, "m".into()),
        );
        store.agents.insert(
            "b".into(),
            Agent::new_system("b".into(), "B".into(), Archetype::Rock, "m".into()),
        );
        let mut a = store.get_agent("a").unwrap();
        a.credit_bankroll(500);
        store.agents.insert("a".into(), a);
        let mut b = store.get_agent("b").unwrap();
        b.credit_bankroll(500);
        store.agents.insert("b".into(), b);
        store
    }

    #[test]
    fn create_match_rejects_wager_below_minimum() {
        let store = store_with_two_agents();
        let err = create_match(&store, "a", GameType::Rps, 5, None, false, 0).unwrap_err();
        assert_eq!(err.code(), "VALIDATION");
    }

    #[test]
    fn create_match_with_opponent_goes_straight_to_active() {
        let store = store_with_two_agents();
        let m = create_match(&store, "a", GameType::Rps, 200, Some("b"), false, 0).unwrap();
        assert_eq!(m.status, MatchStatus::Active);
        assert_eq!(store.get_agent("a").unwrap().bankroll(), 300);
        assert_eq!(store.get_agent("b").unwrap().bankroll(), 300);
    }

    #[test]
    fn rake_and_payout_example_match_spec() {
        let store = store_with_two_agents();
        let m = create_match(&store, "a", GameType::Rps, 200, Some("b"), false, 0).unwrap();
        let outcome = resolve(&Match { winner_id: Some("a".into()), status: MatchStatus::Completed, ..m });
        assert_eq!(outcome.payout, 380);
        assert_eq!(outcome.rake, 20);
    }

    #[test]
    fn elo_update_favors_upset_winner() {
        let (winner_new, loser_new) = elo_update(1400, 1600);
        assert!(winner_new - 1400 > 16); // underdog win gains more than half K
        assert!(1600 - loser_new > 16);
    }

    #[test]
    fn backer_yield_distributes_proportionally_and_floors() {
        let payouts = distribute_backer_yield(100, &[("s1".into(), 300), ("s2".into(), 700)]);
        assert_eq!(payouts, vec![("s1".to_string(), 30), ("s2".to_string(), 70)]);
    }

    #[test]
    fn cancel_match_refunds_both_wagers() {
        let store = store_with_two_agents();
        let m = create_match(&store, "a", GameType::Rps, 200, Some("b"), false, 0).unwrap();
        cancel_match(&store, &m.id, "a").unwrap();
        assert_eq!(store.get_agent("a").unwrap().bankroll(), 500);
        assert_eq!(store.get_agent("b").unwrap().bankroll(), 500);
        assert!(!store.get_agent("a").unwrap().is_in_match());
    }

    #[test]
    fn cleanup_stale_matches_cancels_old_waiting_matches() {
        let store = store_with_two_agents();
        let m = create_match(&store, "a", GameType::Rps, 200, None, false, 0).unwrap();
        let cancelled = cleanup_stale_matches(&store, 1000, 30);
        assert_eq!(cancelled, vec![m.id]);
        assert_eq!(store.get_agent("a").unwrap().bankroll(), 500);
    }

    #[test]
    fn spectator_view_hides_private_keys() {
        let store = store_with_two_agents();
        let m = create_match(&store, "a", GameType::Battleship, 200, Some("b"), false, 0).unwrap();
        let view = get_match_state(&m, None);
        let ships = view.game_state["ships"].as_object().unwrap();
        for (_, v) in ships {
            assert_eq!(v, &json!("hidden"));
        }
    }

    #[tokio::test]
    async fn submit_move_settles_the_match_and_pays_the_winner_once_rps_completes() {
        let store = store_with_two_agents();
        let m = create_match(&store, "a", GameType::Rps, 200, Some("b"), false, 0).unwrap();

        let mut current = m;
        let mut guard = 0;
        while current.status == MatchStatus::Active && guard < 10 {
            current = submit_move(&store, &current.id, "a", &json!({"move": "rock"}), guard as u64).await.unwrap();
            if current.status != MatchStatus::Active {
                break;
            }
            current = submit_move(&store, &current.id, "b", &json!({"move": "scissors"}), guard as u64).await.unwrap();
            guard += 1;
        }

        assert_eq!(current.status, MatchStatus::Completed);
        assert_eq!(current.winner_id.as_deref(), Some("a"));

        let winner = store.get_agent("a").unwrap();
        let loser = store.get_agent("b").unwrap();
        assert_eq!(winner.bankroll(), 500 - 200 + 380);
        assert_eq!(winner.wins, 1);
        assert!(winner.elo() > 1500);
        assert!(!winner.is_in_match());
        assert_eq!(loser.losses, 1);
        assert!(loser.elo() < 1500);
        assert!(!loser.is_in_match());

        let record = store.opponent_records.get(&("a".to_string(), "b".to_string())).unwrap();
        assert_eq!(record.wins, 1);
        assert_eq!(record.matches_played, 1);
    }

    #[tokio::test]
    async fn resolve_match_rejects_a_match_that_is_not_completed() {
        let store = store_with_two_agents();
        let m = create_match(&store, "a", GameType::Rps, 200, Some("b"), false, 0).unwrap();
        let err = resolve_match(&store, &m.id, 0).await.unwrap_err();
        assert_eq!(err.code(), "PRECONDITION");
    }

    #[tokio::test]
    async fn resolve_match_is_a_draw_splits_nothing_and_frees_both_agents() {
        let store = store_with_two_agents();
        let mut m = create_match(&store, "a", GameType::Rps, 200, Some("b"), false, 0).unwrap();
        m.status = MatchStatus::Completed;
        m.winner_id = None;
        store.matches.insert(m.id.clone(), m.clone());

        resolve_match(&store, &m.id, 5).await.unwrap();
        let a = store.get_agent("a").unwrap();
        let b = store.get_agent("b").unwrap();
        assert_eq!(a.draws, 1);
        assert_eq!(b.draws, 1);
        assert!(!a.is_in_match());
        assert!(!b.is_in_match());
        assert_eq!(a.bankroll(), b.bankroll());
    }

    struct StubLlm {
        content: String,
    }

    #[async_trait::async_trait]
    impl crate::llm::LlmPort for StubLlm {
        async fn call(
            &self,
            _model_id: &str,
            _messages: &[ChatMessage],
            _temperature: f64,
        ) -> Result<crate::llm::LlmResponse, LlmError> {
            Ok(crate::llm::LlmResponse {
                content: self.content.clone(),
                input_tokens: 100,
                output_tokens: 20,
            })
        }
    }

    #[tokio::test]
    async fn play_ai_turn_submits_the_llms_move_and_bills_the_agent() {
        let store = store_with_two_agents();
        let m = create_match(&store, "a", GameType::Rps, 200, Some("b"), false, 0).unwrap();
        let llm = StubLlm { content: r#"{"action": "rock", "reasoning": "going with instinct"}"#.to_string() };
        let registry = ModelRegistry::default();

        let result = play_ai_turn(&store, &llm, &registry, &m.id, "a", 0).await.unwrap();
        assert_eq!(result.turn_number, 1);

        let moves = store.moves.get(&m.id).unwrap();
        let last = moves.last().unwrap();
        assert!(last.cost_cents > 0.0);

        let agent = store.get_agent("a").unwrap();
        assert!(agent.total_llm_cost_cents > 0.0);
    }

    #[test]
    fn archetype_system_prompts_are_distinct_per_archetype() {
        let prompts: std::collections::HashSet<&str> = [
            Archetype::Shark,
            Archetype::Rock,
            Archetype::Chameleon,
            Archetype::Degen,
            Archetype::Grinder,
        ]
        .iter()
        .map(|a| archetype_system_prompt(*a))
        .collect();
        assert_eq!(prompts.len(), 5);
    }
}
