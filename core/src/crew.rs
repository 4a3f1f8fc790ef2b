//! Crew orders overlay (C9, SPEC_FULL.md §4.9) — orchestration logic over
//! the `models::crew` data types: deterministic crew assignment, order
//! queuing, and epoch battle resolution.

use thiserror::Error;

use crate::models::{
    Archetype, Crew, CrewBattleEvent, CrewId, CrewOrder, CrewOrderStatus, CrewStrategy,
};
use crate::rng::stable_seed;
use crate::store::{Store, StoreError};

pub const EPOCH_TICKS: u64 = 12;
const TERRITORY_SWING_MIN: i64 = 1;
const TERRITORY_SWING_MAX: i64 = 4;
const TREASURY_SWING_CAP: i64 = 180;
const WAR_SCORE_DECAY: f64 = 0.55;

#[derive(Debug, Error, PartialEq)]
pub enum CrewError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("fewer than two crews registered, cannot resolve an epoch battle")]
    NotEnoughCrews,
}

impl CrewError {
    pub fn code(&self) -> &'static str {
        match self {
            CrewError::Store(e) => e.code(),
            CrewError::NotEnoughCrews => "PRECONDITION",
        }
    }
}

/// Deterministically assign `agent_id` to exactly one of `crew_ids` based
/// on `(agent_id, archetype)` — reassigning the same agent always yields
/// the same crew.
pub fn assign_crew(agent_id: &str, archetype: Archetype, crew_ids: &[CrewId]) -> Option<CrewId> {
    if crew_ids.is_empty() {
        return None;
    }
    let seed = stable_seed(&[agent_id, &format!("{archetype:?}")]);
    let idx = (seed as usize) % crew_ids.len();
    Some(crew_ids[idx].clone())
}

/// Queue a new crew order and return it; the caller is responsible for
/// also spawning the corresponding `AgentCommand` via C8 and linking its
/// id back onto the order.
pub fn queue_order(
    store: &Store,
    crew_id: CrewId,
    agent_id: String,
    strategy: CrewStrategy,
    intensity: u8,
    created_tick: u64,
) -> CrewOrder {
    CrewOrder {
        id: store.new_id("crew_order"),
        crew_id,
        agent_id,
        strategy,
        intensity: intensity.clamp(1, 3),
        status: CrewOrderStatus::Queued,
        spawned_command_id: None,
        created_tick,
    }
}

/// Resolve one epoch battle between the highest- and lowest-`war_score`
/// crews, per SPEC_FULL.md §4.9. Decays every crew's `war_score` by
/// `WAR_SCORE_DECAY` and emits one [`CrewBattleEvent`]. Mutates `crews` in
/// place; the caller persists the updated rows.
pub fn resolve_epoch(crews: &mut [Crew], epoch_tick: u64) -> Result<CrewBattleEvent, CrewError> {
    if crews.len() < 2 {
        return Err(CrewError::NotEnoughCrews);
    }

    let winner_idx = crews
        .iter()
        .enumerate()
        .max_by_key(|(_, c)| c.war_score)
        .map(|(i, _)| i)
        .unwrap();
    let loser_idx = crews
        .iter()
        .enumerate()
        .min_by_key(|(_, c)| c.war_score)
        .map(|(i, _)| i)
        .unwrap();

    let score_gap = crews[winner_idx].war_score - crews[loser_idx].war_score;
    let territory_swing = (score_gap / 10).clamp(TERRITORY_SWING_MIN, TERRITORY_SWING_MAX);
    let treasury_swing = ((crews[loser_idx].treasury as f64 * 0.08).floor() as i64)
        .min(crews[loser_idx].treasury)
        .min(TREASURY_SWING_CAP);

    crews[winner_idx].territory += territory_swing;
    crews[loser_idx].territory -= territory_swing;
    crews[winner_idx].treasury += treasury_swing;
    crews[loser_idx].treasury -= treasury_swing;

    let event = CrewBattleEvent {
        winner_crew_id: crews[winner_idx].id.clone(),
        loser_crew_id: crews[loser_idx].id.clone(),
        territory_swing,
        treasury_swing,
        epoch_tick,
    };

    for crew in crews.iter_mut() {
        crew.war_score = (crew.war_score as f64 * WAR_SCORE_DECAY).round() as i64;
        crew.last_epoch_tick = epoch_tick;
    }

    Ok(event)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assign_crew_is_deterministic() {
        let crews = vec!["raiders".to_string(), "builders".to_string(), "traders".to_string()];
        let a = assign_crew("agent-1", Archetype::Degen, &crews);
        let b = assign_crew("agent-1", Archetype::Degen, &crews);
        assert_eq!(a, b);
    }

    #[test]
    fn resolve_epoch_requires_two_crews() {
        let mut crews = vec![Crew::new("only".into(), "Only".into())];
        let err = resolve_epoch(&mut crews, 12).unwrap_err();
        assert_eq!(err.code(), "PRECONDITION");
    }

    #[test]
    fn resolve_epoch_swings_territory_and_decays_war_score() {
        let mut winner = Crew::new("w".into(), "Winner".into());
        winner.war_score = 100;
        let mut loser = Crew::new("l".into(), "Loser".into());
        loser.war_score = 0;
        loser.treasury = 1000;
        let mut crews = vec![winner, loser];

        let event = resolve_epoch(&mut crews, 24).unwrap();
        assert_eq!(event.winner_crew_id, "w");
        assert_eq!(event.territory_swing, 4.min(10)); // gap 100 -> clamp(10,1,4)=4
        assert_eq!(crews[0].territory, 14);
        assert_eq!(crews[1].territory, 6);
        assert_eq!(crews[0].war_score, 55); // 100 * 0.55
    }
}
