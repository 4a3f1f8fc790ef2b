//! Persistent per-agent goal stack (C4, SPEC_FULL.md §4.4).

use serde_json::{json, Value};
use thiserror::Error;

use crate::models::{AgentId, Archetype, GoalHorizon, GoalMetric, GoalStatus, PersistentGoal};
use crate::rng::{stable_seed, DeterministicRng};

#[derive(Debug, Error, PartialEq)]
pub enum GoalError {
    #[error("no template available for horizon {0:?}")]
    NoTemplate(GoalHorizon),
}

impl GoalError {
    pub fn code(&self) -> &'static str {
        "INTERNAL"
    }
}

/// A catalog entry a goal can be instantiated from. `min_target` and
/// `target_delta` follow SPEC_FULL.md §4.4's `targetValue = max(minTarget,
/// baseline + targetDelta)` rule.
#[derive(Debug, Clone, Copy)]
pub struct GoalTemplate {
    pub key: &'static str,
    pub metric: GoalMetric,
    pub min_target: i64,
    pub target_delta: i64,
    pub deadline_ticks: Option<u64>,
    pub arena_bonus: i64,
    pub health_bonus: i64,
    pub arena_penalty: i64,
    pub health_penalty: i64,
}

fn catalog(horizon: GoalHorizon) -> &'static [GoalTemplate] {
    const SHORT: &[GoalTemplate] = &[
        GoalTemplate {
            key: "short_claim_plot",
            metric: GoalMetric::ClaimedOrUcTotal,
            min_target: 1,
            target_delta: 1,
            deadline_ticks: Some(200),
            arena_bonus: 20,
            health_bonus: 5,
            arena_penalty: 5,
            health_penalty: 5,
        },
        GoalTemplate {
            key: "short_win_a_match",
            metric: GoalMetric::WinsTotal,
            min_target: 1,
            target_delta: 1,
            deadline_ticks: Some(300),
            arena_bonus: 30,
            health_bonus: 0,
            arena_penalty: 0,
            health_penalty: 5,
        },
    ];
    const MID: &[GoalTemplate] = &[
        GoalTemplate {
            key: "mid_build_in_zone",
            metric: GoalMetric::BuiltInZone,
            min_target: 1,
            target_delta: 1,
            deadline_ticks: Some(1000),
            arena_bonus: 60,
            health_bonus: 10,
            arena_penalty: 10,
            health_penalty: 10,
        },
        GoalTemplate {
            key: "mid_bankroll_milestone",
            metric: GoalMetric::Bankroll,
            min_target: 200,
            target_delta: 150,
            deadline_ticks: Some(1200),
            arena_bonus: 0,
            health_bonus: 10,
            arena_penalty: 10,
            health_penalty: 0,
        },
    ];
    const LONG: &[GoalTemplate] = &[
        GoalTemplate {
            key: "long_build_total",
            metric: GoalMetric::BuiltTotal,
            min_target: 3,
            target_delta: 2,
            deadline_ticks: None,
            arena_bonus: 150,
            health_bonus: 20,
            arena_penalty: 0,
            health_penalty: 0,
        },
        GoalTemplate {
            key: "long_api_calls",
            metric: GoalMetric::ApiCallsTotal,
            min_target: 50,
            target_delta: 30,
            deadline_ticks: None,
            arena_bonus: 100,
            health_bonus: 15,
            arena_penalty: 0,
            health_penalty: 0,
        },
    ];
    match horizon {
        GoalHorizon::Short => SHORT,
        GoalHorizon::Mid => MID,
        GoalHorizon::Long => LONG,
    }
}

/// Deterministically select a template for `(town_id, agent_id, horizon,
/// archetype)`. SHORT/MID anchor to the current town; LONG is global, so
/// callers pass an empty `town_id` for LONG selections.
pub fn pick_template(
    town_id: &str,
    agent_id: &str,
    horizon: GoalHorizon,
    archetype: Archetype,
) -> Result<GoalTemplate, GoalError> {
    let options = catalog(horizon);
    if options.is_empty() {
        return Err(GoalError::NoTemplate(horizon));
    }
    let seed = stable_seed(&[town_id, agent_id, &format!("{horizon:?}"), &format!("{archetype:?}")]);
    let mut rng = DeterministicRng::new(seed);
    let idx = rng.pick_index(options.len()).unwrap_or(0);
    Ok(options[idx])
}

/// Instantiate a new ACTIVE goal from `template`, anchoring its target to
/// `baseline` (the metric's value read once at creation time).
pub fn instantiate(
    agent_id: AgentId,
    horizon: GoalHorizon,
    template: GoalTemplate,
    baseline: i64,
    started_tick: u64,
) -> PersistentGoal {
    let target_value = (baseline + template.target_delta).max(template.min_target);
    PersistentGoal {
        agent_id,
        horizon,
        template_key: template.key.to_string(),
        metric: template.metric,
        target_value,
        progress_value: baseline,
        started_tick,
        deadline_tick: template.deadline_ticks.map(|d| started_tick + d),
        status: GoalStatus::Active,
        reward_profile: json!({ "arenaBonus": template.arena_bonus, "healthBonus": template.health_bonus }),
        penalty_profile: json!({ "arenaPenalty": template.arena_penalty, "healthPenalty": template.health_penalty }),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GoalTransition {
    None,
    Completed,
    Failed,
}

/// Recompute `progress_value` against `current_value` and determine the
/// transition for this tick, per SPEC_FULL.md §4.4 step 2.
pub fn evaluate(goal: &mut PersistentGoal, current_value: i64, current_tick: u64) -> GoalTransition {
    if goal.is_terminal() {
        return GoalTransition::None;
    }
    goal.progress_value = current_value;
    if goal.progress_value >= goal.target_value {
        goal.status = GoalStatus::Completed;
        return GoalTransition::Completed;
    }
    if let Some(deadline) = goal.deadline_tick {
        if current_tick > deadline {
            goal.status = GoalStatus::Failed;
            return GoalTransition::Failed;
        }
    }
    GoalTransition::None
}

fn field_i64(value: &Value, key: &str) -> i64 {
    value.get(key).and_then(Value::as_i64).unwrap_or(0)
}

/// Reward/penalty deltas to apply to the agent's bankroll/health, derived
/// from a completed/failed goal's stored profiles.
pub fn transition_deltas(goal: &PersistentGoal, transition: GoalTransition) -> (i64, i64) {
    match transition {
        GoalTransition::Completed => (
            field_i64(&goal.reward_profile, "arenaBonus"),
            field_i64(&goal.reward_profile, "healthBonus"),
        ),
        GoalTransition::Failed => (
            -field_i64(&goal.penalty_profile, "arenaPenalty"),
            -field_i64(&goal.penalty_profile, "healthPenalty"),
        ),
        GoalTransition::None => (0, 0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pick_template_is_deterministic() {
        let a = pick_template("t1", "a1", GoalHorizon::Short, Archetype::Shark).unwrap();
        let b = pick_template("t1", "a1", GoalHorizon::Short, Archetype::Shark).unwrap();
        assert_eq!(a.key, b.key);
    }

    #[test]
    fn instantiate_uses_max_of_min_target_and_baseline_plus_delta() {
        let template = catalog(GoalHorizon::Mid)[1];
        let goal = instantiate("a1".into(), GoalHorizon::Mid, template, 10, 0);
        assert_eq!(goal.target_value, 200); // max(200, 10+150)
    }

    #[test]
    fn evaluate_completes_when_progress_meets_target() {
        let mut goal = instantiate(
            "a1".into(),
            GoalHorizon::Short,
            catalog(GoalHorizon::Short)[0],
            0,
            0,
        );
        let t = evaluate(&mut goal, 1, 5);
        assert_eq!(t, GoalTransition::Completed);
        assert_eq!(goal.status, GoalStatus::Completed);
    }

    #[test]
    fn evaluate_fails_past_deadline() {
        let mut goal = instantiate(
            "a1".into(),
            GoalHorizon::Short,
            catalog(GoalHorizon::Short)[0],
            0,
            0,
        );
        let t = evaluate(&mut goal, 0, goal.deadline_tick.unwrap() + 1);
        assert_eq!(t, GoalTransition::Failed);
    }

    #[test]
    fn terminal_goal_never_reevaluates() {
        let mut goal = instantiate(
            "a1".into(),
            GoalHorizon::Short,
            catalog(GoalHorizon::Short)[0],
            0,
            0,
        );
        goal.status = GoalStatus::Completed;
        assert_eq!(evaluate(&mut goal, 0, 0), GoalTransition::None);
    }
}
