//! Agent tick pipeline (C10, SPEC_FULL.md §4.10) — the central orchestrator
//! that ties together every other component for one agent's turn.

use serde_json::{json, Value};

use crate::amm;
use crate::arena;
use crate::commands::{self};
use crate::config::FourWaySplitBps;
use crate::crew;
use crate::error::{CoreError, CoreResult};
use crate::goals::{self, GoalTransition};
use crate::llm::{ChatMessage, LlmPort};
use crate::models::{
    AgentCommand, AgentId, Archetype, CommandIntent, CommandMode, CrewStrategy, EventKind,
    GameType, GoalHorizon, GoalMetric, PlotStatus, SwapSide, TownEvent,
};
use crate::store::Store;
use crate::town;

/// Fee/budget split used for AMM-routed actions the agent loop drives
/// directly (`buy_arena`/`sell_arena`/`trade`/`buy_skill`), matching
/// `config.rs`'s own town/ops/pvp/insurance default.
const DEFAULT_SWAP_SPLIT: FourWaySplitBps = FourWaySplitBps { a: 5000, b: 2500, c: 1500, d: 1000 };

/// The closed action catalog C10 step 4 offers the LLM port and C8 maps
/// command intents onto (SPEC_FULL.md §4.8/§4.10).
pub const ACTION_CATALOG: &[&str] = &[
    "claim_plot",
    "start_build",
    "do_work",
    "complete_build",
    "buy_arena",
    "sell_arena",
    "play_arena",
    "transfer_arena",
    "buy_skill",
    "rest",
    "trade",
    "crew_raid",
    "crew_defend",
    "crew_farm",
    "crew_trade",
];

/// Immutable snapshot captured at the top of a tick (step 1, "Observe").
#[derive(Debug, Clone)]
pub struct Observation {
    pub agent_id: AgentId,
    pub town_id: String,
    pub bankroll: i64,
    pub reserve_balance: i64,
    pub is_in_match: bool,
    pub archetype: Archetype,
    pub owned_plots: Vec<(String, u32)>,
    pub recent_events: Vec<TownEvent>,
    pub accepted_command: Option<AgentCommand>,
}

#[derive(Debug, Clone)]
pub struct IntentDecision {
    pub action_type: String,
    pub params: Value,
    pub reasoning: String,
}

#[derive(Debug, Clone)]
pub struct TickResult {
    pub tick: u64,
    pub action_type: String,
    pub success: bool,
    pub narrative: String,
    pub command_receipt: Option<String>,
}

/// Observe step: snapshot everything the loop needs before making a
/// decision. Read-only; never mutates the Store.
pub fn observe(store: &Store, agent_id: &str, town_id: &str) -> CoreResult<Observation> {
    let agent = store.get_agent(agent_id)?;
    let owned_plots: Vec<(String, u32)> = store
        .plots
        .iter()
        .filter(|p| p.owner_id.as_deref() == Some(agent_id))
        .map(|p| (p.town_id.clone(), p.plot_index))
        .collect();
    let recent_events = store.recent_events(town_id, 20);

    Ok(Observation {
        agent_id: agent_id.to_string(),
        town_id: town_id.to_string(),
        bankroll: agent.bankroll(),
        reserve_balance: agent.reserve_balance(),
        is_in_match: agent.is_in_match(),
        archetype: agent.archetype,
        owned_plots,
        recent_events,
        accepted_command: None,
    })
}

/// Command-pickup step: accept the next queued command for this agent, if
/// any (SPEC_FULL.md §4.10 step 3).
pub fn pickup_command(store: &Store, agent_id: &str, tick: u64) -> Option<AgentCommand> {
    commands::accept_next_command(store, agent_id, tick)
}

/// If an OVERRIDE command was accepted, short-circuit LLM selection and
/// attempt its expected action directly (SPEC_FULL.md §4.10 step 3).
pub fn decision_from_command(cmd: &AgentCommand) -> Option<IntentDecision> {
    if cmd.mode != CommandMode::Override {
        return None;
    }
    Some(IntentDecision {
        action_type: cmd.intent.expected_action_type().to_string(),
        params: cmd.params.clone(),
        reasoning: "executing OVERRIDE operator command".to_string(),
    })
}

/// Build the LLM intent request and parse its response (step 4). Falls
/// back to `rest` on timeout/parse failure per SPEC_FULL.md §4.12/Failure
/// semantics.
pub async fn decide_intent(
    llm: &dyn LlmPort,
    model_id: &str,
    observation: &Observation,
    accepted_command: Option<&AgentCommand>,
) -> IntentDecision {
    let prompt = json!({
        "observation": {
            "bankroll": observation.bankroll,
            "reserveBalance": observation.reserve_balance,
            "isInMatch": observation.is_in_match,
            "ownedPlots": observation.owned_plots,
        },
        "acceptedCommand": accepted_command.map(|c| json!({
            "mode": format!("{:?}", c.mode).to_uppercase(),
            "intent": c.intent.expected_action_type(),
        })),
        "actionCatalog": ACTION_CATALOG,
    });

    let messages = vec![ChatMessage {
        role: "user".to_string(),
        content: prompt.to_string(),
    }];

    match llm.call(model_id, &messages, 0.7).await {
        Ok(response) => match crate::llm::repair_json(&response.content) {
            Some(parsed) => IntentDecision {
                action_type: parsed
                    .get("actionType")
                    .and_then(Value::as_str)
                    .unwrap_or("rest")
                    .to_string(),
                params: parsed.get("params").cloned().unwrap_or(json!({})),
                reasoning: parsed
                    .get("reasoning")
                    .and_then(Value::as_str)
                    .unwrap_or("")
                    .chars()
                    .take(500)
                    .collect(),
            },
            None => fallback_decision(),
        },
        Err(_) => fallback_decision(),
    }
}

fn fallback_decision() -> IntentDecision {
    IntentDecision {
        action_type: "rest".to_string(),
        params: json!({}),
        reasoning: "falling back after a malformed or timed-out model response".to_string(),
    }
}

/// Validate step 5: static preconditions per action type. Returns `Err`
/// with a human-readable blocked reason rather than mutating anything.
pub fn validate(observation: &Observation, decision: &IntentDecision, is_external: bool) -> Result<(), String> {
    if !ACTION_CATALOG.contains(&decision.action_type.as_str()) {
        return Err(format!("unknown action type {}", decision.action_type));
    }
    match decision.action_type.as_str() {
        "start_build" | "do_work" | "complete_build" => {
            if observation.owned_plots.is_empty() {
                return Err("agent owns no claimed plot".to_string());
            }
        }
        "buy_arena" => {
            let requested = decision.params.get("amount").and_then(Value::as_i64).unwrap_or(0);
            if requested > observation.reserve_balance {
                return Err("reserve balance insufficient for requested buy_arena amount".to_string());
            }
        }
        "play_arena" => {
            if observation.bankroll < 10 {
                return Err("bankroll below the 10-token minimum wager".to_string());
            }
            if observation.is_in_match {
                return Err("agent is already in a match".to_string());
            }
        }
        _ => {}
    }
    if is_external && decision.action_type != "rest" && observation.bankroll < 1 {
        return Err("external agent bankroll below the 1-token inference fee".to_string());
    }
    Ok(())
}

/// Memory/emit step 7: append to the scratchpad and stamp the agent's
/// last-action fields. Returns the narrative line recorded.
pub fn record_memory(
    store: &Store,
    agent_id: &str,
    decision: &IntentDecision,
    success: bool,
    tick: u64,
) -> String {
    let narrative = if success {
        format!("Did {} — {}", decision.action_type, decision.reasoning)
    } else {
        format!("Blocked attempting {}", decision.action_type)
    };

    if let Some(mut agent) = store.agents.get(agent_id).map(|a| a.clone()) {
        agent.push_scratchpad(narrative.clone());
        agent.last_action_type = Some(decision.action_type.clone());
        agent.last_reasoning = Some(decision.reasoning.clone());
        agent.last_narrative = Some(narrative.clone());
        agent.last_tick_at = Some(tick);
        if !success {
            agent.last_blocked_reason = Some(narrative.clone());
        } else {
            agent.last_blocked_reason = None;
        }
        store.agents.insert(agent_id.to_string(), agent);
    }

    store.log_event(TownEvent {
        town_id: String::new(),
        kind: EventKind::Custom("DECISION".to_string()),
        tick,
        metadata: json!({
            "agentId": agent_id,
            "chosenAction": decision.action_type,
            "executedReasoning": decision.reasoning,
            "success": success,
        }),
    });

    narrative
}

/// `do_work` execution helper: a placeholder fixed per-tick investment
/// amount. Real sizing policy (risk tolerance, remaining reserve) lives in
/// the HTTP boundary that calls this crate; kept minimal here since
/// SPEC_FULL.md leaves the exact sizing unspecified.
pub const DO_WORK_INVESTMENT: i64 = 5;

/// Read a goal metric's current value straight off the store, per
/// SPEC_FULL.md §4.4's metric table.
fn metric_value(store: &Store, agent_id: &str, metric: GoalMetric) -> i64 {
    match metric {
        GoalMetric::ClaimedOrUcTotal => store
            .plots
            .iter()
            .filter(|p| {
                p.owner_id.as_deref() == Some(agent_id)
                    && matches!(p.status, PlotStatus::Claimed | PlotStatus::UnderConstruction)
            })
            .count() as i64,
        GoalMetric::BuiltInZone | GoalMetric::BuiltTotal => store
            .plots
            .iter()
            .filter(|p| p.owner_id.as_deref() == Some(agent_id) && p.status == PlotStatus::Built)
            .count() as i64,
        GoalMetric::Bankroll => store.get_agent(agent_id).map(|a| a.bankroll()).unwrap_or(0),
        GoalMetric::WinsTotal => store.get_agent(agent_id).map(|a| a.wins as i64).unwrap_or(0),
        GoalMetric::ApiCallsTotal => store
            .plots
            .iter()
            .filter(|p| p.owner_id.as_deref() == Some(agent_id))
            .map(|p| p.api_calls_used as i64)
            .sum(),
    }
}

/// Goal-refresh step (SPEC_FULL.md §4.10 step 2): re-evaluate every
/// horizon's active goal against its current metric value, instantiating a
/// fresh one wherever the slot is empty or just went terminal, and apply
/// any completed/failed reward or penalty to the agent.
pub fn refresh_goals(store: &Store, agent_id: &str, town_id: &str, archetype: Archetype, tick: u64) {
    for horizon in [GoalHorizon::Short, GoalHorizon::Mid, GoalHorizon::Long] {
        let key = (agent_id.to_string(), horizon);
        let existing = store.goals.get(&key).map(|g| g.clone());
        let goal_town = if horizon == GoalHorizon::Long { "" } else { town_id };

        let mut goal = match existing {
            Some(g) if !g.is_terminal() => g,
            _ => {
                let Ok(template) = goals::pick_template(goal_town, agent_id, horizon, archetype) else {
                    continue;
                };
                let baseline = metric_value(store, agent_id, template.metric);
                goals::instantiate(agent_id.to_string(), horizon, template, baseline, tick)
            }
        };

        let current_value = metric_value(store, agent_id, goal.metric);
        let transition = goals::evaluate(&mut goal, current_value, tick);

        if transition != GoalTransition::None {
            let (arena_delta, health_delta) = goals::transition_deltas(&goal, transition);
            if let Some(mut agent) = store.agents.get(agent_id).map(|a| a.clone()) {
                if arena_delta >= 0 {
                    agent.credit_bankroll(arena_delta);
                } else {
                    let _ = agent.debit_bankroll((-arena_delta).min(agent.bankroll()));
                }
                agent.adjust_health(health_delta);
                store.agents.insert(agent_id.to_string(), agent);
            }
        }

        store.goals.insert(key, goal);
    }
}

/// Parse an optional i64 param under several candidate keys, first match
/// wins — params arrive from either an LLM's JSON or an OVERRIDE command's
/// stored `params`, so the loop tolerates either the catalog's own key or a
/// plain `amount`.
fn parse_amount(params: &Value, keys: &[&str]) -> Option<i64> {
    keys.iter().find_map(|k| params.get(k).and_then(Value::as_i64))
}

/// Execute step 6: route the validated decision to its owning domain
/// operation. Every action in [`ACTION_CATALOG`] is handled here directly;
/// town-service actions call `town::`, arena/economy actions call
/// `arena::`/`amm::`, and crew actions call `crew::`.
pub async fn execute_town_action(
    store: &Store,
    observation: &Observation,
    decision: &IntentDecision,
) -> CoreResult<bool> {
    let agent_id = observation.agent_id.as_str();
    match decision.action_type.as_str() {
        "claim_plot" => {
            let plot_index = decision.params.get("plotIndex").and_then(Value::as_u64).unwrap_or(0) as u32;
            town::claim_plot(store, &observation.town_id, plot_index, agent_id)?;
            Ok(true)
        }
        "start_build" => {
            let (town_id, plot_index) = observation.owned_plots[0].clone();
            let building_type = decision
                .params
                .get("buildingType")
                .and_then(Value::as_str)
                .unwrap_or("generic")
                .to_string();
            let building_name = decision
                .params
                .get("buildingName")
                .and_then(Value::as_str)
                .unwrap_or("Unnamed")
                .to_string();
            town::start_build(store, &town_id, plot_index, agent_id, building_type, building_name)?;
            Ok(true)
        }
        "do_work" => {
            let (town_id, plot_index) = observation.owned_plots[0].clone();
            town::do_work(store, &town_id, plot_index, agent_id, DO_WORK_INVESTMENT)?;
            Ok(true)
        }
        "complete_build" => {
            let (town_id, plot_index) = observation.owned_plots[0].clone();
            town::complete_build(store, &town_id, plot_index)?;
            Ok(true)
        }
        "rest" => Ok(true),
        "buy_arena" => {
            let amount = parse_amount(&decision.params, &["amount"]).unwrap_or(0);
            let min_out = parse_amount(&decision.params, &["minAmountOut"]).unwrap_or(0);
            amm::swap(store, agent_id, SwapSide::BuyArena, amount, min_out, DEFAULT_SWAP_SPLIT, 0).await?;
            Ok(true)
        }
        "sell_arena" => {
            let amount = parse_amount(&decision.params, &["amount"]).unwrap_or(0);
            let min_out = parse_amount(&decision.params, &["minAmountOut"]).unwrap_or(0);
            amm::swap(store, agent_id, SwapSide::SellArena, amount, min_out, DEFAULT_SWAP_SPLIT, 0).await?;
            Ok(true)
        }
        "trade" => {
            let amount = parse_amount(&decision.params, &["amount"]).unwrap_or(0);
            let min_out = parse_amount(&decision.params, &["minAmountOut"]).unwrap_or(0);
            let side = match decision.params.get("side").and_then(Value::as_str) {
                Some("sell") => SwapSide::SellArena,
                _ => SwapSide::BuyArena,
            };
            amm::swap(store, agent_id, side, amount, min_out, DEFAULT_SWAP_SPLIT, 0).await?;
            Ok(true)
        }
        "transfer_arena" => {
            let amount = parse_amount(&decision.params, &["amount"]).unwrap_or(0);
            let to_agent_id = decision
                .params
                .get("toAgentId")
                .and_then(Value::as_str)
                .unwrap_or_default();
            amm::transfer(store, agent_id, to_agent_id, amount)?;
            Ok(true)
        }
        "buy_skill" => {
            let amount = parse_amount(&decision.params, &["amount"]).unwrap_or(0);
            let mut agent = store.get_agent(agent_id)?;
            agent
                .debit_reserve(amount)
                .map_err(|e| CoreError::Validation(e.to_string()))?;
            store.agents.insert(agent_id.to_string(), agent);
            let mut pool = store.economy_pool.lock().await;
            town::route_build_contribution(&mut pool, amount, DEFAULT_SWAP_SPLIT);
            drop(pool);
            store.economy_ledger.lock().push(crate::models::EconomyLedgerEntry {
                description: format!("buy_skill spend for {agent_id}"),
                debit_account: "agent_reserve".to_string(),
                credit_account: "town_budget".to_string(),
                amount,
                tick: 0,
            });
            Ok(true)
        }
        "play_arena" => {
            if let Some(match_id) = decision.params.get("matchId").and_then(Value::as_str) {
                arena::join_match(store, match_id, agent_id, 0)?;
            } else {
                let game_type = match decision.params.get("gameType").and_then(Value::as_str) {
                    Some("poker") => GameType::Poker,
                    Some("battleship") => GameType::Battleship,
                    Some("split_or_steal") => GameType::SplitOrSteal,
                    _ => GameType::Rps,
                };
                let wager = parse_amount(&decision.params, &["wager", "wagerAmount"]).unwrap_or(arena::MIN_WAGER);
                let opponent_id = decision.params.get("opponentId").and_then(Value::as_str);
                let skip_prediction_market =
                    decision.params.get("skipPredictionMarket").and_then(Value::as_bool).unwrap_or(false);
                arena::create_match(store, agent_id, game_type, wager, opponent_id, skip_prediction_market, 0)?;
            }
            Ok(true)
        }
        "crew_raid" | "crew_defend" | "crew_farm" | "crew_trade" => {
            let strategy = match decision.action_type.as_str() {
                "crew_raid" => CrewStrategy::Raid,
                "crew_defend" => CrewStrategy::Defend,
                "crew_farm" => CrewStrategy::Farm,
                _ => CrewStrategy::Trade,
            };
            let crew_id = decision
                .params
                .get("crewId")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let intensity = decision.params.get("intensity").and_then(Value::as_u64).unwrap_or(1) as u8;
            let order = crew::queue_order(store, crew_id, agent_id.to_string(), strategy, intensity, 0);
            store.crew_orders.insert(order.id.clone(), order);
            Ok(true)
        }
        _ => Ok(false), // not in ACTION_CATALOG; validate() already rejected it
    }
}

/// Run the full pipeline for one agent at `tick`, minus the LLM call
/// (already resolved into `decision` by the caller, covering both the
/// OVERRIDE short-circuit and the normal intent path).
pub async fn run_tick_with_decision(
    store: &Store,
    observation: Observation,
    decision: IntentDecision,
    accepted_command: Option<&AgentCommand>,
    is_external: bool,
    tick: u64,
) -> CoreResult<TickResult> {
    refresh_goals(store, &observation.agent_id, &observation.town_id, observation.archetype, tick);

    let validation = validate(&observation, &decision, is_external);
    let success = match validation {
        Ok(()) => match execute_town_action(store, &observation, &decision).await {
            Ok(handled) => handled,
            Err(e) => {
                record_memory(store, &observation.agent_id, &decision, false, tick);
                return Err(e);
            }
        },
        Err(_reason) => false,
    };

    let narrative = record_memory(store, &observation.agent_id, &decision, success, tick);

    let command_receipt = if let Some(cmd) = accepted_command {
        let result = if success {
            commands::mark_executed(store, &cmd.id, json!({"success": true}))
        } else {
            commands::mark_rejected(store, &cmd.id, json!({"success": false}))
        };
        result.ok().map(|c| c.id)
    } else {
        None
    };

    Ok(TickResult {
        tick,
        action_type: decision.action_type,
        success,
        narrative,
        command_receipt,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Agent, Archetype, EconomyPool};

    fn store_with_agent() -> Store {
        let store = Store::new(EconomyPool::new(1000, 1000, 30));
        let mut agent = Agent::new_system("a1".into(), "A".into(), Archetype::Grinder, "m".into());
        agent.credit_bankroll(100);
        store.agents.insert("a1".into(), agent);
        store
    }

    #[test]
    fn validate_rejects_start_build_without_owned_plot() {
        let observation = Observation {
            agent_id: "a1".into(),
            town_id: "t1".into(),
            bankroll: 100,
            reserve_balance: 100,
            is_in_match: false,
            archetype: Archetype::Grinder,
            owned_plots: vec![],
            recent_events: vec![],
            accepted_command: None,
        };
        let decision = IntentDecision {
            action_type: "start_build".into(),
            params: json!({}),
            reasoning: "".into(),
        };
        assert!(validate(&observation, &decision, false).is_err());
    }

    #[test]
    fn validate_rejects_play_arena_under_minimum_wager() {
        let observation = Observation {
            agent_id: "a1".into(),
            town_id: "t1".into(),
            bankroll: 5,
            reserve_balance: 0,
            is_in_match: false,
            archetype: Archetype::Grinder,
            owned_plots: vec![],
            recent_events: vec![],
            accepted_command: None,
        };
        let decision = IntentDecision {
            action_type: "play_arena".into(),
            params: json!({}),
            reasoning: "".into(),
        };
        assert!(validate(&observation, &decision, false).is_err());
    }

    #[tokio::test]
    async fn rest_always_succeeds_and_updates_scratchpad() {
        let store = store_with_agent();
        let observation = observe(&store, "a1", "t1").unwrap();
        let decision = IntentDecision {
            action_type: "rest".into(),
            params: json!({}),
            reasoning: "taking a break".into(),
        };
        let result = run_tick_with_decision(&store, observation, decision, None, false, 5).await.unwrap();
        assert!(result.success);
        assert_eq!(store.get_agent("a1").unwrap().scratchpad().len(), 1);
        assert_eq!(store.get_agent("a1").unwrap().last_tick_at, Some(5));
    }

    #[test]
    fn decision_from_override_command_short_circuits() {
        let cmd = AgentCommand {
            id: "c1".into(),
            agent_id: "a1".into(),
            issuer_type: crate::models::IssuerType::Telegram,
            issuer_telegram_user_id: Some("u1".into()),
            mode: CommandMode::Override,
            intent: CommandIntent::Rest,
            params: json!({}),
            constraints: json!({}),
            audit_meta: json!({}),
            priority: 95,
            created_tick: 0,
            created_seq: 0,
            expires_at_tick: None,
            status: crate::models::CommandStatus::Accepted,
            audit_result: None,
        };
        let decision = decision_from_command(&cmd).unwrap();
        assert_eq!(decision.action_type, "rest");
    }
}
