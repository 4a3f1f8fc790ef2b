//! Agent tick pipeline coverage (SPEC_FULL.md §4.10).

use serde_json::json;
use town_arena_core::agent_loop::{self, IntentDecision};
use town_arena_core::external::{self, ExternalAction};
use town_arena_core::models::{Agent, Archetype, EconomyPool, Plot, Zone};
use town_arena_core::store::Store;

fn store_with_agent_and_claimed_plot() -> Store {
    let store = Store::new(EconomyPool::new(1000, 1000, 30));
    let mut agent = Agent::new_system("agent-1".into(), "Agent".into(), Archetype::Grinder, "m".into());
    agent.credit_bankroll(100);
    store.agents.insert("agent-1".into(), agent);

    let mut plot = Plot::empty("town-1".into(), 0, Zone::Residential);
    plot.status = town_arena_core::models::PlotStatus::Claimed;
    plot.owner_id = Some("agent-1".into());
    store.plots.insert(("town-1".into(), 0), plot);
    store
}

#[tokio::test]
async fn rest_decision_always_succeeds_and_is_memorialized() {
    let store = store_with_agent_and_claimed_plot();
    let observation = agent_loop::observe(&store, "agent-1", "town-1").unwrap();
    let decision = IntentDecision {
        action_type: "rest".to_string(),
        params: json!({}),
        reasoning: "taking stock".to_string(),
    };
    let result = agent_loop::run_tick_with_decision(&store, observation, decision, None, false, 3).await.unwrap();
    assert!(result.success);
    let agent = store.get_agent("agent-1").unwrap();
    assert_eq!(agent.last_action_type.as_deref(), Some("rest"));
    assert_eq!(agent.last_tick_at, Some(3));
    assert_eq!(agent.scratchpad().len(), 1);
}

#[tokio::test]
async fn start_build_without_a_claimed_plot_is_blocked_not_panicked() {
    let store = Store::new(EconomyPool::new(1000, 1000, 30));
    let mut agent = Agent::new_system("agent-2".into(), "Agent2".into(), Archetype::Grinder, "m".into());
    agent.credit_bankroll(100);
    store.agents.insert("agent-2".into(), agent);

    let observation = agent_loop::observe(&store, "agent-2", "town-1").unwrap();
    let decision = IntentDecision {
        action_type: "start_build".to_string(),
        params: json!({"buildingType": "house", "buildingName": "Casa"}),
        reasoning: "let's build".to_string(),
    };
    let result = agent_loop::run_tick_with_decision(&store, observation, decision, None, false, 1).await.unwrap();
    assert!(!result.success);
    assert!(store.get_agent("agent-2").unwrap().last_blocked_reason.is_some());
}

#[tokio::test]
async fn start_build_with_an_owned_claimed_plot_succeeds() {
    let store = store_with_agent_and_claimed_plot();
    let observation = agent_loop::observe(&store, "agent-1", "town-1").unwrap();
    let decision = IntentDecision {
        action_type: "start_build".to_string(),
        params: json!({"buildingType": "house", "buildingName": "Casa"}),
        reasoning: "building a home".to_string(),
    };
    let result = agent_loop::run_tick_with_decision(&store, observation, decision, None, false, 1).await.unwrap();
    assert!(result.success);
    let plot = store.plots.get(&("town-1".to_string(), 0)).unwrap();
    assert_eq!(plot.status, town_arena_core::models::PlotStatus::UnderConstruction);
}

#[tokio::test]
async fn external_adapter_runs_the_same_validate_execute_memory_path() {
    let store = Store::new(EconomyPool::new(1000, 1000, 30));
    let mut agent = Agent::new_user_spawned(
        "agent-3".into(),
        "Agent3".into(),
        Archetype::Degen,
        "m".into(),
        "0xabc".into(),
        "tok-123".into(),
    );
    agent.credit_bankroll(50);
    store.agents.insert("agent-3".into(), agent);

    let action = ExternalAction {
        action_type: "rest".to_string(),
        params: json!({}),
        reasoning: "external rest".to_string(),
    };
    let result = external::submit_external_action(&store, "tok-123", "town-1", action, 7).await.unwrap();
    assert!(result.success);
    assert_eq!(store.get_agent("agent-3").unwrap().bankroll(), 50); // rest never debits

    let unknown = external::authenticate(&store, "not-a-token");
    assert!(unknown.is_none());
}
