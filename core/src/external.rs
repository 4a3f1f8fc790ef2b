//! External-agent adapter (C13, SPEC_FULL.md §4.13).
//!
//! Maps a bearer token to an agent id and runs the same validate/execute/
//! memory steps C10 uses for steps 5-7, plus the one piece that's unique to
//! external callers: a flat 1-token inference-cost debit for any
//! non-`rest` action.

use thiserror::Error;
use serde_json::Value;

use crate::agent_loop::{self, IntentDecision, Observation, TickResult};
use crate::store::{Store, StoreError};

const EXTERNAL_INFERENCE_COST: i64 = 1;

#[derive(Debug, Error, PartialEq)]
pub enum ExternalError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("no agent is bound to the supplied token")]
    Unauthorized,
    #[error("{0}")]
    Blocked(String),
}

impl ExternalError {
    pub fn code(&self) -> &'static str {
        match self {
            ExternalError::Store(e) => e.code(),
            ExternalError::Unauthorized => "VALIDATION",
            ExternalError::Blocked(_) => "PRECONDITION",
        }
    }
}

/// Resolve a bearer token (or, when explicitly enabled, a legacy api key)
/// to an agent id. Scans the in-memory agent table; a real deployment
/// would index this, but the crate's Store is sized for a single process
/// (SPEC_FULL.md §4.1).
pub fn authenticate(store: &Store, token: &str) -> Option<String> {
    store
        .agents
        .iter()
        .find(|a| a.api_key == token)
        .map(|a| a.id().to_string())
}

/// One externally-submitted action. Callers provide the action type and a
/// free-text reasoning string the same way the LLM port's structured
/// response does internally.
#[derive(Debug, Clone)]
pub struct ExternalAction {
    pub action_type: String,
    pub params: Value,
    pub reasoning: String,
}

/// Run steps 5-7 for an externally-authenticated action. `town_id` scopes
/// the observation; external callers are assumed to already know which
/// town their agent lives in.
pub async fn submit_external_action(
    store: &Store,
    token: &str,
    town_id: &str,
    action: ExternalAction,
    tick: u64,
) -> Result<TickResult, ExternalError> {
    let agent_id = authenticate(store, token).ok_or(ExternalError::Unauthorized)?;

    let observation: Observation = agent_loop::observe(store, &agent_id, town_id)
        .map_err(|_| ExternalError::Store(StoreError::NotFound(agent_id.clone())))?;

    if action.action_type != "rest" {
        let mut agent = store
            .get_agent(&agent_id)
            .map_err(ExternalError::Store)?;
        agent
            .debit_bankroll(EXTERNAL_INFERENCE_COST)
            .map_err(|_| ExternalError::Blocked("bankroll below the 1-token inference fee".to_string()))?;
        store.agents.insert(agent_id.clone(), agent);
    }

    let decision = IntentDecision {
        action_type: action.action_type,
        params: action.params,
        reasoning: action.reasoning.chars().take(500).collect(),
    };

    agent_loop::run_tick_with_decision(store, observation, decision, None, true, tick)
        .await
        .map_err(|_| ExternalError::Blocked("execution failed".to_string()))
}
