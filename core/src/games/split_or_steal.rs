//! Split-or-steal engine (SPEC_FULL.md §4.6): fixed pot, simultaneous
//! decision, payoff table applied at reveal.

use serde_json::{json, Value};

use super::GameError;

pub fn init_state(player1: &str, player2: &str) -> Value {
    json!({
        "players": [player1, player2],
        "decisions": {},
        "payouts": null,
        "winner": null,
    })
}

fn other_player(state: &Value, player_id: &str) -> Option<String> {
    state["players"]
        .as_array()?
        .iter()
        .filter_map(|v| v.as_str())
        .find(|p| *p != player_id)
        .map(str::to_string)
}

pub fn valid_actions(state: &Value, _player_id: &str) -> Vec<String> {
    if is_complete(state) {
        vec![]
    } else {
        vec!["split".to_string(), "steal".to_string()]
    }
}

/// Classic split-or-steal payoff table, fraction of the pot each player
/// receives: both split -> half each; one steals -> stealer takes all;
/// both steal -> nobody gets anything.
fn payoff(a: &str, b: &str) -> (f64, f64) {
    match (a, b) {
        ("split", "split") => (0.5, 0.5),
        ("steal", "split") => (1.0, 0.0),
        ("split", "steal") => (0.0, 1.0),
        _ => (0.0, 0.0),
    }
}

pub fn process_action(state: &Value, player_id: &str, action: &Value) -> Result<Value, GameError> {
    if is_complete(state) {
        return Err(GameError::AlreadyComplete);
    }
    let mut state = state.clone();
    let requested = action.get("decision").and_then(Value::as_str).unwrap_or("split");
    let decision = if requested == "steal" { "steal" } else { "split" };
    state["decisions"][player_id] = json!(decision);

    let opponent = other_player(&state, player_id).ok_or_else(|| {
        GameError::MalformedState("split_or_steal state missing opponent".to_string())
    })?;

    if let Some(opp_decision) = state["decisions"].get(&opponent).and_then(Value::as_str) {
        let (my_share, opp_share) = payoff(decision, opp_decision);
        state["payouts"] = json!({ player_id: my_share, opponent: opp_share });
        state["winner"] = if my_share > opp_share {
            json!(player_id)
        } else if opp_share > my_share {
            json!(opponent)
        } else {
            Value::Null
        };
    }

    Ok(state)
}

pub fn is_complete(state: &Value) -> bool {
    !state["payouts"].is_null()
}

pub fn winner(state: &Value) -> Option<String> {
    state["winner"].as_str().map(str::to_string)
}

pub fn current_turn(state: &Value) -> Option<String> {
    if is_complete(state) {
        return None;
    }
    state["players"]
        .as_array()?
        .iter()
        .filter_map(|v| v.as_str())
        .find(|p| state["decisions"].get(p).is_none())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn both_split_is_a_draw() {
        let state = init_state("a", "b");
        let state = process_action(&state, "a", &json!({"decision": "split"})).unwrap();
        let state = process_action(&state, "b", &json!({"decision": "split"})).unwrap();
        assert!(is_complete(&state));
        assert_eq!(winner(&state), None);
        assert_eq!(state["payouts"]["a"], json!(0.5));
    }

    #[test]
    fn steal_against_split_takes_all() {
        let state = init_state("a", "b");
        let state = process_action(&state, "a", &json!({"decision": "steal"})).unwrap();
        let state = process_action(&state, "b", &json!({"decision": "split"})).unwrap();
        assert_eq!(winner(&state), Some("a".to_string()));
    }

    #[test]
    fn both_steal_nobody_wins() {
        let state = init_state("a", "b");
        let state = process_action(&state, "a", &json!({"decision": "steal"})).unwrap();
        let state = process_action(&state, "b", &json!({"decision": "steal"})).unwrap();
        assert_eq!(winner(&state), None);
        assert_eq!(state["payouts"]["a"], json!(0.0));
    }
}
