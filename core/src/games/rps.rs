//! Rock/paper/scissors engine (SPEC_FULL.md §4.6).

use serde_json::{json, Value};

use super::GameError;

const MAX_ROUNDS_SAFETY_CAP: u32 = 5;
const WIN_SCORE: u32 = 2;

fn beats(a: &str, b: &str) -> bool {
    matches!(
        (a, b),
        ("rock", "scissors") | ("scissors", "paper") | ("paper", "rock")
    )
}

pub fn init_state(player1: &str, player2: &str) -> Value {
    json!({
        "round": 0,
        "maxRounds": 3,
        "scores": { player1: 0, player2: 0 },
        "pendingMoves": {},
        "history": [],
        "currentTurn": null,
        "players": [player1, player2],
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

pub fn process_action(state: &Value, player_id: &str, action: &Value) -> Result<Value, GameError> {
    if is_complete(state) {
        return Err(GameError::AlreadyComplete);
    }
    let mut state = state.clone();
    let requested = action.get("move").and_then(Value::as_str).unwrap_or("");
    let valid = ["rock", "paper", "scissors"];
    // Invalid moves are randomized as a penalty rather than rejected.
    let mv = if valid.contains(&requested) {
        requested.to_string()
    } else {
        let idx = (state["round"].as_u64().unwrap_or(0) as usize
            + player_id.len())
            % valid.len();
        valid[idx].to_string()
    };

    state["pendingMoves"][player_id] = json!(mv);

    let opponent = other_player(&state, player_id);
    let both_in = opponent
        .as_ref()
        .map(|opp| state["pendingMoves"].get(opp).is_some())
        .unwrap_or(false);

    if both_in {
        let opp = opponent.unwrap();
        let my_move = state["pendingMoves"][player_id].as_str().unwrap().to_string();
        let opp_move = state["pendingMoves"][&opp].as_str().unwrap().to_string();

        let round_winner = if my_move == opp_move {
            None
        } else if beats(&my_move, &opp_move) {
            Some(player_id.to_string())
        } else {
            Some(opp.clone())
        };

        if let Some(ref w) = round_winner {
            let current = state["scores"][w].as_u64().unwrap_or(0);
            state["scores"][w] = json!(current + 1);
        }

        let history_entry = json!({
            "round": state["round"],
            "moves": { player_id: my_move, opp: opp_move },
            "winner": round_winner,
        });
        state["history"].as_array_mut().unwrap().push(history_entry);

        state["round"] = json!(state["round"].as_u64().unwrap_or(0) + 1);
        state["pendingMoves"] = json!({});
    }

    state["currentTurn"] = json!(null);
    Ok(state)
}

pub fn valid_actions(state: &Value, _player_id: &str) -> Vec<String> {
    if is_complete(state) {
        return vec![];
    }
    vec!["rock".into(), "paper".into(), "scissors".into()]
}

pub fn is_complete(state: &Value) -> bool {
    let round = state["round"].as_u64().unwrap_or(0) as u32;
    let scores = state["scores"].as_object();
    let max_score = scores
        .map(|s| s.values().filter_map(Value::as_u64).max().unwrap_or(0))
        .unwrap_or(0) as u32;
    max_score >= WIN_SCORE || round >= MAX_ROUNDS_SAFETY_CAP
}

pub fn winner(state: &Value) -> Option<String> {
    let scores = state["scores"].as_object()?;
    let mut best: Option<(&String, u64)> = None;
    for (k, v) in scores {
        let score = v.as_u64().unwrap_or(0);
        if best.map(|(_, b)| score > b).unwrap_or(true) {
            best = Some((k, score));
        }
    }
    let (best_id, best_score) = best?;
    let tied = scores.values().filter(|v| v.as_u64().unwrap_or(0) == best_score).count();
    if tied > 1 {
        None
    } else {
        Some(best_id.clone())
    }
}

pub fn current_turn(_state: &Value) -> Option<String> {
    None // both players move simultaneously each round
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_resolves_when_both_moves_present() {
        let state = init_state("a", "b");
        let state = process_action(&state, "a", &json!({"move": "rock"})).unwrap();
        let state = process_action(&state, "b", &json!({"move": "scissors"})).unwrap();
        assert_eq!(state["scores"]["a"], json!(1));
        assert_eq!(state["round"], json!(1));
    }

    #[test]
    fn game_completes_at_two_wins() {
        let mut state = init_state("a", "b");
        for _ in 0..2 {
            state = process_action(&state, "a", &json!({"move": "rock"})).unwrap();
            state = process_action(&state, "b", &json!({"move": "scissors"})).unwrap();
        }
        assert!(is_complete(&state));
        assert_eq!(winner(&state), Some("a".to_string()));
    }

    #[test]
    fn invalid_move_is_randomized_not_rejected() {
        let state = init_state("a", "b");
        let result = process_action(&state, "a", &json!({"move": "lizard"}));
        assert!(result.is_ok());
    }
}
