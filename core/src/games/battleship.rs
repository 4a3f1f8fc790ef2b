//! Battleship engine (SPEC_FULL.md §4.6).
//!
//! 10x10 boards, ships `{5,4,3,3,2}`. Placement is delegated to match
//! creation (`init_state` seeds a deterministic placement per player so
//! the match is reproducible from its match id); play proceeds by calling
//! cells on the opponent's board.

use serde_json::{json, Value};

use super::GameError;
use crate::rng::DeterministicRng;

const BOARD_SIZE: i64 = 10;
const SHIP_SIZES: [u32; 5] = [5, 4, 3, 3, 2];

/// Deterministically place all ships for one player on an empty board,
/// horizontally, non-overlapping, seeded from `seed`.
fn place_ships(seed: u64) -> Vec<(i64, i64)> {
    let mut rng = DeterministicRng::new(seed);
    let mut occupied = std::collections::HashSet::new();
    for &size in SHIP_SIZES.iter() {
        loop {
            let row = rng.range(0, BOARD_SIZE);
            let col = rng.range(0, BOARD_SIZE - size as i64 + 1);
            let cells: Vec<(i64, i64)> = (0..size as i64).map(|i| (row, col + i)).collect();
            if cells.iter().all(|c| !occupied.contains(c)) {
                for c in &cells {
                    occupied.insert(*c);
                }
                break;
            }
        }
    }
    occupied.into_iter().collect()
}

pub fn init_state(player1: &str, player2: &str) -> Value {
    let seed1 = crate::rng::stable_seed(&[player1, player2, "p1-ships"]);
    let seed2 = crate::rng::stable_seed(&[player1, player2, "p2-ships"]);
    let ships1 = place_ships(seed1);
    let ships2 = place_ships(seed2);
    json!({
        "players": [player1, player2],
        "ships": { player1: ships1, player2: ships2 },
        "hits": { player1: [], player2: [] },
        "shipsRemaining": { player1: SHIP_SIZES.len(), player2: SHIP_SIZES.len() },
        "currentTurn": player1,
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

pub fn valid_actions(state: &Value, player_id: &str) -> Vec<String> {
    if is_complete(state) {
        return vec![];
    }
    let Some(opponent) = other_player(state, player_id) else {
        return vec![];
    };
    let already_hit: Vec<(i64, i64)> = state["hits"][&opponent]
        .as_array()
        .map(|a| {
            a.iter()
                .filter_map(|c| {
                    let arr = c.as_array()?;
                    Some((arr.first()?.as_i64()?, arr.get(1)?.as_i64()?))
                })
                .collect()
        })
        .unwrap_or_default();
    let mut out = Vec::new();
    for r in 0..BOARD_SIZE {
        for c in 0..BOARD_SIZE {
            if !already_hit.contains(&(r, c)) {
                out.push(format!("{r},{c}"));
            }
        }
    }
    out
}

pub fn process_action(state: &Value, player_id: &str, action: &Value) -> Result<Value, GameError> {
    if is_complete(state) {
        return Err(GameError::AlreadyComplete);
    }
    if state["currentTurn"].as_str() != Some(player_id) {
        return Err(GameError::NotYourTurn {
            player_id: player_id.to_string(),
        });
    }

    let mut state = state.clone();
    let opponent = other_player(&state, player_id).ok_or_else(|| {
        GameError::MalformedState("battleship state missing opponent".to_string())
    })?;

    let row = action.get("row").and_then(Value::as_i64);
    let col = action.get("col").and_then(Value::as_i64);

    let in_range = matches!((row, col), (Some(r), Some(c)) if (0..BOARD_SIZE).contains(&r) && (0..BOARD_SIZE).contains(&c));

    let already_hit = |s: &Value, r: i64, c: i64| -> bool {
        s["hits"][&opponent]
            .as_array()
            .map(|a| a.iter().any(|cell| {
                cell.as_array().map(|arr| arr[0].as_i64() == Some(r) && arr[1].as_i64() == Some(c)).unwrap_or(false)
            }))
            .unwrap_or(false)
    };

    let duplicate = in_range && already_hit(&state, row.unwrap(), col.unwrap());

    if !in_range || duplicate {
        // Invalid action forfeits the turn without mutating the board.
        state["currentTurn"] = json!(opponent);
        return Ok(state);
    }

    let (r, c) = (row.unwrap(), col.unwrap());
    state["hits"][&opponent]
        .as_array_mut()
        .unwrap()
        .push(json!([r, c]));

    let ship_cells: Vec<(i64, i64)> = state["ships"][&opponent]
        .as_array()
        .map(|a| {
            a.iter()
                .filter_map(|cell| {
                    let arr = cell.as_array()?;
                    Some((arr.first()?.as_i64()?, arr.get(1)?.as_i64()?))
                })
                .collect()
        })
        .unwrap_or_default();

    let is_hit = ship_cells.contains(&(r, c));
    if is_hit {
        let hits_on_opponent: Vec<(i64, i64)> = state["hits"][&opponent]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|cell| {
                let arr = cell.as_array()?;
                Some((arr.first()?.as_i64()?, arr.get(1)?.as_i64()?))
            })
            .collect();
        let all_ships_sunk = ship_cells.iter().all(|cell| hits_on_opponent.contains(cell));
        if all_ships_sunk {
            let remaining = state["shipsRemaining"][&opponent].as_u64().unwrap_or(1);
            if remaining > 0 {
                state["shipsRemaining"][&opponent] = json!(remaining.saturating_sub(1));
            }
        }
    }

    if state["shipsRemaining"][&opponent].as_u64().unwrap_or(1) == 0 {
        state["winner"] = json!(player_id);
    } else {
        state["currentTurn"] = json!(opponent);
    }

    Ok(state)
}

pub fn is_complete(state: &Value) -> bool {
    !state["winner"].is_null()
}

pub fn winner(state: &Value) -> Option<String> {
    state["winner"].as_str().map(str::to_string)
}

pub fn current_turn(state: &Value) -> Option<String> {
    if is_complete(state) {
        None
    } else {
        state["currentTurn"].as_str().map(str::to_string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_cell_forfeits_turn() {
        let state = init_state("a", "b");
        let state = process_action(&state, "a", &json!({"row": 0, "col": 0})).unwrap();
        let state = process_action(&state, "b", &json!({"row": 5, "col": 5})).unwrap();
        let before = state["currentTurn"].clone();
        let state2 = process_action(&state, "a", &json!({"row": 0, "col": 0})).unwrap();
        assert_ne!(state2["currentTurn"], before);
    }

    #[test]
    fn out_of_range_forfeits_turn() {
        let state = init_state("a", "b");
        let state = process_action(&state, "a", &json!({"row": 99, "col": 0})).unwrap();
        assert_eq!(state["currentTurn"], json!("b"));
    }
}
