//! Pure game adapters (C6, SPEC_FULL.md §4.6).
//!
//! Each game is a stateless function set over an opaque `serde_json::Value`
//! game state: `process_action`, `valid_actions`, `is_complete`, `winner`,
//! `current_turn`. Dispatch is a tagged `GameKind` enum matched against a
//! table rather than a trait-object hierarchy, mirroring the teacher's
//! tagged-`PolicyConfig` pattern.

pub mod battleship;
pub mod poker;
pub mod rps;
pub mod split_or_steal;

use serde_json::Value;
use thiserror::Error;

use crate::models::GameType;

#[derive(Debug, Error, PartialEq)]
pub enum GameError {
    #[error("it is not {player_id}'s turn")]
    NotYourTurn { player_id: String },
    #[error("game is already complete")]
    AlreadyComplete,
    #[error("malformed game state: {0}")]
    MalformedState(String),
}

impl GameError {
    pub fn code(&self) -> &'static str {
        match self {
            GameError::NotYourTurn { .. } => "PRECONDITION",
            GameError::AlreadyComplete => "PRECONDITION",
            GameError::MalformedState(_) => "INTERNAL",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameKind {
    Rps,
    Poker,
    Battleship,
    SplitOrSteal,
}

impl From<GameType> for GameKind {
    fn from(g: GameType) -> Self {
        match g {
            GameType::Rps => GameKind::Rps,
            GameType::Poker => GameKind::Poker,
            GameType::Battleship => GameKind::Battleship,
            GameType::SplitOrSteal => GameKind::SplitOrSteal,
        }
    }
}

pub fn init_state(kind: GameKind, player1: &str, player2: &str) -> Value {
    match kind {
        GameKind::Rps => rps::init_state(player1, player2),
        GameKind::Poker => poker::init_state(player1, player2),
        GameKind::Battleship => battleship::init_state(player1, player2),
        GameKind::SplitOrSteal => split_or_steal::init_state(player1, player2),
    }
}

pub fn process_action(
    kind: GameKind,
    state: &Value,
    player_id: &str,
    action: &Value,
) -> Result<Value, GameError> {
    match kind {
        GameKind::Rps => rps::process_action(state, player_id, action),
        GameKind::Poker => poker::process_action(state, player_id, action),
        GameKind::Battleship => battleship::process_action(state, player_id, action),
        GameKind::SplitOrSteal => split_or_steal::process_action(state, player_id, action),
    }
}

pub fn valid_actions(kind: GameKind, state: &Value, player_id: &str) -> Vec<String> {
    match kind {
        GameKind::Rps => rps::valid_actions(state, player_id),
        GameKind::Poker => poker::valid_actions(state, player_id),
        GameKind::Battleship => battleship::valid_actions(state, player_id),
        GameKind::SplitOrSteal => split_or_steal::valid_actions(state, player_id),
    }
}

pub fn is_complete(kind: GameKind, state: &Value) -> bool {
    match kind {
        GameKind::Rps => rps::is_complete(state),
        GameKind::Poker => poker::is_complete(state),
        GameKind::Battleship => battleship::is_complete(state),
        GameKind::SplitOrSteal => split_or_steal::is_complete(state),
    }
}

pub fn winner(kind: GameKind, state: &Value) -> Option<String> {
    match kind {
        GameKind::Rps => rps::winner(state),
        GameKind::Poker => poker::winner(state),
        GameKind::Battleship => battleship::winner(state),
        GameKind::SplitOrSteal => split_or_steal::winner(state),
    }
}

pub fn current_turn(kind: GameKind, state: &Value) -> Option<String> {
    match kind {
        GameKind::Rps => rps::current_turn(state),
        GameKind::Poker => poker::current_turn(state),
        GameKind::Battleship => battleship::current_turn(state),
        GameKind::SplitOrSteal => split_or_steal::current_turn(state),
    }
}

/// Normalize common player-facing action aliases before validation, e.g.
/// POKER's `allin -> all-in`. Each engine owns its own alias table; this is
/// the shared entry point the arena orchestrator calls before
/// `process_action` (SPEC_FULL.md §4.7 `submitMove`).
pub fn normalize_alias(kind: GameKind, raw: &str) -> String {
    match kind {
        GameKind::Poker => poker::normalize_alias(raw),
        _ => raw.to_string(),
    }
}
