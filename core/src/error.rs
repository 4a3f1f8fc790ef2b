//! Crate-wide error aggregation.
//!
//! Individual modules define their own `thiserror` enums (`AmmError`,
//! `SocialGraphError`, `ArenaError`, ...) the way the teacher's
//! `AgentError`/`TransactionError`/`SettlementError` are scoped to their
//! owning module. `CoreError` exists only at the boundary functions that
//! must hand a single flat error type to an external caller (C10 step 5-7,
//! C13) — see SPEC_FULL.md §7 for the taxonomy these variants encode.

use thiserror::Error;

use crate::amm::AmmError;
use crate::arena::ArenaError;
use crate::commands::CommandError;
use crate::conversation::ConversationError;
use crate::crew::CrewError;
use crate::goals::GoalError;
use crate::llm::LlmError;
use crate::social::SocialGraphError;
use crate::store::StoreError;
use crate::town::TownError;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Amm(#[from] AmmError),
    #[error(transparent)]
    Social(#[from] SocialGraphError),
    #[error(transparent)]
    Arena(#[from] ArenaError),
    #[error(transparent)]
    Command(#[from] CommandError),
    #[error(transparent)]
    Goal(#[from] GoalError),
    #[error(transparent)]
    Conversation(#[from] ConversationError),
    #[error(transparent)]
    Town(#[from] TownError),
    #[error(transparent)]
    Crew(#[from] CrewError),
    #[error(transparent)]
    Llm(#[from] LlmError),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// The structured `{code, error}` shape external callers see
    /// (SPEC_FULL.md §6/§7).
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::Store(e) => e.code(),
            CoreError::Amm(e) => e.code(),
            CoreError::Social(e) => e.code(),
            CoreError::Arena(e) => e.code(),
            CoreError::Command(e) => e.code(),
            CoreError::Goal(_) => "INTERNAL",
            CoreError::Conversation(e) => e.code(),
            CoreError::Town(e) => e.code(),
            CoreError::Crew(e) => e.code(),
            CoreError::Llm(e) => e.code(),
            CoreError::Validation(_) => "VALIDATION",
            CoreError::Internal(_) => "INTERNAL",
        }
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
