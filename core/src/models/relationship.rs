//! Symmetric pairwise relationship model (SPEC_FULL.md §4.3).

use serde::{Deserialize, Serialize};

use super::AgentId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RelationshipStatus {
    Neutral,
    Friend,
    Rival,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relationship {
    pub agent_a: AgentId,
    pub agent_b: AgentId,
    pub status: RelationshipStatus,
    pub score: i64,
    pub interactions: u32,
    pub last_interaction_at_tick: Option<u64>,
    pub friend_since_tick: Option<u64>,
    pub rival_since_tick: Option<u64>,
}

impl Relationship {
    /// Build the canonical ordered key `(min(a,b), max(a,b))` for a pair.
    pub fn key(a: &str, b: &str) -> (String, String) {
        if a <= b {
            (a.to_string(), b.to_string())
        } else {
            (b.to_string(), a.to_string())
        }
    }

    pub fn new(a: AgentId, b: AgentId) -> Self {
        let (lo, hi) = Self::key(&a, &b);
        Self {
            agent_a: lo,
            agent_b: hi,
            status: RelationshipStatus::Neutral,
            score: 0,
            interactions: 0,
            last_interaction_at_tick: None,
            friend_since_tick: None,
            rival_since_tick: None,
        }
    }
}
