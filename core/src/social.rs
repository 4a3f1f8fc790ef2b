//! Symmetric pairwise relationship graph (C3, SPEC_FULL.md §4.3).

use thiserror::Error;

use crate::models::{AgentId, Relationship, RelationshipStatus};

const PAIR_COOLDOWN_TICKS: u64 = 45;
const MAX_FRIENDS_PER_AGENT: usize = 2;
const SCORE_MIN: i64 = -30;
const SCORE_MAX: i64 = 30;
const DELTA_MIN: i64 = -7;
const DELTA_MAX: i64 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractionOutcome {
    Neutral,
    Bond,
    Beef,
}

#[derive(Debug, Error, PartialEq)]
pub enum SocialGraphError {
    #[error("an agent cannot have a relationship with itself")]
    SelfPair,
    #[error("pair interacted {ticks_since} tick(s) ago, cooldown is {cooldown}")]
    Cooldown { ticks_since: u64, cooldown: u64 },
}

impl SocialGraphError {
    pub fn code(&self) -> &'static str {
        match self {
            SocialGraphError::SelfPair => "VALIDATION",
            SocialGraphError::Cooldown { .. } => "COOLDOWN",
        }
    }
}

#[derive(Debug, Clone)]
pub struct UpsertInteractionResult {
    pub relationship: Relationship,
    pub status_changed: bool,
    pub friend_cap_hit: bool,
}

/// Record one interaction between `a` and `b`, applying the status
/// state-machine from SPEC_FULL.md §4.3. `existing` is the row previously
/// loaded for this pair, if any; `friend_count_a`/`friend_count_b` are the
/// caller's precomputed FRIEND-row counts for each side (the Store owns
/// the scan, this function stays pure and testable).
pub fn upsert_interaction(
    a: &AgentId,
    b: &AgentId,
    outcome: InteractionOutcome,
    delta: i64,
    existing: Option<Relationship>,
    now_tick: u64,
    friend_count_a: usize,
    friend_count_b: usize,
) -> Result<UpsertInteractionResult, SocialGraphError> {
    if a == b {
        return Err(SocialGraphError::SelfPair);
    }

    let mut rel = existing.unwrap_or_else(|| Relationship::new(a.clone(), b.clone()));

    if let Some(last) = rel.last_interaction_at_tick {
        let elapsed = now_tick.saturating_sub(last);
        if elapsed < PAIR_COOLDOWN_TICKS {
            return Err(SocialGraphError::Cooldown {
                ticks_since: elapsed,
                cooldown: PAIR_COOLDOWN_TICKS,
            });
        }
    }

    let clamped_delta = delta.clamp(DELTA_MIN, DELTA_MAX);
    let next_score = (rel.score + clamped_delta).clamp(SCORE_MIN, SCORE_MAX);

    let prev_status = rel.status;
    let mut friend_cap_hit = false;

    let next_status = match (prev_status, outcome) {
        (RelationshipStatus::Neutral, InteractionOutcome::Bond) if next_score >= 10 => {
            if friend_count_a >= MAX_FRIENDS_PER_AGENT || friend_count_b >= MAX_FRIENDS_PER_AGENT {
                friend_cap_hit = true;
                RelationshipStatus::Neutral
            } else {
                RelationshipStatus::Friend
            }
        }
        (RelationshipStatus::Neutral, InteractionOutcome::Beef) if next_score <= -10 => {
            RelationshipStatus::Rival
        }
        (RelationshipStatus::Friend, InteractionOutcome::Beef) if next_score < 4 => {
            RelationshipStatus::Neutral
        }
        (RelationshipStatus::Rival, InteractionOutcome::Bond) if next_score > -4 => {
            RelationshipStatus::Neutral
        }
        _ => prev_status,
    };

    rel.score = next_score;
    rel.interactions += 1;
    rel.last_interaction_at_tick = Some(now_tick);

    let status_changed = next_status != prev_status;
    if status_changed {
        match next_status {
            RelationshipStatus::Friend => rel.friend_since_tick = Some(now_tick),
            RelationshipStatus::Rival => rel.rival_since_tick = Some(now_tick),
            RelationshipStatus::Neutral => {
                if prev_status == RelationshipStatus::Friend {
                    rel.friend_since_tick = None;
                }
                if prev_status == RelationshipStatus::Rival {
                    rel.rival_since_tick = None;
                }
            }
        }
    }
    rel.status = next_status;

    Ok(UpsertInteractionResult {
        relationship: rel,
        status_changed,
        friend_cap_hit,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_self_pair() {
        let err = upsert_interaction(
            &"a".to_string(),
            &"a".to_string(),
            InteractionOutcome::Bond,
            5,
            None,
            0,
            0,
            0,
        )
        .unwrap_err();
        assert_eq!(err.code(), "VALIDATION");
    }

    #[test]
    fn bond_crosses_friend_threshold() {
        let result = upsert_interaction(
            &"a".to_string(),
            &"b".to_string(),
            InteractionOutcome::Bond,
            7,
            None,
            100,
            0,
            0,
        )
        .unwrap();
        assert_eq!(result.relationship.status, RelationshipStatus::Neutral);
        assert!(!result.status_changed);

        let result2 = upsert_interaction(
            &"a".to_string(),
            &"b".to_string(),
            InteractionOutcome::Bond,
            7,
            Some(result.relationship),
            200,
            0,
            0,
        )
        .unwrap();
        assert_eq!(result2.relationship.status, RelationshipStatus::Friend);
        assert!(result2.status_changed);
        assert_eq!(result2.relationship.friend_since_tick, Some(200));
    }

    #[test]
    fn friend_cap_blocks_transition() {
        let rel = Relationship {
            score: 3,
            ..Relationship::new("a".into(), "b".into())
        };
        let result = upsert_interaction(
            &"a".to_string(),
            &"b".to_string(),
            InteractionOutcome::Bond,
            7,
            Some(rel),
            100,
            2,
            0,
        )
        .unwrap();
        assert!(result.friend_cap_hit);
        assert_eq!(result.relationship.status, RelationshipStatus::Neutral);
    }

    #[test]
    fn cooldown_rejects_rapid_reinteraction() {
        let rel = Relationship {
            last_interaction_at_tick: Some(100),
            ..Relationship::new("a".into(), "b".into())
        };
        let err = upsert_interaction(
            &"a".to_string(),
            &"b".to_string(),
            InteractionOutcome::Neutral,
            1,
            Some(rel),
            120,
            0,
            0,
        )
        .unwrap_err();
        assert_eq!(err.code(), "COOLDOWN");
    }

    #[test]
    fn delta_clamped_before_applying() {
        let result = upsert_interaction(
            &"a".to_string(),
            &"b".to_string(),
            InteractionOutcome::Bond,
            100,
            None,
            0,
            0,
            0,
        )
        .unwrap();
        assert_eq!(result.relationship.score, 7);
    }
}
