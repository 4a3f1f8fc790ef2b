//! Two-party conversation engine (C5, SPEC_FULL.md §4.5).

use serde_json::{json, Value};
use thiserror::Error;

use crate::models::{Agent, Archetype, EventKind, RelationshipStatus, TownEvent};
use crate::rng::{stable_seed, DeterministicRng};
use crate::social::{self, InteractionOutcome, SocialGraphError, UpsertInteractionResult};

const BEAT_WINDOW_SECS: u64 = 300;

#[derive(Debug, Error, PartialEq)]
pub enum ConversationError {
    #[error(transparent)]
    Social(#[from] SocialGraphError),
}

impl ConversationError {
    pub fn code(&self) -> &'static str {
        match self {
            ConversationError::Social(e) => e.code(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EconomicIntent {
    Tip,
    Collab,
    Hustle,
    Flex,
    None,
}

/// One classified line in the generated transcript.
#[derive(Debug, Clone)]
pub struct TranscriptLine {
    pub speaker_id: String,
    pub text: String,
}

/// Output of the EVAL step: the full transcript plus the classification
/// the LLM port (or its canned fallback) produced.
#[derive(Debug, Clone)]
pub struct ConversationEval {
    pub outcome: InteractionOutcome,
    pub delta: i64,
    pub economic_intent: EconomicIntent,
    pub summary: String,
}

/// Deterministic beat seed for `(town_id, a, b, floor(now/300s))` — picks a
/// conversational topic/tone without depending on wall-clock jitter within
/// a 5-minute window.
pub fn beat_seed(town_id: &str, a: &str, b: &str, now_secs: u64) -> u64 {
    let window = now_secs / BEAT_WINDOW_SECS;
    stable_seed(&[town_id, a, b, &window.to_string()])
}

/// Number of lines to generate: 6 when the pair already has history, 4
/// otherwise (SPEC_FULL.md §4.5 step 3).
pub fn line_count(status: RelationshipStatus, interactions: u32) -> usize {
    if status != RelationshipStatus::Neutral || interactions >= 3 {
        6
    } else {
        4
    }
}

/// Canned per-archetype line used when the LLM port fails or returns
/// malformed JSON for a given turn.
pub fn canned_line(archetype: Archetype) -> &'static str {
    match archetype {
        Archetype::Shark => "Let's talk numbers, not feelings.",
        Archetype::Rock => "I'm just here to build.",
        Archetype::Chameleon => "Whatever you're feeling, I'm feeling too.",
        Archetype::Degen => "Double or nothing on this conversation?",
        Archetype::Grinder => "Back to work after this one.",
    }
}

/// Result of applying [`ConversationEval`]'s side effects: the relationship
/// update plus the bankroll/health deltas each participant should receive.
#[derive(Debug, Clone)]
pub struct ConversationEffects {
    pub relationship: UpsertInteractionResult,
    pub tip_from_a_to_b: i64,
    pub tip_from_b_to_a: i64,
    pub beef_tax_a: i64,
    pub beef_tax_b: i64,
}

/// Apply the BOND tip / BEEF tax side effects (SPEC_FULL.md §4.5 step 5),
/// given each participant's current bankroll (read fresh under the
/// transaction by the caller).
pub fn compute_economic_effects(
    eval: &ConversationEval,
    bankroll_a: i64,
    bankroll_b: i64,
) -> (i64, i64, i64, i64) {
    match eval.outcome {
        InteractionOutcome::Bond => {
            let (richer, poorer_bankroll, richer_to_a) = if bankroll_a >= bankroll_b {
                (bankroll_a, bankroll_b, true)
            } else {
                (bankroll_b, bankroll_a, false)
            };
            let tip = ((poorer_bankroll as f64 * 0.04).floor() as i64).clamp(1, 50);
            if richer >= 2 * tip {
                if richer_to_a {
                    (tip, 0, 0, 0)
                } else {
                    (0, tip, 0, 0)
                }
            } else {
                (0, 0, 0, 0)
            }
        }
        InteractionOutcome::Beef => {
            let tax_a = ((bankroll_a as f64 * 0.015).floor() as i64).clamp(1, 20);
            let tax_b = ((bankroll_b as f64 * 0.015).floor() as i64).clamp(1, 20);
            (0, 0, tax_a, tax_b)
        }
        InteractionOutcome::Neutral => (0, 0, 0, 0),
    }
}

/// Apply the relationship update and return the full effects bundle so the
/// caller can debit/credit bankrolls and the economy pool's
/// `cumulativeFeesArena` atomically in one transaction.
#[allow(clippy::too_many_arguments)]
pub fn apply_effects(
    agent_a: &Agent,
    agent_b: &Agent,
    eval: &ConversationEval,
    existing: Option<crate::models::Relationship>,
    now_tick: u64,
    friend_count_a: usize,
    friend_count_b: usize,
) -> Result<ConversationEffects, ConversationError> {
    let relationship = social::upsert_interaction(
        &agent_a.id().to_string(),
        &agent_b.id().to_string(),
        eval.outcome,
        eval.delta,
        existing,
        now_tick,
        friend_count_a,
        friend_count_b,
    )?;

    let (tip_a_to_b, tip_b_to_a, tax_a, tax_b) =
        compute_economic_effects(eval, agent_a.bankroll(), agent_b.bankroll());

    Ok(ConversationEffects {
        relationship,
        tip_from_a_to_b: tip_a_to_b,
        tip_from_b_to_a: tip_b_to_a,
        beef_tax_a: tax_a,
        beef_tax_b: tax_b,
    })
}

/// Build the single CUSTOM/AGENT_CHAT town event this conversation must
/// emit (SPEC_FULL.md §4.5 step 6).
pub fn build_event(
    town_id: &str,
    tick: u64,
    lines: &[TranscriptLine],
    eval: &ConversationEval,
    effects: &ConversationEffects,
) -> TownEvent {
    let metadata: Value = json!({
        "transcript": lines.iter().map(|l| json!({"speakerId": l.speaker_id, "text": l.text})).collect::<Vec<_>>(),
        "outcome": format!("{:?}", eval.outcome).to_uppercase(),
        "summary": eval.summary,
        "economicIntent": format!("{:?}", eval.economic_intent).to_uppercase(),
        "tipFromAToB": effects.tip_from_a_to_b,
        "tipFromBToA": effects.tip_from_b_to_a,
        "beefTaxA": effects.beef_tax_a,
        "beefTaxB": effects.beef_tax_b,
    });
    TownEvent {
        town_id: town_id.to_string(),
        kind: EventKind::AgentChat,
        tick,
        metadata,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Agent;

    #[test]
    fn beat_seed_is_stable_within_window() {
        let a = beat_seed("t1", "a", "b", 1000);
        let b = beat_seed("t1", "a", "b", 1299);
        assert_eq!(a, b);
    }

    #[test]
    fn line_count_extends_with_history() {
        assert_eq!(line_count(RelationshipStatus::Neutral, 0), 4);
        assert_eq!(line_count(RelationshipStatus::Neutral, 3), 6);
        assert_eq!(line_count(RelationshipStatus::Friend, 0), 6);
    }

    #[test]
    fn bond_tips_only_when_richer_can_afford_double() {
        let eval = ConversationEval {
            outcome: InteractionOutcome::Bond,
            delta: 5,
            economic_intent: EconomicIntent::Tip,
            summary: "they vibed".into(),
        };
        let (a_to_b, b_to_a, tax_a, tax_b) = compute_economic_effects(&eval, 1000, 10);
        assert_eq!((a_to_b, b_to_a, tax_a, tax_b), (0, 1, 0, 0));
    }

    #[test]
    fn beef_taxes_both_sides() {
        let eval = ConversationEval {
            outcome: InteractionOutcome::Beef,
            delta: -5,
            economic_intent: EconomicIntent::None,
            summary: "they clashed".into(),
        };
        let (a_to_b, b_to_a, tax_a, tax_b) = compute_economic_effects(&eval, 1000, 1000);
        assert_eq!((a_to_b, b_to_a), (0, 0));
        assert_eq!(tax_a, 15);
        assert_eq!(tax_b, 15);
    }

    #[test]
    fn apply_effects_propagates_social_errors() {
        let a = Agent::new_system("a".into(), "A".into(), Archetype::Rock, "m".into());
        let b = Agent::new_system("b".into(), "B".into(), Archetype::Rock, "m".into());
        let existing = crate::models::Relationship {
            last_interaction_at_tick: Some(100),
            ..crate::models::Relationship::new("a".into(), "b".into())
        };
        let eval = ConversationEval {
            outcome: InteractionOutcome::Neutral,
            delta: 0,
            economic_intent: EconomicIntent::None,
            summary: "".into(),
        };
        let err = apply_effects(&a, &b, &eval, Some(existing), 110, 0, 0).unwrap_err();
        assert_eq!(err.code(), "COOLDOWN");
    }
}
