//! Triggerable events and their choices.
//!
//! Triggers are pure predicates over the state. Choice effects are applied
//! by [`apply_choice`], which reports whether the `(event, choice)` pair was
//! recognized at all.

use serde::{Deserialize, Serialize};

use crate::actions::{gain, ChangeSet, Changes};
use crate::math::amount;
use crate::state::GameState;
use crate::tuning::Tuning;

/// Stable id of the funding crisis event.
pub const FUNDING_CRISIS: &str = "funding_crisis";

/// Stable id of the compute shortage event.
pub const COMPUTE_SHORTAGE: &str = "compute_shortage";

/// A response option offered for an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventChoice {
    /// Stable choice id.
    pub id: String,
    /// Button label.
    pub label: String,
}

impl EventChoice {
    fn new(id: &str, label: &str) -> Self {
        Self {
            id: id.to_string(),
            label: label.to_string(),
        }
    }
}

/// An event awaiting a player decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventDescriptor {
    /// Stable event id.
    pub id: String,
    /// Short title.
    pub name: String,
    /// Longer description.
    pub description: String,
    /// Response options in display order.
    pub options: Vec<EventChoice>,
}

/// Evaluate every trigger against the state.
///
/// Pure: never mutates, safe to call speculatively.
#[must_use]
pub fn triggered(state: &GameState, tuning: &Tuning) -> Vec<EventDescriptor> {
    let mut events = Vec::new();

    if state.turn == tuning.funding_crisis_turn
        && state.money < amount(tuning.funding_crisis_threshold)
    {
        events.push(EventDescriptor {
            id: FUNDING_CRISIS.to_string(),
            name: "Funding Crisis".to_string(),
            description: "Runway is short and the board wants a plan. \
                          An investor offers a bailout with strings attached."
                .to_string(),
            options: vec![
                EventChoice::new("accept_investor", "Accept the investor's terms"),
                EventChoice::new("emergency_loan", "Take an emergency loan"),
            ],
        });
    }

    if state.turn >= 1 && state.compute < amount(tuning.compute_shortage_threshold) {
        events.push(EventDescriptor {
            id: COMPUTE_SHORTAGE.to_string(),
            name: "Compute Shortage".to_string(),
            description: "Training runs are stalling for lack of compute.".to_string(),
            options: vec![
                EventChoice::new("buy_emergency_compute", "Buy emergency compute ($20000)"),
                EventChoice::new("ration_compute", "Ration what we have"),
            ],
        });
    }

    events
}

/// Result of applying a choice.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AppliedChoice {
    /// Whether the pair was recognized.
    pub recognized: bool,
    /// Human-readable description of what happened.
    pub message: String,
    /// Field deltas.
    pub changes: Changes,
}

/// Apply the effect of `choice_id` for `event_id`.
pub(crate) fn apply_choice(state: &mut GameState, event_id: &str, choice_id: &str) -> AppliedChoice {
    let mut changes = ChangeSet::default();

    let message = match (event_id, choice_id) {
        (FUNDING_CRISIS, "accept_investor") => {
            gain(&mut state.money, &mut changes, "money", amount(75_000));
            gain(&mut state.capabilities, &mut changes, "capabilities", amount(5));
            "Investor funding secured: +$75000, but they expect faster progress."
        }
        (FUNDING_CRISIS, "emergency_loan") => {
            gain(&mut state.money, &mut changes, "money", amount(40_000));
            "Emergency loan approved: +$40000."
        }
        (COMPUTE_SHORTAGE, "buy_emergency_compute") => {
            gain(&mut state.money, &mut changes, "money", amount(-20_000));
            gain(&mut state.compute, &mut changes, "compute", amount(40));
            "Emergency compute purchased: +40 compute for $20000."
        }
        (COMPUTE_SHORTAGE, "ration_compute") => "Compute rationed. Research slows down.",
        _ => {
            return AppliedChoice {
                recognized: false,
                message: format!("No effect for choice '{choice_id}' on event '{event_id}'"),
                changes: Changes::new(),
            };
        }
    };

    AppliedChoice {
        recognized: true,
        message: message.to_string(),
        changes: changes.finish(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_at(turn: u64, money: i64) -> GameState {
        let mut state = GameState::new("events", &Tuning::default());
        state.turn = turn;
        state.money = amount(money);
        state
    }

    #[test]
    fn test_no_events_at_start() {
        let state = GameState::new("events", &Tuning::default());
        assert!(triggered(&state, &Tuning::default()).is_empty());
    }

    #[test]
    fn test_funding_crisis_needs_turn_and_threshold() {
        let tuning = Tuning::default();
        let events = triggered(&state_at(10, 30_000), &tuning);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].id, FUNDING_CRISIS);
        assert_eq!(events[0].options.len(), 2);

        assert!(triggered(&state_at(9, 30_000), &tuning).is_empty());
        assert!(triggered(&state_at(10, 60_000), &tuning).is_empty());
    }

    #[test]
    fn test_compute_shortage_after_first_turn() {
        let tuning = Tuning::default();
        let mut state = state_at(0, 100_000);
        state.compute = amount(10);
        assert!(triggered(&state, &tuning).is_empty());

        state.turn = 3;
        let events = triggered(&state, &tuning);
        assert_eq!(events[0].id, COMPUTE_SHORTAGE);
    }

    #[test]
    fn test_triggered_does_not_mutate() {
        let state = state_at(10, 30_000);
        let before = state.clone();
        let _ = triggered(&state, &Tuning::default());
        assert_eq!(state, before);
    }

    #[test]
    fn test_accept_investor_restores_funds() {
        let mut state = state_at(10, 30_000);
        let applied = apply_choice(&mut state, FUNDING_CRISIS, "accept_investor");
        assert!(applied.recognized);
        assert_eq!(state.money, amount(105_000));
        assert_eq!(state.capabilities, amount(5));
        assert_eq!(applied.changes.get("money"), Some(&75_000.0));
    }

    #[test]
    fn test_unknown_pair_is_noop() {
        let mut state = state_at(10, 30_000);
        let before = state.clone();
        let applied = apply_choice(&mut state, "alien_contact", "wave");
        assert!(!applied.recognized);
        assert!(applied.changes.is_empty());
        assert_eq!(state, before);
    }
}
