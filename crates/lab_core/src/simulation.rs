//! The simulation core.
//!
//! [`Simulation`] owns the [`GameState`] and mutates it in response to named
//! actions, event choices and turn-end requests. It knows nothing about
//! phases, rendering or transport; observable effects are requested from
//! the injected [`Collaborator`].
//!
//! # Determinism
//!
//! - All resource math is fixed-point ([`Amount`])
//! - The only randomness is the seeded ChaCha stream inside the state
//! - Maps iterate in key order
//!
//! The same seed, tuning and input sequence always produce the same
//! [`GameState::state_hash`].
//!
//! # Example
//!
//! ```
//! use lab_core::collaborator::RecordingCollaborator;
//! use lab_core::simulation::Simulation;
//! use lab_core::tuning::Tuning;
//!
//! let mut sim = Simulation::new("s1", Tuning::default(), RecordingCollaborator::new());
//! let outcome = sim.execute_action("hire_safety_researcher");
//! assert!(outcome.success);
//!
//! let end = sim.process_turn_end();
//! assert_eq!(sim.state().turn, 1);
//! assert!(!end.game_over);
//! ```

use serde::{Deserialize, Serialize};

use crate::actions::{self, ActionKind, ActionTable, Changes};
use crate::collaborator::{Collaborator, DialogOption, DialogOutcome, MessageCategory};
use crate::error::{GameError, Result};
use crate::events::{self, EventDescriptor};
use crate::math::{amount, format_money, Amount};
use crate::state::{GameState, Snapshot};
use crate::tuning::Tuning;

/// Result of [`Simulation::execute_action`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionOutcome {
    /// Requested action id.
    pub action_id: String,
    /// Whether every effect was applied.
    pub success: bool,
    /// Human-readable messages.
    pub messages: Vec<String>,
    /// Field deltas (empty on failure).
    pub changes: Changes,
}

/// Result of [`Simulation::process_turn_end`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnEndOutcome {
    /// Always `true`.
    pub success: bool,
    /// Events that will be pending when the next turn starts.
    pub events: Vec<EventDescriptor>,
    /// Upkeep and terminal-condition messages.
    pub messages: Vec<String>,
    /// Defeat flag after processing.
    pub game_over: bool,
    /// Victory flag after processing.
    pub victory: bool,
}

/// Result of [`Simulation::handle_event_choice`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChoiceOutcome {
    /// Always `true`, even for unrecognized choices.
    pub success: bool,
    /// Whether the `(event, choice)` pair was recognized and applied.
    pub applied: bool,
    /// Human-readable messages.
    pub messages: Vec<String>,
    /// Field deltas.
    pub changes: Changes,
}

/// The simulation core for one session.
#[derive(Debug, Clone)]
pub struct Simulation<C: Collaborator> {
    state: GameState,
    tuning: Tuning,
    actions: ActionTable,
    collaborator: C,
}

impl<C: Collaborator> Simulation<C> {
    /// Start a new session at turn 0.
    #[must_use]
    pub fn new(seed: impl Into<String>, tuning: Tuning, collaborator: C) -> Self {
        let state = GameState::new(seed, &tuning);
        Self::from_state(state, tuning, collaborator)
    }

    /// Resume from an existing state (fixtures, scenarios).
    #[must_use]
    pub fn from_state(state: GameState, tuning: Tuning, collaborator: C) -> Self {
        tracing::debug!(seed = %state.seed, turn = state.turn, "Simulation created");
        Self {
            state,
            tuning,
            actions: ActionTable::new(),
            collaborator,
        }
    }

    /// Read-only view of the state.
    #[must_use]
    pub fn state(&self) -> &GameState {
        &self.state
    }

    /// Tuning in effect.
    #[must_use]
    pub fn tuning(&self) -> &Tuning {
        &self.tuning
    }

    /// Display-ready projection of the state.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        self.state.snapshot()
    }

    /// Fingerprint of the state.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        self.state.state_hash()
    }

    /// Action lookup table.
    #[must_use]
    pub fn actions(&self) -> &ActionTable {
        &self.actions
    }

    /// The injected collaborator.
    #[must_use]
    pub fn collaborator(&self) -> &C {
        &self.collaborator
    }

    /// Mutable access to the collaborator (draining queued notifications).
    pub fn collaborator_mut(&mut self) -> &mut C {
        &mut self.collaborator
    }

    /// Consume the simulation and hand the collaborator back.
    pub fn into_collaborator(self) -> C {
        self.collaborator
    }

    /// Execute an action by id.
    ///
    /// All effects apply or none do. Unknown ids and unaffordable actions
    /// fail with a message and leave the state untouched.
    pub fn execute_action(&mut self, action_id: &str) -> ActionOutcome {
        match self.try_execute(action_id) {
            Ok((kind, changes)) => {
                let message = format!("{}: {}", kind.name(), describe(&changes));
                self.notify(&message, MessageCategory::Action);
                self.request_sound(&kind.sound_id());
                ActionOutcome {
                    action_id: action_id.to_string(),
                    success: true,
                    messages: vec![message],
                    changes,
                }
            }
            Err(err) => {
                let category = match &err {
                    GameError::UnknownAction(_) => MessageCategory::Error,
                    _ => MessageCategory::Warning,
                };
                let message = err.to_string();
                tracing::debug!(action_id, %err, "Action rejected");
                self.notify(&message, category);
                ActionOutcome {
                    action_id: action_id.to_string(),
                    success: false,
                    messages: vec![message],
                    changes: Changes::new(),
                }
            }
        }
    }

    fn try_execute(&mut self, action_id: &str) -> Result<(ActionKind, Changes)> {
        let kind = self.actions.resolve(action_id)?;
        actions::check(kind, &self.state)?;
        let changes = actions::apply(kind, &mut self.state);
        tracing::debug!(action_id, turn = self.state.turn, "Action executed");
        Ok((kind, changes))
    }

    /// Advance the turn counter and settle upkeep.
    ///
    /// Order: turn, compute burn, maintenance, money check, compute check,
    /// victory check. Terminal flags are set once and never cleared. This is
    /// the only operation that refreshes the collaborator's readouts.
    pub fn process_turn_end(&mut self) -> TurnEndOutcome {
        let mut notes: Vec<(String, MessageCategory)> = Vec::new();

        self.state.turn += 1;

        self.state.compute = self
            .state
            .compute
            .saturating_sub(self.tuning.compute_burn())
            .max(Amount::ZERO);

        let headcount = self.state.total_employees();
        if headcount > 0 {
            let upkeep = self
                .tuning
                .maintenance_per_head()
                .saturating_mul(amount(i64::from(headcount)));
            self.state.money = self.state.money.saturating_sub(upkeep);
            notes.push((
                format!(
                    "Paid ${} maintenance for {} employee(s)",
                    format_money(upkeep),
                    headcount
                ),
                MessageCategory::Info,
            ));
        }

        let was_over = self.state.game_over;
        let mut game_over = was_over;
        if self.state.money <= Amount::ZERO {
            game_over = true;
            if !was_over {
                notes.push((
                    "Out of money! The lab has gone bankrupt.".to_string(),
                    MessageCategory::Warning,
                ));
            }
        }
        if self.state.compute <= Amount::ZERO {
            game_over = true;
            if !was_over {
                notes.push((
                    "Out of compute! Research has ground to a halt.".to_string(),
                    MessageCategory::Warning,
                ));
            }
        }
        self.state.game_over = game_over;

        let reached_victory =
            !self.state.victory && self.state.safety >= self.tuning.victory_safety();
        if reached_victory {
            self.state.victory = true;
            notes.push((
                "Victory! Safety research has outpaced the risks.".to_string(),
                MessageCategory::Success,
            ));
        }

        for (text, category) in &notes {
            self.notify(text, *category);
        }
        if game_over && !was_over {
            self.request_sound("game_over");
        }
        if reached_victory {
            self.request_sound("victory");
        }

        self.collaborator.update_turn_display(self.state.turn);
        self.collaborator
            .update_resource_display(&self.state.resource_readout());
        self.collaborator
            .update_employee_display(&self.state.employee_readout());

        #[cfg(debug_assertions)]
        {
            let hash = self.state.state_hash();
            tracing::debug!(turn = self.state.turn, state_hash = hash, "Turn processed");
        }

        TurnEndOutcome {
            success: true,
            events: self.check_events(),
            messages: notes.into_iter().map(|(text, _)| text).collect(),
            game_over: self.state.game_over,
            victory: self.state.victory,
        }
    }

    /// Events whose triggers currently hold. Never mutates.
    #[must_use]
    pub fn check_events(&self) -> Vec<EventDescriptor> {
        events::triggered(&self.state, &self.tuning)
    }

    /// Apply the chosen option of an event.
    ///
    /// Unrecognized pairs change nothing and still report `success = true`.
    pub fn handle_event_choice(&mut self, event_id: &str, choice_id: &str) -> ChoiceOutcome {
        let applied = events::apply_choice(&mut self.state, event_id, choice_id);

        if applied.recognized {
            self.notify(&applied.message, MessageCategory::Event);
            self.request_sound("event_resolved");
        } else {
            tracing::warn!(event_id, choice_id, "Unrecognized event choice, no effect");
            self.notify(&applied.message, MessageCategory::Info);
        }

        ChoiceOutcome {
            success: true,
            applied: applied.recognized,
            messages: vec![applied.message],
            changes: applied.changes,
        }
    }

    /// Whether the lab has the money for an action. Unknown ids are never
    /// affordable.
    #[must_use]
    pub fn can_afford_action(&self, action_id: &str) -> bool {
        self.actions
            .lookup(action_id)
            .is_some_and(|kind| self.state.money >= amount(kind.cost()))
    }

    /// Ids of every action that would currently succeed, in catalog order.
    #[must_use]
    pub fn get_available_actions(&self) -> Vec<String> {
        ActionKind::ALL
            .iter()
            .filter(|&&kind| actions::check(kind, &self.state).is_ok())
            .map(|kind| kind.id().to_string())
            .collect()
    }

    /// Ask the collaborator to resolve an event through a dialog.
    ///
    /// **Blocks** inside [`Collaborator::show_dialog`] until the player
    /// answers. Returns `None` when the dialog is cancelled.
    pub fn prompt_event(&mut self, event: &EventDescriptor) -> Option<ChoiceOutcome> {
        let options: Vec<DialogOption> = event
            .options
            .iter()
            .map(|choice| DialogOption {
                id: choice.id.clone(),
                label: choice.label.clone(),
            })
            .collect();

        self.notify(&event.name, MessageCategory::Event);

        // Blocking call: waits for the player.
        match self
            .collaborator
            .show_dialog(&event.name, &event.description, &options)
        {
            DialogOutcome::Chosen(choice_id) => Some(self.handle_event_choice(&event.id, &choice_id)),
            DialogOutcome::Cancelled => None,
        }
    }

    fn notify(&mut self, text: &str, category: MessageCategory) {
        self.collaborator.display_message(text, category);
    }

    fn request_sound(&mut self, id: &str) {
        if let Err(err) = self.collaborator.play_sound(id) {
            tracing::warn!(sound = id, %err, "Collaborator failed to play sound");
        }
    }
}

fn describe(changes: &Changes) -> String {
    changes
        .iter()
        .map(|(field, delta)| {
            if *delta >= 0.0 {
                format!("{field} +{delta}")
            } else {
                format!("{field} {delta}")
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}
