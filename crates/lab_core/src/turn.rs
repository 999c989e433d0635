//! Turn phase controller.
//!
//! A finite-state machine layered over the [`Simulation`]. It owns the
//! per-turn [`TurnState`] and is the only authority on which operations are
//! legal when:
//!
//! ```text
//!   TURN_END ──start_turn──▶ TURN_START ──(no pending events)──▶ ACTION_SELECTION
//!      ▲                      │    ▲                               │  select_action*
//!      │                      └────┘ resolve_event                  │
//!      │                                                            ▼
//!      └──────────────── TURN_PROCESSING ◀──────────end_turn────────┘
//! ```
//!
//! Events are always resolved before any action is selected, and the turn
//! cannot end while events are pending. Rejected calls return a
//! [`GameError`] and leave both the turn state and the simulation untouched.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::collaborator::{Collaborator, MessageCategory};
use crate::error::{GameError, Result};
use crate::events::EventDescriptor;
use crate::simulation::{ActionOutcome, ChoiceOutcome, Simulation, TurnEndOutcome};

/// The four phases of a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TurnPhase {
    /// Events are being presented and resolved.
    TurnStart,
    /// The player picks actions.
    ActionSelection,
    /// Selected actions and upkeep are being executed.
    TurnProcessing,
    /// The turn is over; the next one may start.
    TurnEnd,
}

impl fmt::Display for TurnPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TurnPhase::TurnStart => "TURN_START",
            TurnPhase::ActionSelection => "ACTION_SELECTION",
            TurnPhase::TurnProcessing => "TURN_PROCESSING",
            TurnPhase::TurnEnd => "TURN_END",
        };
        f.write_str(name)
    }
}

/// Per-turn state. Created by `start_turn`, consumed by `end_turn`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnState {
    /// Current phase.
    pub phase: TurnPhase,
    /// Events awaiting a decision, in trigger order.
    pub pending_events: Vec<EventDescriptor>,
    /// Actions chosen for this turn, in selection order.
    pub selected_actions: Vec<String>,
}

impl TurnState {
    /// State before the first turn: resting in `TURN_END`.
    #[must_use]
    pub fn idle() -> Self {
        Self {
            phase: TurnPhase::TurnEnd,
            pending_events: Vec::new(),
            selected_actions: Vec::new(),
        }
    }

    /// True only while selecting actions with no events pending.
    #[must_use]
    pub fn can_end_turn(&self) -> bool {
        self.phase == TurnPhase::ActionSelection && self.pending_events.is_empty()
    }
}

impl Default for TurnState {
    fn default() -> Self {
        Self::idle()
    }
}

/// Result of a successful `start_turn`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnStarted {
    /// Turn number being played.
    pub turn: u64,
    /// Phase after the transition.
    pub phase: TurnPhase,
    /// Events the player must resolve first.
    pub events: Vec<EventDescriptor>,
    /// Whether the turn could end right away.
    pub can_end_turn: bool,
}

/// Result of a successful `resolve_event`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventResolved {
    /// Outcome reported by the simulation.
    pub outcome: ChoiceOutcome,
    /// Phase after resolution.
    pub phase: TurnPhase,
    /// Events still pending.
    pub remaining_events: usize,
    /// Whether the turn can now end.
    pub can_end_turn: bool,
}

/// Result of a successful `end_turn`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnEnded {
    /// One entry per selected action, in execution order.
    pub action_results: Vec<ActionOutcome>,
    /// Upkeep and terminal conditions.
    pub turn_end: TurnEndOutcome,
    /// Phase after processing (always `TURN_END`).
    pub phase: TurnPhase,
}

/// Phase-gated front end to a [`Simulation`].
#[derive(Debug, Clone)]
pub struct TurnController<C: Collaborator> {
    sim: Simulation<C>,
    turn: TurnState,
}

impl<C: Collaborator> TurnController<C> {
    /// Wrap a simulation. The controller starts in `TURN_END`.
    #[must_use]
    pub fn new(sim: Simulation<C>) -> Self {
        Self {
            sim,
            turn: TurnState::idle(),
        }
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> TurnPhase {
        self.turn.phase
    }

    /// Current turn state.
    #[must_use]
    pub fn turn_state(&self) -> &TurnState {
        &self.turn
    }

    /// Whether `end_turn` would be accepted.
    #[must_use]
    pub fn can_end_turn(&self) -> bool {
        self.turn.can_end_turn()
    }

    /// The wrapped simulation.
    #[must_use]
    pub fn simulation(&self) -> &Simulation<C> {
        &self.sim
    }

    /// Mutable access to the collaborator.
    pub fn collaborator_mut(&mut self) -> &mut C {
        self.sim.collaborator_mut()
    }

    /// Consume the controller and hand the collaborator back.
    pub fn into_collaborator(self) -> C {
        self.sim.into_collaborator()
    }

    /// Begin a new turn.
    ///
    /// Legal only from `TURN_END` while the game is still running. Collects
    /// triggered events; with none pending the controller moves straight to
    /// `ACTION_SELECTION`.
    pub fn start_turn(&mut self) -> Result<TurnStarted> {
        self.ensure_running()?;
        self.ensure_phase("start a turn", TurnPhase::TurnEnd)?;

        let events = self.sim.check_events();
        for event in &events {
            self.sim
                .collaborator_mut()
                .display_message(&format!("Event: {}", event.name), MessageCategory::Event);
        }

        self.turn = TurnState {
            phase: TurnPhase::TurnStart,
            pending_events: events.clone(),
            selected_actions: Vec::new(),
        };
        self.advance_if_clear();

        tracing::debug!(
            turn = self.sim.state().turn,
            phase = %self.turn.phase,
            events = events.len(),
            "Turn started"
        );

        Ok(TurnStarted {
            turn: self.sim.state().turn,
            phase: self.turn.phase,
            events,
            can_end_turn: self.turn.can_end_turn(),
        })
    }

    /// Resolve a pending event.
    ///
    /// Legal only in `TURN_START`, and only for an event in the pending
    /// list. A recognized choice removes the event from the list; an
    /// unrecognized one is passed to the simulation's permissive handling
    /// and the event stays pending.
    pub fn resolve_event(&mut self, event_id: &str, choice_id: &str) -> Result<EventResolved> {
        self.ensure_phase("resolve an event", TurnPhase::TurnStart)?;
        let Some(pos) = self.turn.pending_events.iter().position(|e| e.id == event_id) else {
            tracing::debug!(event_id, choice_id, "Rejected resolution of non-pending event");
            return Err(GameError::EventNotPending(event_id.to_string()));
        };

        let outcome = self.sim.handle_event_choice(event_id, choice_id);
        if outcome.applied {
            self.turn.pending_events.remove(pos);
        }
        self.advance_if_clear();

        tracing::debug!(
            event_id,
            choice_id,
            applied = outcome.applied,
            remaining = self.turn.pending_events.len(),
            "Event resolution"
        );

        Ok(EventResolved {
            outcome,
            phase: self.turn.phase,
            remaining_events: self.turn.pending_events.len(),
            can_end_turn: self.turn.can_end_turn(),
        })
    }

    /// Ask the collaborator to resolve every pending event through dialogs.
    ///
    /// In-process configurations only. **Blocks** in
    /// [`Collaborator::show_dialog`] once per pending event; a cancelled
    /// dialog leaves its event pending.
    pub fn resolve_events_interactively(&mut self) -> Result<Vec<ChoiceOutcome>> {
        self.ensure_phase("resolve an event", TurnPhase::TurnStart)?;

        let mut outcomes = Vec::new();
        for event in self.turn.pending_events.clone() {
            // Blocking: waits for the player's answer.
            let Some(outcome) = self.sim.prompt_event(&event) else {
                continue;
            };
            if outcome.applied {
                self.turn.pending_events.retain(|e| e.id != event.id);
            }
            outcomes.push(outcome);
        }
        self.advance_if_clear();

        Ok(outcomes)
    }

    /// Queue an action for this turn. Selecting the same id twice is a no-op.
    ///
    /// Returns the selection list after the call.
    pub fn select_action(&mut self, action_id: &str) -> Result<Vec<String>> {
        self.ensure_running()?;
        if self.turn.phase == TurnPhase::TurnStart && !self.turn.pending_events.is_empty() {
            return Err(GameError::EventsPending {
                count: self.turn.pending_events.len(),
            });
        }
        self.ensure_phase("select an action", TurnPhase::ActionSelection)?;
        self.sim.actions().resolve(action_id)?;

        if !self.turn.selected_actions.iter().any(|id| id == action_id) {
            self.turn.selected_actions.push(action_id.to_string());
        }

        Ok(self.turn.selected_actions.clone())
    }

    /// End the turn: execute selected actions in order, then settle upkeep.
    ///
    /// Rejected with [`GameError::EventsPending`] while events wait for a
    /// decision. Action failures are collected, not short-circuited.
    pub fn end_turn(&mut self) -> Result<TurnEnded> {
        if !self.turn.pending_events.is_empty() {
            return Err(GameError::EventsPending {
                count: self.turn.pending_events.len(),
            });
        }
        self.ensure_phase("end the turn", TurnPhase::ActionSelection)?;

        self.turn.phase = TurnPhase::TurnProcessing;
        let selected = std::mem::take(&mut self.turn.selected_actions);

        let action_results: Vec<ActionOutcome> = selected
            .iter()
            .map(|action_id| self.sim.execute_action(action_id))
            .collect();
        let turn_end = self.sim.process_turn_end();

        self.turn = TurnState::idle();

        tracing::debug!(
            turn = self.sim.state().turn,
            actions = action_results.len(),
            failed = action_results.iter().filter(|r| !r.success).count(),
            game_over = turn_end.game_over,
            victory = turn_end.victory,
            "Turn ended"
        );

        Ok(TurnEnded {
            action_results,
            turn_end,
            phase: self.turn.phase,
        })
    }

    /// Execute an action immediately, bypassing phase gating.
    ///
    /// For test harnesses and debugging. Gated play goes through
    /// [`select_action`](Self::select_action) and [`end_turn`](Self::end_turn).
    pub fn execute_action_direct(&mut self, action_id: &str) -> ActionOutcome {
        self.sim.execute_action(action_id)
    }

    fn advance_if_clear(&mut self) {
        if self.turn.phase == TurnPhase::TurnStart && self.turn.pending_events.is_empty() {
            self.turn.phase = TurnPhase::ActionSelection;
        }
    }

    fn ensure_phase(&self, operation: &'static str, expected: TurnPhase) -> Result<()> {
        if self.turn.phase == expected {
            Ok(())
        } else {
            Err(GameError::OutOfPhase {
                operation,
                phase: self.turn.phase,
            })
        }
    }

    fn ensure_running(&self) -> Result<()> {
        let state = self.sim.state();
        if state.game_over {
            Err(GameError::GameFinished("game over"))
        } else if state.victory {
            Err(GameError::GameFinished("victory"))
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborator::{DialogOutcome, RecordingCollaborator};
    use crate::math::amount;
    use crate::state::{GameState, Role};
    use crate::tuning::Tuning;

    fn controller(state: GameState) -> TurnController<RecordingCollaborator> {
        TurnController::new(Simulation::from_state(
            state,
            Tuning::default(),
            RecordingCollaborator::new(),
        ))
    }

    fn fresh() -> TurnController<RecordingCollaborator> {
        controller(GameState::new("turn", &Tuning::default()))
    }

    fn crisis() -> TurnController<RecordingCollaborator> {
        let mut state = GameState::new("turn", &Tuning::default());
        state.turn = 10;
        state.money = amount(30_000);
        controller(state)
    }

    #[test]
    fn test_initial_phase_is_turn_end() {
        let ctl = fresh();
        assert_eq!(ctl.phase(), TurnPhase::TurnEnd);
        assert!(!ctl.can_end_turn());
    }

    #[test]
    fn test_start_without_events_goes_to_selection() {
        let mut ctl = fresh();
        let started = ctl.start_turn().unwrap();
        assert_eq!(started.phase, TurnPhase::ActionSelection);
        assert!(started.events.is_empty());
        assert!(started.can_end_turn);
    }

    #[test]
    fn test_start_with_events_stays_in_turn_start() {
        let mut ctl = crisis();
        let started = ctl.start_turn().unwrap();
        assert_eq!(started.phase, TurnPhase::TurnStart);
        assert_eq!(started.events.len(), 1);
        assert!(!started.can_end_turn);
    }

    #[test]
    fn test_start_turn_twice_is_rejected() {
        let mut ctl = fresh();
        ctl.start_turn().unwrap();
        let err = ctl.start_turn().unwrap_err();
        assert!(matches!(err, GameError::OutOfPhase { .. }));
    }

    #[test]
    fn test_end_turn_with_pending_events_is_rejected() {
        let mut ctl = crisis();
        ctl.start_turn().unwrap();
        let before = ctl.turn_state().clone();
        let money = ctl.simulation().state().money;

        let err = ctl.end_turn().unwrap_err();

        assert_eq!(err, GameError::EventsPending { count: 1 });
        assert_eq!(ctl.phase(), TurnPhase::TurnStart);
        assert_eq!(ctl.turn_state(), &before);
        assert_eq!(ctl.simulation().state().money, money);
        assert_eq!(ctl.simulation().state().turn, 10);
    }

    #[test]
    fn test_select_action_blocked_by_pending_events() {
        let mut ctl = crisis();
        ctl.start_turn().unwrap();
        let before = ctl.turn_state().clone();

        assert!(ctl.select_action("fundraise").is_err());
        assert_eq!(ctl.turn_state(), &before);
    }

    #[test]
    fn test_resolving_last_event_opens_selection() {
        let mut ctl = crisis();
        ctl.start_turn().unwrap();

        let resolved = ctl.resolve_event("funding_crisis", "emergency_loan").unwrap();

        assert!(resolved.outcome.applied);
        assert_eq!(resolved.phase, TurnPhase::ActionSelection);
        assert_eq!(resolved.remaining_events, 0);
        assert!(resolved.can_end_turn);
        assert_eq!(ctl.simulation().state().money, amount(70_000));
    }

    #[test]
    fn test_unrecognized_choice_keeps_event_pending() {
        let mut ctl = crisis();
        ctl.start_turn().unwrap();

        let resolved = ctl.resolve_event("funding_crisis", "panic").unwrap();

        assert!(resolved.outcome.success);
        assert!(!resolved.outcome.applied);
        assert_eq!(resolved.phase, TurnPhase::TurnStart);
        assert_eq!(resolved.remaining_events, 1);
    }

    fn double_crisis() -> TurnController<RecordingCollaborator> {
        let mut state = GameState::new("turn", &Tuning::default());
        state.turn = 10;
        state.money = amount(30_000);
        state.compute = amount(10);
        controller(state)
    }

    #[test]
    fn test_resolving_untriggered_event_is_rejected() {
        let mut ctl = crisis();
        ctl.start_turn().unwrap();
        let before = ctl.turn_state().clone();
        let hash = ctl.simulation().state_hash();

        let err = ctl
            .resolve_event("compute_shortage", "buy_emergency_compute")
            .unwrap_err();

        assert_eq!(err, GameError::EventNotPending("compute_shortage".to_string()));
        assert_eq!(ctl.turn_state(), &before);
        assert_eq!(ctl.simulation().state_hash(), hash);
    }

    #[test]
    fn test_resolved_event_cannot_be_applied_again() {
        let mut ctl = double_crisis();
        let started = ctl.start_turn().unwrap();
        assert_eq!(started.events.len(), 2);

        let first = ctl.resolve_event("funding_crisis", "accept_investor").unwrap();
        assert!(first.outcome.applied);
        assert_eq!(first.remaining_events, 1);
        assert_eq!(first.phase, TurnPhase::TurnStart);
        assert_eq!(ctl.simulation().state().money, amount(105_000));

        let err = ctl.resolve_event("funding_crisis", "accept_investor").unwrap_err();
        assert_eq!(err, GameError::EventNotPending("funding_crisis".to_string()));
        assert_eq!(ctl.simulation().state().money, amount(105_000));
        assert_eq!(ctl.turn_state().pending_events.len(), 1);
        assert_eq!(ctl.turn_state().pending_events[0].id, "compute_shortage");
    }

    #[test]
    fn test_second_event_still_blocks_until_resolved() {
        let mut ctl = double_crisis();
        ctl.start_turn().unwrap();
        ctl.resolve_event("funding_crisis", "emergency_loan").unwrap();

        assert_eq!(ctl.end_turn().unwrap_err(), GameError::EventsPending { count: 1 });
        assert!(ctl.select_action("fundraise").is_err());

        let last = ctl.resolve_event("compute_shortage", "ration_compute").unwrap();
        assert!(last.outcome.applied);
        assert_eq!(last.phase, TurnPhase::ActionSelection);
        assert!(last.can_end_turn);
    }

    #[test]
    fn test_resolve_event_out_of_phase() {
        let mut ctl = fresh();
        ctl.start_turn().unwrap();
        let money = ctl.simulation().state().money;

        let err = ctl.resolve_event("funding_crisis", "emergency_loan").unwrap_err();

        assert!(matches!(
            err,
            GameError::OutOfPhase {
                phase: TurnPhase::ActionSelection,
                ..
            }
        ));
        assert_eq!(ctl.simulation().state().money, money);
    }

    #[test]
    fn test_select_action_deduplicates() {
        let mut ctl = fresh();
        ctl.start_turn().unwrap();
        ctl.select_action("buy_compute").unwrap();
        ctl.select_action("safety_research").unwrap();
        let selected = ctl.select_action("buy_compute").unwrap();
        assert_eq!(selected, vec!["buy_compute", "safety_research"]);
    }

    #[test]
    fn test_select_unknown_action_rejected() {
        let mut ctl = fresh();
        ctl.start_turn().unwrap();
        let err = ctl.select_action("teleport").unwrap_err();
        assert_eq!(err, GameError::UnknownAction("teleport".to_string()));
        assert!(ctl.turn_state().selected_actions.is_empty());
    }

    #[test]
    fn test_select_action_before_start_rejected() {
        let mut ctl = fresh();
        assert!(matches!(
            ctl.select_action("fundraise"),
            Err(GameError::OutOfPhase { .. })
        ));
    }

    #[test]
    fn test_end_turn_executes_in_selection_order() {
        let mut ctl = fresh();
        ctl.start_turn().unwrap();
        // 100000 pays for both hires exactly; fundraise is free
        ctl.select_action("hire_safety_researcher").unwrap();
        ctl.select_action("hire_capabilities_researcher").unwrap();
        ctl.select_action("fundraise").unwrap();

        let ended = ctl.end_turn().unwrap();

        let ids: Vec<_> = ended.action_results.iter().map(|r| r.action_id.as_str()).collect();
        assert_eq!(
            ids,
            vec!["hire_safety_researcher", "hire_capabilities_researcher", "fundraise"]
        );
        assert!(ended.action_results[0].success);
        assert!(ended.action_results[1].success);
        assert!(ended.action_results[2].success);
        assert_eq!(ended.phase, TurnPhase::TurnEnd);
        assert_eq!(ctl.simulation().state().turn, 1);
        assert!(ctl.turn_state().selected_actions.is_empty());
    }

    #[test]
    fn test_failures_do_not_short_circuit() {
        let mut state = GameState::new("turn", &Tuning::default());
        state.money = amount(60_000);
        let mut ctl = controller(state);
        ctl.start_turn().unwrap();
        ctl.select_action("hire_safety_researcher").unwrap();
        ctl.select_action("buy_compute").unwrap();
        ctl.select_action("safety_research").unwrap();

        let ended = ctl.end_turn().unwrap();

        let flags: Vec<_> = ended.action_results.iter().map(|r| r.success).collect();
        assert_eq!(flags, vec![true, false, false]);
        assert_eq!(
            ctl.simulation().state().employee_count(Role::SafetyResearchers),
            1
        );
    }

    #[test]
    fn test_turn_increments_once_per_end_turn() {
        let mut ctl = fresh();
        for expected in 1..=5 {
            ctl.start_turn().unwrap();
            ctl.end_turn().unwrap();
            assert_eq!(ctl.simulation().state().turn, expected);
        }
    }

    #[test]
    fn test_game_over_blocks_new_turns() {
        let mut state = GameState::new("turn", &Tuning::default());
        state.compute = amount(5);
        let mut ctl = controller(state);
        ctl.start_turn().unwrap();
        let ended = ctl.end_turn().unwrap();
        assert!(ended.turn_end.game_over);

        assert_eq!(
            ctl.start_turn().unwrap_err(),
            GameError::GameFinished("game over")
        );
        assert!(ctl.select_action("fundraise").is_err());
    }

    #[test]
    fn test_direct_execution_ignores_phase() {
        let mut ctl = fresh();
        let outcome = ctl.execute_action_direct("buy_compute");
        assert!(outcome.success);
        assert_eq!(ctl.phase(), TurnPhase::TurnEnd);
    }

    #[test]
    fn test_interactive_resolution() {
        let mut state = GameState::new("turn", &Tuning::default());
        state.turn = 10;
        state.money = amount(30_000);
        let mut rec = RecordingCollaborator::new();
        rec.script_choice(DialogOutcome::Chosen("accept_investor".to_string()));
        let mut ctl = TurnController::new(Simulation::from_state(state, Tuning::default(), rec));
        ctl.start_turn().unwrap();

        let outcomes = ctl.resolve_events_interactively().unwrap();

        assert_eq!(outcomes.len(), 1);
        assert_eq!(ctl.phase(), TurnPhase::ActionSelection);
        assert_eq!(ctl.simulation().collaborator().dialogs_shown.len(), 1);
    }

    #[test]
    fn test_interactive_cancel_keeps_event() {
        let mut ctl = crisis();
        ctl.start_turn().unwrap();
        let outcomes = ctl.resolve_events_interactively().unwrap();
        assert!(outcomes.is_empty());
        assert_eq!(ctl.phase(), TurnPhase::TurnStart);
    }
}
