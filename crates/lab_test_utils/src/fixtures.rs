//! Test fixtures and helpers.
//!
//! Pre-built game states and controllers for consistent testing.

use lab_core::collaborator::{Collaborator, NullCollaborator, RecordingCollaborator};
use lab_core::math::{amount, Amount};
use lab_core::simulation::Simulation;
use lab_core::state::{GameState, Role, UpgradeId};
use lab_core::tuning::Tuning;
use lab_core::turn::{TurnController, TurnEnded};

/// Seed used when a test does not care which one it gets.
pub const DEFAULT_SEED: &str = "fixture";

/// Create an amount from whole units.
#[must_use]
pub fn money(n: i64) -> Amount {
    amount(n)
}

/// Builder for [`GameState`] fixtures.
///
/// ```
/// use lab_test_utils::fixtures::StateBuilder;
///
/// let state = StateBuilder::new().turn(10).money(30_000).build();
/// assert_eq!(state.turn, 10);
/// ```
#[derive(Debug, Clone)]
pub struct StateBuilder {
    state: GameState,
}

impl StateBuilder {
    /// Start from the default turn 0 state.
    #[must_use]
    pub fn new() -> Self {
        Self::with_seed(DEFAULT_SEED)
    }

    /// Start from the turn 0 state of a specific seed.
    #[must_use]
    pub fn with_seed(seed: &str) -> Self {
        Self {
            state: GameState::new(seed, &Tuning::default()),
        }
    }

    /// Set the turn counter.
    #[must_use]
    pub fn turn(mut self, turn: u64) -> Self {
        self.state.turn = turn;
        self
    }

    /// Set money.
    #[must_use]
    pub fn money(mut self, value: i64) -> Self {
        self.state.money = amount(value);
        self
    }

    /// Set compute.
    #[must_use]
    pub fn compute(mut self, value: i64) -> Self {
        self.state.compute = amount(value);
        self
    }

    /// Set safety.
    #[must_use]
    pub fn safety(mut self, value: i64) -> Self {
        self.state.safety = amount(value);
        self
    }

    /// Set the head count of one role.
    #[must_use]
    pub fn employees(mut self, role: Role, count: u32) -> Self {
        self.state.employees.insert(role, count);
        self
    }

    /// Mark an upgrade as owned.
    #[must_use]
    pub fn upgrade(mut self, upgrade: UpgradeId) -> Self {
        if !self.state.upgrades.contains(&upgrade) {
            self.state.upgrades.push(upgrade);
        }
        self
    }

    /// Finish the state.
    #[must_use]
    pub fn build(self) -> GameState {
        self.state
    }

    /// Wrap the state in a controller backed by a [`RecordingCollaborator`].
    #[must_use]
    pub fn controller(self) -> TurnController<RecordingCollaborator> {
        controller_for(self.state, RecordingCollaborator::new())
    }
}

impl Default for StateBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Turn 10 with money under the crisis threshold.
#[must_use]
pub fn funding_crisis_state() -> GameState {
    StateBuilder::new().turn(10).money(30_000).build()
}

/// Turn 3 with compute under the shortage threshold.
#[must_use]
pub fn compute_shortage_state() -> GameState {
    StateBuilder::new().turn(3).compute(10).build()
}

/// Wrap a state in a controller with the default tuning.
#[must_use]
pub fn controller_for<C: Collaborator>(state: GameState, collaborator: C) -> TurnController<C> {
    TurnController::new(Simulation::from_state(state, Tuning::default(), collaborator))
}

/// Fresh turn 0 controller recording every collaborator call.
#[must_use]
pub fn recording_controller(seed: &str) -> TurnController<RecordingCollaborator> {
    TurnController::new(Simulation::new(
        seed,
        Tuning::default(),
        RecordingCollaborator::new(),
    ))
}

/// Fresh turn 0 controller that discards collaborator calls.
#[must_use]
pub fn null_controller(seed: &str, tuning: Tuning) -> TurnController<NullCollaborator> {
    TurnController::new(Simulation::new(seed, tuning, NullCollaborator))
}

/// Play one full turn.
///
/// Pending events are resolved with their first option, then `actions` are
/// selected in order (rejections traced, not fatal) and the turn is ended. Returns
/// `None` when the game has already finished.
pub fn play_turn<C: Collaborator>(
    controller: &mut TurnController<C>,
    actions: &[&str],
) -> Option<TurnEnded> {
    let started = controller.start_turn().ok()?;
    for event in &started.events {
        if let Some(choice) = event.options.first() {
            let resolved = controller.resolve_event(&event.id, &choice.id);
            tracing::trace!(event = %event.id, ok = resolved.is_ok(), "Fixture resolved event");
        }
    }
    for id in actions {
        if let Err(err) = controller.select_action(id) {
            tracing::trace!(action = %id, %err, "Fixture selection rejected");
        }
    }
    controller.end_turn().ok()
}
