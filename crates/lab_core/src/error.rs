//! Error types for the turn engine.
//!
//! Validation failures are ordinary values: the controller returns them as
//! the `Err` side of a [`Result`] and callers turn them into failure results
//! with a message. None of them leave partially mutated state behind.

use thiserror::Error;

use crate::turn::TurnPhase;

/// Result type alias using [`GameError`].
pub type Result<T> = std::result::Result<T, GameError>;

/// Top-level error type for the simulation and turn controller.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GameError {
    /// No action with this identifier exists.
    #[error("Unknown action: {0}")]
    UnknownAction(String),

    /// The action costs more money than the lab has.
    #[error("Insufficient funds for {action}: need ${required}, have ${available}")]
    InsufficientFunds {
        /// Display name of the action.
        action: String,
        /// Money required.
        required: String,
        /// Money available.
        available: String,
    },

    /// One-off upgrade has already been bought.
    #[error("Upgrade already purchased: {0}")]
    UpgradeOwned(String),

    /// Operation is not legal in the current turn phase.
    #[error("Cannot {operation} during {phase}")]
    OutOfPhase {
        /// Operation that was attempted.
        operation: &'static str,
        /// Phase the controller was in.
        phase: TurnPhase,
    },

    /// The turn cannot end while events still wait for a decision.
    #[error("Cannot end turn: {count} pending event(s) must be resolved first")]
    EventsPending {
        /// Number of unresolved events.
        count: usize,
    },

    /// The event is not waiting for a decision this turn.
    #[error("Event is not pending: {0}")]
    EventNotPending(String),

    /// The session has reached game over or victory.
    #[error("Game has ended: {0}")]
    GameFinished(&'static str),

    /// Failed to load or parse tuning data.
    #[error("Failed to load tuning '{path}': {message}")]
    TuningLoad {
        /// Path to the file that failed to load.
        path: String,
        /// Error message.
        message: String,
    },

    /// Replay file could not be read, written or decoded.
    #[error("Replay error: {0}")]
    Replay(String),

    /// Replay re-execution produced a different state.
    #[error("Replay diverged at turn {turn}: expected hash {expected}, got {actual}")]
    ReplayDiverged {
        /// Final turn reached by the re-execution.
        turn: u64,
        /// Hash stored in the replay.
        expected: u64,
        /// Hash computed by the re-execution.
        actual: u64,
    },
}
