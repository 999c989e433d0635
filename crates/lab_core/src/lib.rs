//! # Lab Core
//!
//! Deterministic turn engine for the frontier lab management game.
//!
//! This crate contains **only** game logic:
//! - No rendering
//! - No transport
//! - No system randomness (one seeded stream per session)
//! - No floating-point math in the state (uses fixed-point)
//!
//! Everything observable is requested from an injected [`Collaborator`],
//! so the same core runs behind a desktop UI, the process bridge, replays
//! and tests.
//!
//! ## Crate Structure
//!
//! - [`state`] - State container and snapshots
//! - [`actions`] - Closed action catalog
//! - [`events`] - Event triggers and choices
//! - [`simulation`] - Simulation core
//! - [`turn`] - Turn phase controller
//! - [`collaborator`] - Engine collaborator interface
//! - [`replay`] - Input recording and re-execution
//! - [`tuning`] - Balance data
//!
//! [`Collaborator`]: collaborator::Collaborator

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod actions;
pub mod collaborator;
pub mod error;
pub mod events;
pub mod math;
pub mod replay;
pub mod simulation;
pub mod state;
pub mod tuning;
pub mod turn;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::actions::{ActionKind, ActionTable, Changes};
    pub use crate::collaborator::{
        Collaborator, CollaboratorError, DialogOption, DialogOutcome, MessageCategory,
        NullCollaborator, RecordingCollaborator,
    };
    pub use crate::error::{GameError, Result};
    pub use crate::events::{EventChoice, EventDescriptor};
    pub use crate::math::Amount;
    pub use crate::replay::{Replay, ReplayInput};
    pub use crate::simulation::{ActionOutcome, ChoiceOutcome, Simulation, TurnEndOutcome};
    pub use crate::state::{GameState, Role, Snapshot, UpgradeId};
    pub use crate::tuning::Tuning;
    pub use crate::turn::{EventResolved, TurnController, TurnEnded, TurnPhase, TurnStarted};
}
