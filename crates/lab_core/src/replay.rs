//! Replay system for recording and re-running sessions.
//!
//! A replay stores the seed, the tuning and the stream of controller inputs
//! issued during a session. Because the core is deterministic that is all
//! it takes to recreate the session exactly; the stored final hash lets a
//! re-execution prove it.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::collaborator::NullCollaborator;
use crate::error::{GameError, Result};
use crate::simulation::Simulation;
use crate::tuning::Tuning;
use crate::turn::TurnController;

/// Replay file format version for compatibility.
pub const REPLAY_VERSION: u32 = 1;

/// One controller input, in the order it was issued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReplayInput {
    /// `start_turn`
    StartTurn,
    /// `select_action`
    SelectAction(String),
    /// `resolve_event`
    ResolveEvent {
        /// Event being resolved.
        event_id: String,
        /// Chosen option.
        choice_id: String,
    },
    /// `end_turn`
    EndTurn,
    /// `execute_action_direct`
    ExecuteAction(String),
}

/// Complete replay data structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Replay {
    /// Replay format version.
    pub version: u32,
    /// Session seed.
    pub seed: String,
    /// Tuning the session was played with.
    pub tuning: Tuning,
    /// Inputs in issue order, rejected ones included.
    pub inputs: Vec<ReplayInput>,
    /// Turn counter when recording stopped.
    pub final_turn: u64,
    /// State hash when recording stopped.
    pub final_hash: u64,
}

impl Replay {
    /// Start an empty recording.
    #[must_use]
    pub fn new(seed: impl Into<String>, tuning: Tuning) -> Self {
        Self {
            version: REPLAY_VERSION,
            seed: seed.into(),
            tuning,
            inputs: Vec::new(),
            final_turn: 0,
            final_hash: 0,
        }
    }

    /// Append an input.
    pub fn record(&mut self, input: ReplayInput) {
        self.inputs.push(input);
    }

    /// Stamp the end-of-recording state.
    pub fn finalize(&mut self, final_turn: u64, final_hash: u64) {
        self.final_turn = final_turn;
        self.final_hash = final_hash;
    }

    /// Number of recorded inputs.
    #[must_use]
    pub fn input_count(&self) -> usize {
        self.inputs.len()
    }

    /// Save the replay to a file.
    ///
    /// # Errors
    /// Returns an error if serialization or file writing fails.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let bytes = bincode::serialize(self)
            .map_err(|e| GameError::Replay(format!("Failed to serialize replay: {e}")))?;
        std::fs::write(path.as_ref(), bytes)
            .map_err(|e| GameError::Replay(format!("Failed to write replay file: {e}")))?;
        Ok(())
    }

    /// Load a replay from a file.
    ///
    /// # Errors
    /// Returns an error if reading or decoding fails, or if the file was
    /// written by a different format version.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let bytes = std::fs::read(path.as_ref())
            .map_err(|e| GameError::Replay(format!("Failed to read replay file: {e}")))?;
        let replay: Self = bincode::deserialize(&bytes)
            .map_err(|e| GameError::Replay(format!("Failed to deserialize replay: {e}")))?;

        if replay.version != REPLAY_VERSION {
            return Err(GameError::Replay(format!(
                "Replay version mismatch: expected {REPLAY_VERSION}, got {}",
                replay.version
            )));
        }

        Ok(replay)
    }

    /// Re-execute every input against a fresh session.
    #[must_use]
    pub fn run(&self) -> TurnController<NullCollaborator> {
        let mut player = ReplayPlayer::new(self);
        while player.step().is_some() {}
        player.into_controller()
    }

    /// Re-execute and compare against the stored final hash.
    ///
    /// # Errors
    /// Returns [`GameError::ReplayDiverged`] when the hashes differ.
    pub fn verify(&self) -> Result<u64> {
        let controller = self.run();
        let turn = controller.simulation().state().turn;
        let actual = controller.simulation().state_hash();
        if actual == self.final_hash && turn == self.final_turn {
            Ok(actual)
        } else {
            Err(GameError::ReplayDiverged {
                turn,
                expected: self.final_hash,
                actual,
            })
        }
    }
}

/// Steps through a replay one input at a time.
#[derive(Debug)]
pub struct ReplayPlayer<'a> {
    replay: &'a Replay,
    controller: TurnController<NullCollaborator>,
    cursor: usize,
}

impl<'a> ReplayPlayer<'a> {
    /// Create a player positioned before the first input.
    #[must_use]
    pub fn new(replay: &'a Replay) -> Self {
        let sim = Simulation::new(replay.seed.clone(), replay.tuning.clone(), NullCollaborator);
        Self {
            replay,
            controller: TurnController::new(sim),
            cursor: 0,
        }
    }

    /// Apply the next input. Returns it, or `None` once the stream is done.
    ///
    /// Inputs the controller rejects are skipped the same way they were
    /// rejected during recording.
    pub fn step(&mut self) -> Option<&'a ReplayInput> {
        let input = self.replay.inputs.get(self.cursor)?;
        self.cursor += 1;

        let rejected = match input {
            ReplayInput::StartTurn => self.controller.start_turn().err(),
            ReplayInput::SelectAction(id) => self.controller.select_action(id).err(),
            ReplayInput::ResolveEvent {
                event_id,
                choice_id,
            } => self.controller.resolve_event(event_id, choice_id).err(),
            ReplayInput::EndTurn => self.controller.end_turn().err(),
            ReplayInput::ExecuteAction(id) => {
                self.controller.execute_action_direct(id);
                None
            }
        };
        if let Some(err) = rejected {
            tracing::debug!(index = self.cursor - 1, %err, "Replayed input rejected");
        }

        Some(input)
    }

    /// Index of the next input.
    #[must_use]
    pub const fn position(&self) -> usize {
        self.cursor
    }

    /// Whether every input has been applied.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.cursor >= self.replay.inputs.len()
    }

    /// The controller being driven.
    #[must_use]
    pub const fn controller(&self) -> &TurnController<NullCollaborator> {
        &self.controller
    }

    /// Stop and keep the controller.
    #[must_use]
    pub fn into_controller(self) -> TurnController<NullCollaborator> {
        self.controller
    }
}
