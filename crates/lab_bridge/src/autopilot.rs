//! Scripted play for verification runs.
//!
//! The policy is fixed so that a seed alone determines the whole session:
//! every event takes its first option, and each turn selects the first
//! action that is currently available.

use lab_core::collaborator::NullCollaborator;
use lab_core::replay::{Replay, ReplayInput};
use lab_core::simulation::Simulation;
use lab_core::state::Snapshot;
use lab_core::tuning::Tuning;
use lab_core::turn::TurnController;
use rayon::prelude::*;
use serde::Serialize;

/// Outcome of one scripted session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
    pub seed: String,
    pub turns_played: u64,
    pub final_hash: u64,
    pub snapshot: Snapshot,
    /// Inputs issued, ready for [`Replay::verify`].
    #[serde(skip)]
    pub replay: Replay,
}

/// Play up to `turns` turns with the fixed policy.
///
/// Stops early when the game finishes.
pub fn play_session(seed: &str, tuning: &Tuning, turns: u64) -> SessionReport {
    let mut ctl = TurnController::new(Simulation::new(seed, tuning.clone(), NullCollaborator));
    let mut replay = Replay::new(seed, tuning.clone());
    let mut turns_played = 0;

    for _ in 0..turns {
        replay.record(ReplayInput::StartTurn);
        let Ok(started) = ctl.start_turn() else {
            break;
        };

        for event in &started.events {
            let Some(choice) = event.options.first() else {
                continue;
            };
            replay.record(ReplayInput::ResolveEvent {
                event_id: event.id.clone(),
                choice_id: choice.id.clone(),
            });
            if let Err(err) = ctl.resolve_event(&event.id, &choice.id) {
                tracing::warn!(%err, event = %event.id, "Autopilot could not resolve event");
            }
        }

        if let Some(action_id) = ctl.simulation().get_available_actions().into_iter().next() {
            replay.record(ReplayInput::SelectAction(action_id.clone()));
            if let Err(err) = ctl.select_action(&action_id) {
                tracing::warn!(%err, action_id, "Autopilot selection rejected");
            }
        }

        replay.record(ReplayInput::EndTurn);
        match ctl.end_turn() {
            Ok(_) => turns_played += 1,
            Err(err) => {
                tracing::warn!(%err, "Autopilot could not end turn");
                break;
            }
        }
    }

    let state = ctl.simulation().state();
    let final_hash = state.state_hash();
    replay.finalize(state.turn, final_hash);

    tracing::debug!(seed, turns_played, final_hash, "Autopilot session finished");

    SessionReport {
        seed: seed.to_string(),
        turns_played,
        final_hash,
        snapshot: ctl.simulation().snapshot(),
        replay,
    }
}

/// Result of a parallel determinism check.
#[derive(Debug, Clone, Serialize)]
pub struct VerifyReport {
    pub seed: String,
    pub runs: usize,
    pub hashes: Vec<u64>,
    pub replay_verified: bool,
}

impl VerifyReport {
    /// Whether every run hashed the same and the replay reproduced it.
    pub fn passed(&self) -> bool {
        self.replay_verified && self.hashes.windows(2).all(|w| w[0] == w[1])
    }
}

/// Play the same scripted session `runs` times in parallel and compare.
pub fn verify_determinism(seed: &str, tuning: &Tuning, turns: u64, runs: usize) -> VerifyReport {
    let reports: Vec<SessionReport> = (0..runs.max(1))
        .into_par_iter()
        .map(|_| play_session(seed, tuning, turns))
        .collect();

    let replay_verified = reports
        .first()
        .is_some_and(|report| report.replay.verify().is_ok());

    VerifyReport {
        seed: seed.to_string(),
        runs: reports.len(),
        hashes: reports.iter().map(|r| r.final_hash).collect(),
        replay_verified,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_plays_requested_turns() {
        let tuning = Tuning {
            starting_money: 10_000_000,
            ..Tuning::default()
        };
        let report = play_session("auto", &tuning, 5);
        assert_eq!(report.turns_played, 5);
        assert_eq!(report.snapshot.turn, 5);
        // with money to spare the first catalog entry always wins
        assert_eq!(report.snapshot.employees.safety, 5);
    }

    #[test]
    fn test_session_stops_when_finished() {
        let tuning = Tuning {
            maintenance_per_head: 1_000_000,
            ..Tuning::default()
        };
        let report = play_session("short", &tuning, 20);
        assert!(report.snapshot.game_over);
        assert_eq!(report.turns_played, 1);
    }

    #[test]
    fn test_recorded_replay_verifies() {
        let report = play_session("rec", &Tuning::default(), 12);
        assert_eq!(report.replay.verify().unwrap(), report.final_hash);
    }

    #[test]
    fn test_parallel_verify_passes() {
        let report = verify_determinism("par", &Tuning::default(), 15, 4);
        assert_eq!(report.runs, 4);
        assert!(report.passed());
    }
}
