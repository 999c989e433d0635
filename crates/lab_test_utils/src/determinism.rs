//! Determinism testing utilities.
//!
//! Provides a harness for verifying that a session produces identical
//! results given the same seed, tuning and inputs.
//!
//! # Testing Strategy
//!
//! Replays and the `verify` tool depend on the core being 100%
//! deterministic. Sources of non-determinism include:
//!
//! - **Floating-point math**: resources are fixed-point
//!   ([`lab_core::math::Amount`]); floats only appear in readouts.
//!
//! - **HashMap iteration order**: state maps are `BTreeMap`s, hashed in key
//!   order.
//!
//! - **System randomness**: the only draw (fundraising) comes from the
//!   seeded ChaCha stream inside the state.

use std::thread;

use lab_core::collaborator::NullCollaborator;
use lab_core::tuning::Tuning;
use lab_core::turn::TurnController;

use crate::fixtures::{null_controller, play_turn};

/// Actions to select on each turn, one inner list per turn.
pub type TurnPlan = Vec<Vec<String>>;

/// Result of a determinism test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeterminismResult {
    /// Whether all runs produced identical results.
    pub is_deterministic: bool,
    /// Hashes from each run.
    pub hashes: Vec<u64>,
    /// Number of steps simulated per run.
    pub steps: u64,
}

impl DeterminismResult {
    fn from_hashes(hashes: Vec<u64>, steps: u64) -> Self {
        Self {
            is_deterministic: hashes.windows(2).all(|w| w[0] == w[1]),
            hashes,
            steps,
        }
    }

    /// Get all unique hashes (should be 1 for a deterministic session).
    #[must_use]
    pub fn unique_hashes(&self) -> Vec<u64> {
        let mut unique: Vec<u64> = self.hashes.clone();
        unique.sort_unstable();
        unique.dedup();
        unique
    }

    /// Assert that every run matched, with a detailed error message.
    ///
    /// # Panics
    ///
    /// Panics if the runs produced different hashes.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic {
            let unique = self.unique_hashes();
            panic!(
                "Session is non-deterministic!\n\
                 Runs: {}\n\
                 Steps: {}\n\
                 Unique hashes: {} (expected 1)\n\
                 All hashes: {:?}",
                self.hashes.len(),
                self.steps,
                unique.len(),
                self.hashes
            );
        }
    }
}

/// Run a setup/step loop several times and compare final hashes.
///
/// # Arguments
///
/// * `runs` - Number of times to run
/// * `steps` - Number of steps per run
/// * `setup` - Creates the initial state
/// * `step` - Advances the state by one step
/// * `hash` - Computes the state hash
pub fn verify_determinism<S, Setup, Step, HashFn>(
    runs: usize,
    steps: u64,
    setup: Setup,
    step: Step,
    hash: HashFn,
) -> DeterminismResult
where
    Setup: Fn() -> S,
    Step: Fn(&mut S, u64),
    HashFn: Fn(&S) -> u64,
{
    let mut hashes = Vec::with_capacity(runs);

    for _ in 0..runs {
        let mut state = setup();
        for index in 0..steps {
            step(&mut state, index);
        }
        hashes.push(hash(&state));
    }

    DeterminismResult::from_hashes(hashes, steps)
}

/// Play a turn plan on a fresh session and return the controller.
///
/// Stops early once the game has finished.
#[must_use]
pub fn run_plan(seed: &str, tuning: &Tuning, plan: &[Vec<String>]) -> TurnController<NullCollaborator> {
    let mut controller = null_controller(seed, tuning.clone());
    for actions in plan {
        let ids: Vec<&str> = actions.iter().map(String::as_str).collect();
        if play_turn(&mut controller, &ids).is_none() {
            break;
        }
    }
    controller
}

/// Play the same plan `runs` times and compare final hashes.
pub fn verify_plan_determinism(seed: &str, plan: &[Vec<String>], runs: usize) -> DeterminismResult {
    let tuning = Tuning::default();
    let hashes = (0..runs)
        .map(|_| run_plan(seed, &tuning, plan).simulation().state_hash())
        .collect();
    DeterminismResult::from_hashes(hashes, plan.len() as u64)
}

/// Play the same plan on `runs` scoped threads and compare final hashes.
///
/// Catches non-determinism that only shows up under thread scheduling or
/// memory layout differences.
pub fn run_parallel_sessions(seed: &str, plan: &[Vec<String>], runs: usize) -> DeterminismResult {
    let tuning = Tuning::default();
    let hashes = thread::scope(|s| {
        let handles: Vec<_> = (0..runs)
            .map(|_| s.spawn(|| run_plan(seed, &tuning, plan).simulation().state_hash()))
            .collect();

        handles
            .into_iter()
            .map(|h| h.join().unwrap_or_default())
            .collect()
    });
    DeterminismResult::from_hashes(hashes, plan.len() as u64)
}

/// Play two sessions side by side and find the first turn whose hashes
/// differ. `None` if they never diverge.
pub fn find_first_divergence(seed_a: &str, seed_b: &str, plan: &[Vec<String>]) -> Option<u64> {
    let tuning = Tuning::default();
    let mut a = null_controller(seed_a, tuning.clone());
    let mut b = null_controller(seed_b, tuning);

    if a.simulation().state_hash() != b.simulation().state_hash() {
        return Some(0);
    }

    for (turn, actions) in (1u64..).zip(plan) {
        let ids: Vec<&str> = actions.iter().map(String::as_str).collect();
        play_turn(&mut a, &ids);
        play_turn(&mut b, &ids);
        if a.simulation().state_hash() != b.simulation().state_hash() {
            return Some(turn);
        }
    }

    None
}

/// Proptest strategies for determinism testing.
pub mod strategies {
    use lab_core::actions::ActionKind;
    use proptest::prelude::*;

    use super::TurnPlan;

    /// Any seed string.
    pub fn arb_seed() -> impl Strategy<Value = String> {
        "[a-z0-9]{1,16}"
    }

    /// A catalog action id.
    pub fn arb_action_id() -> impl Strategy<Value = String> {
        proptest::sample::select(ActionKind::ALL.to_vec()).prop_map(|kind| kind.id().to_string())
    }

    /// A catalog id most of the time, occasionally a bogus one.
    pub fn arb_any_action_id() -> impl Strategy<Value = String> {
        prop_oneof![
            9 => arb_action_id(),
            1 => "[a-z_]{3,12}",
        ]
    }

    /// Up to `max_actions` selections for one turn.
    pub fn arb_turn_actions(max_actions: usize) -> impl Strategy<Value = Vec<String>> {
        proptest::collection::vec(arb_any_action_id(), 0..=max_actions)
    }

    /// A plan of `1..=max_turns` turns.
    pub fn arb_turn_plan(max_turns: usize, max_actions: usize) -> impl Strategy<Value = TurnPlan> {
        proptest::collection::vec(arb_turn_actions(max_actions), 1..=max_turns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn plan(turns: &[&[&str]]) -> TurnPlan {
        turns
            .iter()
            .map(|ids| ids.iter().map(|id| (*id).to_string()).collect())
            .collect()
    }

    #[test]
    fn test_verify_determinism_simple() {
        let result = verify_determinism(
            3,
            10,
            || null_controller("simple", Tuning::default()),
            |ctl, _| {
                play_turn(ctl, &["fundraise"]);
            },
            |ctl| ctl.simulation().state_hash(),
        );
        result.assert_deterministic();
        assert_eq!(result.unique_hashes().len(), 1);
    }

    #[test]
    fn test_idle_session_is_deterministic() {
        verify_plan_determinism("idle", &plan(&[&[], &[], &[]]), 3).assert_deterministic();
    }

    #[test]
    fn test_parallel_sessions_match() {
        let turns = plan(&[
            &["fundraise", "hire_safety_researcher"],
            &["fundraise", "buy_compute"],
            &["safety_research", "fundraise"],
        ]);
        run_parallel_sessions("parallel", &turns, 8).assert_deterministic();
    }

    #[test]
    fn test_same_seed_never_diverges() {
        let turns = plan(&[&["fundraise"], &["fundraise"], &["fundraise"]]);
        assert_eq!(find_first_divergence("x", "x", &turns), None);
    }

    #[test]
    fn test_different_seed_diverges_immediately() {
        assert_eq!(find_first_divergence("x", "y", &plan(&[&[]])), Some(0));
    }

    #[test]
    #[should_panic(expected = "non-deterministic")]
    fn test_assert_reports_mismatch() {
        DeterminismResult::from_hashes(vec![1, 2], 1).assert_deterministic();
    }

    proptest! {
        /// Any plan replays to the same hash from the same seed.
        #[test]
        fn prop_plans_are_deterministic(
            seed in strategies::arb_seed(),
            turns in strategies::arb_turn_plan(12, 4),
        ) {
            let result = verify_plan_determinism(&seed, &turns, 2);
            prop_assert!(result.is_deterministic);
        }

        /// Money never goes negative through actions alone.
        #[test]
        fn prop_actions_never_overdraw(
            seed in strategies::arb_seed(),
            ids in proptest::collection::vec(strategies::arb_any_action_id(), 0..40),
        ) {
            let mut ctl = null_controller(&seed, Tuning::default());
            for id in &ids {
                ctl.execute_action_direct(id);
                prop_assert!(ctl.simulation().state().money >= lab_core::math::Amount::ZERO);
            }
        }

        /// The turn counter equals the number of completed turns.
        #[test]
        fn prop_turn_counts_completed_turns(turns in strategies::arb_turn_plan(15, 3)) {
            let mut ctl = null_controller("count", Tuning::default());
            let mut completed = 0u64;
            for actions in &turns {
                let ids: Vec<&str> = actions.iter().map(String::as_str).collect();
                if play_turn(&mut ctl, &ids).is_some() {
                    completed += 1;
                }
            }
            prop_assert_eq!(ctl.simulation().state().turn, completed);
        }
    }
}
