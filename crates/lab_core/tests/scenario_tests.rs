//! End-to-end scenarios against the turn controller.

use lab_core::collaborator::{MessageCategory, RecordingCollaborator};
use lab_core::error::GameError;
use lab_core::state::Role;
use lab_core::turn::{TurnController, TurnPhase};

use lab_test_utils::fixtures::{
    compute_shortage_state, controller_for, funding_crisis_state, money, play_turn,
    recording_controller, StateBuilder,
};

#[test]
fn first_turn_without_events_opens_selection() {
    let mut ctl = recording_controller("s1");

    let started = ctl.start_turn().unwrap();

    assert_eq!(started.phase, TurnPhase::ActionSelection);
    assert!(started.can_end_turn);
    assert_eq!(ctl.phase(), TurnPhase::ActionSelection);
}

#[test]
fn pending_funding_crisis_blocks_end_turn() {
    let mut ctl = controller_for(funding_crisis_state(), RecordingCollaborator::new());

    let started = ctl.start_turn().unwrap();
    assert_eq!(started.events[0].id, "funding_crisis");

    let err = ctl.end_turn().unwrap_err();
    assert!(matches!(err, GameError::EventsPending { count: 1 }));
    assert_eq!(ctl.phase(), TurnPhase::TurnStart);
    assert_eq!(ctl.simulation().state().turn, 10);
}

#[test]
fn hiring_with_enough_money_applies_everything() {
    let mut ctl = StateBuilder::new().money(100_000).controller();

    let outcome = ctl.execute_action_direct("hire_safety_researcher");

    let state = ctl.simulation().state();
    assert!(outcome.success);
    assert_eq!(state.money, money(50_000));
    assert_eq!(state.employee_count(Role::SafetyResearchers), 1);
    assert_eq!(state.safety, money(2));
}

#[test]
fn hiring_without_money_changes_nothing() {
    let mut ctl = StateBuilder::new().money(10_000).controller();
    let before = ctl.simulation().state().clone();

    let outcome = ctl.execute_action_direct("hire_safety_researcher");

    assert!(!outcome.success);
    assert_eq!(ctl.simulation().state(), &before);
    assert_eq!(
        ctl.simulation()
            .collaborator()
            .messages_in(MessageCategory::Warning)
            .len(),
        1
    );
}

#[test]
fn bankruptcy_ends_the_game() {
    let mut ctl = StateBuilder::new()
        .money(5_000)
        .employees(Role::SafetyResearchers, 2)
        .controller();

    let mut turns = 0;
    while !ctl.simulation().state().game_over {
        ctl.start_turn().unwrap();
        ctl.end_turn().unwrap();
        turns += 1;
        assert!(turns < 10, "bankruptcy never happened");
    }

    assert_eq!(turns, 3);
    assert!(ctl.simulation().state().money <= money(0));
    assert!(matches!(
        ctl.start_turn(),
        Err(GameError::GameFinished("game over"))
    ));
}

#[test]
fn resolving_crisis_then_playing_on() {
    let mut ctl = controller_for(funding_crisis_state(), RecordingCollaborator::new());
    ctl.start_turn().unwrap();

    let resolved = ctl
        .resolve_event("funding_crisis", "accept_investor")
        .unwrap();
    assert_eq!(resolved.phase, TurnPhase::ActionSelection);

    ctl.select_action("hire_safety_researcher").unwrap();
    let ended = ctl.end_turn().unwrap();

    assert!(ended.action_results[0].success);
    // 30000 + 75000 - 50000 - 1000 maintenance
    assert_eq!(ctl.simulation().state().money, money(54_000));
    assert_eq!(ctl.simulation().state().turn, 11);
}

#[test]
fn compute_shortage_can_be_bought_out() {
    let mut ctl = controller_for(compute_shortage_state(), RecordingCollaborator::new());
    ctl.start_turn().unwrap();
    ctl.resolve_event("compute_shortage", "buy_emergency_compute")
        .unwrap();

    assert_eq!(ctl.simulation().state().compute, money(50));
    assert_eq!(ctl.simulation().state().money, money(80_000));
}

#[test]
fn readouts_refresh_once_per_turn() {
    let mut ctl = recording_controller("readouts");
    for _ in 0..3 {
        play_turn(&mut ctl, &["buy_compute", "safety_research"]);
    }

    let collab = ctl.simulation().collaborator();
    assert_eq!(collab.turn_updates, vec![1, 2, 3]);
    assert_eq!(collab.resource_updates.len(), 3);
    assert_eq!(collab.employee_updates.len(), 3);
}

#[test]
fn snapshot_matches_state() {
    let mut ctl = recording_controller("snapshot");
    play_turn(&mut ctl, &["hire_compute_researcher", "upgrade_red_team"]);

    let state = ctl.simulation().state();
    let snapshot = ctl.simulation().snapshot();

    assert_eq!(snapshot.turn, state.turn);
    assert_eq!(snapshot.employees.compute, 1);
    assert_eq!(snapshot.employees.total, state.total_employees());
    assert_eq!(snapshot.upgrades, vec!["red_team".to_string()]);
    assert_eq!(snapshot.money, state.money.to_num::<f64>());
}

#[test]
fn victory_is_terminal() {
    let mut ctl: TurnController<RecordingCollaborator> =
        StateBuilder::new().safety(99).controller();
    ctl.start_turn().unwrap();
    ctl.select_action("safety_research").unwrap();
    let ended = ctl.end_turn().unwrap();

    assert!(ended.turn_end.victory);
    assert_eq!(
        ctl.start_turn().unwrap_err(),
        GameError::GameFinished("victory")
    );
    assert_eq!(
        ctl.simulation().collaborator().sounds_played.last(),
        Some(&"victory".to_string())
    );
}

#[test]
fn each_event_resolves_once_in_a_two_event_turn() {
    let mut ctl = StateBuilder::new()
        .turn(10)
        .money(30_000)
        .compute(10)
        .controller();

    let started = ctl.start_turn().unwrap();
    let ids: Vec<_> = started.events.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, vec!["funding_crisis", "compute_shortage"]);

    ctl.resolve_event("funding_crisis", "emergency_loan").unwrap();
    assert_eq!(ctl.simulation().state().money, money(70_000));

    let err = ctl.resolve_event("funding_crisis", "emergency_loan").unwrap_err();
    assert_eq!(err, GameError::EventNotPending("funding_crisis".to_string()));
    assert_eq!(ctl.simulation().state().money, money(70_000));
    assert_eq!(ctl.phase(), TurnPhase::TurnStart);
    assert!(ctl.end_turn().is_err());

    ctl.resolve_event("compute_shortage", "buy_emergency_compute").unwrap();
    assert_eq!(ctl.simulation().state().money, money(50_000));
    assert_eq!(ctl.simulation().state().compute, money(50));
    assert!(ctl.can_end_turn());
}

#[test]
fn events_that_did_not_fire_cannot_be_resolved() {
    let mut ctl = controller_for(funding_crisis_state(), RecordingCollaborator::new());
    ctl.start_turn().unwrap();
    let before = ctl.simulation().state().clone();

    let err = ctl
        .resolve_event("compute_shortage", "buy_emergency_compute")
        .unwrap_err();

    assert!(matches!(err, GameError::EventNotPending(_)));
    assert_eq!(ctl.simulation().state(), &before);
    assert_eq!(ctl.turn_state().pending_events.len(), 1);
}
