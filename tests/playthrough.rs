use std::time::Duration;

use assert_matches::assert_matches;
use cardspot::{
    collaborators::{CallLog, Collaborators, FixedPulse, HostCall, MemorySink, PointerEvent},
    config::Config,
    game::{Machine, Phase, PointerOutcome},
    scoring::{CompletionReason, MetricsReport},
    simulate::{run_playthrough, Learner},
};

const STEP: Duration = Duration::from_millis(100);

fn machine(seed: u64) -> (Machine, CallLog, MemorySink) {
    let config = Config {
        seed: Some(seed),
        ..Config::default()
    };
    let log = CallLog::new(FixedPulse::from_timing(&config.timing));
    let sink = MemorySink::new();
    let collab = Collaborators::headless(&config.timing)
        .with_call_log(&log)
        .with_sink(sink.clone());
    (Machine::new(config, collab).unwrap(), log, sink)
}

fn wait_for_window(m: &mut Machine) {
    for _ in 0..1000 {
        if m.phase() == Phase::AwaitingResponse {
            return;
        }
        m.advance(STEP);
    }
    panic!("no response window opened");
}

fn target_pointer(m: &Machine) -> PointerEvent {
    let target = m.state().target();
    let slot = m.visible_items().unwrap().slot_of(target).unwrap();
    PointerEvent::at_slot(slot)
}

#[test]
fn perfect_learner_clears_every_round() {
    let (mut m, log, sink) = machine(1);
    let report = run_playthrough(&mut m, Learner::perfect(), STEP).unwrap();

    assert_eq!(report.reason, CompletionReason::Success);
    assert_eq!(report.success_interactions, 9);
    assert_eq!(report.total_interactions, 9);
    assert_eq!(report.windows_opened, 9);
    assert_eq!(report.aggregate_score, 1.0);
    assert!(report.responses.iter().all(|r| r.score == 100));
    assert_eq!(sink.reports(), vec![report.clone()]);

    assert_eq!(log.count(|c| *c == HostCall::Celebrate), 9);
    assert_eq!(log.count(|c| matches!(c, HostCall::Pulse { .. })), 9);
    assert_eq!(log.count(|c| matches!(c, HostCall::Play(_))), 18);

    let message = report.to_message();
    assert_eq!(message.score, 100.0);
    assert_eq!(message.iteration_type, "ANIMATION_GAME");
    assert_eq!(message.input.message, "Success");
    assert_eq!(m.phase(), Phase::Idle);
}

#[test]
fn idle_learner_times_out_in_the_first_level() {
    let (mut m, log, _sink) = machine(2);
    let report = run_playthrough(&mut m, Learner::Idle, STEP).unwrap();

    assert_eq!(report.reason, CompletionReason::TimedOut);
    assert_eq!(report.success_interactions, 0);
    assert_eq!(report.total_interactions, 0);
    assert_eq!(report.aggregate_score, 0.0);
    // three prompts in the first round, one in the auto-passed second
    assert_eq!(report.windows_opened, 4);
    assert_eq!(report.duration_secs, 43);
    assert_eq!(log.count(|c| *c == HostCall::Celebrate), 0);
    assert_eq!(report.to_message().input.message, "TimeOut");
}

#[test]
fn misses_cost_the_round_but_not_the_next() {
    let (mut m, _log, _sink) = machine(3);
    assert!(m.start());

    while m.state().level() < 2 || m.phase() != Phase::AwaitingResponse {
        wait_for_window(&mut m);
        if m.state().level() == 2 {
            break;
        }
        let pointer = target_pointer(&m);
        assert_matches!(m.handle_pointer(pointer), PointerOutcome::Hit(_));
    }
    assert_eq!((m.state().level(), m.state().sub_level()), (2, 1));

    let layout = m.visible_items().unwrap().clone();
    assert_eq!(layout.len(), 2);
    let target = m.state().target();
    let decoy = layout
        .placements()
        .iter()
        .find(|p| p.item != target)
        .unwrap()
        .slot;

    assert_eq!(
        m.handle_pointer(PointerEvent::at_slot(decoy)),
        PointerOutcome::Miss { score: 80 }
    );
    assert_eq!(
        m.handle_pointer(PointerEvent::at_slot(decoy)),
        PointerOutcome::Miss { score: 60 }
    );
    let pointer = target_pointer(&m);
    let record = match m.handle_pointer(pointer) {
        PointerOutcome::Hit(record) => record,
        other => panic!("expected a hit, got {other:?}"),
    };
    assert_eq!(record.score, 60);
    assert_eq!(m.scorecard().tally().score(), 100);

    wait_for_window(&mut m);
    assert_eq!((m.state().level(), m.state().sub_level()), (2, 2));
    let pointer = target_pointer(&m);
    assert_matches!(
        m.handle_pointer(pointer),
        PointerOutcome::Hit(record) if record.score == 100
    );
}

#[test]
fn report_invariants_hold_for_every_learner() {
    let learners = [
        Learner::perfect(),
        Learner::Idle,
        Learner::clumsy(1),
        Learner::clumsy(3),
        Learner::clumsy(6),
        Learner::hesitant(1),
        Learner::hesitant(2),
        Learner::hesitant(3),
    ];
    for seed in 0..10 {
        for learner in learners {
            let (mut m, _log, sink) = machine(seed);
            let report = run_playthrough(&mut m, learner, STEP)
                .unwrap_or_else(|| panic!("{learner:?} seed {seed} did not finish"));
            check_invariants(&report);
            assert_eq!(sink.reports().len(), 1);
        }
    }
}

fn check_invariants(report: &MetricsReport) {
    assert!(report.success_interactions <= report.total_interactions);
    assert!(report.success_interactions <= 9);
    assert!(report.success_interactions <= report.windows_opened);
    assert_eq!(report.responses.len() as u32, report.success_interactions);
    assert_eq!(report.coordinates.len() as u32, report.total_interactions);
    assert!((0.0..=1.0).contains(&report.aggregate_score));
    for response in &report.responses {
        assert!(response.score <= 100);
        assert_eq!(response.score % 20, 0);
    }
    if report.success_interactions == 9 {
        assert_eq!(report.reason, CompletionReason::Success);
    }
    if report.reason == CompletionReason::TimedOut {
        assert!(report.aggregate_score < 1.0);
    }
}

#[test]
fn clumsy_learner_scores_each_round_by_its_misses() {
    let (mut m, _log, _sink) = machine(5);
    let report = run_playthrough(&mut m, Learner::clumsy(2), STEP).unwrap();

    assert_eq!(report.reason, CompletionReason::Success);
    assert_eq!(report.total_interactions, 27);
    assert_eq!(report.success_interactions, 9);
    assert!(report.responses.iter().all(|r| r.score == 60));
    assert!((report.aggregate_score - 1.0 / 3.0).abs() < 1e-9);
}

#[test]
fn machine_replays_after_a_report() {
    let (mut m, _log, sink) = machine(8);
    let first = run_playthrough(&mut m, Learner::perfect(), STEP).unwrap();
    let second = run_playthrough(&mut m, Learner::Idle, STEP).unwrap();

    assert_eq!(first.reason, CompletionReason::Success);
    assert_eq!(second.reason, CompletionReason::TimedOut);
    assert_eq!(sink.reports().len(), 2);
    assert_eq!(m.last_report(), Some(&second));
}
