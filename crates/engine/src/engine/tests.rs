use std::sync::Arc;
use std::time::Duration;

use rmsched_core::{
    ExhaustionPolicy, ReservationPolicy, ResourceVector, SchedError, SimulationConfig, TaskSpec,
};

use crate::engine::SchedulerEngine;
use crate::notify::{MemorySink, NotificationKind};
use crate::utilization::WorkerState;
use crate::worker::WorkerExit;

/// Config with 5ms time units that lets workers exit once out of work.
fn fast_config(processors: usize) -> SimulationConfig {
    SimulationConfig {
        processors,
        time_unit_ms: 5,
        exit_when_drained: true,
        ..SimulationConfig::default()
    }
}

fn engine(config: SimulationConfig) -> (SchedulerEngine, Arc<MemorySink>) {
    let sink = Arc::new(MemorySink::new());
    let engine = SchedulerEngine::new(config, sink.clone()).unwrap();
    (engine, sink)
}

fn spec(name: &str, period: i64, demand: [i64; 3], cpu: i64, reps: i64) -> TaskSpec {
    TaskSpec::new(name, period, 1, demand.to_vec(), cpu, reps)
}

fn ready_names(engine: &SchedulerEngine, cpu: usize) -> Vec<String> {
    engine.queues.ready_labels(cpu).into_iter().map(|t| t.name).collect()
}

#[test]
fn engine_creation() {
    let (engine, _) = engine(fast_config(3));
    let snapshot = engine.snapshot();
    assert_eq!(snapshot.processors.len(), 3);
    assert_eq!(engine.available_resources(), ResourceVector::from([10, 10, 10]));
    assert!(!engine.is_running());
}

#[test]
fn invalid_config_is_rejected() {
    let config = SimulationConfig {
        processors: 0,
        ..SimulationConfig::default()
    };
    assert!(SchedulerEngine::new(config, Arc::new(MemorySink::new())).is_err());
}

#[test]
fn admit_orders_by_period() {
    let (engine, _) = engine(fast_config(1));
    let report = engine
        .admit(&[
            spec("slow", 30, [0, 0, 0], 0, 1),
            spec("fast", 10, [0, 0, 0], 0, 1),
            spec("mid_a", 20, [0, 0, 0], 0, 1),
            spec("mid_b", 20, [0, 0, 0], 0, 1),
        ])
        .unwrap();

    assert_eq!(report.admitted, vec!["fast", "mid_a", "mid_b", "slow"]);
    assert_eq!(ready_names(&engine, 0), vec!["fast", "mid_a", "mid_b", "slow"]);
}

#[test]
fn admit_places_tasks_on_their_processor() {
    let (engine, _) = engine(fast_config(3));
    engine
        .admit(&[spec("a", 10, [0, 0, 0], 2, 1), spec("b", 10, [0, 0, 0], 0, 1)])
        .unwrap();

    assert_eq!(ready_names(&engine, 0), vec!["b"]);
    assert!(ready_names(&engine, 1).is_empty());
    assert_eq!(ready_names(&engine, 2), vec!["a"]);
}

#[test]
fn invalid_descriptor_rejects_whole_batch() {
    let (engine, _) = engine(fast_config(2));
    let err = engine
        .admit(&[spec("ok", 10, [1, 0, 0], 0, 1), spec("bad", 10, [0, 0, 0], 7, 1)])
        .unwrap_err();

    assert!(matches!(err, SchedError::InvalidTask { ref name, .. } if name == "bad"));
    assert!(ready_names(&engine, 0).is_empty());
}

#[test]
fn zero_repetitions_are_skipped() {
    let (engine, _) = engine(fast_config(1));
    let report = engine.admit(&[spec("T1", 0, [0, 0, 0], 0, 0)]).unwrap();

    assert!(report.admitted.is_empty());
    assert_eq!(report.skipped, vec!["T1"]);
    assert_eq!(engine.queues.ready_len(0), 0);
}

#[test]
fn inject_and_submit() {
    let (engine, _) = engine(fast_config(2));
    assert!(engine.inject(&spec("w", 0, [0, 0, 0], 1, 1)).unwrap());
    assert!(engine.submit(&spec("s", 0, [0, 0, 0], 1, 1)).unwrap());
    assert!(!engine.inject(&spec("none", 0, [0, 0, 0], 0, 0)).unwrap());
    assert!(engine.inject(&spec("neg", 0, [-1, 0, 0], 0, 1)).is_err());

    assert_eq!(engine.queues.waiting_len(), 1);
    assert_eq!(ready_names(&engine, 1), vec!["s"]);
}

#[test]
fn from_config_admits_ready_and_waiting() {
    let mut config = fast_config(2);
    config.tasks = vec![spec("a", 10, [0, 0, 0], 0, 1)];
    config.waiting = vec![spec("w", 0, [0, 0, 0], 1, 1)];

    let (engine, report) =
        SchedulerEngine::from_config(config, Arc::new(MemorySink::new())).unwrap();

    assert_eq!(report.admitted, vec!["a"]);
    assert_eq!(report.injected, vec!["w"]);
    assert_eq!(engine.queues.waiting_len(), 1);
}

#[test]
fn start_twice_fails() {
    let (mut engine, _) = engine(fast_config(1));
    engine.start().unwrap();
    assert!(matches!(engine.start(), Err(SchedError::AlreadyStarted)));
    engine.wait_for_completion().unwrap();
}

#[test]
fn wait_without_start_fails() {
    let (mut engine, _) = engine(fast_config(1));
    assert!(matches!(engine.wait_for_completion(), Err(SchedError::NotStarted)));
}

#[test]
fn shutdown_stops_idle_workers() {
    let mut config = fast_config(2);
    config.exit_when_drained = false;
    let (mut engine, _) = engine(config);

    engine.start().unwrap();
    assert!(engine.is_running());
    std::thread::sleep(Duration::from_millis(40));
    let report = engine.stop().unwrap();

    assert!(report.outcomes.iter().all(|e| matches!(e, WorkerExit::Stopped)));
    for p in &report.snapshot.processors {
        assert_eq!(p.state, WorkerState::Stopped);
        assert!(p.idle_secs > 0.0);
        assert_eq!(p.utilization_pct, 0.0);
    }
}

#[test]
fn halt_is_scoped_to_one_processor() {
    let (mut engine, sink) = engine(fast_config(2));
    engine
        .admit(&[spec("greedy", 10, [11, 0, 0], 0, 1), spec("fine", 10, [1, 1, 1], 1, 2)])
        .unwrap();

    engine.start().unwrap();
    let report = engine.wait_for_completion().unwrap();

    assert_eq!(report.halted_processors(), vec![0]);
    assert!(matches!(report.outcomes[1], WorkerExit::Drained));
    assert_eq!(report.snapshot.processors[1].runs_completed, 2);
    assert_eq!(sink.count(NotificationKind::Halted), 1);
    assert_eq!(sink.count(NotificationKind::Retired), 1);
    assert_eq!(report.snapshot.available_resources, ResourceVector::from([10, 10, 10]));
}

#[test]
fn requeue_policy_waits_for_resources() {
    let mut config = fast_config(3);
    config.resource_capacity = vec![4, 4, 4];
    config.exhaustion_policy = ExhaustionPolicy::Requeue;
    let (mut engine, sink) = engine(config);
    engine
        .admit(&[
            spec("a", 10, [2, 2, 2], 0, 2),
            spec("b", 10, [2, 2, 2], 1, 2),
            spec("c", 10, [2, 2, 2], 2, 2),
        ])
        .unwrap();

    engine.start().unwrap();
    let report = engine.wait_for_completion().unwrap();

    assert!(report.halted_processors().is_empty());
    assert_eq!(report.total_runs(), 6);
    assert_eq!(sink.count(NotificationKind::Retired), 3);
    assert_eq!(sink.count(NotificationKind::Halted), 0);
    assert_eq!(report.snapshot.available_resources, ResourceVector::from([4, 4, 4]));
}

#[test]
fn requeue_policy_still_halts_on_impossible_demand() {
    let mut config = fast_config(1);
    config.exhaustion_policy = ExhaustionPolicy::Requeue;
    let (mut engine, sink) = engine(config);
    engine.admit(&[spec("huge", 10, [0, 0, 50], 0, 1)]).unwrap();

    engine.start().unwrap();
    let report = engine.wait_for_completion().unwrap();

    assert!(report.outcomes[0].is_halted());
    assert_eq!(sink.count(NotificationKind::Halted), 1);
}

/// `first` reruns after `second` on the same processor; the two demands only
/// fit together if `first` gives its share back between runs.
fn interleaved_demands() -> [TaskSpec; 2] {
    [
        spec("first", 10, [3, 3, 3], 0, 2),
        spec("second", 20, [2, 2, 2], 0, 1),
    ]
}

#[test]
fn default_policy_holds_resources_between_repetitions() {
    let mut config = fast_config(1);
    config.resource_capacity = vec![4, 4, 4];
    let (mut engine, sink) = engine(config);
    engine.admit(&interleaved_demands()).unwrap();

    engine.start().unwrap();
    let report = engine.wait_for_completion().unwrap();

    match &report.outcomes[0] {
        WorkerExit::Halted(SchedError::ResourceExhausted { task, available, .. }) => {
            assert_eq!(task, "second");
            assert_eq!(available, &ResourceVector::from([1, 1, 1]));
        }
        other => panic!("expected resource exhaustion, got {other:?}"),
    }
    assert_eq!(report.total_runs(), 1);
    assert_eq!(sink.count(NotificationKind::Halted), 1);
    // `first` still owes a run and keeps its reservation.
    assert_eq!(report.snapshot.available_resources, ResourceVector::from([1, 1, 1]));
    assert_eq!(ready_names(&engine, 0), vec!["first"]);
}

#[test]
fn per_repetition_policy_frees_resources_for_other_tasks() {
    let mut config = fast_config(1);
    config.resource_capacity = vec![4, 4, 4];
    config.reservation_policy = ReservationPolicy::PerRepetition;
    let (mut engine, sink) = engine(config);
    engine.admit(&interleaved_demands()).unwrap();

    engine.start().unwrap();
    let report = engine.wait_for_completion().unwrap();

    assert!(matches!(report.outcomes[0], WorkerExit::Drained));
    assert_eq!(report.total_runs(), 3);
    assert_eq!(sink.count(NotificationKind::Halted), 0);
    assert_eq!(
        sink.messages(),
        vec![
            "Task first executed on CPU 1",
            "Task second executed on CPU 1",
            "Task second finished all repetitions",
            "Task first executed on CPU 1",
            "Task first finished all repetitions",
        ]
    );
    assert_eq!(report.snapshot.available_resources, ResourceVector::from([4, 4, 4]));
}

#[test]
fn per_repetition_policy_returns_resources_between_runs() {
    let mut config = fast_config(1);
    config.reservation_policy = ReservationPolicy::PerRepetition;
    let (mut engine, sink) = engine(config);
    engine.admit(&[spec("rep", 10, [3, 3, 3], 0, 3)]).unwrap();

    engine.start().unwrap();
    let report = engine.wait_for_completion().unwrap();

    assert_eq!(report.total_runs(), 3);
    assert_eq!(sink.count(NotificationKind::Dispatched), 3);
    assert_eq!(report.snapshot.available_resources, ResourceVector::from([10, 10, 10]));
}

#[test]
fn monitor_reads_while_running() {
    let mut config = fast_config(1);
    config.exit_when_drained = false;
    let (mut engine, _) = engine(config);
    engine.admit(&[spec("m", 10, [1, 0, 0], 0, 2)]).unwrap();
    let monitor = engine.monitor();

    engine.start().unwrap();
    std::thread::sleep(Duration::from_millis(150));
    let live = monitor.snapshot();
    let report = engine.stop().unwrap();

    assert!(monitor.shutdown_requested());
    assert_eq!(live.processors.len(), 1);
    assert_eq!(report.snapshot.processors[0].runs_completed, 2);
    assert_eq!(report.snapshot.processors[0].running_task, "m");
    assert!(monitor.utilization(0) > 0.0);
}
