//! End-to-end runs of the engine on small workloads.

use std::sync::Arc;
use std::time::{Duration, Instant};

use rmsched_core::{ExhaustionPolicy, ResourceVector, SchedError, SimulationConfig, TaskSpec};
use rmsched_engine::{
    MemorySink, NotificationKind, SchedulerEngine, UtilizationHistory, WorkerExit, WorkerState,
};

fn config(processors: usize, time_unit_ms: u64) -> SimulationConfig {
    SimulationConfig {
        processors,
        time_unit_ms,
        exit_when_drained: true,
        ..SimulationConfig::default()
    }
}

fn run(config: SimulationConfig, tasks: &[TaskSpec]) -> (rmsched_engine::EngineReport, Arc<MemorySink>) {
    let sink = Arc::new(MemorySink::new());
    let mut engine = SchedulerEngine::new(config, sink.clone()).unwrap();
    engine.admit(tasks).unwrap();
    engine.start().unwrap();
    let report = engine.wait_for_completion().unwrap();
    (report, sink)
}

// ── Scenario A: one repeating task ──────────────────────────

#[test]
fn single_task_runs_each_repetition_and_returns_resources() {
    let task = TaskSpec::new("A", 10, 1, vec![2, 0, 0], 0, 2);
    let (report, sink) = run(config(3, 10), &[task]);

    assert_eq!(report.snapshot.processors[0].runs_completed, 2);
    assert_eq!(report.snapshot.available_resources, ResourceVector::from([10, 10, 10]));
    assert_eq!(
        sink.messages(),
        vec![
            "Task A executed on CPU 1",
            "Task A executed on CPU 1",
            "Task A finished all repetitions",
        ]
    );
    assert!(report.halted_processors().is_empty());
}

// ── Scenario B: demand above capacity ───────────────────────

#[test]
fn oversized_demand_halts_worker_before_running() {
    let task = TaskSpec::new("big", 10, 1, vec![11, 0, 0], 0, 1);
    let (report, sink) = run(config(1, 5), &[task]);

    match &report.outcomes[0] {
        WorkerExit::Halted(SchedError::ResourceExhausted { task, cpu, .. }) => {
            assert_eq!(task, "big");
            assert_eq!(*cpu, 1);
        }
        other => panic!("expected resource exhaustion, got {other:?}"),
    }
    assert_eq!(report.snapshot.processors[0].runs_completed, 0);
    assert_eq!(report.snapshot.processors[0].state, WorkerState::Halted);
    assert_eq!(sink.count(NotificationKind::Dispatched), 0);
    assert_eq!(
        sink.messages(),
        vec!["Not enough resources available for task big on CPU 1. Stopping simulation."]
    );
    assert_eq!(report.snapshot.available_resources, ResourceVector::from([10, 10, 10]));
}

// ── Scenario C: FIFO order on one processor ─────────────────

#[test]
fn same_processor_tasks_run_in_admission_order() {
    let tasks = [
        TaskSpec::new("first", 50, 1, vec![1, 0, 0], 0, 1),
        TaskSpec::new("second", 50, 1, vec![0, 1, 0], 0, 1),
    ];
    let (report, sink) = run(config(1, 5), &tasks);

    let dispatched: Vec<String> = sink
        .notifications()
        .into_iter()
        .filter(|n| n.kind == NotificationKind::Dispatched)
        .map(|n| n.task)
        .collect();
    assert_eq!(dispatched, vec!["first", "second"]);
    assert_eq!(sink.count(NotificationKind::Retired), 2);
    assert_eq!(report.total_runs(), 2);
}

// ── Scenario D: waiting queue is drained before idling ──────

#[test]
fn idle_worker_takes_task_from_waiting_queue() {
    let sink = Arc::new(MemorySink::new());
    let mut engine = SchedulerEngine::new(config(1, 5), sink.clone()).unwrap();
    engine
        .inject(&TaskSpec::new("stray", 0, 1, vec![1, 1, 1], 0, 2))
        .unwrap();

    engine.start().unwrap();
    let report = engine.wait_for_completion().unwrap();

    assert_eq!(report.snapshot.processors[0].runs_completed, 2);
    assert!(report.snapshot.waiting_queue.is_empty());
    assert_eq!(sink.messages()[0], "Task stray executed on CPU 1");
    assert_eq!(sink.count(NotificationKind::Retired), 1);
    // Nothing to idle on: the worker drained without backing off.
    assert_eq!(report.snapshot.processors[0].idle_secs, 0.0);
}

#[test]
fn waiting_task_recirculates_on_the_processor_that_ran_it() {
    let sink = Arc::new(MemorySink::new());
    let mut cfg = config(2, 5);
    cfg.exit_when_drained = false;
    let mut engine = SchedulerEngine::new(cfg, sink.clone()).unwrap();
    engine
        .inject(&TaskSpec::new("roamer", 0, 1, vec![0, 0, 0], 0, 3))
        .unwrap();

    engine.start().unwrap();
    let deadline = Instant::now() + Duration::from_secs(5);
    while sink.count(NotificationKind::Retired) == 0 && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(5));
    }
    let report = engine.stop().unwrap();

    let cpus: Vec<usize> = sink
        .notifications()
        .into_iter()
        .filter(|n| n.kind == NotificationKind::Dispatched)
        .map(|n| n.processor_id)
        .collect();
    assert_eq!(cpus.len(), 3);
    assert!(cpus.iter().all(|c| *c == cpus[0]));
    assert_eq!(report.total_runs(), 3);
}

// ── Properties ──────────────────────────────────────────────

#[test]
fn repetitions_are_run_exactly() {
    let tasks = [
        TaskSpec::new("five", 10, 1, vec![1, 1, 1], 0, 5),
        TaskSpec::new("one", 20, 1, vec![1, 1, 1], 1, 1),
        TaskSpec::new("three", 30, 1, vec![1, 1, 1], 1, 3),
    ];
    let (report, sink) = run(config(2, 2), &tasks);

    let count = |name: &str| {
        sink.notifications()
            .iter()
            .filter(|n| n.kind == NotificationKind::Dispatched && n.task == name)
            .count()
    };
    assert_eq!(count("five"), 5);
    assert_eq!(count("one"), 1);
    assert_eq!(count("three"), 3);
    assert_eq!(report.total_runs(), 9);
    assert_eq!(sink.count(NotificationKind::Retired), 3);
}

#[test]
fn accounting_tracks_elapsed_time() {
    let mut cfg = config(1, 10);
    cfg.exit_when_drained = false;
    cfg.release_delay_units = 0;
    let sink = Arc::new(MemorySink::new());
    let mut engine = SchedulerEngine::new(cfg, sink).unwrap();
    engine
        .admit(&[TaskSpec::new("t", 10, 2, vec![0, 0, 0], 0, 3)])
        .unwrap();
    let monitor = engine.monitor();

    let start = Instant::now();
    engine.start().unwrap();

    let mut history = UtilizationHistory::new();
    let mut last = 0.0;
    for _ in 0..15 {
        std::thread::sleep(Duration::from_millis(10));
        let snap = monitor.snapshot();
        let accounted = snap.processors[0].busy_secs + snap.processors[0].idle_secs;
        assert!(accounted >= last, "accounting went backwards");
        last = accounted;
        history.record(&snap);
    }
    let report = engine.stop().unwrap();
    let elapsed = start.elapsed().as_secs_f64();

    let p = &report.snapshot.processors[0];
    let accounted = p.busy_secs + p.idle_secs;
    assert!(accounted <= elapsed);
    assert!(accounted >= elapsed / 2.0, "accounted {accounted}s of {elapsed}s");
    assert!(p.busy_secs >= 0.06);
    assert_eq!(history.samples(), 15);
    assert!(history.series(0).iter().all(|u| (0.0..=100.0).contains(u)));
}

#[test]
fn contended_pool_never_leaks_or_overflows() {
    // Every task holds its demand across both runs, so processors must wait
    // for each other's retirements.
    let mut cfg = config(3, 2);
    cfg.resource_capacity = vec![4, 6, 4];
    cfg.exhaustion_policy = ExhaustionPolicy::Requeue;
    let tasks: Vec<TaskSpec> = (0..9)
        .map(|i| TaskSpec::new(format!("t{i}"), 10 + i, 1, vec![1, 2, 1], i % 3, 2))
        .collect();

    let sink = Arc::new(MemorySink::new());
    let mut engine = SchedulerEngine::new(cfg, sink.clone()).unwrap();
    engine.admit(&tasks).unwrap();
    let monitor = engine.monitor();
    engine.start().unwrap();

    let watcher = std::thread::spawn(move || {
        for _ in 0..50 {
            let snap = monitor.snapshot();
            assert!(snap
                .available_resources
                .as_slice()
                .iter()
                .zip(snap.resource_capacity.as_slice())
                .all(|(a, c)| a <= c));
            std::thread::sleep(Duration::from_millis(1));
        }
    });

    let report = engine.wait_for_completion().unwrap();
    watcher.join().unwrap();

    assert_eq!(report.total_runs(), 18);
    assert_eq!(sink.count(NotificationKind::Retired), 9);
    assert!(report.halted_processors().is_empty());
    assert_eq!(report.snapshot.available_resources, ResourceVector::from([4, 6, 4]));
}

#[test]
fn reference_workload_completes() {
    let mut cfg = SimulationConfig::reference();
    cfg.time_unit_ms = 1;
    cfg.exit_when_drained = true;
    let sink = Arc::new(MemorySink::new());
    let (mut engine, admission) = SchedulerEngine::from_config(cfg, sink.clone()).unwrap();

    assert_eq!(admission.skipped, vec!["T1"]);
    assert_eq!(admission.admitted, vec!["T2", "T3", "T4", "T5", "T6"]);

    engine.start().unwrap();
    let report = engine.wait_for_completion().unwrap();

    assert!(report.halted_processors().is_empty());
    assert_eq!(report.total_runs(), 11);
    assert_eq!(sink.count(NotificationKind::Retired), 5);
    assert_eq!(report.snapshot.available_resources, ResourceVector::from([10, 10, 10]));
}
