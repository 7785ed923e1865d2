//! The per-processor execution loop.
//!
//! ```text
//! FETCH ──► ADMIT ──► RUN ──► RECIRCULATE_OR_RETIRE ──► FETCH
//!             │
//!             └─(no resources, halt policy)──► HALTED
//! ```
//!
//! Execution is non-preemptive: once a task is admitted the worker holds the
//! processor for the task's whole execution time. The shutdown signal is only
//! checked between runs.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rmsched_core::{ExhaustionPolicy, ReservationPolicy, SchedError, SimulationConfig, Task};
use tracing::{debug, info, warn, Level};

use crate::metrics::SchedulerSnapshot;
use crate::notify::{Notification, NotificationSink};
use crate::pool::ResourcePool;
use crate::queues::TaskQueueSet;
use crate::utilization::{UtilizationTracker, WorkerState};

/// Timing and policy knobs shared by every worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerSettings {
    /// Back-off when both queues are empty; also the longest a stop request waits.
    pub idle_poll: Duration,
    /// Deallocation delay before a retiring task's resources return.
    pub release_delay: Duration,
    pub exhaustion_policy: ExhaustionPolicy,
    pub reservation_policy: ReservationPolicy,
    pub exit_when_drained: bool,
}

impl From<&SimulationConfig> for WorkerSettings {
    fn from(config: &SimulationConfig) -> Self {
        Self {
            idle_poll: config.idle_poll(),
            release_delay: config.release_delay(),
            exhaustion_policy: config.exhaustion_policy,
            reservation_policy: config.reservation_policy,
            exit_when_drained: config.exit_when_drained,
        }
    }
}

/// Why a worker loop ended.
#[derive(Debug)]
pub enum WorkerExit {
    /// A task's demand could not be met; carries [`SchedError::ResourceExhausted`].
    Halted(SchedError),
    /// The shutdown signal was observed.
    Stopped,
    /// Own ready queue and the waiting queue were both empty.
    Drained,
    /// The worker thread panicked.
    Panicked,
}

impl WorkerExit {
    pub fn is_halted(&self) -> bool {
        matches!(self, Self::Halted(_))
    }

    pub fn state(&self) -> WorkerState {
        match self {
            Self::Halted(_) | Self::Panicked => WorkerState::Halted,
            Self::Stopped => WorkerState::Stopped,
            Self::Drained => WorkerState::Drained,
        }
    }
}

impl std::fmt::Display for WorkerExit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Halted(e) => write!(f, "halted: {e}"),
            Self::Stopped => f.write_str("stopped"),
            Self::Drained => f.write_str("drained"),
            Self::Panicked => f.write_str("panicked"),
        }
    }
}

enum Admission {
    Granted(Task),
    Requeued,
    Halt(SchedError),
}

/// One simulated processor.
pub struct ProcessorWorker {
    id: usize,
    pool: Arc<ResourcePool>,
    queues: Arc<TaskQueueSet>,
    tracker: Arc<UtilizationTracker>,
    sink: Arc<dyn NotificationSink>,
    shutdown: Arc<AtomicBool>,
    settings: WorkerSettings,
}

impl ProcessorWorker {
    pub fn new(
        id: usize,
        pool: Arc<ResourcePool>,
        queues: Arc<TaskQueueSet>,
        tracker: Arc<UtilizationTracker>,
        sink: Arc<dyn NotificationSink>,
        shutdown: Arc<AtomicBool>,
        settings: WorkerSettings,
    ) -> Self {
        Self {
            id,
            pool,
            queues,
            tracker,
            sink,
            shutdown,
            settings,
        }
    }

    /// Run the loop until halt, shutdown, or (optionally) drain.
    pub fn run(self) -> WorkerExit {
        debug!(cpu = self.id + 1, "worker started");
        self.tracker.set_state(self.id, WorkerState::Idle);

        let exit = loop {
            if self.shutdown.load(Ordering::Relaxed) {
                break WorkerExit::Stopped;
            }

            let Some(task) = self.fetch() else {
                if self.settings.exit_when_drained {
                    break WorkerExit::Drained;
                }
                self.idle(self.settings.idle_poll);
                continue;
            };

            let task = match self.admit(task) {
                Admission::Granted(task) => task,
                Admission::Requeued => continue,
                Admission::Halt(err) => break WorkerExit::Halted(err),
            };

            self.execute(&task);
            self.recirculate_or_retire(task);
            self.tracker.set_state(self.id, WorkerState::Idle);
        };

        self.tracker.set_state(self.id, exit.state());
        debug!(cpu = self.id + 1, exit = ?exit, "worker finished");
        exit
    }

    /// Own ready queue first, then the shared waiting queue.
    fn fetch(&self) -> Option<Task> {
        if let Some(task) = self.queues.pop_ready(self.id) {
            return Some(task);
        }
        let task = self.queues.pop_waiting()?;
        debug!(cpu = self.id + 1, task = task.name(), "took task from waiting queue");
        Some(task)
    }

    fn idle(&self, pause: Duration) {
        let start = Instant::now();
        std::thread::sleep(pause);
        self.tracker.record_idle(self.id, start.elapsed());
    }

    fn admit(&self, mut task: Task) -> Admission {
        if task.holds_reservation() || self.pool.try_reserve(task.demand()) {
            task.set_holds_reservation(true);
            return Admission::Granted(task);
        }

        let available = self.pool.available();
        let hopeless = !self.pool.can_ever_satisfy(task.demand());
        if self.settings.exhaustion_policy == ExhaustionPolicy::Requeue && !hopeless {
            debug!(
                cpu = self.id + 1,
                task = task.name(),
                demand = %task.demand(),
                available = %available,
                "resources busy, requeueing"
            );
            if let Err(e) = self.queues.push_ready(self.id, task) {
                warn!(cpu = self.id + 1, error = %e, "requeue failed, task dropped");
            }
            self.idle(self.settings.idle_poll);
            return Admission::Requeued;
        }

        warn!(
            cpu = self.id + 1,
            task = task.name(),
            demand = %task.demand(),
            available = %available,
            "not enough resources, stopping worker"
        );
        self.sink.notify(Notification::halted(task.name(), self.id));
        Admission::Halt(SchedError::ResourceExhausted {
            task: task.name().to_string(),
            cpu: self.id + 1,
            demand: task.demand().clone(),
            available,
        })
    }

    fn execute(&self, task: &Task) {
        self.tracker.set_state(self.id, WorkerState::Running);
        let start = Instant::now();
        std::thread::sleep(task.execution_time());
        let elapsed = start.elapsed();

        self.tracker.record_busy(self.id, elapsed);
        self.tracker.set_current_task(self.id, task.name());

        if tracing::enabled!(Level::DEBUG) {
            let snapshot = SchedulerSnapshot::capture(&self.pool, &self.queues, &self.tracker);
            for line in snapshot.report_lines() {
                debug!("{line}");
            }
        }
        info!(cpu = self.id + 1, task = task.name(), elapsed_ms = elapsed.as_millis() as u64, "run complete");
        self.sink.notify(Notification::dispatched(task.name(), self.id));
    }

    fn recirculate_or_retire(&self, mut task: Task) {
        if task.complete_run() {
            if self.settings.reservation_policy == ReservationPolicy::PerRepetition {
                self.pool.release(task.demand());
                task.set_holds_reservation(false);
            }
            // Recirculated tasks stay on the processor that ran them.
            if let Err(e) = self.queues.push_ready(self.id, task) {
                warn!(cpu = self.id + 1, error = %e, "recirculation failed, task dropped");
            }
            return;
        }

        info!(cpu = self.id + 1, task = task.name(), "task retired");
        self.sink.notify(Notification::retired(task.name(), self.id));

        std::thread::sleep(self.settings.release_delay);
        if task.holds_reservation() {
            self.pool.release(task.demand());
            task.set_holds_reservation(false);
        }
    }
}
