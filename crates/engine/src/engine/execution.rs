use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use rmsched_core::{SchedError, SchedResult};
use tracing::{error, info};

use crate::metrics::SchedulerSnapshot;
use crate::utilization::WorkerState;
use crate::worker::{ProcessorWorker, WorkerExit, WorkerSettings};

use super::SchedulerEngine;

/// Outcome of a finished simulation.
#[derive(Debug)]
pub struct EngineReport {
    /// One entry per processor, indexed by processor id.
    pub outcomes: Vec<WorkerExit>,
    /// Final metrics after every worker exited.
    pub snapshot: SchedulerSnapshot,
    pub elapsed: Duration,
}

impl EngineReport {
    /// Processors whose worker halted on resource exhaustion (or panicked).
    pub fn halted_processors(&self) -> Vec<usize> {
        self.outcomes
            .iter()
            .enumerate()
            .filter(|(_, exit)| exit.state() == WorkerState::Halted)
            .map(|(id, _)| id)
            .collect()
    }

    pub fn total_runs(&self) -> u64 {
        self.snapshot.total_runs()
    }
}

impl SchedulerEngine {
    /// Start one worker thread per processor.
    pub fn start(&mut self) -> SchedResult<()> {
        if self.started_at.is_some() {
            return Err(SchedError::AlreadyStarted);
        }

        let settings = WorkerSettings::from(&self.config);
        info!(
            "Scheduler starting with {} processors, exhaustion policy {:?}, reservation policy {:?}",
            self.config.processors, settings.exhaustion_policy, settings.reservation_policy
        );
        self.started_at = Some(Instant::now());

        for id in 0..self.config.processors {
            let worker = ProcessorWorker::new(
                id,
                Arc::clone(&self.pool),
                Arc::clone(&self.queues),
                Arc::clone(&self.tracker),
                Arc::clone(&self.sink),
                Arc::clone(&self.shutdown),
                settings,
            );
            let spawned = std::thread::Builder::new()
                .name(format!("cpu-{}", id + 1))
                .spawn(move || worker.run());

            match spawned {
                Ok(handle) => self.workers.push((id, handle)),
                Err(e) => {
                    error!(cpu = id + 1, error = %e, "failed to spawn worker");
                    self.shutdown.store(true, Ordering::Relaxed);
                    return Err(SchedError::Spawn(e.to_string()));
                }
            }
        }

        Ok(())
    }

    /// Block until every worker has halted, stopped or drained.
    ///
    /// Without `exit_when_drained` a worker only ends on resource exhaustion
    /// or [`shutdown`](Self::shutdown), so some other thread must call that.
    pub fn wait_for_completion(&mut self) -> SchedResult<EngineReport> {
        let started_at = self.started_at.ok_or(SchedError::NotStarted)?;

        let mut outcomes = Vec::with_capacity(self.workers.len());
        for (id, handle) in self.workers.drain(..) {
            let exit = handle.join().unwrap_or_else(|_| {
                error!(cpu = id + 1, "worker thread panicked");
                self.tracker.set_state(id, WorkerState::Halted);
                WorkerExit::Panicked
            });
            outcomes.push(exit);
        }

        let report = EngineReport {
            outcomes,
            snapshot: self.snapshot(),
            elapsed: started_at.elapsed(),
        };
        info!(
            "Scheduler finished in {:.2}s: {} runs, halted processors {:?}",
            report.elapsed.as_secs_f64(),
            report.total_runs(),
            report.halted_processors()
        );
        Ok(report)
    }

    /// Signal shutdown and wait for the workers to exit.
    pub fn stop(&mut self) -> SchedResult<EngineReport> {
        self.shutdown();
        self.wait_for_completion()
    }
}
