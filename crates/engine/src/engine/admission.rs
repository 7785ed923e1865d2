use rmsched_core::{SchedResult, Task, TaskSpec};
use serde::Serialize;
use tracing::{debug, info};

use super::SchedulerEngine;

/// Where admitted tasks went, by name.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AdmissionReport {
    /// Placed on ready queues, in dispatch order.
    pub admitted: Vec<String>,
    /// Placed on the waiting queue.
    pub injected: Vec<String>,
    /// Zero repetitions; nothing to run.
    pub skipped: Vec<String>,
}

impl SchedulerEngine {
    /// Admit an initial task set.
    ///
    /// Every descriptor is validated before any is queued, so an invalid entry
    /// rejects the whole batch. Valid tasks are ordered by ascending period
    /// (rate-monotonic: higher rate first, admission order among equals) and
    /// appended to their processor's ready queue.
    pub fn admit(&self, specs: &[TaskSpec]) -> SchedResult<AdmissionReport> {
        let limits = self.config.limits();
        let mut tasks = specs
            .iter()
            .map(|spec| spec.validate(&limits))
            .collect::<SchedResult<Vec<Task>>>()?;
        tasks.sort_by_key(|task| task.period());

        let mut report = AdmissionReport::default();
        for task in tasks {
            let name = task.name().to_string();
            if self.place_ready(task)? {
                report.admitted.push(name);
            } else {
                report.skipped.push(name);
            }
        }

        info!(
            admitted = report.admitted.len(),
            skipped = report.skipped.len(),
            "Task set admitted"
        );
        Ok(report)
    }

    /// Add one task to its processor's ready queue, e.g. while running.
    ///
    /// Returns `false` when the task has no repetitions and was dropped.
    pub fn submit(&self, spec: &TaskSpec) -> SchedResult<bool> {
        let task = spec.validate(&self.config.limits())?;
        self.place_ready(task)
    }

    /// Add one task to the shared waiting queue, where any idle processor may
    /// pick it up.
    ///
    /// Returns `false` when the task has no repetitions and was dropped.
    pub fn inject(&self, spec: &TaskSpec) -> SchedResult<bool> {
        let task = spec.validate(&self.config.limits())?;
        if task.is_complete() {
            debug!(task = task.name(), "zero repetitions, not injected");
            return Ok(false);
        }
        debug!(task = task.name(), "injected into waiting queue");
        self.queues.push_waiting(task);
        Ok(true)
    }

    fn place_ready(&self, task: Task) -> SchedResult<bool> {
        if task.is_complete() {
            debug!(task = task.name(), "zero repetitions, not queued");
            return Ok(false);
        }
        debug!(
            task = task.name(),
            id = %task.id(),
            cpu = task.processor_id() + 1,
            repetitions = task.repetitions(),
            deadlines = task.deadlines().len(),
            "queued"
        );
        self.queues.push_ready(task.processor_id(), task)?;
        Ok(true)
    }
}
