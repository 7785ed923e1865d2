//! Per-processor busy/idle accounting.

use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use rmsched_core::IDLE_LABEL;
use serde::Serialize;

/// Lifecycle state of a processor's worker as seen by observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    /// Not started yet.
    Pending,
    /// Polling for work.
    Idle,
    /// Executing a task.
    Running,
    /// Stopped after resource exhaustion.
    Halted,
    /// Stopped by the shutdown signal.
    Stopped,
    /// Ran out of queued work.
    Drained,
}

/// Accumulated counters for one processor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessorUsage {
    pub busy: Duration,
    pub idle: Duration,
    /// Name of the task last dispatched, or `"idle"`.
    pub current_task: String,
    pub runs_completed: u64,
    pub state: WorkerState,
}

impl Default for ProcessorUsage {
    fn default() -> Self {
        Self {
            busy: Duration::ZERO,
            idle: Duration::ZERO,
            current_task: IDLE_LABEL.to_string(),
            runs_completed: 0,
            state: WorkerState::Pending,
        }
    }
}

impl ProcessorUsage {
    /// Busy share of accounted time as a percentage; 0 before any time is accounted.
    pub fn utilization(&self) -> f64 {
        let total = self.busy + self.idle;
        if total.is_zero() {
            0.0
        } else {
            self.busy.as_secs_f64() / total.as_secs_f64() * 100.0
        }
    }

    pub fn accounted(&self) -> Duration {
        self.busy + self.idle
    }
}

/// Per-processor counters.
///
/// Each slot is written only by its own worker; readers get a copy that may
/// be momentarily stale. Counters only grow for the lifetime of the tracker.
#[derive(Debug)]
pub struct UtilizationTracker {
    processors: Vec<RwLock<ProcessorUsage>>,
}

impl UtilizationTracker {
    pub fn new(processors: usize) -> Self {
        Self {
            processors: (0..processors)
                .map(|_| RwLock::new(ProcessorUsage::default()))
                .collect(),
        }
    }

    fn update(&self, processor_id: usize, f: impl FnOnce(&mut ProcessorUsage)) {
        if let Some(slot) = self.processors.get(processor_id) {
            let mut usage = slot.write().unwrap_or_else(PoisonError::into_inner);
            f(&mut usage);
        }
    }

    /// Add time spent executing and count one completed run.
    pub fn record_busy(&self, processor_id: usize, elapsed: Duration) {
        self.update(processor_id, |u| {
            u.busy += elapsed;
            u.runs_completed += 1;
        });
    }

    pub fn record_idle(&self, processor_id: usize, elapsed: Duration) {
        self.update(processor_id, |u| u.idle += elapsed);
    }

    pub fn set_current_task(&self, processor_id: usize, label: &str) {
        self.update(processor_id, |u| {
            if u.current_task != label {
                u.current_task = label.to_string();
            }
        });
    }

    pub fn set_state(&self, processor_id: usize, state: WorkerState) {
        self.update(processor_id, |u| u.state = state);
    }

    /// Copy of one processor's counters.
    pub fn usage(&self, processor_id: usize) -> Option<ProcessorUsage> {
        self.processors
            .get(processor_id)
            .map(|slot| slot.read().unwrap_or_else(PoisonError::into_inner).clone())
    }

    /// Utilization percentage for a processor; 0 for unknown ids.
    pub fn utilization(&self, processor_id: usize) -> f64 {
        self.usage(processor_id)
            .map(|u| u.utilization())
            .unwrap_or(0.0)
    }

    pub fn snapshot(&self) -> Vec<ProcessorUsage> {
        (0..self.processors.len())
            .filter_map(|id| self.usage(id))
            .collect()
    }
}
