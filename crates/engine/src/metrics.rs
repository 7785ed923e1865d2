use std::fmt;

use chrono::{DateTime, Utc};
use rmsched_core::ResourceVector;
use serde::Serialize;

use crate::pool::ResourcePool;
use crate::queues::{QueuedTask, TaskQueueSet};
use crate::utilization::{UtilizationTracker, WorkerState};

/// One processor's view for external observers.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessorSnapshot {
    /// 0-based processor id.
    pub id: usize,
    /// Busy share of accounted time, 0-100.
    pub utilization_pct: f64,
    pub busy_secs: f64,
    pub idle_secs: f64,
    pub ready_queue: Vec<QueuedTask>,
    pub running_task: String,
    pub runs_completed: u64,
    pub state: WorkerState,
}

/// Scheduler metrics exposed to pull-based observers.
///
/// Assembled from several independently locked parts, so the pieces may be
/// a few microseconds apart. Good enough for monitoring, never used for
/// scheduling decisions.
#[derive(Debug, Clone, Serialize)]
pub struct SchedulerSnapshot {
    pub taken_at: DateTime<Utc>,
    pub processors: Vec<ProcessorSnapshot>,
    pub waiting_queue: Vec<QueuedTask>,
    pub available_resources: ResourceVector,
    pub resource_capacity: ResourceVector,
}

impl SchedulerSnapshot {
    pub fn capture(pool: &ResourcePool, queues: &TaskQueueSet, tracker: &UtilizationTracker) -> Self {
        let processors = tracker
            .snapshot()
            .into_iter()
            .enumerate()
            .map(|(id, usage)| ProcessorSnapshot {
                id,
                utilization_pct: usage.utilization(),
                busy_secs: usage.busy.as_secs_f64(),
                idle_secs: usage.idle.as_secs_f64(),
                ready_queue: queues.ready_labels(id),
                running_task: usage.current_task,
                runs_completed: usage.runs_completed,
                state: usage.state,
            })
            .collect();

        Self {
            taken_at: Utc::now(),
            processors,
            waiting_queue: queues.waiting_labels(),
            available_resources: pool.available(),
            resource_capacity: pool.capacity().clone(),
        }
    }

    /// One block per processor in the classic monitor layout.
    pub fn report_lines(&self) -> Vec<String> {
        self.processors
            .iter()
            .map(|p| {
                let ready: Vec<String> = p.ready_queue.iter().map(|t| t.to_string()).collect();
                format!(
                    "CPU{}:\nCPU Utilization: {:.2}%\nReady Queue: [{}]\nRunning Task: {}\n",
                    p.id + 1,
                    p.utilization_pct,
                    ready.join(", "),
                    p.running_task
                )
            })
            .collect()
    }

    pub fn total_runs(&self) -> u64 {
        self.processors.iter().map(|p| p.runs_completed).sum()
    }
}

impl fmt::Display for SchedulerSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in self.report_lines() {
            writeln!(f, "{line}")?;
        }
        let waiting: Vec<String> = self.waiting_queue.iter().map(|t| t.to_string()).collect();
        writeln!(f, "Waiting Queue: [{}]", waiting.join(", "))?;
        write!(
            f,
            "Resources: {} of {}",
            self.available_resources, self.resource_capacity
        )
    }
}

/// Utilization time series per processor, one point per sample.
#[derive(Debug, Clone, Default, Serialize)]
pub struct UtilizationHistory {
    series: Vec<Vec<f64>>,
}

impl UtilizationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, snapshot: &SchedulerSnapshot) {
        if self.series.len() < snapshot.processors.len() {
            self.series.resize_with(snapshot.processors.len(), Vec::new);
        }
        for p in &snapshot.processors {
            self.series[p.id].push(p.utilization_pct);
        }
    }

    pub fn series(&self, processor_id: usize) -> &[f64] {
        self.series
            .get(processor_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn samples(&self) -> usize {
        self.series.first().map(Vec::len).unwrap_or(0)
    }

    /// Most recent value per processor.
    pub fn latest(&self) -> Vec<f64> {
        self.series
            .iter()
            .map(|s| s.last().copied().unwrap_or(0.0))
            .collect()
    }
}
