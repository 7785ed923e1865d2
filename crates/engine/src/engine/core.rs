use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

use rmsched_core::{ResourceVector, SchedResult, SimulationConfig};
use tracing::info;

use crate::metrics::SchedulerSnapshot;
use crate::notify::NotificationSink;
use crate::pool::ResourcePool;
use crate::queues::TaskQueueSet;
use crate::utilization::UtilizationTracker;
use crate::worker::WorkerExit;

use super::AdmissionReport;

/// The scheduling engine. Owns the resource pool, the queues and the
/// utilization counters, and runs one [`ProcessorWorker`](crate::ProcessorWorker)
/// thread per processor.
pub struct SchedulerEngine {
    pub(super) config: SimulationConfig,
    /// Shared resource counters.
    pub(super) pool: Arc<ResourcePool>,
    /// Ready queues plus the waiting queue.
    pub(super) queues: Arc<TaskQueueSet>,
    /// Per-processor busy/idle accounting.
    pub(super) tracker: Arc<UtilizationTracker>,
    /// Destination for progress notifications.
    pub(super) sink: Arc<dyn NotificationSink>,
    /// Shutdown signal.
    pub(super) shutdown: Arc<AtomicBool>,
    /// Running worker threads, keyed by processor id.
    pub(super) workers: Vec<(usize, JoinHandle<WorkerExit>)>,
    pub(super) started_at: Option<Instant>,
}

impl SchedulerEngine {
    /// Create an engine with empty queues and a full resource pool.
    pub fn new(config: SimulationConfig, sink: Arc<dyn NotificationSink>) -> SchedResult<Self> {
        config.validate()?;
        info!(
            "Scheduler engine created: {} processors, resources {}",
            config.processors,
            config.capacity()
        );

        Ok(Self {
            pool: Arc::new(ResourcePool::new(config.capacity())),
            queues: Arc::new(TaskQueueSet::new(config.processors)),
            tracker: Arc::new(UtilizationTracker::new(config.processors)),
            sink,
            shutdown: Arc::new(AtomicBool::new(false)),
            workers: Vec::new(),
            started_at: None,
            config,
        })
    }

    /// Create an engine and admit the config's `tasks` and `waiting` entries.
    pub fn from_config(
        config: SimulationConfig,
        sink: Arc<dyn NotificationSink>,
    ) -> SchedResult<(Self, AdmissionReport)> {
        let engine = Self::new(config, sink)?;
        let mut report = engine.admit(&engine.config.tasks)?;
        for spec in &engine.config.waiting {
            if engine.inject(spec)? {
                report.injected.push(spec.name.clone());
            } else {
                report.skipped.push(spec.name.clone());
            }
        }
        Ok((engine, report))
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Current metrics for all processors.
    pub fn snapshot(&self) -> SchedulerSnapshot {
        SchedulerSnapshot::capture(&self.pool, &self.queues, &self.tracker)
    }

    pub fn available_resources(&self) -> ResourceVector {
        self.pool.available()
    }

    /// Utilization percentage of one processor.
    pub fn utilization(&self, processor_id: usize) -> f64 {
        self.tracker.utilization(processor_id)
    }

    /// A cloneable read-only handle for observers on other threads.
    pub fn monitor(&self) -> EngineMonitor {
        EngineMonitor {
            pool: Arc::clone(&self.pool),
            queues: Arc::clone(&self.queues),
            tracker: Arc::clone(&self.tracker),
            shutdown: Arc::clone(&self.shutdown),
        }
    }

    /// Signal every worker to stop at its next state boundary.
    pub fn shutdown(&self) {
        info!("Scheduler shutdown requested");
        self.shutdown.store(true, Ordering::Relaxed);
    }

    /// Get an Arc to the shutdown flag (for external shutdown signaling).
    pub fn shutdown_signal(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    /// True between `start` and `wait_for_completion`.
    pub fn is_running(&self) -> bool {
        !self.workers.is_empty()
    }
}

impl Drop for SchedulerEngine {
    fn drop(&mut self) {
        if !self.workers.is_empty() {
            self.shutdown.store(true, Ordering::Relaxed);
        }
    }
}

/// Read-only view of a running engine, for observers on other threads.
#[derive(Clone)]
pub struct EngineMonitor {
    pool: Arc<ResourcePool>,
    queues: Arc<TaskQueueSet>,
    tracker: Arc<UtilizationTracker>,
    shutdown: Arc<AtomicBool>,
}

impl EngineMonitor {
    pub fn snapshot(&self) -> SchedulerSnapshot {
        SchedulerSnapshot::capture(&self.pool, &self.queues, &self.tracker)
    }

    pub fn utilization(&self, processor_id: usize) -> f64 {
        self.tracker.utilization(processor_id)
    }

    pub fn shutdown_requested(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }
}
