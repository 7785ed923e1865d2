//! Rate-monotonic multiprocessor scheduling engine.
//!
//! One worker thread per simulated processor pulls tasks from its own ready
//! queue (falling back to the shared waiting queue), reserves the task's
//! demand from the shared [`ResourcePool`], simulates execution and either
//! recirculates or retires the task. [`UtilizationTracker`] observes the
//! whole process; [`SchedulerEngine`] wires everything together.

pub mod engine;
pub mod metrics;
pub mod notify;
pub mod pool;
pub mod queues;
pub mod utilization;
pub mod worker;

pub use engine::{AdmissionReport, EngineMonitor, EngineReport, SchedulerEngine};
pub use metrics::{ProcessorSnapshot, SchedulerSnapshot, UtilizationHistory};
pub use notify::{
    ChannelSink, FanoutSink, MemorySink, Notification, NotificationKind, NotificationSink,
    TracingSink,
};
pub use pool::ResourcePool;
pub use queues::{QueuedTask, TaskQueueSet};
pub use utilization::{ProcessorUsage, UtilizationTracker, WorkerState};
pub use worker::{ProcessorWorker, WorkerExit, WorkerSettings};
