//! Scheduler engine -- owns the shared state and the worker threads.
//!
//! Split into focused submodules:
//! - `core`: SchedulerEngine struct, constructor, accessors, and shutdown
//! - `admission`: task validation, rate-monotonic ordering, and queue placement
//! - `execution`: worker startup and completion

mod admission;
mod core;
mod execution;
#[cfg(test)]
mod tests;

pub use self::admission::AdmissionReport;
pub use self::core::{EngineMonitor, SchedulerEngine};
pub use self::execution::EngineReport;
