//! Per-processor ready queues plus the shared waiting queue.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use rmsched_core::{SchedError, SchedResult, Task};
use serde::Serialize;

/// A queue entry as shown to observers: task name and remaining runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueuedTask {
    pub name: String,
    pub repetitions: u32,
}

impl QueuedTask {
    fn of(task: &Task) -> Self {
        Self {
            name: task.name().to_string(),
            repetitions: task.repetitions(),
        }
    }
}

impl std::fmt::Display for QueuedTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.name, self.repetitions)
    }
}

type Queue = Mutex<VecDeque<Task>>;

// Queue operations never panic while holding the guard, so poisoning can only
// come from an unrelated panic and the deque itself is intact.
fn guard(queue: &Queue) -> MutexGuard<'_, VecDeque<Task>> {
    queue.lock().unwrap_or_else(PoisonError::into_inner)
}

/// FIFO queues: one per processor and one shared.
///
/// Each queue has its own lock so processors never contend on each other's
/// ready queue. Tasks move by value; a popped task is owned by the caller
/// until it is pushed again.
#[derive(Debug)]
pub struct TaskQueueSet {
    ready: Vec<Queue>,
    waiting: Queue,
}

impl TaskQueueSet {
    pub fn new(processors: usize) -> Self {
        Self {
            ready: (0..processors).map(|_| Mutex::new(VecDeque::new())).collect(),
            waiting: Mutex::new(VecDeque::new()),
        }
    }

    fn ready_queue(&self, processor_id: usize) -> SchedResult<&Queue> {
        self.ready.get(processor_id).ok_or_else(|| {
            SchedError::Config(format!(
                "processor {} outside [0, {})",
                processor_id,
                self.ready.len()
            ))
        })
    }

    /// Append to the tail of a processor's ready queue.
    pub fn push_ready(&self, processor_id: usize, task: Task) -> SchedResult<()> {
        guard(self.ready_queue(processor_id)?).push_back(task);
        Ok(())
    }

    /// Take the head of a processor's ready queue, if any.
    pub fn pop_ready(&self, processor_id: usize) -> Option<Task> {
        self.ready.get(processor_id).and_then(|q| guard(q).pop_front())
    }

    pub fn push_waiting(&self, task: Task) {
        guard(&self.waiting).push_back(task);
    }

    pub fn pop_waiting(&self) -> Option<Task> {
        guard(&self.waiting).pop_front()
    }

    pub fn ready_len(&self, processor_id: usize) -> usize {
        self.ready.get(processor_id).map(|q| guard(q).len()).unwrap_or(0)
    }

    pub fn waiting_len(&self) -> usize {
        guard(&self.waiting).len()
    }

    /// Head-to-tail listing of a ready queue.
    pub fn ready_labels(&self, processor_id: usize) -> Vec<QueuedTask> {
        self.ready
            .get(processor_id)
            .map(|q| guard(q).iter().map(QueuedTask::of).collect())
            .unwrap_or_default()
    }

    pub fn waiting_labels(&self) -> Vec<QueuedTask> {
        guard(&self.waiting).iter().map(QueuedTask::of).collect()
    }
}
