//! Progress notifications emitted by workers.
//!
//! Workers hand every [`Notification`] to a [`NotificationSink`] and move on:
//! sinks must not block and have no way to fail the scheduling loop.

use std::fmt;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// A run finished on a processor.
    Dispatched,
    /// A task finished its last repetition.
    Retired,
    /// A worker stopped because resources ran out.
    Halted,
}

/// A human-readable progress message plus the facts it was built from.
#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub task: String,
    /// 0-based processor id.
    pub processor_id: usize,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl Notification {
    fn new(kind: NotificationKind, task: &str, processor_id: usize, message: String) -> Self {
        Self {
            kind,
            task: task.to_string(),
            processor_id,
            message,
            timestamp: Utc::now(),
        }
    }

    pub fn dispatched(task: &str, processor_id: usize) -> Self {
        let message = format!("Task {} executed on CPU {}", task, processor_id + 1);
        Self::new(NotificationKind::Dispatched, task, processor_id, message)
    }

    pub fn retired(task: &str, processor_id: usize) -> Self {
        let message = format!("Task {} finished all repetitions", task);
        Self::new(NotificationKind::Retired, task, processor_id, message)
    }

    pub fn halted(task: &str, processor_id: usize) -> Self {
        let message = format!(
            "Not enough resources available for task {} on CPU {}. Stopping simulation.",
            task,
            processor_id + 1
        );
        Self::new(NotificationKind::Halted, task, processor_id, message)
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Write-only destination for notifications.
pub trait NotificationSink: Send + Sync {
    /// Accept a notification. Must return promptly.
    fn notify(&self, notification: Notification);

    /// Human-readable name for this sink (e.g., "tracing", "channel").
    fn sink_name(&self) -> &str;
}

// ── Built-in sinks ────────────────────────────────────────────

/// Writes notifications into the `tracing` log stream.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl NotificationSink for TracingSink {
    fn notify(&self, n: Notification) {
        match n.kind {
            NotificationKind::Halted => {
                tracing::warn!(task = %n.task, cpu = n.processor_id + 1, "{}", n.message)
            }
            _ => tracing::info!(task = %n.task, cpu = n.processor_id + 1, "{}", n.message),
        }
    }

    fn sink_name(&self) -> &str {
        "tracing"
    }
}

/// Forwards notifications over an unbounded channel.
///
/// Sending never blocks; once the receiver is gone notifications are dropped.
#[derive(Debug)]
pub struct ChannelSink {
    tx: Sender<Notification>,
}

impl ChannelSink {
    pub fn new() -> (Self, Receiver<Notification>) {
        let (tx, rx) = mpsc::channel();
        (Self { tx }, rx)
    }
}

impl NotificationSink for ChannelSink {
    fn notify(&self, notification: Notification) {
        if self.tx.send(notification).is_err() {
            tracing::trace!("notification receiver dropped");
        }
    }

    fn sink_name(&self) -> &str {
        "channel"
    }
}

/// Keeps every notification in memory, in arrival order.
#[derive(Debug, Default)]
pub struct MemorySink {
    received: Mutex<Vec<Notification>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.received
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn messages(&self) -> Vec<String> {
        self.notifications().into_iter().map(|n| n.message).collect()
    }

    pub fn count(&self, kind: NotificationKind) -> usize {
        self.notifications().iter().filter(|n| n.kind == kind).count()
    }
}

impl NotificationSink for MemorySink {
    fn notify(&self, notification: Notification) {
        self.received
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(notification);
    }

    fn sink_name(&self) -> &str {
        "memory"
    }
}

/// Delivers each notification to several sinks.
#[derive(Default)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn NotificationSink>>,
}

impl FanoutSink {
    pub fn new(sinks: Vec<Arc<dyn NotificationSink>>) -> Self {
        Self { sinks }
    }
}

impl NotificationSink for FanoutSink {
    fn notify(&self, notification: Notification) {
        if let Some((last, rest)) = self.sinks.split_last() {
            for sink in rest {
                sink.notify(notification.clone());
            }
            last.notify(notification);
        }
    }

    fn sink_name(&self) -> &str {
        "fanout"
    }
}
