//! Task descriptors and the validated tasks the engine schedules.
//!
//! A [`TaskSpec`] is the raw descriptor as it arrives from configuration or
//! an ad-hoc submission. It carries signed integers so that malformed input
//! (negative demand, negative processor id) can be reported instead of being
//! silently wrapped by a deserializer. [`TaskSpec::validate`] turns it into a
//! [`Task`], the owned value that moves between queues and workers.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{SchedError, SchedResult};

/// Label reported for a processor that has not run anything yet.
pub const IDLE_LABEL: &str = "idle";

// ── Resource vectors ──────────────────────────────────────────

/// One non-negative quantity per resource kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceVector(Vec<u32>);

impl ResourceVector {
    pub fn new(values: Vec<u32>) -> Self {
        Self(values)
    }

    /// Number of resource kinds this vector describes.
    pub fn kinds(&self) -> usize {
        self.0.len()
    }

    pub fn as_slice(&self) -> &[u32] {
        &self.0
    }

    /// True when every component of `self` is covered by `available`.
    pub fn fits_within(&self, available: &ResourceVector) -> bool {
        self.0.len() == available.0.len()
            && self.0.iter().zip(&available.0).all(|(d, a)| d <= a)
    }
}

impl From<Vec<u32>> for ResourceVector {
    fn from(values: Vec<u32>) -> Self {
        Self(values)
    }
}

impl<const N: usize> From<[u32; N]> for ResourceVector {
    fn from(values: [u32; N]) -> Self {
        Self(values.to_vec())
    }
}

impl fmt::Display for ResourceVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, v) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{v}")?;
        }
        write!(f, "]")
    }
}

// ── Raw descriptors ───────────────────────────────────────────

/// Bounds a descriptor is validated against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskLimits {
    pub processors: usize,
    pub resource_kinds: usize,
    /// Wall-clock length of one simulated time unit.
    pub time_unit: Duration,
}

/// A task descriptor as submitted, before validation.
///
/// `period` and `execution_time` are expressed in simulated time units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSpec {
    pub name: String,
    /// 0 means the task is not periodic.
    #[serde(default)]
    pub period: i64,
    pub execution_time: i64,
    pub resources: Vec<i64>,
    pub processor_id: i64,
    #[serde(default = "default_repetitions")]
    pub repetitions: i64,
}

fn default_repetitions() -> i64 {
    1
}

impl TaskSpec {
    pub fn new(
        name: impl Into<String>,
        period: i64,
        execution_time: i64,
        resources: Vec<i64>,
        processor_id: i64,
        repetitions: i64,
    ) -> Self {
        Self {
            name: name.into(),
            period,
            execution_time,
            resources,
            processor_id,
            repetitions,
        }
    }

    /// Check every field against `limits` and build the owned [`Task`].
    ///
    /// Nothing is clamped: any out-of-range value is an
    /// [`SchedError::InvalidTask`].
    pub fn validate(&self, limits: &TaskLimits) -> SchedResult<Task> {
        let name = self.name.as_str();

        if self.resources.len() != limits.resource_kinds {
            return Err(SchedError::invalid(
                name,
                format!(
                    "expected {} resource kinds, got {}",
                    limits.resource_kinds,
                    self.resources.len()
                ),
            ));
        }
        let mut demand = Vec::with_capacity(self.resources.len());
        for (kind, value) in self.resources.iter().enumerate() {
            let v = u32::try_from(*value).map_err(|_| {
                SchedError::invalid(name, format!("resource {} demand {} out of range", kind + 1, value))
            })?;
            demand.push(v);
        }

        let processor_id = usize::try_from(self.processor_id)
            .ok()
            .filter(|id| *id < limits.processors)
            .ok_or_else(|| {
                SchedError::invalid(
                    name,
                    format!(
                        "processor id {} outside [0, {})",
                        self.processor_id, limits.processors
                    ),
                )
            })?;

        let repetitions = u32::try_from(self.repetitions).map_err(|_| {
            SchedError::invalid(name, format!("repetitions {} out of range", self.repetitions))
        })?;

        let period = scale_units(name, "period", self.period, limits.time_unit)?;
        let execution_time =
            scale_units(name, "execution_time", self.execution_time, limits.time_unit)?;
        let deadlines = compute_deadlines(period, repetitions).ok_or_else(|| {
            SchedError::invalid(
                name,
                format!("deadlines overflow for period {} over {} repetitions", self.period, repetitions),
            )
        })?;

        Ok(Task {
            id: Uuid::new_v4(),
            name: self.name.clone(),
            period,
            execution_time,
            demand: ResourceVector::new(demand),
            processor_id,
            repetitions,
            deadlines,
            holds_reservation: false,
        })
    }
}

fn scale_units(name: &str, field: &str, units: i64, unit: Duration) -> SchedResult<Duration> {
    u32::try_from(units)
        .ok()
        .and_then(|u| unit.checked_mul(u))
        .ok_or_else(|| SchedError::invalid(name, format!("{field} {units} out of range")))
}

/// Absolute deadlines `period × (i+1)` for each repetition index.
///
/// Aperiodic tasks (`period == 0`) have no deadlines. `None` if the last
/// deadline does not fit in a `Duration`.
pub fn compute_deadlines(period: Duration, repetitions: u32) -> Option<Vec<Duration>> {
    if period.is_zero() {
        return Some(Vec::new());
    }
    (1..=repetitions).map(|i| period.checked_mul(i)).collect()
}

// ── Validated tasks ───────────────────────────────────────────

/// A validated task instance.
///
/// Not `Clone`: a task moves from queue to worker and back and is never in
/// two places at once.
#[derive(Debug)]
pub struct Task {
    id: Uuid,
    name: String,
    period: Duration,
    execution_time: Duration,
    demand: ResourceVector,
    processor_id: usize,
    repetitions: u32,
    deadlines: Vec<Duration>,
    holds_reservation: bool,
}

impl Task {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn execution_time(&self) -> Duration {
        self.execution_time
    }

    pub fn demand(&self) -> &ResourceVector {
        &self.demand
    }

    /// Home processor assigned at admission.
    pub fn processor_id(&self) -> usize {
        self.processor_id
    }

    /// Runs still owed, including the one about to be dispatched.
    pub fn repetitions(&self) -> u32 {
        self.repetitions
    }

    pub fn deadlines(&self) -> &[Duration] {
        &self.deadlines
    }

    pub fn is_complete(&self) -> bool {
        self.repetitions == 0
    }

    /// Whether the task currently owns its demand in the resource pool.
    pub fn holds_reservation(&self) -> bool {
        self.holds_reservation
    }

    pub fn set_holds_reservation(&mut self, holds: bool) {
        self.holds_reservation = holds;
    }

    /// Account for one finished run. Returns `true` when more runs remain.
    pub fn complete_run(&mut self) -> bool {
        self.repetitions = self.repetitions.saturating_sub(1);
        self.repetitions > 0
    }

    /// `name:repetitions`, the form used in ready-queue listings.
    pub fn label(&self) -> String {
        format!("{}:{}", self.name, self.repetitions)
    }
}
