use std::env;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{SchedError, SchedResult};
use crate::task::{ResourceVector, TaskLimits, TaskSpec};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env_opt(key).and_then(|v| v.parse().ok())
}

// ── Policies ──────────────────────────────────────────────────

/// What a worker does when the pool cannot satisfy a task's demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExhaustionPolicy {
    /// Notify and stop the worker. The task is dropped.
    #[default]
    Halt,
    /// Put the task back at the tail of the ready queue and back off.
    Requeue,
}

/// When a repeating task acquires and returns its resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReservationPolicy {
    /// Reserve on first dispatch, release once at retirement.
    #[default]
    HoldAcrossRepetitions,
    /// Reserve before and release after every run.
    PerRepetition,
}

impl std::str::FromStr for ExhaustionPolicy {
    type Err = SchedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "halt" => Ok(Self::Halt),
            "requeue" => Ok(Self::Requeue),
            other => Err(SchedError::Config(format!(
                "invalid exhaustion policy '{other}', expected 'halt' or 'requeue'"
            ))),
        }
    }
}

impl std::str::FromStr for ReservationPolicy {
    type Err = SchedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "hold_across_repetitions" | "hold" => Ok(Self::HoldAcrossRepetitions),
            "per_repetition" => Ok(Self::PerRepetition),
            other => Err(SchedError::Config(format!(
                "invalid reservation policy '{other}', expected 'hold_across_repetitions' or 'per_repetition'"
            ))),
        }
    }
}

// ── Top-level config ──────────────────────────────────────────

/// Simulation configuration, typically parsed from TOML.
///
/// Everything here is fixed once the engine is constructed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Number of simulated processors (one worker thread each).
    #[serde(default = "default_processors")]
    pub processors: usize,
    /// Initial (and maximum) units per resource kind.
    #[serde(default = "default_capacity")]
    pub resource_capacity: Vec<u32>,
    /// Wall-clock milliseconds per simulated time unit.
    #[serde(default = "default_time_unit_ms")]
    pub time_unit_ms: u64,
    /// Idle back-off between empty polls, in time units.
    #[serde(default = "default_idle_poll_units")]
    pub idle_poll_units: u32,
    /// Deallocation delay before a retiring task's resources return, in time units.
    #[serde(default = "default_release_delay_units")]
    pub release_delay_units: u32,
    /// Cadence of the external metrics observer.
    #[serde(default = "default_monitor_interval_ms")]
    pub monitor_interval_ms: u64,
    #[serde(default)]
    pub exhaustion_policy: ExhaustionPolicy,
    #[serde(default)]
    pub reservation_policy: ReservationPolicy,
    /// Stop a worker once its ready queue and the waiting queue are both empty.
    #[serde(default)]
    pub exit_when_drained: bool,
    /// Initial task set, placed on ready queues at admission.
    #[serde(default)]
    pub tasks: Vec<TaskSpec>,
    /// Tasks injected into the shared waiting queue before start.
    #[serde(default)]
    pub waiting: Vec<TaskSpec>,
}

fn default_processors() -> usize { 3 }
fn default_capacity() -> Vec<u32> { vec![10, 10, 10] }
fn default_time_unit_ms() -> u64 { 1000 }
fn default_idle_poll_units() -> u32 { 1 }
fn default_release_delay_units() -> u32 { 1 }
fn default_monitor_interval_ms() -> u64 { 200 }

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            processors: default_processors(),
            resource_capacity: default_capacity(),
            time_unit_ms: default_time_unit_ms(),
            idle_poll_units: default_idle_poll_units(),
            release_delay_units: default_release_delay_units(),
            monitor_interval_ms: default_monitor_interval_ms(),
            exhaustion_policy: ExhaustionPolicy::default(),
            reservation_policy: ReservationPolicy::default(),
            exit_when_drained: false,
            tasks: Vec::new(),
            waiting: Vec::new(),
        }
    }
}

impl SimulationConfig {
    /// Parse config from a TOML string.
    pub fn from_toml(toml_str: &str) -> SchedResult<Self> {
        let mut config: Self = toml::from_str(toml_str)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load config from a file path.
    pub fn from_file(path: impl AsRef<Path>) -> SchedResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml(&content)
    }

    /// The six-task workload the simulator ships with.
    pub fn reference() -> Self {
        Self {
            tasks: vec![
                TaskSpec::new("T1", 0, 8, vec![0, 0, 0], 0, 0),
                TaskSpec::new("T2", 80, 16, vec![0, 2, 1], 1, 3),
                TaskSpec::new("T3", 100, 20, vec![2, 0, 1], 2, 2),
                TaskSpec::new("T4", 150, 25, vec![0, 0, 2], 1, 2),
                TaskSpec::new("T5", 160, 30, vec![2, 2, 1], 0, 2),
                TaskSpec::new("T6", 170, 35, vec![2, 3, 1], 2, 2),
            ],
            ..Self::default()
        }
    }

    // ── Environment variable overrides ──────────────────────────────

    /// Apply environment variable overrides.
    ///
    /// Convention: `RMSCHED_KEY` overrides `key`, e.g.
    /// - `RMSCHED_PROCESSORS` -> `processors`
    /// - `RMSCHED_RESOURCE_CAPACITY` -> `resource_capacity` (comma separated)
    /// - `RMSCHED_TIME_UNIT_MS` -> `time_unit_ms`
    /// - `RMSCHED_EXHAUSTION_POLICY` -> `exhaustion_policy`
    pub fn apply_env_overrides(&mut self) {
        if let Some(v) = env_parse("RMSCHED_PROCESSORS") {
            self.processors = v;
        }
        if let Some(v) = env_opt("RMSCHED_RESOURCE_CAPACITY") {
            let parsed: Result<Vec<u32>, _> = v.split(',').map(|s| s.trim().parse()).collect();
            match parsed {
                Ok(capacity) => self.resource_capacity = capacity,
                Err(e) => tracing::warn!(value = %v, error = %e, "ignoring RMSCHED_RESOURCE_CAPACITY"),
            }
        }
        if let Some(v) = env_parse("RMSCHED_TIME_UNIT_MS") {
            self.time_unit_ms = v;
        }
        if let Some(v) = env_parse("RMSCHED_IDLE_POLL_UNITS") {
            self.idle_poll_units = v;
        }
        if let Some(v) = env_parse("RMSCHED_RELEASE_DELAY_UNITS") {
            self.release_delay_units = v;
        }
        if let Some(v) = env_parse("RMSCHED_MONITOR_INTERVAL_MS") {
            self.monitor_interval_ms = v;
        }
        if let Some(v) = env_parse("RMSCHED_EXHAUSTION_POLICY") {
            self.exhaustion_policy = v;
        }
        if let Some(v) = env_parse("RMSCHED_RESERVATION_POLICY") {
            self.reservation_policy = v;
        }
        if let Some(v) = env_parse("RMSCHED_EXIT_WHEN_DRAINED") {
            self.exit_when_drained = v;
        }
    }

    /// Validate engine-level settings. Task descriptors are checked at admission.
    pub fn validate(&self) -> SchedResult<()> {
        if self.processors == 0 {
            return Err(SchedError::Config("processors must be at least 1".into()));
        }
        if self.resource_capacity.is_empty() {
            return Err(SchedError::Config(
                "resource_capacity must name at least one resource kind".into(),
            ));
        }
        if self.time_unit_ms == 0 {
            return Err(SchedError::Config("time_unit_ms must be positive".into()));
        }
        if self.idle_poll_units == 0 {
            return Err(SchedError::Config("idle_poll_units must be positive".into()));
        }
        if self.monitor_interval_ms == 0 {
            return Err(SchedError::Config("monitor_interval_ms must be positive".into()));
        }
        Ok(())
    }

    pub fn resource_kinds(&self) -> usize {
        self.resource_capacity.len()
    }

    pub fn capacity(&self) -> ResourceVector {
        ResourceVector::new(self.resource_capacity.clone())
    }

    pub fn time_unit(&self) -> Duration {
        Duration::from_millis(self.time_unit_ms)
    }

    pub fn idle_poll(&self) -> Duration {
        self.time_unit() * self.idle_poll_units
    }

    pub fn release_delay(&self) -> Duration {
        self.time_unit() * self.release_delay_units
    }

    pub fn monitor_interval(&self) -> Duration {
        Duration::from_millis(self.monitor_interval_ms)
    }

    /// Bounds task descriptors are validated against.
    pub fn limits(&self) -> TaskLimits {
        TaskLimits {
            processors: self.processors,
            resource_kinds: self.resource_kinds(),
            time_unit: self.time_unit(),
        }
    }

    /// Print a summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Simulation config loaded:");
        tracing::info!("  processors:  {}", self.processors);
        tracing::info!("  resources:   {}", self.capacity());
        tracing::info!("  time unit:   {}ms", self.time_unit_ms);
        tracing::info!("  policies:    exhaustion={:?}, reservation={:?}", self.exhaustion_policy, self.reservation_policy);
        tracing::info!("  tasks:       {} ready, {} waiting", self.tasks.len(), self.waiting.len());
    }
}
