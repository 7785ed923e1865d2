use thiserror::Error;

use crate::task::ResourceVector;

#[derive(Error, Debug)]
pub enum SchedError {
    #[error("Invalid task '{name}': {reason}")]
    InvalidTask { name: String, reason: String },

    #[error("Not enough resources for task '{task}' on CPU {cpu}: demand {demand}, available {available}")]
    ResourceExhausted {
        task: String,
        cpu: usize,
        demand: ResourceVector,
        available: ResourceVector,
    },

    #[error("Config error: {0}")]
    Config(String),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Config I/O error: {0}")]
    ConfigIo(#[from] std::io::Error),

    #[error("Engine already started")]
    AlreadyStarted,

    #[error("Engine not started")]
    NotStarted,

    #[error("Failed to spawn worker thread: {0}")]
    Spawn(String),
}

impl SchedError {
    pub(crate) fn invalid(name: &str, reason: impl Into<String>) -> Self {
        Self::InvalidTask {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}

pub type SchedResult<T> = Result<T, SchedError>;
