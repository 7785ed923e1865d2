pub mod config;
pub mod error;
pub mod task;

pub use config::{ExhaustionPolicy, ReservationPolicy, SimulationConfig};
pub use error::*;
pub use task::*;
