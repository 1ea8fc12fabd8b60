pub mod config;
pub mod error;
pub mod types;

pub use config::{ChangeThresholds, Heuristics, MonitorConfig, HEURISTICS_VERSION};
pub use error::SafeguardError;
pub use types::*;
