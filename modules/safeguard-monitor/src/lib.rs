pub mod detect;
pub mod monitor;
pub mod notify;
pub mod report;
pub mod store;
pub mod types;

pub use monitor::Monitor;
pub use report::MonitorReport;
pub use types::{CycleOutcome, CycleStats, MonitorState, MonitorStatus};
