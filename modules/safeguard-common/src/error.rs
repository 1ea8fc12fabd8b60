use thiserror::Error;

#[derive(Error, Debug)]
pub enum SafeguardError {
    #[error("Input error: {0}")]
    Input(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Dispatch error on channel '{channel}': {reason}")]
    Dispatch { channel: String, reason: String },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Monitoring cycle already in progress")]
    CycleInFlight,

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl SafeguardError {
    pub fn dispatch(channel: &str, reason: impl ToString) -> Self {
        Self::Dispatch {
            channel: channel.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Short machine-readable kind, used in alert details.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Input(_) => "input",
            Self::Config(_) => "config",
            Self::Dispatch { .. } => "dispatch",
            Self::Storage(_) => "storage",
            Self::CycleInFlight => "cycle_in_flight",
            Self::Anyhow(_) => "internal",
        }
    }
}

pub type Result<T, E = SafeguardError> = std::result::Result<T, E>;
