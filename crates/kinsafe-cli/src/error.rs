use kinsafe_core::{CoreError, ValidationError, WarehouseError};
use thiserror::Error;

/// CLI-level error categories mapped to exit codes.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Core(CoreError),

    #[error("command error: {0}")]
    Command(String),

    #[error("strict mode failed: degraded result ({0})")]
    StrictDegraded(String),

    #[error(transparent)]
    Warehouse(#[from] WarehouseError),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<CoreError> for CliError {
    fn from(error: CoreError) -> Self {
        match error {
            CoreError::Validation(error) => Self::Validation(error),
            other => Self::Core(other),
        }
    }
}

impl CliError {
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Validation(_) => 2,
            Self::Command(_) => 2,
            Self::StrictDegraded(_) => 3,
            Self::Core(_) => 4,
            Self::Serialization(_) => 4,
            Self::Warehouse(_) => 6,
            Self::Io(_) => 10,
        }
    }
}
