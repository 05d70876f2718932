use thiserror::Error;

/// Validation and contract errors exposed by `kinsafe-core`.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("latitude {value} is outside -90..=90")]
    InvalidLatitude { value: f64 },
    #[error("longitude {value} is outside -180..=180")]
    InvalidLongitude { value: f64 },
    #[error("field '{field}' must be finite")]
    NonFiniteValue { field: &'static str },

    #[error("forecast days must be within 1..=16, got {value}")]
    InvalidForecastDays { value: u32 },
    #[error("radius_km must be positive and finite, got {value}")]
    InvalidRadius { value: f64 },
    #[error("limit must be greater than zero")]
    InvalidLimit,
    #[error("time window must be between 1 and 720 hours, got {value}")]
    InvalidTimeWindow { value: u32 },
    #[error("request kind '{kind}' requires a location")]
    LocationRequired { kind: &'static str },

    #[error("invalid provider '{value}'")]
    InvalidProvider { value: String },
    #[error("invalid request kind '{value}'")]
    InvalidRequestKind { value: String },
    #[error("invalid disaster category '{value}'")]
    InvalidCategory { value: String },
    #[error("invalid severity '{value}', expected one of minor, moderate, severe, extreme")]
    InvalidSeverity { value: String },

    #[error("event id cannot be empty")]
    EmptyEventId,

    #[error("timestamp must be RFC3339 UTC (suffix Z): '{value}'")]
    TimestampNotUtc { value: String },
    #[error("timestamp is not valid RFC3339: '{value}'")]
    InvalidTimestamp { value: String },
}

/// Top-level error type for core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("ingestion task did not finish: {0}")]
    IngestTask(#[from] tokio::task::JoinError),

    #[error("expected a {expected} payload, got {found}")]
    PayloadShape {
        expected: &'static str,
        found: &'static str,
    },
}
