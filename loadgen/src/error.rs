//! Error definitions for the load generator

use thiserror::Error;

/// Fatal errors raised while acquiring the shared session
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("Login rejected with HTTP {status}; check the test account credentials")]
    LoginRejected { status: u16 },

    #[error("Login response carried no token; check the test account credentials")]
    MissingToken,

    #[error("Login request failed: {0}")]
    Transport(String),
}

/// Errors in run configuration (stages, durations, thresholds)
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid duration: {0:?}")]
    InvalidDuration(String),

    #[error("Invalid stage {0:?}, expected <duration>:<target>")]
    InvalidStage(String),

    #[error("At least one stage is required")]
    NoStages,

    #[error("Invalid threshold expression {0:?}")]
    InvalidThreshold(String),

    #[error("Unknown metric in threshold: {0}")]
    UnknownMetric(String),

    #[error("Aggregation {aggregation} is not supported for metric {metric}")]
    UnsupportedAggregation { metric: String, aggregation: String },
}

/// Top-level error for a load test run
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Setup failed: {0}")]
    Setup(#[from] SetupError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}
