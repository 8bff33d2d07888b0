//! Portal load generator library
//!
//! Drives a ramping virtual-user load test against the internship portal
//! REST backend. Exported for the binary and for integration tests.

pub mod client;
pub mod config;
pub mod error;
pub mod executor;
pub mod metrics;
pub mod runner;
pub mod scenario;
pub mod stages;
pub mod summary;
pub mod thresholds;

// Re-export commonly used types
pub use client::{ApiClient, ApiResponse, Credentials, ResourceId, Session};
pub use config::Config;
pub use error::{ConfigError, LoadError, SetupError};
pub use executor::{ExecutionStats, ExecutorConfig, RampingExecutor};
pub use crate::metrics::RunMetrics;
pub use runner::{run, run_scenario};
pub use scenario::{Pacer, PortalScenario, Scenario, VuContext};
pub use summary::RunSummary;
