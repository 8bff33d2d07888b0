//! Run configuration
//!
//! Configuration is loaded from environment variables over built-in
//! defaults. Scalar values that fail to parse keep their default; stage and
//! threshold definitions are structural and fail loudly instead.

use crate::client::Credentials;
use crate::error::ConfigError;
use crate::stages::{self, Stage};
use crate::thresholds::{self, Threshold};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Test account registered in the backend ahead of the run
pub const DEFAULT_TEST_USER_EMAIL: &str = "loadtest@example.com";
pub const DEFAULT_TEST_USER_PASSWORD: &str = "loadtest-password";

/// Largest accepted think-time multiplier
pub const MAX_THINK_TIME_SCALE: f64 = 1000.0;

/// Main run configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Backend base URL, without trailing slash
    pub base_url: String,
    /// Test account used by the one-time login
    pub credentials: Credentials,

    /// Ramp and stop behaviour
    pub load: LoadConfig,

    /// Pass/fail criteria for the run
    pub thresholds: Vec<Threshold>,

    /// HTTP client settings
    pub http: HttpConfig,

    /// Where to write reports
    pub output: OutputConfig,
}

/// Ramp-related configuration
#[derive(Debug, Clone)]
pub struct LoadConfig {
    pub stages: Vec<Stage>,
    /// VUs active at t=0
    pub start_vus: usize,
    /// Window for in-flight iterations once the last stage ends
    pub graceful_stop: Duration,
    /// Multiplier on every think-time pause (0 disables pauses)
    pub think_time_scale: f64,
}

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Per-request timeout
    pub request_timeout: Duration,
}

/// Report output configuration
#[derive(Debug, Clone, Default)]
pub struct OutputConfig {
    /// JSON summary file
    pub summary_export: Option<PathBuf>,
    /// Prometheus text dump of the metric registry
    pub metrics_export: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            credentials: Credentials {
                email: DEFAULT_TEST_USER_EMAIL.to_string(),
                password: DEFAULT_TEST_USER_PASSWORD.to_string(),
            },
            load: LoadConfig::default(),
            thresholds: thresholds::default_thresholds(),
            http: HttpConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            stages: stages::default_stages(),
            start_vus: 1,
            graceful_stop: Duration::from_secs(30),
            think_time_scale: 1.0,
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(60),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        // Target config
        if let Some(url) = lookup("BASE_URL")
            && !url.is_empty()
        {
            config.base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(email) = lookup("TEST_USER_EMAIL")
            && !email.is_empty()
        {
            config.credentials.email = email;
        }
        if let Some(password) = lookup("TEST_USER_PASSWORD")
            && !password.is_empty()
        {
            config.credentials.password = password;
        }

        // Load config
        if let Some(val) = lookup("STAGES") {
            config.load.stages = stages::parse_stages(&val)?;
        }
        if let Some(val) = lookup("START_VUS")
            && let Ok(v) = val.parse()
        {
            config.load.start_vus = v;
        }
        if let Some(val) = lookup("GRACEFUL_STOP_SECS")
            && let Ok(secs) = val.parse::<u64>()
        {
            config.load.graceful_stop = Duration::from_secs(secs);
        }
        if let Some(val) = lookup("THINK_TIME_SCALE")
            && let Ok(scale) = val.parse::<f64>()
            && (0.0..=MAX_THINK_TIME_SCALE).contains(&scale)
        {
            config.load.think_time_scale = scale;
        }

        // Thresholds
        if let Some(val) = lookup("THRESHOLDS") {
            config.thresholds = thresholds::parse_thresholds(&val)?;
        }

        // HTTP config
        if let Some(val) = lookup("REQUEST_TIMEOUT_SECS")
            && let Ok(secs) = val.parse::<u64>()
            && secs > 0
        {
            config.http.request_timeout = Duration::from_secs(secs);
        }

        // Output config
        if let Some(path) = lookup("SUMMARY_EXPORT")
            && !path.is_empty()
        {
            config.output.summary_export = Some(PathBuf::from(path));
        }
        if let Some(path) = lookup("METRICS_EXPORT")
            && !path.is_empty()
        {
            config.output.metrics_export = Some(PathBuf::from(path));
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.base_url, "http://localhost:8080");
        assert_eq!(config.load.stages, stages::default_stages());
        assert_eq!(config.load.start_vus, 1);
        assert_eq!(config.thresholds.len(), 2);
        assert_eq!(config.http.request_timeout, Duration::from_secs(60));
        assert!(config.output.summary_export.is_none());
    }

    #[test]
    fn test_config_from_lookup_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("BASE_URL", "http://backend:9000/"),
            ("TEST_USER_EMAIL", "someone@example.com"),
            ("STAGES", "5s:2,5s:0"),
            ("THINK_TIME_SCALE", "0"),
            ("GRACEFUL_STOP_SECS", "3"),
            ("THRESHOLDS", "checks=rate>0.5"),
            ("SUMMARY_EXPORT", "summary.json"),
        ]))
        .unwrap();

        assert_eq!(config.base_url, "http://backend:9000");
        assert_eq!(config.credentials.email, "someone@example.com");
        assert_eq!(config.credentials.password, DEFAULT_TEST_USER_PASSWORD);
        assert_eq!(config.load.stages.len(), 2);
        assert_eq!(config.load.think_time_scale, 0.0);
        assert_eq!(config.load.graceful_stop, Duration::from_secs(3));
        assert_eq!(config.thresholds.len(), 1);
        assert_eq!(
            config.output.summary_export,
            Some(PathBuf::from("summary.json"))
        );
    }

    #[test]
    fn test_unparseable_scalars_keep_defaults() {
        let config = Config::from_lookup(lookup(&[
            ("START_VUS", "many"),
            ("THINK_TIME_SCALE", "-2"),
            ("REQUEST_TIMEOUT_SECS", "0"),
        ]))
        .unwrap();

        assert_eq!(config.load.start_vus, 1);
        assert_eq!(config.load.think_time_scale, 1.0);
        assert_eq!(config.http.request_timeout, Duration::from_secs(60));

        for scale in ["1e300", "inf", "NaN"] {
            let config = Config::from_lookup(lookup(&[("THINK_TIME_SCALE", scale)])).unwrap();
            assert_eq!(config.load.think_time_scale, 1.0, "{}", scale);
        }
    }

    #[test]
    fn test_bad_structure_is_an_error() {
        assert!(Config::from_lookup(lookup(&[("STAGES", "soon:5")])).is_err());
        assert!(matches!(
            Config::from_lookup(lookup(&[("STAGES", "99999999999999999999s:1")])),
            Err(ConfigError::InvalidDuration(_))
        ));
        assert!(Config::from_lookup(lookup(&[("THRESHOLDS", "latency=p(95)<5")])).is_err());
    }
}
