//! Wires a configuration into a full run: setup, ramp, summary

use crate::client::ApiClient;
use crate::config::Config;
use crate::error::LoadError;
use crate::executor::{ExecutorConfig, RampingExecutor};
use crate::metrics::RunMetrics;
use crate::scenario::{Pacer, PortalScenario, Scenario};
use crate::summary::RunSummary;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Run the portal scenario as configured
///
/// Login failure aborts before any VU starts. Threshold failures do not
/// error; they are reported through [`RunSummary::passed`].
pub async fn run(config: &Config) -> Result<RunSummary, LoadError> {
    let metrics = Arc::new(RunMetrics::new());
    let client = ApiClient::new(&config.base_url, config.http.request_timeout, metrics.clone())?;
    let scenario = Arc::new(PortalScenario::new(client, config.credentials.clone()));

    run_scenario(config, scenario, metrics).await
}

/// Run any scenario against the configured ramp and thresholds
pub async fn run_scenario<S: Scenario>(
    config: &Config,
    scenario: Arc<S>,
    metrics: Arc<RunMetrics>,
) -> Result<RunSummary, LoadError> {
    let session = scenario.setup().await?;

    let executor = RampingExecutor::new(ExecutorConfig {
        stages: config.load.stages.clone(),
        start_vus: config.load.start_vus,
        graceful_stop: config.load.graceful_stop,
        tick: Duration::from_millis(100),
        pacer: Pacer::new(config.load.think_time_scale),
    });
    let execution = executor.run(scenario, session, metrics.clone()).await;

    info!(
        "Run complete: {} iterations, {} requests in {:.1}s",
        execution.iterations_completed,
        metrics.http_reqs(),
        execution.duration.as_secs_f64()
    );

    let summary = RunSummary::collect(
        &config.base_url,
        &config.load.stages,
        execution,
        &metrics,
        &config.thresholds,
    );

    if let Some(path) = &config.output.summary_export {
        summary.export(path)?;
        info!("Summary written to {:?}", path);
    }

    Ok(summary)
}
