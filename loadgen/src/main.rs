use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use portal_loadgen::config::Config;
use portal_loadgen::{LoadError, run};
use std::path::Path;
use std::process::ExitCode;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Exit code when the run completed but a threshold was crossed
const EXIT_THRESHOLDS_CROSSED: u8 = 99;

/// Initialize the Prometheus metrics recorder
fn setup_prometheus_metrics() -> anyhow::Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    Ok(handle)
}

/// Dump the recorder's registry in Prometheus text format
fn write_prometheus_metrics(handle: &PrometheusHandle, path: &Path) -> std::io::Result<()> {
    std::fs::write(path, handle.render())
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // Initialize Prometheus metrics recorder (must be done before any metrics are recorded)
    let prometheus_handle = setup_prometheus_metrics()?;

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "portal_loadgen=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration from environment
    let config = Config::from_env()?;
    info!(
        "Loaded configuration: base_url={}, stages={}, think_time_scale={}",
        config.base_url,
        config
            .load
            .stages
            .iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>()
            .join(","),
        config.load.think_time_scale
    );

    let summary = match run(&config).await {
        Ok(summary) => summary,
        Err(LoadError::Setup(e)) => {
            error!("Aborting before any iteration: {}", e);
            return Err(e.into());
        }
        Err(e) => return Err(e.into()),
    };

    println!("{}", summary.report());

    if let Some(path) = &config.output.metrics_export {
        match write_prometheus_metrics(&prometheus_handle, path) {
            Ok(()) => info!("Prometheus metrics written to {:?}", path),
            Err(e) => warn!("Failed to write Prometheus metrics to {:?}: {}", path, e),
        }
    }

    if summary.passed() {
        Ok(ExitCode::SUCCESS)
    } else {
        warn!("One or more thresholds were crossed");
        Ok(ExitCode::from(EXIT_THRESHOLDS_CROSSED))
    }
}
