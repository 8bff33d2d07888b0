//! Ramping virtual-user executor
//!
//! A controller task re-evaluates the stage ramp every tick and publishes the
//! target population over a `watch` channel. VUs are spawned lazily as the
//! target grows. A VU whose id is above the target finishes its current
//! iteration and parks until the target rises again or the run ends.
//!
//! When the last stage is over, no new iterations start. In-flight iterations
//! get the graceful-stop window to finish, after which they are aborted.

use crate::client::Session;
use crate::metrics::RunMetrics;
use crate::scenario::{Pacer, Scenario, VuContext};
use crate::stages::{self, Stage};
use metrics::gauge;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Executor settings
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    pub stages: Vec<Stage>,
    /// VUs active at t=0
    pub start_vus: usize,
    /// How long in-flight iterations may run after the last stage ends
    pub graceful_stop: Duration,
    /// Controller re-evaluation period
    pub tick: Duration,
    pub pacer: Pacer,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            stages: stages::default_stages(),
            start_vus: 1,
            graceful_stop: Duration::from_secs(30),
            tick: Duration::from_millis(100),
            pacer: Pacer::default(),
        }
    }
}

/// What the executor did
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExecutionStats {
    pub vus_max: u64,
    pub iterations_completed: u64,
    pub iterations_interrupted: u64,
    #[serde(with = "crate::stages::duration_secs")]
    pub duration: Duration,
}

/// Signal shared by the controller and every VU
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Control {
    target: usize,
    stopping: bool,
}

pub struct RampingExecutor {
    config: ExecutorConfig,
}

impl RampingExecutor {
    pub fn new(config: ExecutorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Drive `scenario` through the configured ramp
    pub async fn run<S: Scenario>(
        &self,
        scenario: Arc<S>,
        session: Session,
        metrics: Arc<RunMetrics>,
    ) -> ExecutionStats {
        let start = Instant::now();
        let total = stages::total_duration(&self.config.stages);
        let session = Arc::new(session);
        let completed = Arc::new(AtomicU64::new(0));

        let initial = Control {
            target: stages::target_at(&self.config.stages, self.config.start_vus, Duration::ZERO),
            stopping: false,
        };
        let (tx, rx) = watch::channel(initial);

        let mut vus: JoinSet<()> = JoinSet::new();
        let mut spawned = 0usize;
        let mut current_stage = None;
        let mut ticker = tokio::time::interval(self.config.tick);

        info!(
            "Starting ramp: {} stage(s), {:?} total, up to {} VUs",
            self.config.stages.len(),
            total,
            stages::peak_target(&self.config.stages, self.config.start_vus)
        );

        loop {
            ticker.tick().await;
            let elapsed = start.elapsed();
            if elapsed >= total {
                break;
            }

            let stage = stages::stage_index_at(&self.config.stages, elapsed);
            if stage != current_stage {
                if let Some(idx) = stage {
                    info!("Stage {}/{}: {}", idx + 1, self.config.stages.len(), self.config.stages[idx]);
                }
                current_stage = stage;
            }

            let target = stages::target_at(&self.config.stages, self.config.start_vus, elapsed);
            while spawned < target {
                spawned += 1;
                vus.spawn(vu_loop(
                    spawned as u64,
                    scenario.clone(),
                    session.clone(),
                    metrics.clone(),
                    self.config.pacer,
                    rx.clone(),
                    completed.clone(),
                ));
                debug!(vu = spawned, "VU spawned");
            }

            gauge!("loadgen_vus_target").set(target as f64);
            tx.send_if_modified(|control| {
                if control.target != target {
                    control.target = target;
                    true
                } else {
                    false
                }
            });
        }

        info!(
            "Ramp finished, waiting up to {:?} for in-flight iterations",
            self.config.graceful_stop
        );
        tx.send_modify(|control| control.stopping = true);

        let drained = tokio::time::timeout(self.config.graceful_stop, drain(&mut vus)).await;

        let mut interrupted = 0u64;
        if drained.is_err() {
            interrupted = vus.len() as u64;
            warn!("Graceful stop elapsed, aborting {} iteration(s)", interrupted);
            vus.abort_all();
            drain(&mut vus).await;
        }

        ExecutionStats {
            vus_max: spawned as u64,
            iterations_completed: completed.load(Ordering::SeqCst),
            iterations_interrupted: interrupted,
            duration: start.elapsed(),
        }
    }
}

/// Wait for every VU task, logging the ones that panicked
async fn drain(vus: &mut JoinSet<()>) {
    while let Some(result) = vus.join_next().await {
        if let Err(e) = result
            && e.is_panic()
        {
            warn!("VU task panicked: {}", e);
        }
    }
}

/// One virtual user: iterate while active, park while ramped down
async fn vu_loop<S: Scenario>(
    vu: u64,
    scenario: Arc<S>,
    session: Arc<Session>,
    metrics: Arc<RunMetrics>,
    pacer: Pacer,
    mut control: watch::Receiver<Control>,
    completed: Arc<AtomicU64>,
) {
    let mut iter = 0u64;

    loop {
        let state = *control.borrow_and_update();
        if state.stopping {
            break;
        }

        if vu as usize > state.target {
            // Parked until the target rises or the run stops
            if control.changed().await.is_err() {
                break;
            }
            continue;
        }

        let ctx = VuContext::new(vu, iter, metrics.clone(), pacer);
        let started = Instant::now();
        scenario.iteration(&session, &ctx).await;
        metrics.record_iteration(started.elapsed());
        completed.fetch_add(1, Ordering::SeqCst);

        iter += 1;
    }

    debug!(vu, iterations = iter, "VU finished");
}
