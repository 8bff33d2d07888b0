//! Scenario abstraction driven by the executor
//!
//! A [`Scenario`] has a one-time `setup` that yields the shared [`Session`]
//! and an `iteration` that each virtual user runs over and over. The
//! executor hands every iteration a [`VuContext`] carrying the VU id, the
//! per-VU iteration counter, the metric sink and the pacer.

pub mod payloads;
pub mod portal;

pub use portal::PortalScenario;

use crate::client::Session;
use crate::error::SetupError;
use crate::metrics::RunMetrics;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A load scenario: one setup, many iterations
#[async_trait]
pub trait Scenario: Send + Sync + 'static {
    /// Runs once before any VU starts. An error aborts the whole run.
    async fn setup(&self) -> Result<Session, SetupError>;

    /// One pass of the per-VU workflow. Failures are recorded, never returned.
    async fn iteration(&self, session: &Session, ctx: &VuContext);
}

/// Think-time pauses, scaled by a run-wide factor
#[derive(Debug, Clone, Copy)]
pub struct Pacer {
    scale: f64,
}

impl Pacer {
    pub fn new(scale: f64) -> Self {
        Self {
            scale: scale.max(0.0),
        }
    }

    /// No pauses at all
    pub fn instant() -> Self {
        Self::new(0.0)
    }

    /// Scaled pause, saturating at `Duration::MAX`
    pub fn scaled(&self, secs: f64) -> Duration {
        Duration::try_from_secs_f64((secs * self.scale).max(0.0)).unwrap_or(Duration::MAX)
    }

    pub async fn sleep(&self, secs: f64) {
        let pause = self.scaled(secs);
        if !pause.is_zero() {
            tokio::time::sleep(pause).await;
        }
    }
}

impl Default for Pacer {
    fn default() -> Self {
        Self::new(1.0)
    }
}

/// Per-iteration view of a virtual user
#[derive(Debug, Clone)]
pub struct VuContext {
    /// 1-based VU id, stable for the whole run
    pub vu: u64,
    /// 0-based iteration counter of this VU
    pub iter: u64,
    pub metrics: Arc<RunMetrics>,
    pub pacer: Pacer,
}

impl VuContext {
    pub fn new(vu: u64, iter: u64, metrics: Arc<RunMetrics>, pacer: Pacer) -> Self {
        Self {
            vu,
            iter,
            metrics,
            pacer,
        }
    }

    /// `{vu}-{iter}`: unique across VUs and across iterations of one VU
    pub fn unique_id(&self) -> String {
        format!("{}-{}", self.vu, self.iter)
    }

    pub async fn sleep(&self, secs: f64) {
        self.pacer.sleep(secs).await;
    }

    /// Start a named group; checks made through it are tagged with its name
    pub fn group(&self, name: &'static str) -> GroupScope<'_> {
        GroupScope {
            name,
            started: Instant::now(),
            metrics: &self.metrics,
        }
    }
}

/// An open group. Its duration is recorded when it ends.
pub struct GroupScope<'a> {
    name: &'static str,
    started: Instant,
    metrics: &'a RunMetrics,
}

impl GroupScope<'_> {
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Record a named check and hand the outcome back
    pub fn check(&self, name: &str, passed: bool) -> bool {
        self.metrics.record_check(self.name, name, passed);
        passed
    }

    pub fn end(self) {
        self.metrics.record_group(self.name, self.started.elapsed());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_id_format() {
        let ctx = VuContext::new(3, 7, Arc::new(RunMetrics::new()), Pacer::instant());
        assert_eq!(ctx.unique_id(), "3-7");
    }

    #[test]
    fn test_pacer_scaling() {
        assert_eq!(Pacer::new(0.5).scaled(2.0), Duration::from_secs(1));
        assert_eq!(Pacer::instant().scaled(3.0), Duration::ZERO);
        assert_eq!(Pacer::new(-1.0).scaled(3.0), Duration::ZERO);
        assert_eq!(Pacer::default().scaled(0.5), Duration::from_millis(500));
        assert_eq!(Pacer::new(1e300).scaled(1.0), Duration::MAX);
    }

    #[test]
    fn test_group_records_checks_and_duration() {
        let metrics = Arc::new(RunMetrics::new());
        let ctx = VuContext::new(1, 0, metrics.clone(), Pacer::instant());

        let group = ctx.group("Internship CRUD");
        assert!(group.check("[Internship] Create success (201)", true));
        assert!(!group.check("[Internship] Create success (201)", false));
        group.end();

        let checks = metrics.checks();
        assert_eq!(checks.len(), 1);
        assert_eq!(checks[0].group, "Internship CRUD");
        assert_eq!(metrics.groups()[0].group, "Internship CRUD");
    }
}
