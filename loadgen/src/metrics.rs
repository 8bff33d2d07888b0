//! Run-wide metric aggregation
//!
//! Every VU writes into one shared [`RunMetrics`]. Counters are atomics,
//! keyed series live in sharded `DashMap`s so concurrent VUs rarely contend.
//! Each sample is also forwarded to the `metrics` facade so an installed
//! recorder (Prometheus in the binary) sees the same numbers.

use dashmap::DashMap;
use metrics::{counter, histogram};
use serde::Serialize;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Latency samples for one series
#[derive(Debug, Default, Clone)]
pub struct LatencyStats {
    pub samples: Vec<Duration>,
}

impl LatencyStats {
    pub fn new() -> Self {
        Self {
            samples: Vec::new(),
        }
    }

    pub fn record(&mut self, latency: Duration) {
        self.samples.push(latency);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Calculate percentile (0-100), interpolating linearly between the
    /// two closest ranks. p(75) of [10, 20, 30, 40] is 32.5.
    pub fn percentile(&self, p: f64) -> Option<Duration> {
        if self.samples.is_empty() {
            return None;
        }

        let mut sorted = self.samples.clone();
        sorted.sort();

        let rank = (p.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f64;
        let lower = rank.floor() as usize;
        let upper = (rank.ceil() as usize).min(sorted.len() - 1);
        let frac = rank - lower as f64;
        Some(sorted[lower] + (sorted[upper] - sorted[lower]).mul_f64(frac))
    }

    pub fn p50(&self) -> Option<Duration> {
        self.percentile(50.0)
    }

    pub fn p90(&self) -> Option<Duration> {
        self.percentile(90.0)
    }

    pub fn p95(&self) -> Option<Duration> {
        self.percentile(95.0)
    }

    pub fn p99(&self) -> Option<Duration> {
        self.percentile(99.0)
    }

    pub fn min(&self) -> Option<Duration> {
        self.samples.iter().min().copied()
    }

    pub fn max(&self) -> Option<Duration> {
        self.samples.iter().max().copied()
    }

    pub fn avg(&self) -> Option<Duration> {
        if self.samples.is_empty() {
            return None;
        }
        let total: Duration = self.samples.iter().sum();
        Some(total / self.samples.len() as u32)
    }

    /// Summarise into milliseconds for reporting and thresholds
    pub fn trend(&self) -> Option<TrendSummary> {
        let ms = |d: Duration| d.as_secs_f64() * 1000.0;
        Some(TrendSummary {
            count: self.samples.len(),
            avg: ms(self.avg()?),
            min: ms(self.min()?),
            med: ms(self.p50()?),
            max: ms(self.max()?),
            p90: ms(self.p90()?),
            p95: ms(self.p95()?),
            p99: ms(self.p99()?),
        })
    }
}

/// Aggregated view of a latency series, in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrendSummary {
    pub count: usize,
    pub avg: f64,
    pub min: f64,
    pub med: f64,
    pub max: f64,
    pub p90: f64,
    pub p95: f64,
    pub p99: f64,
}

/// Pass/fail tallies of one named check
#[derive(Debug, Default)]
pub struct CheckCounts {
    pub group: String,
    pub passes: AtomicU64,
    pub fails: AtomicU64,
}

/// Per-endpoint request series
#[derive(Debug, Default)]
struct EndpointSeries {
    requests: u64,
    failed: u64,
    latencies: LatencyStats,
}

/// Shared metric sink for a whole run
#[derive(Debug, Default)]
pub struct RunMetrics {
    http_reqs: AtomicU64,
    http_failed: AtomicU64,
    http_durations: Mutex<LatencyStats>,
    endpoints: DashMap<&'static str, EndpointSeries>,

    checks: DashMap<String, CheckCounts>,
    groups: DashMap<String, LatencyStats>,

    iterations: AtomicU64,
    iteration_durations: Mutex<LatencyStats>,
}

impl RunMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one HTTP request.
    ///
    /// `status` is `None` when the request never produced a response. Such a
    /// request, and any status outside 200..=399, counts as failed.
    pub fn record_http(&self, endpoint: &'static str, status: Option<u16>, latency: Duration) {
        let failed = !matches!(status, Some(200..=399));

        self.http_reqs.fetch_add(1, Ordering::Relaxed);
        if failed {
            self.http_failed.fetch_add(1, Ordering::Relaxed);
        }
        if let Ok(mut durations) = self.http_durations.lock() {
            durations.record(latency);
        }

        let mut series = self.endpoints.entry(endpoint).or_default();
        series.requests += 1;
        if failed {
            series.failed += 1;
        }
        series.latencies.record(latency);
        drop(series);

        counter!("loadgen_http_reqs_total", "endpoint" => endpoint).increment(1);
        if failed {
            counter!("loadgen_http_req_failed_total", "endpoint" => endpoint).increment(1);
        }
        histogram!("loadgen_http_req_duration_seconds", "endpoint" => endpoint)
            .record(latency.as_secs_f64());
    }

    /// Record a named check outcome inside a group
    pub fn record_check(&self, group: &str, name: &str, passed: bool) {
        let entry = self.checks.entry(name.to_string()).or_insert_with(|| CheckCounts {
            group: group.to_string(),
            ..Default::default()
        });
        if passed {
            entry.passes.fetch_add(1, Ordering::Relaxed);
        } else {
            entry.fails.fetch_add(1, Ordering::Relaxed);
        }
        drop(entry);

        let outcome = if passed { "pass" } else { "fail" };
        counter!("loadgen_checks_total", "check" => name.to_string(), "outcome" => outcome)
            .increment(1);
    }

    pub fn record_group(&self, group: &str, elapsed: Duration) {
        self.groups
            .entry(group.to_string())
            .or_default()
            .record(elapsed);
    }

    pub fn record_iteration(&self, elapsed: Duration) {
        self.iterations.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut durations) = self.iteration_durations.lock() {
            durations.record(elapsed);
        }
        counter!("loadgen_iterations_total").increment(1);
    }

    pub fn http_reqs(&self) -> u64 {
        self.http_reqs.load(Ordering::Relaxed)
    }

    pub fn http_failed(&self) -> u64 {
        self.http_failed.load(Ordering::Relaxed)
    }

    /// Fraction of requests that failed (0.0 to 1.0)
    pub fn http_failed_rate(&self) -> Option<f64> {
        rate(self.http_failed(), self.http_reqs())
    }

    pub fn iterations(&self) -> u64 {
        self.iterations.load(Ordering::Relaxed)
    }

    /// Total passes and fails across all checks
    pub fn check_totals(&self) -> (u64, u64) {
        self.checks.iter().fold((0, 0), |(p, f), entry| {
            (
                p + entry.passes.load(Ordering::Relaxed),
                f + entry.fails.load(Ordering::Relaxed),
            )
        })
    }

    /// Fraction of checks that passed (0.0 to 1.0)
    pub fn checks_rate(&self) -> Option<f64> {
        let (passes, fails) = self.check_totals();
        rate(passes, passes + fails)
    }

    pub fn http_durations(&self) -> LatencyStats {
        self.http_durations
            .lock()
            .map(|d| d.clone())
            .unwrap_or_default()
    }

    pub fn iteration_durations(&self) -> LatencyStats {
        self.iteration_durations
            .lock()
            .map(|d| d.clone())
            .unwrap_or_default()
    }

    /// Snapshot of every check, sorted by group then name
    pub fn checks(&self) -> Vec<CheckSnapshot> {
        let mut checks: Vec<CheckSnapshot> = self
            .checks
            .iter()
            .map(|entry| CheckSnapshot {
                name: entry.key().clone(),
                group: entry.group.clone(),
                passes: entry.passes.load(Ordering::Relaxed),
                fails: entry.fails.load(Ordering::Relaxed),
            })
            .collect();
        checks.sort_by(|a, b| (&a.group, &a.name).cmp(&(&b.group, &b.name)));
        checks
    }

    /// Snapshot of every endpoint series, sorted by endpoint name
    pub fn endpoints(&self) -> Vec<EndpointSnapshot> {
        let mut endpoints: Vec<EndpointSnapshot> = self
            .endpoints
            .iter()
            .map(|entry| EndpointSnapshot {
                endpoint: entry.key().to_string(),
                requests: entry.requests,
                failed: entry.failed,
                duration: entry.latencies.trend(),
            })
            .collect();
        endpoints.sort_by(|a, b| a.endpoint.cmp(&b.endpoint));
        endpoints
    }

    /// Snapshot of group durations, sorted by group name
    pub fn groups(&self) -> Vec<GroupSnapshot> {
        let mut groups: Vec<GroupSnapshot> = self
            .groups
            .iter()
            .map(|entry| GroupSnapshot {
                group: entry.key().clone(),
                duration: entry.trend(),
            })
            .collect();
        groups.sort_by(|a, b| a.group.cmp(&b.group));
        groups
    }

    /// Requests recorded for one endpoint
    pub fn endpoint_requests(&self, endpoint: &str) -> u64 {
        self.endpoints
            .get(endpoint)
            .map(|series| series.requests)
            .unwrap_or(0)
    }
}

fn rate(part: u64, total: u64) -> Option<f64> {
    if total == 0 {
        None
    } else {
        Some(part as f64 / total as f64)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckSnapshot {
    pub name: String,
    pub group: String,
    pub passes: u64,
    pub fails: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct EndpointSnapshot {
    pub endpoint: String,
    pub requests: u64,
    pub failed: u64,
    pub duration: Option<TrendSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GroupSnapshot {
    pub group: String,
    pub duration: Option<TrendSummary>,
}
