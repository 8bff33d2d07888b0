//! End-of-run summary: text report, JSON export and threshold verdict

use crate::executor::ExecutionStats;
use crate::metrics::{
    CheckSnapshot, EndpointSnapshot, GroupSnapshot, LatencyStats, RunMetrics, TrendSummary,
};
use crate::stages::Stage;
use crate::thresholds::{self, Aggregation, MetricName, MetricValues, Threshold, ThresholdOutcome};
use serde::Serialize;
use std::path::Path;
use uuid::Uuid;

/// Everything a finished run produced
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub finished_at: String,
    pub base_url: String,
    pub stages: Vec<Stage>,
    pub execution: ExecutionStats,

    pub http_reqs: u64,
    pub http_req_failed: u64,
    pub http_req_failed_rate: Option<f64>,
    pub http_req_duration: Option<TrendSummary>,
    pub endpoints: Vec<EndpointSnapshot>,

    pub checks_passed: u64,
    pub checks_failed: u64,
    pub checks_rate: Option<f64>,
    pub checks: Vec<CheckSnapshot>,

    pub groups: Vec<GroupSnapshot>,
    pub iterations: u64,
    pub iteration_duration: Option<TrendSummary>,

    pub thresholds: Vec<ThresholdOutcome>,

    #[serde(skip)]
    http_duration_samples: LatencyStats,
    #[serde(skip)]
    iteration_duration_samples: LatencyStats,
}

impl RunSummary {
    /// Snapshot the metrics and evaluate thresholds against them
    pub fn collect(
        base_url: &str,
        stages: &[Stage],
        execution: ExecutionStats,
        metrics: &RunMetrics,
        thresholds: &[Threshold],
    ) -> Self {
        let (checks_passed, checks_failed) = metrics.check_totals();
        let http_durations = metrics.http_durations();
        let iteration_durations = metrics.iteration_durations();

        let mut summary = Self {
            run_id: Uuid::new_v4(),
            finished_at: chrono::Utc::now().to_rfc3339(),
            base_url: base_url.to_string(),
            stages: stages.to_vec(),
            execution,
            http_reqs: metrics.http_reqs(),
            http_req_failed: metrics.http_failed(),
            http_req_failed_rate: metrics.http_failed_rate(),
            http_req_duration: http_durations.trend(),
            endpoints: metrics.endpoints(),
            checks_passed,
            checks_failed,
            checks_rate: metrics.checks_rate(),
            checks: metrics.checks(),
            groups: metrics.groups(),
            iterations: metrics.iterations(),
            iteration_duration: iteration_durations.trend(),
            thresholds: Vec::new(),
            http_duration_samples: http_durations,
            iteration_duration_samples: iteration_durations,
        };
        summary.thresholds = thresholds::evaluate(thresholds, &summary);
        summary
    }

    /// True when every threshold expression held
    pub fn passed(&self) -> bool {
        self.thresholds.iter().all(|t| t.passed)
    }

    fn per_second(&self, count: u64) -> Option<f64> {
        let secs = self.execution.duration.as_secs_f64();
        (secs > 0.0).then(|| count as f64 / secs)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Write the JSON summary to `path`
    pub fn export(&self, path: &Path) -> Result<(), crate::error::LoadError> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Generate a human-readable report
    pub fn report(&self) -> String {
        let mut report = String::new();
        report.push_str("═══════════════════════════════════════════════════════════════\n");
        report.push_str(&format!(" LOAD TEST RESULTS: {}\n", self.base_url));
        report.push_str("═══════════════════════════════════════════════════════════════\n\n");

        let stages: Vec<String> = self.stages.iter().map(|s| s.to_string()).collect();
        report.push_str(&format!("Stages: {}\n", stages.join(", ")));
        report.push_str(&format!(
            "Duration: {:.2}s\n",
            self.execution.duration.as_secs_f64()
        ));
        report.push_str(&format!("VUs max: {}\n", self.execution.vus_max));
        report.push_str(&format!(
            "Iterations: {} complete, {} interrupted\n\n",
            self.iterations, self.execution.iterations_interrupted
        ));

        report.push_str(&format!(
            "HTTP requests: {} ({:.1}/s)\n",
            self.http_reqs,
            self.per_second(self.http_reqs).unwrap_or(0.0)
        ));
        report.push_str(&format!(
            "Failed: {} ({:.2}%)\n",
            self.http_req_failed,
            self.http_req_failed_rate.unwrap_or(0.0) * 100.0
        ));
        if let Some(trend) = &self.http_req_duration {
            report.push_str(&format!("Request duration: {}\n", format_trend(trend)));
        }

        if !self.endpoints.is_empty() {
            report.push_str("\nEndpoints:\n");
            for ep in &self.endpoints {
                report.push_str(&format!(
                    "  {:30} {:>6} req {:>5} failed",
                    ep.endpoint, ep.requests, ep.failed
                ));
                if let Some(trend) = &ep.duration {
                    report.push_str(&format!("  p95={:.1}ms", trend.p95));
                }
                report.push('\n');
            }
        }

        report.push_str(&format!(
            "\nChecks: {} passed, {} failed ({:.2}%)\n",
            self.checks_passed,
            self.checks_failed,
            self.checks_rate.unwrap_or(0.0) * 100.0
        ));
        let mut current_group: Option<&str> = None;
        for check in &self.checks {
            if current_group != Some(check.group.as_str()) {
                report.push_str(&format!("  █ {}\n", check.group));
                current_group = Some(check.group.as_str());
            }
            let mark = if check.fails == 0 { "✓" } else { "✗" };
            report.push_str(&format!(
                "    {} {} ({} ✓ / {} ✗)\n",
                mark, check.name, check.passes, check.fails
            ));
        }

        if !self.groups.is_empty() {
            report.push_str("\nGroup durations:\n");
            for group in &self.groups {
                if let Some(trend) = &group.duration {
                    report.push_str(&format!("  {:24} {}\n", group.group, format_trend(trend)));
                }
            }
        }

        report.push_str("\nThresholds:\n");
        for t in &self.thresholds {
            let observed = t
                .observed
                .map(|v| format!("{:.4}", v))
                .unwrap_or_else(|| "N/A".to_string());
            report.push_str(&format!(
                "  {} {} {} (observed {})\n",
                if t.passed { "✓" } else { "✗" },
                t.metric,
                t.expression,
                observed
            ));
        }

        report.push_str("\n═══════════════════════════════════════════════════════════════\n");
        report.push_str(&format!(
            " OVERALL: {}\n",
            if self.passed() {
                "PASS"
            } else {
                "FAIL (threshold crossed)"
            }
        ));
        report.push_str("═══════════════════════════════════════════════════════════════\n");
        report
    }
}

fn format_trend(t: &TrendSummary) -> String {
    format!(
        "avg={:.1}ms min={:.1}ms med={:.1}ms max={:.1}ms p(90)={:.1}ms p(95)={:.1}ms",
        t.avg, t.min, t.med, t.max, t.p90, t.p95
    )
}

/// Duration aggregations in milliseconds
fn duration_value(stats: &LatencyStats, aggregation: Aggregation) -> Option<f64> {
    let d = match aggregation {
        Aggregation::Avg => stats.avg(),
        Aggregation::Min => stats.min(),
        Aggregation::Max => stats.max(),
        Aggregation::Med => stats.p50(),
        Aggregation::Percentile(p) => stats.percentile(p),
        Aggregation::Rate | Aggregation::Count => None,
    }?;
    Some(d.as_secs_f64() * 1000.0)
}

impl MetricValues for RunSummary {
    fn value(&self, metric: MetricName, aggregation: Aggregation) -> Option<f64> {
        match (metric, aggregation) {
            (MetricName::HttpReqFailed, Aggregation::Rate) => self.http_req_failed_rate,
            (MetricName::Checks, Aggregation::Rate) => self.checks_rate,
            (MetricName::HttpReqs, Aggregation::Count) => Some(self.http_reqs as f64),
            (MetricName::HttpReqs, Aggregation::Rate) => self.per_second(self.http_reqs),
            (MetricName::Iterations, Aggregation::Count) => Some(self.iterations as f64),
            (MetricName::Iterations, Aggregation::Rate) => self.per_second(self.iterations),
            (MetricName::HttpReqDuration, agg) => duration_value(&self.http_duration_samples, agg),
            (MetricName::IterationDuration, agg) => {
                duration_value(&self.iteration_duration_samples, agg)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::default_stages;
    use crate::thresholds::{default_thresholds, parse_thresholds};
    use std::time::Duration;

    fn execution(secs: u64) -> ExecutionStats {
        ExecutionStats {
            vus_max: 2,
            iterations_completed: 4,
            iterations_interrupted: 0,
            duration: Duration::from_secs(secs),
        }
    }

    fn healthy_metrics() -> RunMetrics {
        let metrics = RunMetrics::new();
        for ms in [10, 20, 30, 40] {
            metrics.record_http("POST /posts", Some(201), Duration::from_millis(ms));
            metrics.record_check("Post & Comment & Like", "[Post] Create success (201)", true);
        }
        metrics.record_iteration(Duration::from_millis(500));
        metrics
    }

    #[test]
    fn test_healthy_run_passes_default_thresholds() {
        let summary = RunSummary::collect(
            "http://localhost:8080",
            &default_stages(),
            execution(4),
            &healthy_metrics(),
            &default_thresholds(),
        );

        assert!(summary.passed());
        assert_eq!(summary.http_reqs, 4);
        assert_eq!(summary.checks_passed, 4);
        assert_eq!(summary.value(MetricName::HttpReqs, Aggregation::Rate), Some(1.0));

        let report = summary.report();
        assert!(report.contains("OVERALL: PASS"));
        assert!(report.contains("[Post] Create success (201)"));
        assert!(report.contains("30s:10, 1m:10, 10s:0"));
    }

    #[test]
    fn test_failed_checks_cross_threshold() {
        let metrics = healthy_metrics();
        metrics.record_check("CompanyList CRUD", "[Company] Create success (201)", false);

        let summary = RunSummary::collect(
            "http://localhost:8080",
            &default_stages(),
            execution(4),
            &metrics,
            &default_thresholds(),
        );

        assert!(!summary.passed());
        assert_eq!(summary.checks_rate, Some(0.8));
        assert!(summary.report().contains("FAIL (threshold crossed)"));
    }

    #[test]
    fn test_duration_thresholds_use_milliseconds() {
        let thresholds =
            parse_thresholds("http_req_duration=p(95)<50,max<=41,avg<26;iterations=count>0")
                .unwrap();
        let summary = RunSummary::collect(
            "http://localhost:8080",
            &default_stages(),
            execution(4),
            &healthy_metrics(),
            &thresholds,
        );

        assert!(summary.passed(), "{:?}", summary.thresholds);
        let p75 = summary
            .value(MetricName::HttpReqDuration, Aggregation::Percentile(75.0))
            .unwrap();
        assert!((p75 - 32.5).abs() < 1e-6);
    }

    #[test]
    fn test_empty_run_fails_and_serializes() {
        let summary = RunSummary::collect(
            "http://localhost:8080",
            &default_stages(),
            ExecutionStats::default(),
            &RunMetrics::new(),
            &default_thresholds(),
        );

        assert!(!summary.passed());
        let json: serde_json::Value = serde_json::from_str(&summary.to_json().unwrap()).unwrap();
        assert_eq!(json["http_reqs"], 0);
        assert_eq!(json["thresholds"][0]["metric"], "http_req_failed");
        assert!(json["thresholds"][0]["observed"].is_null());
        assert_eq!(json["stages"][1]["duration"], 60.0);
        assert!(json.get("http_duration_samples").is_none());
    }
}
