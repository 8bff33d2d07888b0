//! Run-level pass/fail criteria
//!
//! A threshold binds a metric to one or more expressions:
//!
//! ```text
//! http_req_failed    rate<0.01
//! checks             rate>0.98
//! http_req_duration  p(95)<500, avg<=200
//! ```
//!
//! Duration metrics are compared in milliseconds. An expression with no
//! observed value fails.

use crate::error::ConfigError;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Metrics a threshold may reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricName {
    HttpReqFailed,
    Checks,
    HttpReqs,
    HttpReqDuration,
    IterationDuration,
    Iterations,
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::HttpReqFailed => "http_req_failed",
            MetricName::Checks => "checks",
            MetricName::HttpReqs => "http_reqs",
            MetricName::HttpReqDuration => "http_req_duration",
            MetricName::IterationDuration => "iteration_duration",
            MetricName::Iterations => "iterations",
        }
    }

    fn supports(&self, aggregation: Aggregation) -> bool {
        use Aggregation::*;
        match self {
            MetricName::HttpReqFailed | MetricName::Checks => matches!(aggregation, Rate),
            MetricName::HttpReqs | MetricName::Iterations => matches!(aggregation, Count | Rate),
            MetricName::HttpReqDuration | MetricName::IterationDuration => {
                matches!(aggregation, Avg | Min | Max | Med | Percentile(_))
            }
        }
    }
}

impl FromStr for MetricName {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "http_req_failed" => Ok(MetricName::HttpReqFailed),
            "checks" => Ok(MetricName::Checks),
            "http_reqs" => Ok(MetricName::HttpReqs),
            "http_req_duration" => Ok(MetricName::HttpReqDuration),
            "iteration_duration" => Ok(MetricName::IterationDuration),
            "iterations" => Ok(MetricName::Iterations),
            other => Err(ConfigError::UnknownMetric(other.to_string())),
        }
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Aggregation {
    Rate,
    Count,
    Avg,
    Min,
    Max,
    Med,
    /// Percentile in (0, 100]
    Percentile(f64),
}

impl fmt::Display for Aggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Aggregation::Rate => f.write_str("rate"),
            Aggregation::Count => f.write_str("count"),
            Aggregation::Avg => f.write_str("avg"),
            Aggregation::Min => f.write_str("min"),
            Aggregation::Max => f.write_str("max"),
            Aggregation::Med => f.write_str("med"),
            Aggregation::Percentile(p) => write!(f, "p({})", p),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

impl Comparator {
    pub fn holds(&self, observed: f64, bound: f64) -> bool {
        match self {
            Comparator::Lt => observed < bound,
            Comparator::Le => observed <= bound,
            Comparator::Gt => observed > bound,
            Comparator::Ge => observed >= bound,
            Comparator::Eq => observed == bound,
            Comparator::Ne => observed != bound,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            Comparator::Lt => "<",
            Comparator::Le => "<=",
            Comparator::Gt => ">",
            Comparator::Ge => ">=",
            Comparator::Eq => "==",
            Comparator::Ne => "!=",
        }
    }
}

/// One `<aggregation><op><number>` expression
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    pub aggregation: Aggregation,
    pub comparator: Comparator,
    pub bound: f64,
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.aggregation, self.comparator.as_str(), self.bound)
    }
}

impl FromStr for Expression {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let compact: String = s.chars().filter(|c| !c.is_whitespace()).collect();
        let invalid = || ConfigError::InvalidThreshold(s.to_string());

        // Two-character operators first so `<=` is not read as `<`
        let (op_pos, comparator, op_len) = [
            ("<=", Comparator::Le),
            (">=", Comparator::Ge),
            ("==", Comparator::Eq),
            ("!=", Comparator::Ne),
            ("<", Comparator::Lt),
            (">", Comparator::Gt),
        ]
        .iter()
        .find_map(|(op, cmp)| compact.find(op).map(|pos| (pos, *cmp, op.len())))
        .ok_or_else(invalid)?;

        let lhs = &compact[..op_pos];
        let rhs = &compact[op_pos + op_len..];

        let aggregation = parse_aggregation(lhs).ok_or_else(invalid)?;
        let bound: f64 = rhs.parse().map_err(|_| invalid())?;
        if !bound.is_finite() {
            return Err(invalid());
        }

        Ok(Self {
            aggregation,
            comparator,
            bound,
        })
    }
}

fn parse_aggregation(s: &str) -> Option<Aggregation> {
    match s {
        "rate" => Some(Aggregation::Rate),
        "count" => Some(Aggregation::Count),
        "avg" => Some(Aggregation::Avg),
        "min" => Some(Aggregation::Min),
        "max" => Some(Aggregation::Max),
        "med" => Some(Aggregation::Med),
        _ => {
            let p: f64 = s.strip_prefix("p(")?.strip_suffix(')')?.parse().ok()?;
            (p > 0.0 && p <= 100.0).then_some(Aggregation::Percentile(p))
        }
    }
}

/// A metric with the expressions it must satisfy
#[derive(Debug, Clone, PartialEq)]
pub struct Threshold {
    pub metric: MetricName,
    pub expressions: Vec<Expression>,
}

impl Threshold {
    /// Build a threshold, rejecting aggregations the metric does not have
    pub fn new(metric: MetricName, expressions: Vec<Expression>) -> Result<Self, ConfigError> {
        for expr in &expressions {
            if !metric.supports(expr.aggregation) {
                return Err(ConfigError::UnsupportedAggregation {
                    metric: metric.to_string(),
                    aggregation: expr.aggregation.to_string(),
                });
            }
        }
        Ok(Self {
            metric,
            expressions,
        })
    }
}

/// Default criteria: under 1% failed requests, over 98% passing checks
pub fn default_thresholds() -> Vec<Threshold> {
    vec![
        Threshold {
            metric: MetricName::HttpReqFailed,
            expressions: vec![Expression {
                aggregation: Aggregation::Rate,
                comparator: Comparator::Lt,
                bound: 0.01,
            }],
        },
        Threshold {
            metric: MetricName::Checks,
            expressions: vec![Expression {
                aggregation: Aggregation::Rate,
                comparator: Comparator::Gt,
                bound: 0.98,
            }],
        },
    ]
}

/// Parse `metric=expr[,expr];metric=expr...`
pub fn parse_thresholds(s: &str) -> Result<Vec<Threshold>, ConfigError> {
    s.split(';')
        .filter(|part| !part.trim().is_empty())
        .map(|part| {
            let (metric, exprs) = part
                .split_once('=')
                .ok_or_else(|| ConfigError::InvalidThreshold(part.to_string()))?;
            let metric: MetricName = metric.parse()?;
            let expressions = exprs
                .split(',')
                .map(str::parse)
                .collect::<Result<Vec<Expression>, _>>()?;
            Threshold::new(metric, expressions)
        })
        .collect()
}

/// Source of aggregated values for threshold evaluation
pub trait MetricValues {
    /// Observed value of `aggregation` over `metric`, `None` without samples
    fn value(&self, metric: MetricName, aggregation: Aggregation) -> Option<f64>;
}

/// Result of one expression
#[derive(Debug, Clone, Serialize)]
pub struct ThresholdOutcome {
    pub metric: MetricName,
    pub expression: String,
    pub observed: Option<f64>,
    pub passed: bool,
}

/// Evaluate every expression of every threshold
pub fn evaluate(thresholds: &[Threshold], values: &impl MetricValues) -> Vec<ThresholdOutcome> {
    thresholds
        .iter()
        .flat_map(|threshold| {
            threshold.expressions.iter().map(move |expr| {
                let observed = values.value(threshold.metric, expr.aggregation);
                let passed = observed
                    .map(|v| expr.comparator.holds(v, expr.bound))
                    .unwrap_or(false);
                ThresholdOutcome {
                    metric: threshold.metric,
                    expression: expr.to_string(),
                    observed,
                    passed,
                }
            })
        })
        .collect()
}
