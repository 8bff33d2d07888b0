//! Ramp stages for the virtual-user executor
//!
//! A run is a sequence of stages. Each stage moves the active VU population
//! linearly from the previous target to its own target over its duration:
//!
//! ```text
//! 30s:10  ramp from start_vus to 10
//! 1m:10   hold at 10
//! 10s:0   ramp down to 0
//! ```

use crate::error::ConfigError;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// One time-boxed target population level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Stage {
    /// How long the ramp towards `target` lasts
    #[serde(with = "duration_secs")]
    pub duration: Duration,
    /// VU population at the end of the stage
    pub target: usize,
}

impl Stage {
    pub const fn new(duration: Duration, target: usize) -> Self {
        Self { duration, target }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", format_duration(self.duration), self.target)
    }
}

impl FromStr for Stage {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (duration, target) = s
            .trim()
            .split_once(':')
            .ok_or_else(|| ConfigError::InvalidStage(s.to_string()))?;
        let duration = parse_duration(duration)?;
        let target = target
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidStage(s.to_string()))?;
        Ok(Self { duration, target })
    }
}

/// The default ramp: 30s up to 10 VUs, hold for 1m, 10s down to 0
pub fn default_stages() -> Vec<Stage> {
    vec![
        Stage::new(Duration::from_secs(30), 10),
        Stage::new(Duration::from_secs(60), 10),
        Stage::new(Duration::from_secs(10), 0),
    ]
}

/// Parse a comma-separated stage list such as `30s:10,1m:10,10s:0`
pub fn parse_stages(s: &str) -> Result<Vec<Stage>, ConfigError> {
    let stages = s
        .split(',')
        .filter(|part| !part.trim().is_empty())
        .map(str::parse)
        .collect::<Result<Vec<Stage>, _>>()?;

    if stages.is_empty() {
        return Err(ConfigError::NoStages);
    }
    Ok(stages)
}

/// Parse a duration made of `<n><unit>` components, e.g. `1m30s`, `500ms`, `2h`
///
/// Fractional amounts are accepted (`1.5s`). A bare number is rejected so
/// that a missing unit never silently means seconds.
pub fn parse_duration(s: &str) -> Result<Duration, ConfigError> {
    let s = s.trim();
    let invalid = || ConfigError::InvalidDuration(s.to_string());

    if s.is_empty() {
        return Err(invalid());
    }

    let mut total = 0.0f64;
    let mut rest = s;
    while !rest.is_empty() {
        let num_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .ok_or_else(invalid)?;
        if num_len == 0 {
            return Err(invalid());
        }
        let amount: f64 = rest[..num_len].parse().map_err(|_| invalid())?;
        rest = &rest[num_len..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let scale = match &rest[..unit_len] {
            "ms" => 0.001,
            "s" => 1.0,
            "m" => 60.0,
            "h" => 3600.0,
            _ => return Err(invalid()),
        };
        rest = &rest[unit_len..];

        total += amount * scale;
    }

    Duration::try_from_secs_f64(total).map_err(|_| invalid())
}

/// Render a duration the way it would be written in a stage definition
pub fn format_duration(d: Duration) -> String {
    let millis = d.as_millis();
    if millis % 1000 != 0 {
        return format!("{}ms", millis);
    }

    let secs = d.as_secs();
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    let mut out = String::new();
    if h > 0 {
        out.push_str(&format!("{}h", h));
    }
    if m > 0 {
        out.push_str(&format!("{}m", m));
    }
    if s > 0 || out.is_empty() {
        out.push_str(&format!("{}s", s));
    }
    out
}

/// Total wall-clock length of a stage list
pub fn total_duration(stages: &[Stage]) -> Duration {
    stages.iter().map(|s| s.duration).sum()
}

/// Target VU count at `elapsed` into the run
///
/// Interpolates linearly inside the current stage and rounds to the nearest
/// whole VU. Past the last stage the last target holds.
pub fn target_at(stages: &[Stage], start_vus: usize, elapsed: Duration) -> usize {
    let mut from = start_vus;
    let mut stage_start = Duration::ZERO;

    for stage in stages {
        let stage_end = stage_start + stage.duration;
        if elapsed < stage_end {
            let frac = (elapsed - stage_start).as_secs_f64() / stage.duration.as_secs_f64();
            let value = from as f64 + (stage.target as f64 - from as f64) * frac;
            return value.round().max(0.0) as usize;
        }
        from = stage.target;
        stage_start = stage_end;
    }

    from
}

/// Index of the stage running at `elapsed`, or `None` once all stages are over
pub fn stage_index_at(stages: &[Stage], elapsed: Duration) -> Option<usize> {
    let mut stage_end = Duration::ZERO;
    for (idx, stage) in stages.iter().enumerate() {
        stage_end += stage.duration;
        if elapsed < stage_end {
            return Some(idx);
        }
    }
    None
}

/// Highest VU count any point of the ramp asks for
pub fn peak_target(stages: &[Stage], start_vus: usize) -> usize {
    stages
        .iter()
        .map(|s| s.target)
        .fold(start_vus, usize::max)
}

pub(crate) mod duration_secs {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(d.as_secs_f64())
    }
}
