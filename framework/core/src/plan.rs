//! The load profile for a run: an ordered list of stages that the runner walks through,
//! linearly ramping the number of concurrent virtual users between stage targets.

use std::time::Duration;

use serde::{Deserialize, Deserializer};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlanError {
    #[error("a run plan must contain at least one stage")]
    NoStages,
    #[error("stage {index} has a zero duration")]
    ZeroDurationStage { index: usize },
    #[error("invalid duration {input:?}: {reason}")]
    InvalidDuration { input: String, reason: &'static str },
}

/// Parse a human-readable duration such as `250ms`, `90s`, `3m` or `1h`.
pub fn parse_duration(raw: &str) -> Result<Duration, PlanError> {
    let invalid = |reason| PlanError::InvalidDuration {
        input: raw.to_string(),
        reason,
    };

    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(invalid("empty string"));
    }
    let unit_start = trimmed
        .find(|c: char| !c.is_ascii_digit())
        .ok_or_else(|| invalid("missing unit, expected one of ms, s, m, h"))?;
    let (value, unit) = trimmed.split_at(unit_start);
    if value.is_empty() {
        return Err(invalid("missing leading digits"));
    }
    let value: u64 = value.parse().map_err(|_| invalid("value out of range"))?;

    let seconds_per_unit = match unit {
        "ms" => return Ok(Duration::from_millis(value)),
        "s" => 1,
        "m" => 60,
        "h" => 3600,
        _ => return Err(invalid("unknown unit, expected one of ms, s, m, h")),
    };
    value
        .checked_mul(seconds_per_unit)
        .map(Duration::from_secs)
        .ok_or_else(|| invalid("value out of range"))
}

fn duration_from_str<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_duration(&raw).map_err(serde::de::Error::custom)
}

/// One leg of a run plan. Over `duration` the runner ramps the concurrent user count from
/// whatever the previous stage ended on to `target`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Stage {
    #[serde(deserialize_with = "duration_from_str")]
    pub duration: Duration,
    pub target: usize,
}

impl Stage {
    pub fn new(duration: Duration, target: usize) -> Self {
        Self { duration, target }
    }
}

/// A validated sequence of [Stage]s. Immutable once built, so every part of the runner that
/// holds a copy computes the same target for the same elapsed time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunPlan {
    start_target: usize,
    stages: Vec<Stage>,
    total: Duration,
}

impl RunPlan {
    /// Build a plan that ramps from rest. Fails if the stage list is empty or any stage has a
    /// zero duration, which would make the ramp gradient undefined.
    pub fn new(stages: Vec<Stage>) -> Result<Self, PlanError> {
        if stages.is_empty() {
            return Err(PlanError::NoStages);
        }
        if let Some(index) = stages.iter().position(|stage| stage.duration.is_zero()) {
            return Err(PlanError::ZeroDurationStage { index });
        }
        let total = stages.iter().map(|stage| stage.duration).sum();

        Ok(Self {
            start_target: 0,
            stages,
            total,
        })
    }

    /// Start the first ramp from `start_target` users instead of from rest.
    pub fn with_start_target(mut self, start_target: usize) -> Self {
        self.start_target = start_target;
        self
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn start_target(&self) -> usize {
        self.start_target
    }

    pub fn total_duration(&self) -> Duration {
        self.total
    }

    /// The highest user count the plan will ask for at any point.
    pub fn max_target(&self) -> usize {
        self.stages
            .iter()
            .map(|stage| stage.target)
            .max()
            .unwrap_or(0)
            .max(self.start_target)
    }

    /// The number of concurrent users the plan calls for at `elapsed` time into the run.
    ///
    /// The target moves linearly from the previous stage's target to the current stage's target
    /// over the stage's duration, rounded to the nearest whole user. At or past the end of the
    /// plan the target is zero.
    pub fn target_at(&self, elapsed: Duration) -> usize {
        if elapsed >= self.total {
            return 0;
        }

        let mut stage_start = Duration::ZERO;
        let mut previous = self.start_target;
        for stage in &self.stages {
            let stage_end = stage_start + stage.duration;
            if elapsed < stage_end {
                let progress =
                    (elapsed - stage_start).as_secs_f64() / stage.duration.as_secs_f64();
                let from = previous as f64;
                let to = stage.target as f64;
                return (from + (to - from) * progress).round() as usize;
            }
            previous = stage.target;
            stage_start = stage_end;
        }

        0
    }
}
