//! Run expensive work at most once per interval
//!
//! The clock is the metrics backend's own: the job publishes the time of its
//! last evaluation as a gauge, and the next check compares that value with the
//! time the backend last scraped it. Restarting the exporter therefore does not
//! forget when the work was last done; only the in-process `scrape_count`
//! resets, which forces one bootstrap evaluation after a restart.
//!
//! The backend lags behind the exporter by up to one scrape. Until its sample
//! carries the evaluation this process published, the in-process record of
//! that evaluation is compared with the wall clock instead.

use crate::app::ports::MetricsBackend;
use crate::error::Result;
use crate::types::{Labels, PointSample};
use chrono::Utc;
use std::time::Duration;
use tracing::{debug, warn};

// Published timestamps go through float formatting on their way to the backend
const PUBLISHED_TOLERANCE_SECS: f64 = 1e-3;

/// In-memory throttle bookkeeping, owned by the runner's per-job state
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ThrottleState {
    /// Completed evaluations since process start
    pub scrape_count: u64,
    /// Value last published on the evaluation gauge, in unix seconds
    pub last_evaluation: Option<f64>,
}

impl ThrottleState {
    /// Record an evaluation whose timestamp gauge was set to `published_at`
    pub fn record_evaluation(&mut self, published_at: f64) {
        self.scrape_count += 1;
        self.last_evaluation = Some(published_at);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvaluateReason {
    /// Nothing evaluated since process start
    Bootstrap,
    IntervalElapsed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    WithinInterval,
    /// The backend answered but has no series for the evaluation metric yet
    NoData,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThrottleDecision {
    Evaluate(EvaluateReason),
    Skip(SkipReason),
}

impl ThrottleDecision {
    pub fn should_evaluate(&self) -> bool {
        matches!(self, ThrottleDecision::Evaluate(_))
    }
}

/// Throttle keyed on a published "last evaluation" gauge
#[derive(Debug, Clone)]
pub struct Throttle {
    metric: &'static str,
    labels: Labels,
    interval: Duration,
}

impl Throttle {
    pub fn new(metric: &'static str, labels: Labels, interval: Duration) -> Self {
        Self { metric, labels, interval }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Decide whether the expensive path runs this cycle.
    ///
    /// A backend error is returned to the caller; an empty answer is a skip.
    pub async fn check(&self, backend: &dyn MetricsBackend, state: &ThrottleState) -> Result<ThrottleDecision> {
        if state.scrape_count == 0 {
            return Ok(ThrottleDecision::Evaluate(EvaluateReason::Bootstrap));
        }

        let sample = backend.current_value(self.metric, &self.labels).await?;
        let decision = match state.last_evaluation {
            Some(published) if !reflects(sample.as_ref(), published) => {
                debug!(metric = self.metric, published, "backend has not scraped the last evaluation yet");
                decide_published(published, now_secs(), self.interval)
            }
            _ => decide(sample, self.interval),
        };
        match decision {
            ThrottleDecision::Skip(SkipReason::NoData) => {
                warn!(metric = self.metric, labels = %self.labels, "no series found in metrics backend, skipping evaluation");
            }
            other => debug!(metric = self.metric, decision = ?other, "throttle checked"),
        }
        Ok(decision)
    }
}

/// Pure decision for a throttle that has already bootstrapped
pub fn decide(sample: Option<PointSample>, interval: Duration) -> ThrottleDecision {
    let Some(sample) = sample else {
        return ThrottleDecision::Skip(SkipReason::NoData);
    };

    let last_scrape = sample.timestamp.timestamp_millis() as f64 / 1000.0;
    let last_evaluation = sample.value;
    let elapsed = last_scrape - last_evaluation;

    if elapsed > interval.as_secs_f64() {
        ThrottleDecision::Evaluate(EvaluateReason::IntervalElapsed)
    } else {
        ThrottleDecision::Skip(SkipReason::WithinInterval)
    }
}

/// Decision from the evaluation this process published, against `now`
pub fn decide_published(published: f64, now: f64, interval: Duration) -> ThrottleDecision {
    if now - published > interval.as_secs_f64() {
        ThrottleDecision::Evaluate(EvaluateReason::IntervalElapsed)
    } else {
        ThrottleDecision::Skip(SkipReason::WithinInterval)
    }
}

fn reflects(sample: Option<&PointSample>, published: f64) -> bool {
    sample.is_some_and(|s| s.value >= published - PUBLISHED_TOLERANCE_SECS)
}

fn now_secs() -> f64 {
    Utc::now().timestamp_millis() as f64 / 1000.0
}
