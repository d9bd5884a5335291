//! Metric jobs and the machinery that registers and runs them
//!
//! A job is a unit struct implementing [`MetricJob`]. Each job module exposes a
//! `register` function; [`default_registry`] calls them in a fixed order and
//! freezes the result, so adding a job never means editing a dispatch table.

pub mod db;
pub mod registry;
pub mod runner;
pub mod solver;

pub use registry::{FrozenRegistry, JobDescriptor, JobRegistry, Registration};
pub use runner::{JobOutcome, JobReport, JobRunner, RunReport};

use crate::app::ports::{ClusterPort, GraphPort, MetricSink, MetricsBackend};
use crate::config::Config;
use crate::constants::LABEL_INSTANCE;
use crate::derive::ThrottleState;
use crate::error::Result;
use crate::metrics::MetricName;
use crate::types::Labels;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

#[async_trait]
pub trait MetricJob: Send + Sync + 'static {
    /// Unique job name, used for registration, logs and self-metrics
    fn name(&self) -> &'static str;

    /// Whether the job may run on a worker next to other jobs
    fn concurrent_safe(&self) -> bool {
        false
    }

    async fn run(&self, ctx: &JobContext, state: &mut JobState) -> Result<()>;
}

/// Per-job state, owned by the runner and lent to each invocation
#[derive(Debug, Clone, Default)]
pub struct JobState {
    pub throttle: ThrottleState,
    /// Last value published for a series the job computes a delta against
    pub last_published: Option<f64>,
    pub runs: u64,
    pub failures: u64,
    pub last_success: Option<DateTime<Utc>>,
}

/// Settings the jobs read at run time
#[derive(Debug, Clone)]
pub struct JobSettings {
    /// `instance` label the metrics backend attaches to this exporter's series
    pub instance: String,
    pub bloat_interval: Duration,
}

impl JobSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            instance: config.exporter.instance.clone(),
            bloat_interval: config.bloat_interval(),
        }
    }

    /// Filter selecting this exporter's own series in the metrics backend
    pub fn instance_labels(&self) -> Labels {
        Labels::new().with(LABEL_INSTANCE, self.instance.clone())
    }
}

impl Default for JobSettings {
    fn default() -> Self {
        Self {
            instance: "graph-metrics-exporter:9898".to_string(),
            bloat_interval: Duration::from_secs(7 * 24 * 60 * 60),
        }
    }
}

/// External collaborators injected into every job
#[derive(Clone)]
pub struct JobContext {
    pub graph: Arc<dyn GraphPort>,
    pub cluster: Arc<dyn ClusterPort>,
    pub backend: Arc<dyn MetricsBackend>,
    pub sink: Arc<dyn MetricSink>,
    pub settings: JobSettings,
}

impl JobContext {
    pub fn set(&self, metric: MetricName, labels: &Labels, value: f64) {
        debug!("{}{}={}", metric, labels, value);
        self.sink.set(metric.as_str(), labels, value);
    }

    pub fn increment(&self, metric: MetricName, labels: &Labels, amount: u64) {
        debug!("{}{}+={}", metric, labels, amount);
        self.sink.increment(metric.as_str(), labels, amount);
    }
}

/// Registry holding every built-in job, frozen
pub fn default_registry() -> Result<FrozenRegistry> {
    let mut registry = JobRegistry::new();
    db::register(&mut registry)?;
    solver::register(&mut registry)?;
    Ok(registry.freeze())
}
