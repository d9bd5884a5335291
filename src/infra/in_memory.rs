//! In-memory implementations of the ports, for dry runs, static deployments and tests

use crate::app::ports::{ClusterPort, GraphPort, MetricSink, MetricsBackend};
use crate::error::{ExporterError, Result};
use crate::types::{BloatStatistic, Labels, PointSample, SolverErrorFilter, SolverIdentity};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

/// Solver list fixed at construction, used when no cluster API is configured
pub struct StaticCluster {
    solvers: Mutex<Vec<String>>,
    unavailable: AtomicBool,
}

impl StaticCluster {
    pub fn new(solvers: Vec<String>) -> Self {
        Self {
            solvers: Mutex::new(solvers),
            unavailable: AtomicBool::new(false),
        }
    }

    pub fn set_solvers(&self, solvers: Vec<String>) {
        *self.solvers.lock().unwrap() = solvers;
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }
}

#[async_trait]
impl ClusterPort for StaticCluster {
    async fn list_active_solver_identities(&self) -> Result<Vec<String>> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(ExporterError::cluster("cluster API unavailable"));
        }
        Ok(self.solvers.lock().unwrap().clone())
    }
}

/// Canned graph answers
#[derive(Debug, Clone, Default)]
pub struct GraphFixture {
    pub healthy: bool,
    pub corrupted: bool,
    pub bloat: Vec<BloatStatistic>,
    pub unsolved: HashMap<String, u64>,
    pub solved: HashMap<String, u64>,
    pub errors: HashMap<(String, SolverErrorFilter), u64>,
    /// Solver names whose queries fail
    pub failing_solvers: HashSet<String>,
    /// Every query fails
    pub unavailable: bool,
}

pub struct InMemoryGraph {
    fixture: Mutex<GraphFixture>,
    bloat_calls: AtomicUsize,
}

impl Default for InMemoryGraph {
    fn default() -> Self {
        Self::new(GraphFixture { healthy: true, ..GraphFixture::default() })
    }
}

impl InMemoryGraph {
    pub fn new(fixture: GraphFixture) -> Self {
        Self {
            fixture: Mutex::new(fixture),
            bloat_calls: AtomicUsize::new(0),
        }
    }

    /// Mutate the canned answers between runs
    pub fn update<F: FnOnce(&mut GraphFixture)>(&self, f: F) {
        f(&mut self.fixture.lock().unwrap());
    }

    /// Number of bloat scans served so far
    pub fn bloat_calls(&self) -> usize {
        self.bloat_calls.load(Ordering::SeqCst)
    }

    fn check_available(&self) -> Result<()> {
        if self.fixture.lock().unwrap().unavailable {
            return Err(ExporterError::graph("graph database unavailable"));
        }
        Ok(())
    }

    fn solver_count<F>(&self, solver: &SolverIdentity, pick: F) -> Result<u64>
    where
        F: FnOnce(&GraphFixture) -> Option<u64>,
    {
        let fixture = self.fixture.lock().unwrap();
        if fixture.unavailable {
            return Err(ExporterError::graph("graph database unavailable"));
        }
        if fixture.failing_solvers.contains(&solver.name) {
            return Err(ExporterError::graph(format!("query for {} failed", solver.name)));
        }
        Ok(pick(&fixture).unwrap_or(0))
    }
}

#[async_trait]
impl GraphPort for InMemoryGraph {
    async fn execute_health_check(&self) -> Result<()> {
        self.check_available()?;
        if self.fixture.lock().unwrap().healthy {
            Ok(())
        } else {
            Err(ExporterError::graph("health check failed"))
        }
    }

    async fn bloat_statistics(&self) -> Result<Vec<BloatStatistic>> {
        self.check_available()?;
        self.bloat_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.fixture.lock().unwrap().bloat.clone())
    }

    async fn is_corrupted(&self) -> Result<bool> {
        self.check_available()?;
        Ok(self.fixture.lock().unwrap().corrupted)
    }

    async fn count_unsolved(&self, solver: &SolverIdentity) -> Result<u64> {
        self.solver_count(solver, |f| f.unsolved.get(&solver.name).copied())
    }

    async fn count_solved(&self, solver: &SolverIdentity) -> Result<u64> {
        self.solver_count(solver, |f| f.solved.get(&solver.name).copied())
    }

    async fn count_solved_with_error(&self, solver: &SolverIdentity, filter: SolverErrorFilter) -> Result<u64> {
        self.solver_count(solver, |f| f.errors.get(&(solver.name.clone(), filter)).copied())
    }
}

/// Metrics backend holding whatever the test or dry run put into it
#[derive(Default)]
pub struct InMemoryBackend {
    series: Mutex<HashMap<String, Vec<(Labels, PointSample)>>>,
    unavailable: AtomicBool,
    queries: AtomicUsize,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store (or replace) the latest sample of a series
    pub fn insert(&self, metric: &str, labels: Labels, sample: PointSample) {
        let mut series = self.series.lock().unwrap();
        let entries = series.entry(metric.to_string()).or_default();
        match entries.iter_mut().find(|(l, _)| *l == labels) {
            Some(entry) => entry.1 = sample,
            None => entries.push((labels, sample)),
        }
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MetricsBackend for InMemoryBackend {
    async fn current_value(&self, metric: &str, labels: &Labels) -> Result<Option<PointSample>> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(ExporterError::backend("metrics backend unavailable"));
        }
        let series = self.series.lock().unwrap();
        // Selector semantics: every filter label must match, extra series labels are fine
        Ok(series.get(metric).and_then(|entries| {
            entries
                .iter()
                .find(|(l, _)| labels.iter().all(|(k, v)| l.get(k) == Some(v)))
                .map(|(_, sample)| *sample)
        }))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RecordedWrite {
    Set { metric: String, labels: Labels, value: f64 },
    Increment { metric: String, labels: Labels, amount: u64 },
}

impl RecordedWrite {
    pub fn metric(&self) -> &str {
        match self {
            RecordedWrite::Set { metric, .. } | RecordedWrite::Increment { metric, .. } => metric,
        }
    }
}

impl fmt::Display for RecordedWrite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordedWrite::Set { metric, labels, value } => write!(f, "set {}{} = {}", metric, labels, value),
            RecordedWrite::Increment { metric, labels, amount } => {
                write!(f, "inc {}{} += {}", metric, labels, amount)
            }
        }
    }
}

/// Sink that records every write instead of publishing it
#[derive(Default)]
pub struct RecordingSink {
    writes: Mutex<Vec<RecordedWrite>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn writes(&self) -> Vec<RecordedWrite> {
        self.writes.lock().unwrap().clone()
    }

    pub fn writes_for(&self, metric: &str) -> Vec<RecordedWrite> {
        self.writes
            .lock()
            .unwrap()
            .iter()
            .filter(|w| w.metric() == metric)
            .cloned()
            .collect()
    }

    /// Last value set on a gauge series
    pub fn gauge(&self, metric: &str, labels: &Labels) -> Option<f64> {
        self.writes.lock().unwrap().iter().rev().find_map(|w| match w {
            RecordedWrite::Set { metric: m, labels: l, value } if m == metric && l == labels => Some(*value),
            _ => None,
        })
    }

    /// Sum of all increments on a counter series
    pub fn counter(&self, metric: &str, labels: &Labels) -> u64 {
        self.writes
            .lock()
            .unwrap()
            .iter()
            .filter_map(|w| match w {
                RecordedWrite::Increment { metric: m, labels: l, amount } if m == metric && l == labels => {
                    Some(*amount)
                }
                _ => None,
            })
            .sum()
    }

    pub fn clear(&self) {
        self.writes.lock().unwrap().clear();
    }
}

impl MetricSink for RecordingSink {
    fn set(&self, metric: &str, labels: &Labels, value: f64) {
        self.writes.lock().unwrap().push(RecordedWrite::Set {
            metric: metric.to_string(),
            labels: labels.clone(),
            value,
        });
    }

    fn increment(&self, metric: &str, labels: &Labels, amount: u64) {
        self.writes.lock().unwrap().push(RecordedWrite::Increment {
            metric: metric.to_string(),
            labels: labels.clone(),
            amount,
        });
    }
}
