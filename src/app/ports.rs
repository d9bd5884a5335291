use crate::error::Result;
use crate::types::{BloatStatistic, Labels, PointSample, SolverErrorFilter, SolverIdentity};
use async_trait::async_trait;

/// Knowledge-graph queries used by the jobs
#[async_trait]
pub trait GraphPort: Send + Sync {
    /// Cheap round-trip proving the database answers queries
    async fn execute_health_check(&self) -> Result<()>;

    /// Per-table bloat figures; an empty list is a valid answer
    async fn bloat_statistics(&self) -> Result<Vec<BloatStatistic>>;

    async fn is_corrupted(&self) -> Result<bool>;

    async fn count_unsolved(&self, solver: &SolverIdentity) -> Result<u64>;

    async fn count_solved(&self, solver: &SolverIdentity) -> Result<u64>;

    async fn count_solved_with_error(&self, solver: &SolverIdentity, filter: SolverErrorFilter) -> Result<u64>;

    fn parse_dimension_identity(&self, raw: &str) -> Result<SolverIdentity> {
        SolverIdentity::parse(raw)
    }
}

#[async_trait]
pub trait ClusterPort: Send + Sync {
    /// Names of the solver configurations currently deployed
    async fn list_active_solver_identities(&self) -> Result<Vec<String>>;
}

/// Read side of the metrics backend: what was last stored for a series
#[async_trait]
pub trait MetricsBackend: Send + Sync {
    /// `Ok(None)` means the backend answered but holds no matching series
    async fn current_value(&self, metric: &str, labels: &Labels) -> Result<Option<PointSample>>;
}

/// Write side of the metric registry. Writes are fire-and-forget.
pub trait MetricSink: Send + Sync {
    fn set(&self, metric: &str, labels: &Labels, value: f64);

    fn increment(&self, metric: &str, labels: &Labels, amount: u64);
}
