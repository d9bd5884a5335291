//! Knowledge-graph database health jobs

use super::{JobContext, JobRegistry, JobState, MetricJob};
use crate::constants::{
    GRAPHDB_BLOAT_DATA_JOB, GRAPHDB_CONNECTION_STATUS_JOB, GRAPHDB_CORRUPTION_JOB, LABEL_TABLE, NO_TABLE_SENTINEL,
};
use crate::derive::Throttle;
use crate::error::Result;
use crate::metrics::MetricName;
use crate::types::Labels;
use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info, warn};

pub fn register(registry: &mut JobRegistry) -> Result<()> {
    registry.register(GraphDbConnectionStatus)?;
    registry.register(GraphDbBloatData)?;
    registry.register(GraphDbCorruption)?;
    Ok(())
}

/// Publishes whether the graph database answers a health check.
///
/// A failed check is the observation itself, so the job still succeeds.
pub struct GraphDbConnectionStatus;

#[async_trait]
impl MetricJob for GraphDbConnectionStatus {
    fn name(&self) -> &'static str {
        GRAPHDB_CONNECTION_STATUS_JOB
    }

    fn concurrent_safe(&self) -> bool {
        true
    }

    async fn run(&self, ctx: &JobContext, _state: &mut JobState) -> Result<()> {
        let up = match ctx.graph.execute_health_check().await {
            Ok(()) => 1.0,
            Err(e) => {
                warn!(error = %e, "graph database health check failed");
                0.0
            }
        };
        ctx.set(MetricName::GraphDbConnectionUp, &Labels::new(), up);
        Ok(())
    }
}

/// Per-table bloat, evaluated at most once per configured interval
pub struct GraphDbBloatData;

#[async_trait]
impl MetricJob for GraphDbBloatData {
    fn name(&self) -> &'static str {
        GRAPHDB_BLOAT_DATA_JOB
    }

    async fn run(&self, ctx: &JobContext, state: &mut JobState) -> Result<()> {
        let throttle = Throttle::new(
            MetricName::GraphDbLastBloatEvaluation.as_str(),
            ctx.settings.instance_labels(),
            ctx.settings.bloat_interval,
        );
        let decision = throttle.check(ctx.backend.as_ref(), &state.throttle).await?;
        if !decision.should_evaluate() {
            debug!(?decision, "bloat evaluation skipped");
            return Ok(());
        }

        let statistics = ctx.graph.bloat_statistics().await?;

        if statistics.is_empty() {
            let labels = Labels::new().with(LABEL_TABLE, NO_TABLE_SENTINEL);
            ctx.set(MetricName::GraphDbTableBloatPercent, &labels, 0.0);
            ctx.set(MetricName::GraphDbTableBloatMegabytes, &labels, 0.0);
            debug!("bloat listing is empty");
        } else {
            for table in &statistics {
                let labels = Labels::new().with(LABEL_TABLE, table.table_name.clone());
                ctx.set(MetricName::GraphDbTableBloatPercent, &labels, table.percent_bloat);
                ctx.set(MetricName::GraphDbTableBloatMegabytes, &labels, table.megabytes_bloat);
            }
        }

        let now = Utc::now().timestamp_millis() as f64 / 1000.0;
        ctx.set(MetricName::GraphDbLastBloatEvaluation, &Labels::new(), now);
        state.throttle.record_evaluation(now);

        info!(
            tables = statistics.len(),
            reason = ?decision,
            "bloat evaluated, next evaluation in {} days",
            throttle.interval().as_secs() / (24 * 60 * 60)
        );
        Ok(())
    }
}

pub struct GraphDbCorruption;

#[async_trait]
impl MetricJob for GraphDbCorruption {
    fn name(&self) -> &'static str {
        GRAPHDB_CORRUPTION_JOB
    }

    fn concurrent_safe(&self) -> bool {
        true
    }

    async fn run(&self, ctx: &JobContext, _state: &mut JobState) -> Result<()> {
        let corrupted = ctx.graph.is_corrupted().await?;
        if corrupted {
            warn!("graph database corruption detected");
        }
        ctx.set(MetricName::GraphDbIsCorrupted, &Labels::new(), if corrupted { 1.0 } else { 0.0 });
        Ok(())
    }
}
