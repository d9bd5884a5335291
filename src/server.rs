use crate::app::ports::{ClusterPort, MetricSink};
use crate::config::Config;
use crate::error::Result;
use crate::infra::http_graph::HttpGraph;
use crate::infra::in_memory::StaticCluster;
use crate::infra::kube_cluster::KubeCluster;
use crate::infra::prometheus_query::PrometheusQuery;
use crate::jobs::{self, JobContext, JobRunner, JobSettings};
use std::future::Future;
use std::sync::Arc;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

/// Build the job context from configuration, publishing through `sink`
pub fn build_context(config: &Config, sink: Arc<dyn MetricSink>) -> Result<JobContext> {
    let cluster: Arc<dyn ClusterPort> = match config.cluster.api_url.as_deref() {
        Some(api_url) => {
            info!(api_url, namespace = %config.cluster.namespace, "listing solvers from cluster API");
            Arc::new(KubeCluster::new(api_url, &config.cluster)?)
        }
        None => {
            info!(solvers = config.cluster.solvers.len(), "using static solver list");
            Arc::new(StaticCluster::new(config.cluster.solvers.clone()))
        }
    };

    Ok(JobContext {
        graph: Arc::new(HttpGraph::new(&config.graph)?),
        cluster,
        backend: Arc::new(PrometheusQuery::new(&config.prometheus)?),
        sink,
        settings: JobSettings::from_config(config),
    })
}

/// Runner over the built-in jobs with the configured execution mode
pub fn build_runner(config: &Config, sink: Arc<dyn MetricSink>) -> Result<JobRunner> {
    let registry = jobs::default_registry()?;
    let ctx = build_context(config, sink)?;
    Ok(JobRunner::new(registry, ctx).with_execution(config.exporter.execution, config.exporter.max_workers))
}

/// Run all jobs every configured interval until `shutdown` resolves.
///
/// A run in progress when shutdown is requested is allowed to finish.
pub async fn serve<S>(config: &Config, runner: &JobRunner, shutdown: S) -> Result<()>
where
    S: Future<Output = ()>,
{
    let mut ticker = tokio::time::interval(config.interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tokio::pin!(shutdown);

    info!(
        interval_secs = config.exporter.interval_secs,
        jobs = runner.registry().len(),
        execution = ?config.exporter.execution,
        "exporter started"
    );

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("shutdown requested, stopping");
                break;
            }
            _ = ticker.tick() => {
                let report = runner.run_all().await;
                if !report.all_succeeded() {
                    let failed: Vec<&str> = report.failed().map(|j| j.name).collect();
                    warn!(run_id = %report.run_id, ?failed, "run finished with failed jobs");
                }
            }
        }
    }

    Ok(())
}
