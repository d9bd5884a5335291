//! Metrics infrastructure for the exporter
//!
//! Installs the Prometheus recorder that backs the `/metrics` endpoint and
//! keeps a handle for in-process rendering (`once --print`).

pub mod catalog;
pub mod registry;

pub use catalog::MetricName;

use crate::error::{ExporterError, Result};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::sync::OnceLock;
use tracing::{error, info, warn};

static HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the global metrics recorder
///
/// Idempotent. With a listen address the Prometheus HTTP endpoint is served on
/// the current tokio runtime; without one the recorder is installed for
/// in-process rendering only.
pub fn init_metrics(listen: Option<SocketAddr>) -> Result<()> {
    if HANDLE.get().is_some() {
        warn!("metrics recorder already installed");
        return Ok(());
    }

    let handle = match listen {
        Some(addr) => {
            let (recorder, exporter) = PrometheusBuilder::new()
                .with_http_listener(addr)
                .build()
                .map_err(|e| ExporterError::Config(format!("Failed to build Prometheus exporter: {}", e)))?;
            let handle = recorder.handle();
            ::metrics::set_global_recorder(recorder)
                .map_err(|e| ExporterError::Config(format!("Failed to install metrics recorder: {}", e)))?;
            // The exporter's error type carries no Debug or Display impl
            tokio::spawn(async move {
                if exporter.await.is_err() {
                    error!("Prometheus HTTP listener on {} stopped", addr);
                }
            });
            info!("Prometheus HTTP exporter listening on http://{}/metrics", addr);
            handle
        }
        None => PrometheusBuilder::new()
            .install_recorder()
            .map_err(|e| ExporterError::Config(format!("Failed to install Prometheus recorder: {}", e)))?,
    };

    if HANDLE.set(handle).is_err() {
        warn!("metrics handle was stored concurrently");
    }

    registry::register_all_metrics();
    Ok(())
}

/// Render the current exposition text, if a recorder is installed
pub fn render() -> Option<String> {
    HANDLE.get().map(|h| h.render())
}

/// Documentation for a single metric
#[derive(Debug, Clone)]
pub struct MetricDoc {
    pub name: &'static str,
    pub metric_type: MetricType,
    pub help: &'static str,
    pub labels: Vec<&'static str>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricType {
    Counter,
    Histogram,
    Gauge,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::ports::MetricSink;
    use crate::infra::metrics_sink::PrometheusSink;
    use crate::types::Labels;
    use std::time::Duration;

    #[tokio::test]
    async fn test_http_listener_serves_published_series() {
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .and_then(|l| l.local_addr())
            .unwrap()
            .port();
        let addr: SocketAddr = format!("127.0.0.1:{}", port).parse().unwrap();

        init_metrics(Some(addr)).unwrap();
        // A second call keeps the installed recorder
        init_metrics(Some(addr)).unwrap();
        PrometheusSink.set("kg_solvers", &Labels::new(), 4.0);

        let url = format!("http://{}/metrics", addr);
        let mut body = None;
        for _ in 0..50 {
            if let Ok(resp) = reqwest::get(&url).await {
                body = Some(resp.text().await.unwrap());
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        let body = body.expect("listener answered");
        assert!(body.contains("kg_solvers 4"), "unexpected exposition: {}", body);
        assert!(render().unwrap().contains("kg_solvers"));
    }
}
