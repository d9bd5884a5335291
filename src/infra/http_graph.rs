use crate::app::ports::GraphPort;
use crate::config::GraphConfig;
use crate::error::{ExporterError, Result};
use crate::types::{BloatStatistic, SolverErrorFilter, SolverIdentity};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

/// JSON-over-HTTP client for the knowledge-graph service
pub struct HttpGraph {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct CountResponse {
    count: u64,
}

#[derive(Debug, Deserialize)]
struct CorruptionResponse {
    corrupted: bool,
}

impl HttpGraph {
    pub fn new(config: &GraphConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self.client.get(&url).query(query).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ExporterError::graph(format!(
                "GET {} returned {}: {}",
                path,
                status,
                body.chars().take(200).collect::<String>()
            )));
        }
        Ok(resp.json::<T>().await?)
    }

    async fn get_count(&self, path: &str, query: &[(&str, String)]) -> Result<u64> {
        Ok(self.get_json::<CountResponse>(path, query).await?.count)
    }
}

fn solver_query(solver: &SolverIdentity) -> Vec<(&'static str, String)> {
    vec![
        ("os_name", solver.os_name.clone()),
        ("os_version", solver.os_version.clone()),
        ("python_version", solver.python_version.clone()),
    ]
}

#[async_trait]
impl GraphPort for HttpGraph {
    async fn execute_health_check(&self) -> Result<()> {
        let url = format!("{}/health", self.base_url);
        let resp = self.client.get(&url).send().await?;
        if resp.status().is_success() {
            Ok(())
        } else {
            Err(ExporterError::graph(format!("health check returned {}", resp.status())))
        }
    }

    async fn bloat_statistics(&self) -> Result<Vec<BloatStatistic>> {
        self.get_json("/statistics/bloat", &[]).await
    }

    async fn is_corrupted(&self) -> Result<bool> {
        Ok(self
            .get_json::<CorruptionResponse>("/statistics/corruption", &[])
            .await?
            .corrupted)
    }

    async fn count_unsolved(&self, solver: &SolverIdentity) -> Result<u64> {
        self.get_count("/python/solver/unsolved/count", &solver_query(solver)).await
    }

    async fn count_solved(&self, solver: &SolverIdentity) -> Result<u64> {
        self.get_count("/python/solver/solved/count", &solver_query(solver)).await
    }

    async fn count_solved_with_error(&self, solver: &SolverIdentity, filter: SolverErrorFilter) -> Result<u64> {
        let mut query = solver_query(solver);
        query.push(("unparseable", filter.unparseable.to_string()));
        query.push(("unsolvable", filter.unsolvable.to_string()));
        self.get_count("/python/solver/error/count", &query).await
    }
}
