use crate::app::ports::ClusterPort;
use crate::config::ClusterConfig;
use crate::error::{ExporterError, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

/// Lists solver configurations through a Kubernetes-style list endpoint
pub struct KubeCluster {
    client: reqwest::Client,
    list_url: String,
    label_selector: String,
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ObjectList {
    #[serde(default)]
    items: Vec<ObjectItem>,
}

#[derive(Debug, Deserialize)]
struct ObjectItem {
    metadata: ObjectMeta,
}

#[derive(Debug, Deserialize)]
struct ObjectMeta {
    name: String,
}

impl KubeCluster {
    pub fn new(api_url: &str, config: &ClusterConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        let path = config.list_path.replace("{namespace}", &config.namespace);
        Ok(Self {
            client,
            list_url: format!("{}{}", api_url.trim_end_matches('/'), path),
            label_selector: config.label_selector.clone(),
            token: config.token.clone(),
        })
    }
}

/// Extract object names from a list response body
pub fn parse_object_names(body: &str) -> Result<Vec<String>> {
    let list: ObjectList = serde_json::from_str(body)?;
    Ok(list.items.into_iter().map(|item| item.metadata.name).collect())
}

#[async_trait]
impl ClusterPort for KubeCluster {
    async fn list_active_solver_identities(&self) -> Result<Vec<String>> {
        let mut request = self.client.get(&self.list_url);
        if !self.label_selector.is_empty() {
            request = request.query(&[("labelSelector", self.label_selector.as_str())]);
        }
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let resp = request.send().await?;
        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(ExporterError::cluster(format!(
                "listing {} returned {}",
                self.list_url, status
            )));
        }
        parse_object_names(&body)
    }
}
