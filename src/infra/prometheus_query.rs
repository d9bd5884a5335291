use crate::app::ports::MetricsBackend;
use crate::config::PrometheusConfig;
use crate::error::{ExporterError, Result};
use crate::types::{Labels, PointSample};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

/// Instant-query client for the Prometheus HTTP API
pub struct PrometheusQuery {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl PrometheusQuery {
    pub fn new(config: &PrometheusConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
        })
    }
}

#[async_trait]
impl MetricsBackend for PrometheusQuery {
    async fn current_value(&self, metric: &str, labels: &Labels) -> Result<Option<PointSample>> {
        let selector = build_selector(metric, labels);
        debug!(%selector, "querying metrics backend");

        let mut request = self
            .client
            .get(format!("{}/api/v1/query", self.base_url))
            .query(&[("query", selector.as_str())]);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let resp = request.send().await?;
        let status = resp.status();
        let body = resp.text().await?;

        match parse_query_response(&body) {
            Ok(sample) if status.is_success() => Ok(sample),
            Ok(_) => Err(ExporterError::backend(format!("HTTP {} for query {}", status, selector))),
            Err(_) if !status.is_success() => Err(ExporterError::backend(format!(
                "HTTP {} for query {}: {}",
                status,
                selector,
                body.chars().take(200).collect::<String>()
            ))),
            Err(e) => Err(e),
        }
    }
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    status: String,
    #[serde(default)]
    data: Option<QueryData>,
    #[serde(default, rename = "errorType")]
    error_type: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct QueryData {
    #[serde(rename = "resultType")]
    result_type: String,
    result: Vec<VectorSample>,
}

#[derive(Debug, Deserialize)]
struct VectorSample {
    #[serde(default)]
    #[allow(dead_code)]
    metric: HashMap<String, String>,
    value: (f64, String),
}

/// Build a PromQL instant-vector selector such as `name{instance="a:1"}`
pub fn build_selector(metric: &str, labels: &Labels) -> String {
    if labels.is_empty() {
        return metric.to_string();
    }
    let matchers = labels
        .iter()
        .map(|(k, v)| format!("{}=\"{}\"", k, escape_label_value(v)))
        .collect::<Vec<_>>()
        .join(",");
    format!("{}{{{}}}", metric, matchers)
}

fn escape_label_value(v: &str) -> String {
    v.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n")
}

/// Decode an instant-query response into its first sample
pub fn parse_query_response(body: &str) -> Result<Option<PointSample>> {
    let resp: QueryResponse = serde_json::from_str(body)?;

    if resp.status != "success" {
        return Err(ExporterError::backend(format!(
            "query failed ({}): {}",
            resp.error_type.as_deref().unwrap_or("unknown"),
            resp.error.as_deref().unwrap_or("no error message")
        )));
    }

    let data = resp
        .data
        .ok_or_else(|| ExporterError::backend("successful query without data"))?;
    if data.result_type != "vector" {
        return Err(ExporterError::backend(format!(
            "expected a vector result, got '{}'",
            data.result_type
        )));
    }

    let Some(first) = data.result.into_iter().next() else {
        return Ok(None);
    };

    let (ts, raw_value) = first.value;
    let value: f64 = raw_value
        .parse()
        .map_err(|_| ExporterError::backend(format!("sample value '{}' is not a number", raw_value)))?;

    Ok(Some(PointSample { timestamp: timestamp_from_secs(ts)?, value }))
}

fn timestamp_from_secs(secs: f64) -> Result<DateTime<Utc>> {
    if !secs.is_finite() {
        return Err(ExporterError::backend(format!("sample timestamp {} is not finite", secs)));
    }
    let whole = secs.floor();
    let nanos = ((secs - whole) * 1e9).round().min(999_999_999.0) as u32;
    DateTime::from_timestamp(whole as i64, nanos)
        .ok_or_else(|| ExporterError::backend(format!("sample timestamp {} is out of range", secs)))
}
