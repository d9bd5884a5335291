use crate::error::{ExporterError, Result};
use serde::Deserialize;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub exporter: ExporterConfig,
    pub prometheus: PrometheusConfig,
    pub graph: GraphConfig,
    pub cluster: ClusterConfig,
    pub jobs: JobsConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    #[default]
    Sequential,
    Concurrent,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExporterConfig {
    pub listen_addr: String,
    pub interval_secs: u64,
    /// Value of the `instance` label the backend attaches to this exporter's series
    pub instance: String,
    pub execution: ExecutionMode,
    pub max_workers: usize,
}

impl Default for ExporterConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:9898".to_string(),
            interval_secs: 60,
            instance: "graph-metrics-exporter:9898".to_string(),
            execution: ExecutionMode::Sequential,
            max_workers: 4,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PrometheusConfig {
    pub url: String,
    pub token: Option<String>,
    pub timeout_secs: u64,
}

impl Default for PrometheusConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:9090".to_string(),
            token: None,
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GraphConfig {
    pub url: String,
    pub timeout_secs: u64,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8080".to_string(),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClusterConfig {
    /// Empty means "use the static `solvers` list"
    pub api_url: Option<String>,
    pub namespace: String,
    /// `{namespace}` is substituted
    pub list_path: String,
    pub label_selector: String,
    pub token: Option<String>,
    pub timeout_secs: u64,
    pub solvers: Vec<String>,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            api_url: None,
            namespace: "default".to_string(),
            list_path: "/api/v1/namespaces/{namespace}/configmaps".to_string(),
            label_selector: "component=solver".to_string(),
            token: None,
            timeout_secs: 10,
            solvers: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct JobsConfig {
    pub bloat_interval_days: u64,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self { bloat_interval_days: 7 }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// Directory for the rolling JSON log file; console only when unset
    pub directory: Option<String>,
    pub json: bool,
}

impl Config {
    /// Load configuration from `path` (defaults when the file is absent),
    /// apply `EXPORTER_*` environment overrides and validate.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let config_content = fs::read_to_string(path).map_err(|e| {
                ExporterError::Config(format!("Failed to read config file '{}': {}", path.display(), e))
            })?;
            Self::from_toml(&config_content)?
        } else {
            tracing::info!(path = %path.display(), "config file not found, using defaults");
            Config::default()
        };

        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let mut config: Config = toml::from_str(content)?;
        config.normalize();
        Ok(config)
    }

    /// Apply overrides from a variable lookup (the process environment in production)
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("EXPORTER_LISTEN_ADDR") {
            self.exporter.listen_addr = v;
        }
        if let Some(v) = lookup("EXPORTER_INTERVAL_SECS") {
            self.exporter.interval_secs = parse_number("EXPORTER_INTERVAL_SECS", &v)?;
        }
        if let Some(v) = lookup("EXPORTER_INSTANCE") {
            self.exporter.instance = v;
        }
        if let Some(v) = lookup("EXPORTER_PROMETHEUS_URL") {
            self.prometheus.url = v;
        }
        if let Some(v) = lookup("EXPORTER_PROMETHEUS_TOKEN") {
            self.prometheus.token = Some(v);
        }
        if let Some(v) = lookup("EXPORTER_GRAPH_URL") {
            self.graph.url = v;
        }
        if let Some(v) = lookup("EXPORTER_CLUSTER_API_URL") {
            self.cluster.api_url = Some(v);
        }
        if let Some(v) = lookup("EXPORTER_CLUSTER_TOKEN") {
            self.cluster.token = Some(v);
        }
        if let Some(v) = lookup("EXPORTER_CLUSTER_NAMESPACE") {
            self.cluster.namespace = v;
        }
        if let Some(v) = lookup("EXPORTER_BLOAT_INTERVAL_DAYS") {
            self.jobs.bloat_interval_days = parse_number("EXPORTER_BLOAT_INTERVAL_DAYS", &v)?;
        }
        self.normalize();
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.exporter.interval_secs == 0 {
            return Err(ExporterError::Config("exporter.interval_secs must be > 0".to_string()));
        }
        if self.exporter.max_workers == 0 {
            return Err(ExporterError::Config("exporter.max_workers must be > 0".to_string()));
        }
        if self.jobs.bloat_interval_days == 0 {
            return Err(ExporterError::Config("jobs.bloat_interval_days must be > 0".to_string()));
        }
        self.listen_addr()?;
        Ok(())
    }

    pub fn listen_addr(&self) -> Result<SocketAddr> {
        self.exporter.listen_addr.parse().map_err(|e| {
            ExporterError::Config(format!(
                "exporter.listen_addr '{}' is not a socket address: {}",
                self.exporter.listen_addr, e
            ))
        })
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.exporter.interval_secs)
    }

    pub fn bloat_interval(&self) -> Duration {
        Duration::from_secs(self.jobs.bloat_interval_days * 24 * 60 * 60)
    }

    // Empty strings in TOML or the environment mean "not set"
    fn normalize(&mut self) {
        for opt in [
            &mut self.prometheus.token,
            &mut self.cluster.api_url,
            &mut self.cluster.token,
            &mut self.logging.directory,
        ] {
            if opt.as_deref().map(str::trim).is_some_and(str::is_empty) {
                *opt = None;
            }
        }
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| ExporterError::Config(format!("{key}='{raw}' is not a valid number: {e}")))
}
