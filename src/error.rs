use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExporterError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Metrics backend error: {message}")]
    Backend { message: String },

    #[error("Graph database error: {message}")]
    Graph { message: String },

    #[error("Cluster API error: {message}")]
    Cluster { message: String },

    #[error("Invalid dimension '{raw}': {reason}")]
    InvalidDimension { raw: String, reason: String },

    #[error("Job name '{name}' is already registered by a different job")]
    DuplicateJob { name: &'static str },
}

impl ExporterError {
    pub fn backend(message: impl Into<String>) -> Self {
        ExporterError::Backend { message: message.into() }
    }

    pub fn graph(message: impl Into<String>) -> Self {
        ExporterError::Graph { message: message.into() }
    }

    pub fn cluster(message: impl Into<String>) -> Self {
        ExporterError::Cluster { message: message.into() }
    }
}

pub type Result<T> = std::result::Result<T, ExporterError>;
