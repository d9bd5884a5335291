pub mod app;
pub mod config;
pub mod constants;
pub mod derive;
pub mod error;
pub mod infra;
pub mod jobs;
pub mod logging;
pub mod metrics;
pub mod types;
pub mod server;
