use anyhow::Context;
use clap::{Parser, Subcommand};
use graph_metrics_exporter::app::ports::MetricSink;
use graph_metrics_exporter::config::Config;
use graph_metrics_exporter::constants::DEFAULT_CONFIG_PATH;
use graph_metrics_exporter::infra::in_memory::RecordingSink;
use graph_metrics_exporter::infra::metrics_sink::PrometheusSink;
use graph_metrics_exporter::{jobs, logging, metrics, server};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "graph-metrics-exporter")]
#[command(about = "Periodic metrics exporter for the knowledge graph and its solvers")]
#[command(version)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve /metrics and run all jobs every interval
    Serve,
    /// Run all jobs once and exit
    Once {
        /// Record metric writes instead of publishing them
        #[arg(long)]
        dry_run: bool,
        /// Print the exposition text after the run
        #[arg(long)]
        print: bool,
    },
    /// List registered jobs in execution order
    Jobs,
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("signal received, finishing current run");
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    dotenv::dotenv().ok();

    let cli = Cli::parse();
    let config = Config::load(&cli.config)
        .with_context(|| format!("loading configuration from {}", cli.config.display()))?;
    let _log_guard = logging::init_logging(&config.logging);

    match cli.command {
        Commands::Serve => {
            metrics::init_metrics(Some(config.listen_addr()?))?;
            let runner = server::build_runner(&config, Arc::new(PrometheusSink))?;
            server::serve(&config, &runner, shutdown_signal()).await?;
            info!("exporter stopped");
        }
        Commands::Once { dry_run, print } => {
            metrics::init_metrics(None)?;
            let recording = Arc::new(RecordingSink::new());
            let sink: Arc<dyn MetricSink> = if dry_run { recording.clone() } else { Arc::new(PrometheusSink) };
            let runner = server::build_runner(&config, sink)?;

            let report = runner.run_all().await;

            if dry_run {
                for write in recording.writes() {
                    println!("{}", write);
                }
            }
            if print {
                if let Some(text) = metrics::render() {
                    print!("{}", text);
                }
            }
            for job in &report.jobs {
                println!("{:<40} {:<8} {:>6}ms", job.name, job.outcome.as_label(), job.duration.as_millis());
            }

            if !report.all_succeeded() {
                error!(failed = report.failed_count(), "one or more jobs failed");
            }
            // Returned rather than exiting so the log guard flushes the file writer
            return Ok(report.exit_code());
        }
        Commands::Jobs => {
            let registry = jobs::default_registry()?;
            for desc in registry.iter() {
                let mode = if desc.concurrent_safe() { "concurrent" } else { "sequential" };
                println!("{:<40} {}", desc.name(), mode);
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}
