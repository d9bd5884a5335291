use anyhow::Result;
use chrono::{Duration as ChronoDuration, Utc};
use graph_metrics_exporter::config::ExecutionMode;
use graph_metrics_exporter::constants::{
    get_builtin_jobs, GRAPHDB_BLOAT_DATA_JOB, GRAPHDB_CONNECTION_STATUS_JOB, LABEL_INSTANCE, LABEL_SOLVER,
    LABEL_TABLE, SOLVER_COUNT_JOB, UNSOLVED_PYTHON_PACKAGES_JOB,
};
use graph_metrics_exporter::infra::in_memory::{
    GraphFixture, InMemoryBackend, InMemoryGraph, RecordedWrite, RecordingSink, StaticCluster,
};
use graph_metrics_exporter::jobs::{self, JobContext, JobRegistry, JobRunner, JobSettings};
use graph_metrics_exporter::types::{BloatStatistic, Labels, PointSample, SolverErrorFilter};
use std::sync::Arc;

const FEDORA: &str = "solver-fedora-31-py38";
const RHEL: &str = "solver-rhel-8-py36";
const UBI: &str = "solver-ubi-8-py38";

struct Harness {
    graph: Arc<InMemoryGraph>,
    cluster: Arc<StaticCluster>,
    backend: Arc<InMemoryBackend>,
    sink: Arc<RecordingSink>,
    settings: JobSettings,
}

impl Harness {
    fn new(fixture: GraphFixture, solvers: &[&str]) -> Self {
        Self {
            graph: Arc::new(InMemoryGraph::new(fixture)),
            cluster: Arc::new(StaticCluster::new(solvers.iter().map(|s| s.to_string()).collect())),
            backend: Arc::new(InMemoryBackend::new()),
            sink: Arc::new(RecordingSink::new()),
            settings: JobSettings::default(),
        }
    }

    fn context(&self) -> JobContext {
        JobContext {
            graph: self.graph.clone(),
            cluster: self.cluster.clone(),
            backend: self.backend.clone(),
            sink: self.sink.clone(),
            settings: self.settings.clone(),
        }
    }

    fn runner(&self) -> Result<JobRunner> {
        Ok(JobRunner::new(jobs::default_registry()?, self.context()))
    }

    /// Runner holding a single built-in job
    fn runner_for(&self, name: &str) -> Result<JobRunner> {
        let mut registry = JobRegistry::new();
        register_job(&mut registry, name)?;
        Ok(JobRunner::new(registry.freeze(), self.context()))
    }

    fn instance(&self) -> Labels {
        Labels::new().with(LABEL_INSTANCE, self.settings.instance.clone())
    }
}

fn register_job(registry: &mut JobRegistry, name: &str) -> Result<()> {
    use graph_metrics_exporter::jobs::db::{GraphDbBloatData, GraphDbConnectionStatus, GraphDbCorruption};
    use graph_metrics_exporter::jobs::solver::{
        SolvedPythonPackages, SolverCount, SolverErrorDecomposition, UnsolvedPythonPackages,
    };
    match name {
        "graphdb_connection_status" => registry.register(GraphDbConnectionStatus)?,
        "graphdb_bloat_data" => registry.register(GraphDbBloatData)?,
        "graphdb_corruption" => registry.register(GraphDbCorruption)?,
        "solver_count" => registry.register(SolverCount)?,
        "unsolved_python_packages" => registry.register(UnsolvedPythonPackages)?,
        "solved_python_packages" => registry.register(SolvedPythonPackages)?,
        "solver_error_decomposition" => registry.register(SolverErrorDecomposition)?,
        other => anyhow::bail!("unknown job {}", other),
    };
    Ok(())
}

fn solver(name: &str) -> Labels {
    Labels::new().with(LABEL_SOLVER, name)
}

fn fleet_fixture() -> GraphFixture {
    let mut fixture = GraphFixture { healthy: true, ..GraphFixture::default() };
    fixture.unsolved.insert(FEDORA.to_string(), 60);
    fixture.unsolved.insert(RHEL.to_string(), 20);
    fixture.solved.insert(FEDORA.to_string(), 50);
    fixture.solved.insert(RHEL.to_string(), 10);
    fixture.errors.insert((FEDORA.to_string(), SolverErrorFilter::ANY), 5);
    fixture.errors.insert((FEDORA.to_string(), SolverErrorFilter::UNPARSEABLE), 2);
    fixture.errors.insert((FEDORA.to_string(), SolverErrorFilter::UNSOLVABLE), 3);
    fixture
}

#[tokio::test]
async fn test_run_all_runs_every_job_once_in_order() -> Result<()> {
    let harness = Harness::new(fleet_fixture(), &[FEDORA, RHEL]);
    let runner = harness.runner()?;

    let report = runner.run_all().await;

    let names: Vec<&str> = report.jobs.iter().map(|j| j.name).collect();
    assert_eq!(names, get_builtin_jobs());
    assert!(report.all_succeeded(), "unexpected failures: {:?}", report.failed().collect::<Vec<_>>());
    for name in get_builtin_jobs() {
        assert_eq!(runner.state(name).await.unwrap().runs, 1, "{} ran more than once", name);
    }
    Ok(())
}

#[tokio::test]
async fn test_concurrent_mode_runs_every_job_once() -> Result<()> {
    let harness = Harness::new(fleet_fixture(), &[FEDORA, RHEL]);
    let runner = harness.runner()?.with_execution(ExecutionMode::Concurrent, 3);

    let report = runner.run_all().await;

    let names: Vec<&str> = report.jobs.iter().map(|j| j.name).collect();
    assert_eq!(names, get_builtin_jobs());
    assert!(report.all_succeeded());
    for name in get_builtin_jobs() {
        assert_eq!(runner.state(name).await.unwrap().runs, 1);
    }
    assert_eq!(harness.sink.gauge("kg_solvers", &Labels::new()), Some(2.0));
    Ok(())
}

#[tokio::test]
async fn test_cluster_outage_fails_only_solver_jobs() -> Result<()> {
    let harness = Harness::new(fleet_fixture(), &[FEDORA]);
    harness.cluster.set_unavailable(true);
    let runner = harness.runner()?;

    let report = runner.run_all().await;

    let failed: Vec<&str> = report.failed().map(|j| j.name).collect();
    assert_eq!(
        failed,
        vec![
            SOLVER_COUNT_JOB,
            UNSOLVED_PYTHON_PACKAGES_JOB,
            "solved_python_packages",
            "solver_error_decomposition"
        ]
    );
    assert_eq!(harness.sink.gauge("kg_graphdb_connection_up", &Labels::new()), Some(1.0));
    assert_eq!(harness.sink.gauge("kg_graphdb_is_corrupted", &Labels::new()), Some(0.0));
    Ok(())
}

#[tokio::test]
async fn test_failed_health_check_publishes_zero() -> Result<()> {
    let harness = Harness::new(GraphFixture::default(), &[]);
    let runner = harness.runner_for(GRAPHDB_CONNECTION_STATUS_JOB)?;

    let report = runner.run_all().await;

    assert!(report.all_succeeded());
    assert_eq!(harness.sink.gauge("kg_graphdb_connection_up", &Labels::new()), Some(0.0));
    Ok(())
}

#[tokio::test]
async fn test_bloat_throttle_bootstrap_skip_and_elapsed() -> Result<()> {
    let mut fixture = GraphFixture { healthy: true, ..GraphFixture::default() };
    fixture.bloat.push(BloatStatistic {
        table_name: "python_package_version".to_string(),
        percent_bloat: 12.5,
        megabytes_bloat: 340.0,
    });
    let harness = Harness::new(fixture, &[]);
    let runner = harness.runner_for(GRAPHDB_BLOAT_DATA_JOB)?;
    let evaluation = "kg_graphdb_last_bloat_evaluation_timestamp_seconds";

    // First run after start evaluates without asking the backend
    runner.run_all().await;
    assert_eq!(harness.graph.bloat_calls(), 1);
    assert_eq!(harness.backend.queries(), 0);
    let table = Labels::new().with(LABEL_TABLE, "python_package_version");
    assert_eq!(harness.sink.gauge("kg_graphdb_table_bloat_percent", &table), Some(12.5));
    assert_eq!(harness.sink.writes_for(evaluation).len(), 1);

    let bootstrap = harness.sink.gauge(evaluation, &Labels::new()).unwrap();

    // Backend has scraped the bootstrap evaluation: within the 7 day interval
    let now = Utc::now();
    harness.backend.insert(evaluation, harness.instance(), PointSample { timestamp: now, value: bootstrap });
    harness.sink.clear();
    let report = runner.run_all().await;
    assert!(report.all_succeeded());
    assert_eq!(harness.graph.bloat_calls(), 1);
    assert!(harness.sink.writes_for(evaluation).is_empty());

    // Same evaluation, last scraped eight days after it was published
    harness.backend.insert(
        evaluation,
        harness.instance(),
        PointSample { timestamp: now + ChronoDuration::days(8), value: bootstrap },
    );
    runner.run_all().await;
    assert_eq!(harness.graph.bloat_calls(), 2);
    let published = harness.sink.gauge(evaluation, &Labels::new()).unwrap();
    assert!(published >= now.timestamp() as f64 - 1.0);
    Ok(())
}

#[tokio::test]
async fn test_bloat_not_rescanned_before_backend_catches_up() -> Result<()> {
    let harness = Harness::new(GraphFixture { healthy: true, ..GraphFixture::default() }, &[]);
    let runner = harness.runner_for(GRAPHDB_BLOAT_DATA_JOB)?;
    // History from before a restart: last evaluated a month ago, scraped just now
    let now = Utc::now();
    harness.backend.insert(
        "kg_graphdb_last_bloat_evaluation_timestamp_seconds",
        harness.instance(),
        PointSample { timestamp: now, value: (now - ChronoDuration::days(30)).timestamp() as f64 },
    );

    runner.run_all().await;
    runner.run_all().await;
    runner.run_all().await;

    assert_eq!(harness.graph.bloat_calls(), 1);
    Ok(())
}

#[tokio::test]
async fn test_bloat_throttle_backend_outage_fails_job() -> Result<()> {
    let harness = Harness::new(GraphFixture { healthy: true, ..GraphFixture::default() }, &[]);
    let runner = harness.runner_for(GRAPHDB_BLOAT_DATA_JOB)?;
    runner.run_all().await;

    harness.backend.set_unavailable(true);
    let report = runner.run_all().await;

    assert_eq!(report.failed_count(), 1);
    assert_eq!(harness.graph.bloat_calls(), 1);
    Ok(())
}

#[tokio::test]
async fn test_empty_bloat_listing_publishes_sentinel() -> Result<()> {
    let harness = Harness::new(GraphFixture { healthy: true, ..GraphFixture::default() }, &[]);
    let runner = harness.runner_for(GRAPHDB_BLOAT_DATA_JOB)?;

    runner.run_all().await;

    let none = Labels::new().with(LABEL_TABLE, "none");
    assert_eq!(harness.sink.gauge("kg_graphdb_table_bloat_percent", &none), Some(0.0));
    assert_eq!(harness.sink.gauge("kg_graphdb_table_bloat_megabytes", &none), Some(0.0));
    Ok(())
}

#[tokio::test]
async fn test_unsolved_decrease_from_backend_value() -> Result<()> {
    let harness = Harness::new(fleet_fixture(), &[FEDORA, RHEL]);
    let runner = harness.runner_for(UNSOLVED_PYTHON_PACKAGES_JOB)?;
    harness.backend.insert(
        "kg_unsolved_python_packages_overall",
        harness.instance(),
        PointSample { timestamp: Utc::now(), value: 100.0 },
    );

    let report = runner.run_all().await;

    assert!(report.all_succeeded());
    assert_eq!(harness.sink.gauge("kg_unsolved_python_packages", &solver(FEDORA)), Some(60.0));
    assert_eq!(harness.sink.gauge("kg_unsolved_python_packages", &solver(RHEL)), Some(20.0));
    assert_eq!(harness.sink.gauge("kg_unsolved_python_packages_overall", &Labels::new()), Some(80.0));
    assert_eq!(harness.sink.counter("kg_unsolved_python_packages_decrease_total", &Labels::new()), 20);
    Ok(())
}

#[tokio::test]
async fn test_unsolved_increase_is_not_a_decrease() -> Result<()> {
    let harness = Harness::new(fleet_fixture(), &[FEDORA, RHEL]);
    let runner = harness.runner_for(UNSOLVED_PYTHON_PACKAGES_JOB)?;
    harness.backend.insert(
        "kg_unsolved_python_packages_overall",
        harness.instance(),
        PointSample { timestamp: Utc::now(), value: 60.0 },
    );

    runner.run_all().await;

    assert_eq!(harness.sink.counter("kg_unsolved_python_packages_decrease_total", &Labels::new()), 0);
    assert_eq!(harness.sink.gauge("kg_unsolved_python_packages_overall", &Labels::new()), Some(80.0));
    Ok(())
}

#[tokio::test]
async fn test_unsolved_decrease_counted_once_per_drop() -> Result<()> {
    let harness = Harness::new(fleet_fixture(), &[FEDORA, RHEL]);
    let runner = harness.runner_for(UNSOLVED_PYTHON_PACKAGES_JOB)?;
    harness.backend.insert(
        "kg_unsolved_python_packages_overall",
        harness.instance(),
        PointSample { timestamp: Utc::now(), value: 100.0 },
    );

    // The backend is not scraped between these runs
    runner.run_all().await;
    runner.run_all().await;
    assert_eq!(harness.sink.counter("kg_unsolved_python_packages_decrease_total", &Labels::new()), 20);

    harness.graph.update(|f| {
        f.unsolved.insert(FEDORA.to_string(), 50);
    });
    runner.run_all().await;
    assert_eq!(harness.sink.counter("kg_unsolved_python_packages_decrease_total", &Labels::new()), 30);
    assert_eq!(harness.sink.gauge("kg_unsolved_python_packages_overall", &Labels::new()), Some(70.0));
    Ok(())
}

#[tokio::test]
async fn test_unsolved_baseline_starts_from_first_publication() -> Result<()> {
    let harness = Harness::new(fleet_fixture(), &[FEDORA, RHEL]);
    let runner = harness.runner_for(UNSOLVED_PYTHON_PACKAGES_JOB)?;

    runner.run_all().await;
    harness.graph.update(|f| {
        f.unsolved.insert(RHEL.to_string(), 5);
    });
    runner.run_all().await;

    assert_eq!(harness.sink.counter("kg_unsolved_python_packages_decrease_total", &Labels::new()), 15);
    Ok(())
}

#[tokio::test]
async fn test_unsolved_without_baseline_still_sets_total() -> Result<()> {
    let harness = Harness::new(fleet_fixture(), &[FEDORA, RHEL]);
    let runner = harness.runner_for(UNSOLVED_PYTHON_PACKAGES_JOB)?;

    let report = runner.run_all().await;

    assert!(report.all_succeeded());
    assert!(harness.sink.writes_for("kg_unsolved_python_packages_decrease_total").is_empty());
    assert_eq!(harness.sink.gauge("kg_unsolved_python_packages_overall", &Labels::new()), Some(80.0));
    Ok(())
}

#[tokio::test]
async fn test_fan_out_isolates_failing_solver() -> Result<()> {
    let mut fixture = fleet_fixture();
    fixture.solved.insert(UBI.to_string(), 7);
    fixture.failing_solvers.insert(RHEL.to_string());
    let harness = Harness::new(fixture, &[FEDORA, RHEL, UBI]);
    let runner = harness.runner_for("solved_python_packages")?;

    let report = runner.run_all().await;

    assert!(report.all_succeeded());
    let writes = harness.sink.writes_for("kg_solved_python_packages");
    assert_eq!(writes.len(), 2);
    assert_eq!(harness.sink.gauge("kg_solved_python_packages", &solver(FEDORA)), Some(50.0));
    assert_eq!(harness.sink.gauge("kg_solved_python_packages", &solver(UBI)), Some(7.0));
    assert_eq!(harness.sink.gauge("kg_solved_python_packages", &solver(RHEL)), None);
    Ok(())
}

#[tokio::test]
async fn test_unparseable_solver_name_is_skipped() -> Result<()> {
    let harness = Harness::new(fleet_fixture(), &[FEDORA, "solver-broken"]);
    let runner = harness.runner_for("solved_python_packages")?;

    let report = runner.run_all().await;

    assert!(report.all_succeeded());
    assert_eq!(harness.sink.writes_for("kg_solved_python_packages").len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_partial_unsolved_fan_out_leaves_total_alone() -> Result<()> {
    let mut fixture = fleet_fixture();
    fixture.failing_solvers.insert(RHEL.to_string());
    let harness = Harness::new(fixture, &[FEDORA, RHEL]);
    let runner = harness.runner_for(UNSOLVED_PYTHON_PACKAGES_JOB)?;
    harness.backend.insert(
        "kg_unsolved_python_packages_overall",
        harness.instance(),
        PointSample { timestamp: Utc::now(), value: 100.0 },
    );

    runner.run_all().await;

    assert_eq!(harness.sink.gauge("kg_unsolved_python_packages", &solver(FEDORA)), Some(60.0));
    assert!(harness.sink.writes_for("kg_unsolved_python_packages_overall").is_empty());
    assert!(harness.sink.writes_for("kg_unsolved_python_packages_decrease_total").is_empty());
    Ok(())
}

#[tokio::test]
async fn test_solver_error_decomposition() -> Result<()> {
    let harness = Harness::new(fleet_fixture(), &[FEDORA]);
    let runner = harness.runner_for("solver_error_decomposition")?;

    runner.run_all().await;

    let labels = solver(FEDORA);
    assert_eq!(harness.sink.gauge("kg_solver_error_python_packages", &labels), Some(5.0));
    assert_eq!(harness.sink.gauge("kg_solver_error_unparseable_python_packages", &labels), Some(2.0));
    assert_eq!(harness.sink.gauge("kg_solver_error_unsolvable_python_packages", &labels), Some(3.0));
    assert_eq!(harness.sink.gauge("kg_solved_python_packages_no_error", &labels), Some(45.0));
    assert_eq!(harness.sink.gauge("kg_solver_count_inconsistent", &labels), Some(0.0));
    Ok(())
}

#[tokio::test]
async fn test_inconsistent_error_counts_are_clamped_and_flagged() -> Result<()> {
    let mut fixture = fleet_fixture();
    fixture.errors.insert((RHEL.to_string(), SolverErrorFilter::ANY), 15);
    let harness = Harness::new(fixture, &[RHEL]);
    let runner = harness.runner_for("solver_error_decomposition")?;

    let report = runner.run_all().await;

    assert!(report.all_succeeded());
    let labels = solver(RHEL);
    assert_eq!(harness.sink.gauge("kg_solved_python_packages_no_error", &labels), Some(0.0));
    assert_eq!(harness.sink.gauge("kg_solver_count_inconsistent", &labels), Some(1.0));
    Ok(())
}

#[tokio::test]
async fn test_decomposition_queries_before_writes() -> Result<()> {
    let mut fixture = fleet_fixture();
    fixture.failing_solvers.insert(FEDORA.to_string());
    let harness = Harness::new(fixture, &[FEDORA]);
    let runner = harness.runner_for("solver_error_decomposition")?;

    runner.run_all().await;

    // No half-published decomposition for a solver whose queries failed
    assert!(harness.sink.writes().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_solved_packages_is_idempotent() -> Result<()> {
    let harness = Harness::new(fleet_fixture(), &[FEDORA, RHEL]);
    let runner = harness.runner_for("solved_python_packages")?;

    runner.run_all().await;
    let first = harness.sink.writes();
    harness.sink.clear();
    runner.run_all().await;

    assert_eq!(harness.sink.writes(), first);
    assert!(first.iter().all(|w| matches!(w, RecordedWrite::Set { .. })));
    Ok(())
}

#[tokio::test]
async fn test_runner_picks_up_fleet_changes() -> Result<()> {
    let harness = Harness::new(fleet_fixture(), &[FEDORA]);
    let runner = harness.runner_for(SOLVER_COUNT_JOB)?;

    runner.run_all().await;
    harness.cluster.set_solvers(vec![FEDORA.to_string(), RHEL.to_string(), UBI.to_string()]);
    runner.run_all().await;

    let values: Vec<f64> = harness
        .sink
        .writes_for("kg_solvers")
        .into_iter()
        .filter_map(|w| match w {
            RecordedWrite::Set { value, .. } => Some(value),
            _ => None,
        })
        .collect();
    assert_eq!(values, vec![1.0, 3.0]);
    Ok(())
}
