//! Catalog of every metric the exporter publishes
//!
//! Job code refers to metrics through [`MetricName`] so names, help texts and
//! label sets live in one place and magic strings stay out of the jobs.

use crate::constants::{LABEL_JOB, LABEL_OUTCOME, LABEL_SOLVER, LABEL_TABLE};
use crate::metrics::{MetricDoc, MetricType};
use once_cell::sync::Lazy;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    // Runner self-observation
    JobRuns,
    JobDuration,
    JobLastSuccess,
    RunDuration,
    FanOutFailures,

    // Graph database health
    GraphDbConnectionUp,
    GraphDbTableBloatPercent,
    GraphDbTableBloatMegabytes,
    GraphDbLastBloatEvaluation,
    GraphDbIsCorrupted,

    // Solver fleet
    Solvers,
    UnsolvedPerSolver,
    UnsolvedOverall,
    UnsolvedDecrease,
    SolvedPerSolver,
    SolverErrorPerSolver,
    SolverErrorUnparseablePerSolver,
    SolverErrorUnsolvablePerSolver,
    SolvedNoErrorPerSolver,
    SolverCountInconsistent,
}

impl MetricName {
    pub const ALL: [MetricName; 20] = [
        MetricName::JobRuns,
        MetricName::JobDuration,
        MetricName::JobLastSuccess,
        MetricName::RunDuration,
        MetricName::FanOutFailures,
        MetricName::GraphDbConnectionUp,
        MetricName::GraphDbTableBloatPercent,
        MetricName::GraphDbTableBloatMegabytes,
        MetricName::GraphDbLastBloatEvaluation,
        MetricName::GraphDbIsCorrupted,
        MetricName::Solvers,
        MetricName::UnsolvedPerSolver,
        MetricName::UnsolvedOverall,
        MetricName::UnsolvedDecrease,
        MetricName::SolvedPerSolver,
        MetricName::SolverErrorPerSolver,
        MetricName::SolverErrorUnparseablePerSolver,
        MetricName::SolverErrorUnsolvablePerSolver,
        MetricName::SolvedNoErrorPerSolver,
        MetricName::SolverCountInconsistent,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::JobRuns => "exporter_job_runs_total",
            MetricName::JobDuration => "exporter_job_duration_seconds",
            MetricName::JobLastSuccess => "exporter_job_last_success_timestamp_seconds",
            MetricName::RunDuration => "exporter_run_duration_seconds",
            MetricName::FanOutFailures => "exporter_fanout_failures_total",

            MetricName::GraphDbConnectionUp => "kg_graphdb_connection_up",
            MetricName::GraphDbTableBloatPercent => "kg_graphdb_table_bloat_percent",
            MetricName::GraphDbTableBloatMegabytes => "kg_graphdb_table_bloat_megabytes",
            MetricName::GraphDbLastBloatEvaluation => "kg_graphdb_last_bloat_evaluation_timestamp_seconds",
            MetricName::GraphDbIsCorrupted => "kg_graphdb_is_corrupted",

            MetricName::Solvers => "kg_solvers",
            MetricName::UnsolvedPerSolver => "kg_unsolved_python_packages",
            MetricName::UnsolvedOverall => "kg_unsolved_python_packages_overall",
            MetricName::UnsolvedDecrease => "kg_unsolved_python_packages_decrease_total",
            MetricName::SolvedPerSolver => "kg_solved_python_packages",
            MetricName::SolverErrorPerSolver => "kg_solver_error_python_packages",
            MetricName::SolverErrorUnparseablePerSolver => "kg_solver_error_unparseable_python_packages",
            MetricName::SolverErrorUnsolvablePerSolver => "kg_solver_error_unsolvable_python_packages",
            MetricName::SolvedNoErrorPerSolver => "kg_solved_python_packages_no_error",
            MetricName::SolverCountInconsistent => "kg_solver_count_inconsistent",
        }
    }

    pub fn metric_type(&self) -> MetricType {
        match self {
            MetricName::JobRuns | MetricName::FanOutFailures | MetricName::UnsolvedDecrease => {
                MetricType::Counter
            }
            MetricName::JobDuration | MetricName::RunDuration => MetricType::Histogram,
            _ => MetricType::Gauge,
        }
    }

    pub fn help(&self) -> &'static str {
        match self {
            MetricName::JobRuns => "Job invocations by outcome",
            MetricName::JobDuration => "Wall-clock duration of a single job invocation",
            MetricName::JobLastSuccess => "Unix time of the last successful invocation of a job",
            MetricName::RunDuration => "Wall-clock duration of a full pass over all jobs",
            MetricName::FanOutFailures => "Dimensions whose query failed during a fan-out",
            MetricName::GraphDbConnectionUp => "1 when the graph database answers a health check, 0 otherwise",
            MetricName::GraphDbTableBloatPercent => "Bloat of a graph database table in percent",
            MetricName::GraphDbTableBloatMegabytes => "Bloat of a graph database table in megabytes",
            MetricName::GraphDbLastBloatEvaluation => "Unix time of the last bloat evaluation",
            MetricName::GraphDbIsCorrupted => "1 when graph database corruption has been detected",
            MetricName::Solvers => "Number of solver configurations deployed in the cluster",
            MetricName::UnsolvedPerSolver => "Python package versions not yet solved, per solver",
            MetricName::UnsolvedOverall => "Python package versions not yet solved, all solvers",
            MetricName::UnsolvedDecrease => "Accumulated decrease of unsolved Python package versions",
            MetricName::SolvedPerSolver => "Solved Python package versions, per solver",
            MetricName::SolverErrorPerSolver => "Solved Python package versions with a solver error, per solver",
            MetricName::SolverErrorUnparseablePerSolver => "Solver errors caused by unparseable packages, per solver",
            MetricName::SolverErrorUnsolvablePerSolver => "Solver errors caused by unsolvable packages, per solver",
            MetricName::SolvedNoErrorPerSolver => "Solved Python package versions without error, per solver",
            MetricName::SolverCountInconsistent => "1 when the error count of a solver exceeds its solved count",
        }
    }

    pub fn labels(&self) -> Vec<&'static str> {
        match self {
            MetricName::JobRuns => vec![LABEL_JOB, LABEL_OUTCOME],
            MetricName::JobDuration | MetricName::JobLastSuccess | MetricName::FanOutFailures => vec![LABEL_JOB],
            MetricName::GraphDbTableBloatPercent | MetricName::GraphDbTableBloatMegabytes => vec![LABEL_TABLE],
            MetricName::UnsolvedPerSolver
            | MetricName::SolvedPerSolver
            | MetricName::SolverErrorPerSolver
            | MetricName::SolverErrorUnparseablePerSolver
            | MetricName::SolverErrorUnsolvablePerSolver
            | MetricName::SolvedNoErrorPerSolver
            | MetricName::SolverCountInconsistent => vec![LABEL_SOLVER],
            _ => Vec::new(),
        }
    }

    pub fn doc(&self) -> MetricDoc {
        MetricDoc {
            name: self.as_str(),
            metric_type: self.metric_type(),
            help: self.help(),
            labels: self.labels(),
        }
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub static CATALOG: Lazy<Vec<MetricDoc>> = Lazy::new(|| MetricName::ALL.iter().map(MetricName::doc).collect());
