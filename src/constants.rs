/// Job name constants shared by the job definitions, the CLI listing and tests

pub const GRAPHDB_CONNECTION_STATUS_JOB: &str = "graphdb_connection_status";
pub const GRAPHDB_BLOAT_DATA_JOB: &str = "graphdb_bloat_data";
pub const GRAPHDB_CORRUPTION_JOB: &str = "graphdb_corruption";
pub const SOLVER_COUNT_JOB: &str = "solver_count";
pub const UNSOLVED_PYTHON_PACKAGES_JOB: &str = "unsolved_python_packages";
pub const SOLVED_PYTHON_PACKAGES_JOB: &str = "solved_python_packages";
pub const SOLVER_ERROR_DECOMPOSITION_JOB: &str = "solver_error_decomposition";

// Label keys
pub const LABEL_INSTANCE: &str = "instance";
pub const LABEL_JOB: &str = "job";
pub const LABEL_OUTCOME: &str = "outcome";
pub const LABEL_SOLVER: &str = "solver";
pub const LABEL_TABLE: &str = "table";

/// Table label published when the bloat listing comes back empty
pub const NO_TABLE_SENTINEL: &str = "none";

/// Default configuration file looked up when `--config` is not given
pub const DEFAULT_CONFIG_PATH: &str = "exporter.toml";

/// Get all built-in job names in registration order
pub fn get_builtin_jobs() -> Vec<&'static str> {
    vec![
        GRAPHDB_CONNECTION_STATUS_JOB,
        GRAPHDB_BLOAT_DATA_JOB,
        GRAPHDB_CORRUPTION_JOB,
        SOLVER_COUNT_JOB,
        UNSOLVED_PYTHON_PACKAGES_JOB,
        SOLVED_PYTHON_PACKAGES_JOB,
        SOLVER_ERROR_DECOMPOSITION_JOB,
    ]
}
