use crate::error::{ExporterError, Result};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Ordered label set attached to a published series or used as a read-back filter.
///
/// Keys are kept sorted so two label sets built in a different order compare equal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Labels(Vec<(String, String)>);

impl Labels {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Add or replace a label
    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        let value = value.into();
        match self.0.binary_search_by(|(k, _)| k.as_str().cmp(key)) {
            Ok(idx) => self.0[idx].1 = value,
            Err(idx) => self.0.insert(idx, (key.to_string(), value)),
        }
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl fmt::Display for Labels {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (k, v)) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{}=\"{}\"", k, v)?;
        }
        write!(f, "}}")
    }
}

/// One sample read back from the metrics backend
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PointSample {
    /// When the backend recorded the sample
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

/// Per-table bloat figures reported by the graph database
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BloatStatistic {
    pub table_name: String,
    pub percent_bloat: f64,
    pub megabytes_bloat: f64,
}

/// Narrows a solver-error count to a subclass of errors
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct SolverErrorFilter {
    pub unparseable: bool,
    pub unsolvable: bool,
}

impl SolverErrorFilter {
    pub const ANY: SolverErrorFilter = SolverErrorFilter { unparseable: false, unsolvable: false };
    pub const UNPARSEABLE: SolverErrorFilter = SolverErrorFilter { unparseable: true, unsolvable: false };
    pub const UNSOLVABLE: SolverErrorFilter = SolverErrorFilter { unparseable: false, unsolvable: true };
}

static SOLVER_NAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^solver-(?P<os_name>[a-z][a-z0-9]*)-(?P<os_version>[0-9][0-9.]*)-py(?P<major>[0-9])(?P<minor>[0-9]+)$")
        .expect("solver name pattern is valid")
});

/// Identity of a solver configuration, used as the fan-out dimension for per-solver metrics
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SolverIdentity {
    /// Raw solver name as listed by the cluster, published as the `solver` label
    pub name: String,
    pub os_name: String,
    pub os_version: String,
    pub python_version: String,
}

impl SolverIdentity {
    /// Parse a solver name of the form `solver-<os_name>-<os_version>-py<major><minor>`.
    ///
    /// `solver-fedora-31-py38` becomes `{ os_name: "fedora", os_version: "31", python_version: "3.8" }`.
    pub fn parse(raw: &str) -> Result<Self> {
        let caps = SOLVER_NAME_RE
            .captures(raw.trim())
            .ok_or_else(|| ExporterError::InvalidDimension {
                raw: raw.to_string(),
                reason: "expected solver-<os_name>-<os_version>-py<major><minor>".to_string(),
            })?;

        Ok(Self {
            name: raw.trim().to_string(),
            os_name: caps["os_name"].to_string(),
            os_version: caps["os_version"].to_string(),
            python_version: format!("{}.{}", &caps["major"], &caps["minor"]),
        })
    }
}

impl fmt::Display for SolverIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}
