use crate::constants::LABEL_JOB;
use crate::error::{ExporterError, Result};
use crate::metrics::MetricName;
use std::fmt;
use std::future::Future;
use tracing::warn;

/// A dimension whose unit of work failed
#[derive(Debug)]
pub struct DimensionFailure {
    pub dimension: String,
    pub error: ExporterError,
}

/// Outcome of running one unit of work per dimension
#[derive(Debug)]
pub struct FanOut<T> {
    pub results: Vec<T>,
    pub failures: Vec<DimensionFailure>,
}

impl<T> FanOut<T> {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn attempted(&self) -> usize {
        self.results.len() + self.failures.len()
    }
}

/// Run `unit` for every dimension in order, isolating failures per dimension.
///
/// A failing dimension is logged and counted under
/// `exporter_fanout_failures_total{job}`; the remaining dimensions still run.
/// Dimensions are processed one at a time so shared clients see a single
/// in-flight request.
pub async fn fan_out<'a, D, T, F, Fut>(job: &'static str, dimensions: &'a [D], mut unit: F) -> FanOut<T>
where
    D: fmt::Display,
    F: FnMut(&'a D) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut results = Vec::with_capacity(dimensions.len());
    let mut failures = Vec::new();

    for dimension in dimensions {
        match unit(dimension).await {
            Ok(value) => results.push(value),
            Err(error) => {
                warn!(job, dimension = %dimension, error = %error, "dimension failed, continuing with the rest");
                ::metrics::counter!(MetricName::FanOutFailures.as_str(), LABEL_JOB => job).increment(1);
                failures.push(DimensionFailure {
                    dimension: dimension.to_string(),
                    error,
                });
            }
        }
    }

    FanOut { results, failures }
}
