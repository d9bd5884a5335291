//! Solver fleet jobs: one series per deployed solver configuration

use super::{JobContext, JobRegistry, JobState, MetricJob};
use crate::constants::{
    LABEL_SOLVER, SOLVED_PYTHON_PACKAGES_JOB, SOLVER_COUNT_JOB, SOLVER_ERROR_DECOMPOSITION_JOB,
    UNSOLVED_PYTHON_PACKAGES_JOB,
};
use crate::derive::{fan_out, monotonic_delta, Delta, ErrorDecomposition};
use crate::error::Result;
use crate::metrics::MetricName;
use crate::types::{Labels, SolverErrorFilter, SolverIdentity};
use async_trait::async_trait;
use tracing::{info, warn};

pub fn register(registry: &mut JobRegistry) -> Result<()> {
    registry.register(SolverCount)?;
    registry.register(UnsolvedPythonPackages)?;
    registry.register(SolvedPythonPackages)?;
    registry.register(SolverErrorDecomposition)?;
    Ok(())
}

fn solver_labels(solver: &SolverIdentity) -> Labels {
    Labels::new().with(LABEL_SOLVER, solver.name.clone())
}

pub struct SolverCount;

#[async_trait]
impl MetricJob for SolverCount {
    fn name(&self) -> &'static str {
        SOLVER_COUNT_JOB
    }

    fn concurrent_safe(&self) -> bool {
        true
    }

    async fn run(&self, ctx: &JobContext, _state: &mut JobState) -> Result<()> {
        let solvers = ctx.cluster.list_active_solver_identities().await?;
        ctx.set(MetricName::Solvers, &Labels::new(), solvers.len() as f64);
        Ok(())
    }
}

/// Unsolved package versions per solver, their sum, and how much the sum shrank
/// since it was last published.
pub struct UnsolvedPythonPackages;

#[async_trait]
impl MetricJob for UnsolvedPythonPackages {
    fn name(&self) -> &'static str {
        UNSOLVED_PYTHON_PACKAGES_JOB
    }

    async fn run(&self, ctx: &JobContext, state: &mut JobState) -> Result<()> {
        let solvers = ctx.cluster.list_active_solver_identities().await?;

        let counts = fan_out(UNSOLVED_PYTHON_PACKAGES_JOB, &solvers, |raw| async move {
            let solver = ctx.graph.parse_dimension_identity(raw)?;
            let count = ctx.graph.count_unsolved(&solver).await?;
            ctx.set(MetricName::UnsolvedPerSolver, &solver_labels(&solver), count as f64);
            Ok(count)
        })
        .await;

        // A partial sum would look like packages got solved
        if !counts.is_complete() {
            warn!(
                failed = counts.failures.len(),
                solvers = solvers.len(),
                "unsolved total not updated this cycle"
            );
            return Ok(());
        }
        let total: u64 = counts.results.iter().sum();

        // The backend only seeds the baseline after a restart; it lags the
        // exporter by up to one scrape.
        let previous = match state.last_published {
            Some(value) => Some(value),
            None => UnsolvedPythonPackages::read_back(ctx).await,
        };

        match monotonic_delta(previous, total as f64) {
            Delta::Increment(decrease) => ctx.increment(MetricName::UnsolvedDecrease, &Labels::new(), decrease),
            Delta::NoBaseline => warn!(
                metric = MetricName::UnsolvedOverall.as_str(),
                "no previous value in metrics backend, decrease not updated"
            ),
        }

        ctx.set(MetricName::UnsolvedOverall, &Labels::new(), total as f64);
        state.last_published = Some(total as f64);
        Ok(())
    }
}

impl UnsolvedPythonPackages {
    async fn read_back(ctx: &JobContext) -> Option<f64> {
        match ctx
            .backend
            .current_value(MetricName::UnsolvedOverall.as_str(), &ctx.settings.instance_labels())
            .await
        {
            Ok(sample) => sample.map(|s| s.value),
            Err(e) => {
                warn!(error = %e, "reading back previous unsolved total failed");
                None
            }
        }
    }
}

pub struct SolvedPythonPackages;

#[async_trait]
impl MetricJob for SolvedPythonPackages {
    fn name(&self) -> &'static str {
        SOLVED_PYTHON_PACKAGES_JOB
    }

    fn concurrent_safe(&self) -> bool {
        true
    }

    async fn run(&self, ctx: &JobContext, _state: &mut JobState) -> Result<()> {
        let solvers = ctx.cluster.list_active_solver_identities().await?;

        fan_out(SOLVED_PYTHON_PACKAGES_JOB, &solvers, |raw| async move {
            let solver = ctx.graph.parse_dimension_identity(raw)?;
            let solved = ctx.graph.count_solved(&solver).await?;
            ctx.set(MetricName::SolvedPerSolver, &solver_labels(&solver), solved as f64);
            Ok(())
        })
        .await;
        Ok(())
    }
}

/// Solver errors per solver, split into subclasses, plus solved-without-error.
///
/// Error counts above their total are clamped and flagged through
/// `kg_solver_count_inconsistent`.
pub struct SolverErrorDecomposition;

impl SolverErrorDecomposition {
    async fn query(ctx: &JobContext, solver: &SolverIdentity) -> Result<ErrorDecomposition> {
        Ok(ErrorDecomposition {
            solved: ctx.graph.count_solved(solver).await?,
            solved_with_error: ctx.graph.count_solved_with_error(solver, SolverErrorFilter::ANY).await?,
            unparseable: ctx
                .graph
                .count_solved_with_error(solver, SolverErrorFilter::UNPARSEABLE)
                .await?,
            unsolvable: ctx
                .graph
                .count_solved_with_error(solver, SolverErrorFilter::UNSOLVABLE)
                .await?,
        })
    }

    fn publish(ctx: &JobContext, solver: &SolverIdentity, counts: &ErrorDecomposition) {
        let labels = solver_labels(solver);
        let consistent = counts.is_consistent();
        if !consistent {
            warn!(
                solver = %solver,
                solved = counts.solved,
                solved_with_error = counts.solved_with_error,
                unparseable = counts.unparseable,
                unsolvable = counts.unsolvable,
                "solver error counts are inconsistent, clamping solved-without-error to 0"
            );
        }

        ctx.set(MetricName::SolverErrorPerSolver, &labels, counts.solved_with_error as f64);
        ctx.set(MetricName::SolverErrorUnparseablePerSolver, &labels, counts.unparseable as f64);
        ctx.set(MetricName::SolverErrorUnsolvablePerSolver, &labels, counts.unsolvable as f64);
        ctx.set(MetricName::SolvedNoErrorPerSolver, &labels, counts.solved_without_error() as f64);
        ctx.set(MetricName::SolverCountInconsistent, &labels, if consistent { 0.0 } else { 1.0 });
    }
}

#[async_trait]
impl MetricJob for SolverErrorDecomposition {
    fn name(&self) -> &'static str {
        SOLVER_ERROR_DECOMPOSITION_JOB
    }

    fn concurrent_safe(&self) -> bool {
        true
    }

    async fn run(&self, ctx: &JobContext, _state: &mut JobState) -> Result<()> {
        let solvers = ctx.cluster.list_active_solver_identities().await?;

        let outcome = fan_out(SOLVER_ERROR_DECOMPOSITION_JOB, &solvers, |raw| async move {
            let solver = ctx.graph.parse_dimension_identity(raw)?;
            // Every query completes before the first write for this solver
            let counts = SolverErrorDecomposition::query(ctx, &solver).await?;
            SolverErrorDecomposition::publish(ctx, &solver, &counts);
            Ok(counts.is_consistent())
        })
        .await;

        let inconsistent = outcome.results.iter().filter(|consistent| !**consistent).count();
        if inconsistent > 0 {
            info!(inconsistent, solvers = solvers.len(), "solver error decomposition published with anomalies");
        }
        Ok(())
    }
}
