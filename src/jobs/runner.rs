use super::{FrozenRegistry, JobContext, JobDescriptor, JobState};
use crate::config::ExecutionMode;
use crate::constants::{LABEL_JOB, LABEL_OUTCOME};
use crate::metrics::MetricName;
use chrono::Utc;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, Semaphore};
use tracing::{error, info, info_span, warn, Instrument, Span};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Succeeded,
    Failed(String),
    Panicked(String),
}

impl JobOutcome {
    pub fn as_label(&self) -> &'static str {
        match self {
            JobOutcome::Succeeded => "success",
            JobOutcome::Failed(_) => "failure",
            JobOutcome::Panicked(_) => "panic",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, JobOutcome::Succeeded)
    }
}

#[derive(Debug, Clone)]
pub struct JobReport {
    pub name: &'static str,
    pub outcome: JobOutcome,
    pub duration: Duration,
}

/// Outcome of one pass over all registered jobs, in registration order
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: Uuid,
    pub jobs: Vec<JobReport>,
    pub duration: Duration,
}

impl RunReport {
    pub fn failed(&self) -> impl Iterator<Item = &JobReport> {
        self.jobs.iter().filter(|j| !j.outcome.is_success())
    }

    pub fn failed_count(&self) -> usize {
        self.failed().count()
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed_count() == 0
    }

    /// Process exit status for a single-shot run
    pub fn exit_code(&self) -> ExitCode {
        if self.all_succeeded() {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        }
    }
}

/// Executes registered jobs with per-job failure isolation
pub struct JobRunner {
    registry: FrozenRegistry,
    ctx: Arc<JobContext>,
    // One slot per registry entry; the lock is held for a whole invocation
    states: Vec<Arc<Mutex<JobState>>>,
    mode: ExecutionMode,
    workers: Arc<Semaphore>,
}

impl JobRunner {
    pub fn new(registry: FrozenRegistry, ctx: JobContext) -> Self {
        let states = registry.iter().map(|_| Arc::new(Mutex::new(JobState::default()))).collect();
        Self {
            registry,
            ctx: Arc::new(ctx),
            states,
            mode: ExecutionMode::Sequential,
            workers: Arc::new(Semaphore::new(1)),
        }
    }

    /// Let jobs marked concurrent-safe run on up to `max_workers` workers
    pub fn with_execution(mut self, mode: ExecutionMode, max_workers: usize) -> Self {
        self.mode = mode;
        self.workers = Arc::new(Semaphore::new(max_workers.max(1)));
        self
    }

    pub fn registry(&self) -> &FrozenRegistry {
        &self.registry
    }

    /// Snapshot of a job's state
    pub async fn state(&self, name: &str) -> Option<JobState> {
        let idx = self.registry.iter().position(|d| d.name() == name)?;
        Some(self.states[idx].lock().await.clone())
    }

    /// Run every registered job once.
    ///
    /// Never fails: job errors and panics are logged and reported in the
    /// returned [`RunReport`].
    pub async fn run_all(&self) -> RunReport {
        let run_id = Uuid::new_v4();
        let run_span = info_span!("run", %run_id);
        let started = Instant::now();

        let reports = self.run_jobs(&run_span).instrument(run_span.clone()).await;

        let duration = started.elapsed();
        ::metrics::histogram!(MetricName::RunDuration.as_str()).record(duration.as_secs_f64());

        let report = RunReport { run_id, jobs: reports, duration };
        run_span.in_scope(|| {
            info!(
                jobs = report.jobs.len(),
                failed = report.failed_count(),
                duration_ms = duration.as_millis() as u64,
                "run finished"
            )
        });
        report
    }

    async fn run_jobs(&self, run_span: &Span) -> Vec<JobReport> {
        let mut slots: Vec<Option<JobReport>> = vec![None; self.registry.len()];
        let mut concurrent = Vec::new();

        if self.mode == ExecutionMode::Concurrent {
            for (idx, desc) in self.registry.iter().enumerate() {
                if !desc.concurrent_safe() {
                    continue;
                }
                let desc = desc.clone();
                let ctx = Arc::clone(&self.ctx);
                let state = Arc::clone(&self.states[idx]);
                let workers = Arc::clone(&self.workers);
                let span = run_span.clone();
                let handle = tokio::spawn(async move {
                    // The semaphore is never closed
                    let _permit = workers.acquire_owned().await.ok();
                    execute(&desc, ctx, state, &span).await
                });
                concurrent.push((idx, handle));
            }
        }

        for (idx, desc) in self.registry.iter().enumerate() {
            if self.mode == ExecutionMode::Concurrent && desc.concurrent_safe() {
                continue;
            }
            let report = execute(desc, Arc::clone(&self.ctx), Arc::clone(&self.states[idx]), run_span).await;
            slots[idx] = Some(report);
        }

        for (idx, handle) in concurrent {
            let name = self.registry.iter().nth(idx).map(|d| d.name()).unwrap_or("unknown");
            let report = match handle.await {
                Ok(report) => report,
                Err(e) => JobReport {
                    name,
                    outcome: JobOutcome::Panicked(e.to_string()),
                    duration: Duration::ZERO,
                },
            };
            slots[idx] = Some(report);
        }

        slots.into_iter().flatten().collect()
    }
}

/// Run one job on its own task so a panic cannot unwind into the runner
async fn execute(desc: &JobDescriptor, ctx: Arc<JobContext>, state: Arc<Mutex<JobState>>, run_span: &Span) -> JobReport {
    let name = desc.name();
    let job = Arc::clone(desc.job());
    let span = info_span!(parent: run_span, "job", job = name);
    let started = Instant::now();

    let task_state = Arc::clone(&state);
    let handle = tokio::spawn(
        async move {
            let mut guard = task_state.lock().await;
            guard.runs += 1;
            job.run(&ctx, &mut guard).await
        }
        .instrument(span.clone()),
    );

    let outcome = match handle.await {
        Ok(Ok(())) => JobOutcome::Succeeded,
        Ok(Err(e)) => JobOutcome::Failed(e.to_string()),
        Err(e) if e.is_panic() => JobOutcome::Panicked(panic_message(e.into_panic())),
        Err(e) => JobOutcome::Failed(e.to_string()),
    };
    let duration = started.elapsed();

    {
        let mut guard = state.lock().await;
        match &outcome {
            JobOutcome::Succeeded => guard.last_success = Some(Utc::now()),
            _ => guard.failures += 1,
        }
    }

    span.in_scope(|| match &outcome {
        JobOutcome::Succeeded => info!(duration_ms = duration.as_millis() as u64, "job succeeded"),
        JobOutcome::Failed(err) => error!(error = %err, "job failed"),
        JobOutcome::Panicked(msg) => error!(panic = %msg, "job panicked"),
    });
    record_job_metrics(name, &outcome, duration);

    if duration > Duration::from_secs(60) {
        span.in_scope(|| warn!(duration_ms = duration.as_millis() as u64, "job is slow"));
    }

    JobReport { name, outcome, duration }
}

fn record_job_metrics(name: &'static str, outcome: &JobOutcome, duration: Duration) {
    ::metrics::counter!(
        MetricName::JobRuns.as_str(),
        LABEL_JOB => name,
        LABEL_OUTCOME => outcome.as_label()
    )
    .increment(1);
    ::metrics::histogram!(MetricName::JobDuration.as_str(), LABEL_JOB => name).record(duration.as_secs_f64());
    if outcome.is_success() {
        ::metrics::gauge!(MetricName::JobLastSuccess.as_str(), LABEL_JOB => name).set(Utc::now().timestamp() as f64);
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
