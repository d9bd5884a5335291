use super::MetricJob;
use crate::error::{ExporterError, Result};
use std::any::TypeId;
use std::sync::Arc;
use tracing::debug;

/// A registered job
#[derive(Clone)]
pub struct JobDescriptor {
    name: &'static str,
    type_id: TypeId,
    concurrent_safe: bool,
    job: Arc<dyn MetricJob>,
}

impl JobDescriptor {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn concurrent_safe(&self) -> bool {
        self.concurrent_safe
    }

    pub fn job(&self) -> &Arc<dyn MetricJob> {
        &self.job
    }
}

impl std::fmt::Debug for JobDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobDescriptor")
            .field("name", &self.name)
            .field("concurrent_safe", &self.concurrent_safe)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    Added,
    /// The same job type was registered before; nothing changed
    AlreadyRegistered,
}

/// Ordered collection of jobs being declared at startup
#[derive(Debug, Default)]
pub struct JobRegistry {
    jobs: Vec<JobDescriptor>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a job, keyed by its name.
    ///
    /// Registering the same job type twice is a no-op. A different job type
    /// claiming a taken name is rejected.
    ///
    /// Sameness is decided by type alone: a second instance of an already
    /// registered type under the same name is dropped even when its fields
    /// differ, and the first instance keeps running.
    pub fn register<J: MetricJob>(&mut self, job: J) -> Result<Registration> {
        let name = job.name();
        let type_id = TypeId::of::<J>();

        if let Some(existing) = self.jobs.iter().find(|d| d.name == name) {
            if existing.type_id == type_id {
                debug!(job = name, "job already registered");
                return Ok(Registration::AlreadyRegistered);
            }
            return Err(ExporterError::DuplicateJob { name });
        }

        self.jobs.push(JobDescriptor {
            name,
            type_id,
            concurrent_safe: job.concurrent_safe(),
            job: Arc::new(job),
        });
        Ok(Registration::Added)
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Stop accepting registrations
    pub fn freeze(self) -> FrozenRegistry {
        FrozenRegistry { jobs: self.jobs.into() }
    }
}

/// Immutable, cheaply clonable view of the registered jobs
#[derive(Debug, Clone)]
pub struct FrozenRegistry {
    jobs: Arc<[JobDescriptor]>,
}

impl FrozenRegistry {
    pub fn iter(&self) -> impl Iterator<Item = &JobDescriptor> {
        self.jobs.iter()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.jobs.iter().map(|d| d.name).collect()
    }

    pub fn get(&self, name: &str) -> Option<&JobDescriptor> {
        self.jobs.iter().find(|d| d.name == name)
    }
}
