use anyhow::{anyhow, Result};
use std::{collections::BTreeMap, sync::Arc};

use crate::{
    data::{JobType, JobVersion},
    job::JobRunner,
};

/// Maps each [JobType] to the [JobRunner] that computes it. Built once at
/// process start and shared, read-only, by the workers and the public API.
#[derive(Clone, Default)]
pub struct JobRunnerRegistry {
    runners: BTreeMap<JobType, Arc<dyn JobRunner>>,
}

impl JobRunnerRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `runner` under its own job type. Two runners may not share a
    /// job type.
    pub fn register<R>(&mut self, runner: R) -> Result<()>
    where
        R: JobRunner + 'static,
    {
        let job_type = runner.job_type();
        if self.runners.contains_key(&job_type) {
            return Err(anyhow!("A runner is already registered for '{job_type}'"));
        }
        debug!(
            "Registering runner for {} at version {}",
            job_type,
            runner.job_version()
        );
        self.runners.insert(job_type, Arc::new(runner));
        Ok(())
    }

    /// Builder-style variant of [JobRunnerRegistry::register]
    pub fn with_runner<R>(mut self, runner: R) -> Result<Self>
    where
        R: JobRunner + 'static,
    {
        self.register(runner)?;
        Ok(self)
    }

    /// The runner for `job_type`, if any
    pub fn get(&self, job_type: &JobType) -> Option<Arc<dyn JobRunner>> {
        self.runners.get(job_type).cloned()
    }

    /// The current version of the runner for `job_type`, if any
    pub fn version_of(&self, job_type: &JobType) -> Option<JobVersion> {
        self.runners.get(job_type).map(|runner| runner.job_version())
    }

    /// All registered job types
    pub fn job_types(&self) -> impl Iterator<Item = &JobType> {
        self.runners.keys()
    }
}
