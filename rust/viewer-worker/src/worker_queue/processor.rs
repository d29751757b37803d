use anyhow::Result;
use async_trait::async_trait;
use std::fmt::{Debug, Display};
use viewer_core::data::Priority;

#[cfg(doc)]
use super::WorkerQueue;

/// An interface to perform work within the context
/// of a [WorkerQueue].
#[async_trait]
pub trait Processor: Clone + Send + Sync + 'static {
    /// Type passed to each job processor to derive additional
    /// data beyond the job details.
    type Context: Clone + Send + Sync + 'static;
    /// Type representing an individual unit of work.
    type Job: Debug + Display + Clone + Send + 'static;

    /// Jobs sharing a unicity id are never waiting twice in the queue,
    /// and never run concurrently. `None` opts out of both.
    fn unicity_id(_job: &Self::Job) -> Option<String> {
        None
    }

    /// Folds `incoming` into `waiting`, a job with the same unicity id that
    /// has not started yet. `incoming` is dropped by default.
    fn merge(_waiting: &mut Self::Job, _incoming: Self::Job) {}

    /// Waiting [Priority::Normal] jobs are dispatched before
    /// [Priority::Low] ones.
    fn priority(_job: &Self::Job) -> Priority {
        Priority::Normal
    }

    /// Processes an asynchronous [Self::Job].
    ///
    /// On success, returns the jobs to be subsequently queued.
    async fn process(context: Self::Context, job: Self::Job) -> Result<Vec<Self::Job>>;

    /// Called once a job has exhausted its retries (failures or timeouts),
    /// with a description of the last failure.
    async fn abandon(_context: Self::Context, _job: Self::Job, _reason: String) -> Result<()> {
        Ok(())
    }
}
