use crate::{
    worker_queue::{Processor, WorkerQueue, WorkerSettings},
    ExecutionError, JobExecutor,
};
use anyhow::Result;
use async_trait::async_trait;
use std::marker::PhantomData;
use viewer_core::{
    cache::ResponseCache,
    data::{JobInfo, Priority},
};

/// Implements [Processor] for [JobInfo] tasks by running them through a
/// [JobExecutor].
#[derive(Clone)]
pub struct ViewerJobProcessor<C>
where
    C: ResponseCache,
{
    cache_marker: PhantomData<C>,
}

#[async_trait]
impl<C> Processor for ViewerJobProcessor<C>
where
    C: ResponseCache + 'static,
{
    type Context = JobExecutor<C>;
    type Job = JobInfo;

    fn unicity_id(job: &Self::Job) -> Option<String> {
        Some(job.identity.fingerprint())
    }

    /// A forced twin makes the waiting job forced, and a twin requested at
    /// [Priority::Normal] raises the waiting job to that priority.
    fn merge(waiting: &mut Self::Job, incoming: Self::Job) {
        waiting.force |= incoming.force;
        if incoming.priority == Priority::Normal {
            waiting.priority = Priority::Normal;
        }
    }

    fn priority(job: &Self::Job) -> Priority {
        job.priority
    }

    /// Jobs that cannot run as submitted are dropped here: retrying them
    /// would fail the same way, and they must leave no entry behind.
    async fn process(context: Self::Context, job: Self::Job) -> Result<Vec<Self::Job>> {
        match context.run(&job).await {
            Ok(outcome) => Ok(outcome.children),
            Err(error @ ExecutionError::Programming { .. }) => {
                error!("Dropping a job that cannot run: {}", error);
                Ok(Vec::new())
            }
            Err(ExecutionError::Infrastructure(error)) => Err(error),
        }
    }

    async fn abandon(context: Self::Context, job: Self::Job, reason: String) -> Result<()> {
        context.set_crashed(&job, &reason).await
    }
}

/// The worker queue running dataset viewer jobs against a cache of type `C`
pub type ViewerWorkerQueue<C> = WorkerQueue<ViewerJobProcessor<C>>;

/// Start a [ViewerWorkerQueue] whose workers run jobs with `executor`
pub fn start_worker_queue<C>(
    executor: JobExecutor<C>,
    settings: &WorkerSettings,
) -> Result<ViewerWorkerQueue<C>>
where
    C: ResponseCache + 'static,
{
    info!(
        "Starting {} workers (timeout {}s, {} retries)",
        settings.worker_count,
        settings.job_timeout.as_secs(),
        settings.job_retries
    );
    WorkerQueue::spawn(executor, settings)
}
