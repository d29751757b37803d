use super::{orchestrator::WorkerQueueOrchestrator, Processor};
use anyhow::{anyhow, Result};
use std::{sync::Arc, time::Duration};
use tokio::{
    sync::mpsc::{unbounded_channel, UnboundedSender},
    task::JoinHandle,
};
use viewer_core::{data::JobInfo, job::JobClient};

/// Tuning of a [WorkerQueue]
#[derive(Debug, Clone)]
pub struct WorkerSettings {
    /// Number of concurrent workers
    pub worker_count: usize,
    /// Longest a single job may run before it is retried
    pub job_timeout: Duration,
    /// Additional attempts granted to a job that failed or timed out
    pub job_retries: usize,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        WorkerSettings {
            worker_count: 2,
            job_timeout: Duration::from_secs(60 * 10),
            job_retries: 1,
        }
    }
}

/// An abstraction around managing several worker tasks, and distributing
/// work amongst them.
///
/// To terminate all processing, all references to the [WorkerQueue]
/// must be dropped.
#[derive(Debug, Clone)]
pub struct WorkerQueue<P: Processor> {
    handle: Option<Arc<JoinHandle<Result<()>>>>,
    request_tx: UnboundedSender<P::Job>,
}

impl<P> WorkerQueue<P>
where
    P: Processor,
{
    /// Creates a new [WorkerQueue] and starts the worker tasks described by
    /// `settings`, each processing jobs with a clone of `worker_context`.
    pub fn spawn(worker_context: P::Context, settings: &WorkerSettings) -> Result<Self> {
        if settings.worker_count == 0 {
            return Err(anyhow!("worker_count must be greater than 0."));
        }

        let (request_tx, request_rx) = unbounded_channel();
        let orchestrator = WorkerQueueOrchestrator::<P>::new(worker_context, settings, request_rx);
        let handle = Some(Arc::new(tokio::spawn(async move {
            orchestrator.start().await.map_err(|error| {
                error!("Unrecoverable WorkerQueueOrchestrator error: {}", error);
                error
            })
        })));

        Ok(Self { handle, request_tx })
    }

    /// Submit a job to be performed on an available worker.
    pub fn submit(&self, job: P::Job) -> Result<()> {
        self.request_tx
            .send(job)
            .map_err(|_| anyhow!("Error submitting job."))
    }
}

impl<P> JobClient for WorkerQueue<P>
where
    P: Processor<Job = JobInfo>,
{
    fn submit(&self, job: JobInfo) -> Result<()> {
        WorkerQueue::submit(self, job)
    }
}

impl<P> Drop for WorkerQueue<P>
where
    P: Processor,
{
    fn drop(&mut self) {
        if let Some(probably_handle) = self.handle.take() {
            if let Some(handle) = Arc::into_inner(probably_handle) {
                handle.abort();
            }
        }
    }
}
