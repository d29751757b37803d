use super::{
    worker::{JobRequest, Worker, WorkerResponse},
    Processor, WorkerSettings,
};
use anyhow::{anyhow, Result};
use std::{
    collections::{HashSet, VecDeque},
    time::{Duration, SystemTime},
};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use viewer_core::data::Priority;

#[cfg(doc)]
use super::WorkerQueue;

/// [WorkerQueueOrchestrator] is where work is orchestrated
/// from a [WorkerQueue].
///
/// The orchestrator spins up worker tasks, receives job requests
/// over a message channel, and sends work to available workers
/// for processing. A job submitted while its unicity id is waiting is
/// merged into the waiting job, and a job is held back while another job
/// with the same unicity id runs.
/// The orchestrator is also responsible for terminating/restarting
/// workers that surpass the timeout, and retries failed jobs up
/// to the configured limit before abandoning them.
pub struct WorkerQueueOrchestrator<P: Processor> {
    workers: Vec<Worker<P>>,
    retries: usize,
    timeout: Duration,
    normal_queue: VecDeque<JobRequest<P>>,
    low_queue: VecDeque<JobRequest<P>>,
    waiting_ids: HashSet<String>,
    request_rx: Option<UnboundedReceiver<P::Job>>,
    response_rx: Option<UnboundedReceiver<WorkerResponse<P::Job>>>,
    worker_context: P::Context,
    response_tx: UnboundedSender<WorkerResponse<P::Job>>,
}

impl<P> WorkerQueueOrchestrator<P>
where
    P: Processor,
{
    /// Creates a new [WorkerQueueOrchestrator], spawning
    /// `settings.worker_count` workers. Must be called within a tokio runtime.
    pub fn new(
        worker_context: P::Context,
        settings: &WorkerSettings,
        request_rx: UnboundedReceiver<P::Job>,
    ) -> Self {
        let (response_tx, response_rx) = unbounded_channel();

        let workers = (0..settings.worker_count)
            .map(|index| Worker::spawn(index, worker_context.clone(), response_tx.clone()))
            .collect();

        Self {
            normal_queue: VecDeque::new(),
            low_queue: VecDeque::new(),
            waiting_ids: HashSet::new(),
            workers,
            retries: settings.job_retries,
            timeout: settings.job_timeout,
            request_rx: Some(request_rx),
            response_rx: Some(response_rx),
            response_tx,
            worker_context,
        }
    }

    fn queue_mut(&mut self, priority: Priority) -> &mut VecDeque<JobRequest<P>> {
        match priority {
            Priority::Normal => &mut self.normal_queue,
            Priority::Low => &mut self.low_queue,
        }
    }

    /// Queues a job request. When a job with the same unicity id is
    /// already waiting, the two are merged with [Processor::merge] instead,
    /// and the waiting job moves to the queue of its merged priority.
    fn enqueue(&mut self, job_request: JobRequest<P>) {
        if let Some(unicity_id) = &job_request.unicity_id {
            if !self.waiting_ids.insert(unicity_id.clone()) {
                self.merge_into_waiting(job_request);
                return;
            }
        }
        self.queue_mut(job_request.priority).push_back(job_request);
    }

    fn merge_into_waiting(&mut self, incoming: JobRequest<P>) {
        let find = |queue: &VecDeque<JobRequest<P>>| {
            queue
                .iter()
                .position(|waiting| waiting.unicity_id == incoming.unicity_id)
        };
        let location = match (find(&self.normal_queue), find(&self.low_queue)) {
            (Some(index), _) => Some((Priority::Normal, index)),
            (None, Some(index)) => Some((Priority::Low, index)),
            (None, None) => None,
        };

        let Some((priority, index)) = location else {
            warn!("No waiting job matches the unicity id of {}", incoming.job);
            self.queue_mut(incoming.priority).push_back(incoming);
            return;
        };
        let queue = self.queue_mut(priority);
        let Some(mut waiting) = queue.remove(index) else {
            return;
        };

        trace!("Merging {} into the waiting {}", incoming.job, waiting.job);
        P::merge(&mut waiting.job, incoming.job);
        waiting.priority = P::priority(&waiting.job);

        if waiting.priority == priority {
            queue.insert(index, waiting);
        } else {
            self.queue_mut(waiting.priority).push_back(waiting);
        }
    }

    /// Takes the first waiting job, normal priority first, whose unicity
    /// id is not running.
    fn next_job(&mut self) -> Option<JobRequest<P>> {
        let running: HashSet<String> = self
            .workers
            .iter()
            .filter_map(|worker| worker.active_unicity_id().map(str::to_owned))
            .collect();
        let is_runnable = |job_request: &JobRequest<P>| match &job_request.unicity_id {
            Some(unicity_id) => !running.contains(unicity_id),
            None => true,
        };

        let job_request = match self.normal_queue.iter().position(is_runnable) {
            Some(index) => self.normal_queue.remove(index),
            None => {
                let index = self.low_queue.iter().position(is_runnable)?;
                self.low_queue.remove(index)
            }
        }?;

        if let Some(unicity_id) = &job_request.unicity_id {
            self.waiting_ids.remove(unicity_id);
        }
        Some(job_request)
    }

    /// Submits unprocessed jobs to available workers.
    fn process_queue(&mut self) -> Result<()> {
        for index in 0..self.workers.len() {
            if !self.workers[index].idle() {
                continue;
            }
            match self.next_job() {
                Some(job_request) => self.workers[index].process_job(job_request)?,
                None => return Ok(()),
            }
        }
        Ok(())
    }

    /// Given a [JobRequest] that has failed (via error result or timeout),
    /// either abandon it if sufficient retries have been attempted,
    /// or requeue the job.
    fn process_failed_job(&mut self, mut job_request: JobRequest<P>, reason: String) {
        if job_request.mark_attempt_failed(self.retries) {
            self.enqueue(job_request);
            return;
        }

        error!("Job reached retry limit: {:?}", job_request);
        let context = self.worker_context.clone();
        let job = job_request.job;
        tokio::spawn(async move {
            if let Err(error) = P::abandon(context, job, reason).await {
                error!("Could not abandon job: {}", error);
            }
        });
    }

    /// Process a result from a [Worker], marking the worker as idle,
    /// and queueing subsequently requested jobs, or
    /// retrying the failed attempt.
    fn process_result(&mut self, worker_id: usize, result: Result<Vec<P::Job>>) -> Result<()> {
        let worker = self
            .workers
            .get_mut(worker_id)
            .ok_or_else(|| anyhow!("Worker index out of bounds."))?;
        let Some(job_request) = worker.clear() else {
            // The worker was cycled after a timeout while its result was in flight
            warn!("Ignoring a result from worker {} without a job", worker_id);
            return Ok(());
        };

        match result {
            Ok(next_jobs) => {
                for next_job in next_jobs {
                    self.enqueue(JobRequest::<P>::new(next_job));
                }
            }
            Err(error) => {
                error!("Error processing job {}: {:#}", job_request.job, error);
                self.process_failed_job(job_request, format!("{error:#}"));
            }
        };
        Ok(())
    }

    /// Check for timed out workers, restart them, and attempt to
    /// reprocess their failed jobs.
    fn process_timed_out_jobs(&mut self) -> Result<()> {
        let now = SystemTime::now();
        let timed_out_worker_indices: Vec<usize> = self
            .workers
            .iter()
            .enumerate()
            .filter(|(_, worker)| {
                worker
                    .job_elapsed_time(&now)
                    .map(|elapsed| elapsed >= self.timeout)
                    .unwrap_or(false)
            })
            .map(|(index, _)| index)
            .collect();

        for index in timed_out_worker_indices {
            let worker = Worker::spawn(
                index,
                self.worker_context.clone(),
                self.response_tx.clone(),
            );
            let mut old_worker = std::mem::replace(&mut self.workers[index], worker);
            if let Some(active_job) = old_worker.terminate() {
                warn!("Job timed out: {}", active_job.job);
                let reason = format!("Job timed out after {} seconds", self.timeout.as_secs());
                self.process_failed_job(active_job, reason);
            }
        }
        Ok(())
    }

    /// Returns a [Duration] of when the next check for job timeouts
    /// should occur.
    ///
    /// For example, if the timeout is set to 3 minutes, and the current
    /// longest running job is currently 1 minute into processing, the
    /// next time to check for timed out jobs is in 2 minutes.
    fn get_timeout_check_duration(&self) -> Duration {
        let now = SystemTime::now();
        self.workers
            .iter()
            .filter_map(|worker| worker.job_elapsed_time(&now))
            .map(|elapsed| self.timeout.saturating_sub(elapsed))
            .min()
            .unwrap_or(self.timeout)
    }

    /// Start the processing of incoming requests
    /// on the current task.
    pub async fn start(mut self) -> Result<()> {
        // Take our receivers so this loop doesn't need
        // a mutable reference.
        let mut response_rx = self
            .response_rx
            .take()
            .ok_or_else(|| anyhow!("Orchestrator already started."))?;
        let mut request_rx = self
            .request_rx
            .take()
            .ok_or_else(|| anyhow!("Orchestrator already started."))?;
        loop {
            let timeout_check = tokio::time::sleep(self.get_timeout_check_duration());
            tokio::pin!(timeout_check);

            tokio::select! {
                // Request to process a new job
                Some(job) = request_rx.recv() => {
                    self.enqueue(JobRequest::<P>::new(job));
                }
                // Response from a worker
                Some((worker_id, result)) = response_rx.recv() => {
                    self.process_result(worker_id, result)?;
                }
                // Wait for the most recent job to hit the timeout
                _ = &mut timeout_check => {
                    self.process_timed_out_jobs()?;
                }
            }
            self.process_queue()?;
        }
    }
}
