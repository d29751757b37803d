use anyhow::{anyhow, Result};
use http::StatusCode;
use std::{collections::HashSet, sync::Arc};
use thiserror::Error;
use viewer_core::{
    cache::{lookup, CacheEntry, CacheLookup, CacheStatus, ResponseCache},
    data::{InputType, ItemsDiff, JobIdentity, JobInfo, ProcessingGraph, SplitFullName},
    error::{ErrorCode, ErrorEnvelope},
    job::{JobError, JobRunner, JobRunnerRegistry},
};

/// What happened when a [JobExecutor] ran a job.
#[derive(Debug, Clone, PartialEq)]
pub struct JobOutcome {
    /// The job that was run
    pub job: JobInfo,
    /// Set when a fresh entry made the computation unnecessary
    pub skipped: bool,
    /// The status of the entry written by this run; `None` when skipped
    pub status: Option<CacheStatus>,
    /// The discovered items compared with those of the previous run
    pub diff: ItemsDiff,
    /// Jobs to queue as a consequence of this run
    pub children: Vec<JobInfo>,
}

impl JobOutcome {
    fn skipped(job: &JobInfo) -> Self {
        JobOutcome {
            job: job.clone(),
            skipped: true,
            status: None,
            diff: ItemsDiff::default(),
            children: Vec::new(),
        }
    }
}

/// Why a [JobExecutor] could not run a job to completion.
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// The job cannot be run as submitted (unknown job type, missing
    /// parameters, unreadable content). Nothing was persisted and running it
    /// again would fail the same way.
    #[error("Cannot run {job}: {message}")]
    Programming {
        /// The job that was rejected
        job: JobInfo,
        /// What is wrong with it
        message: String,
    },
    /// The job could not be completed because of its environment, e.g. the
    /// cache failed; it may succeed if attempted again
    #[error(transparent)]
    Infrastructure(#[from] anyhow::Error),
}

impl ExecutionError {
    fn programming<M: Into<String>>(job: &JobInfo, message: M) -> Self {
        ExecutionError::Programming {
            job: job.clone(),
            message: message.into(),
        }
    }
}

/// Message of the entry recorded for a job that crashed. The reason of the
/// crash is kept as an undisclosed cause.
pub const JOB_RUNNER_CRASHED_MESSAGE: &str = "Job runner crashed while running this job.";

/// Drives single jobs: consults the response cache through the version
/// gate, runs the job's [JobRunner], persists the terminal entry and derives
/// the children jobs from the [ProcessingGraph].
#[derive(Clone)]
pub struct JobExecutor<C: ResponseCache> {
    registry: JobRunnerRegistry,
    graph: Arc<ProcessingGraph>,
    cache: C,
}

impl<C> JobExecutor<C>
where
    C: ResponseCache,
{
    /// Create an executor running jobs with the runners of `registry`
    pub fn new(registry: JobRunnerRegistry, graph: ProcessingGraph, cache: C) -> Self {
        JobExecutor {
            registry,
            graph: Arc::new(graph),
            cache,
        }
    }

    /// The cache this executor writes to
    pub fn cache(&self) -> &C {
        &self.cache
    }

    fn runner_for(&self, job: &JobInfo) -> Result<Arc<dyn JobRunner>> {
        self.registry
            .get(&job.identity.job_type)
            .ok_or_else(|| anyhow!("No runner is registered for {}", job.identity.job_type))
    }

    /// True when `job` is not forced and the cache already holds an entry
    /// produced by the current version of its runner
    pub async fn should_skip(&self, job: &JobInfo) -> Result<bool> {
        if job.force {
            return Ok(false);
        }
        let runner = self.runner_for(job)?;
        let cached = lookup(&self.cache, &job.identity, &runner.job_version()).await?;
        Ok(!cached.needs_compute())
    }

    /// Run `job` to completion.
    ///
    /// A classified failure of the runner is a normal outcome: it is
    /// persisted and `Ok` is returned. An error is only returned for
    /// failures that must not be persisted.
    pub async fn run(&self, job: &JobInfo) -> Result<JobOutcome, ExecutionError> {
        let runner = self
            .runner_for(job)
            .map_err(|error| ExecutionError::programming(job, error.to_string()))?;

        if self.should_skip(job).await? {
            debug!("Skipping {}: a fresh response is cached", job);
            return Ok(JobOutcome::skipped(job));
        }

        let version = runner.job_version();
        let previous_items = match lookup(&self.cache, &job.identity, &version).await? {
            CacheLookup::Fresh(entry) if entry.status == CacheStatus::Success => {
                match runner.new_items(&entry.content) {
                    Ok(items) => items,
                    Err(error) => {
                        warn!("Could not read items of the cached entry for {}: {}", job, error);
                        HashSet::new()
                    }
                }
            }
            _ => HashSet::new(),
        };

        info!("Computing {}", job);

        let computed = match runner.compute(&job.identity).await {
            Ok(content) => runner.new_items(&content).map(|items| (content, items)),
            Err(error) => Err(error),
        };

        let (content, items) = match computed {
            Ok(computed) => computed,
            Err(JobError::Failed(envelope)) => {
                info!(
                    "{} failed with {}: {}",
                    job,
                    envelope.code(),
                    envelope.cause().unwrap_or(envelope.message())
                );
                self.cache
                    .upsert(CacheEntry::failure(job.identity.clone(), version, envelope))
                    .await?;
                return Ok(JobOutcome {
                    job: job.clone(),
                    skipped: false,
                    status: Some(CacheStatus::Error),
                    diff: ItemsDiff::default(),
                    children: Vec::new(),
                });
            }
            Err(JobError::Programming(message)) => {
                return Err(ExecutionError::programming(job, message));
            }
        };

        self.cache
            .upsert(CacheEntry::success(job.identity.clone(), version, content))
            .await?;

        let diff = ItemsDiff::between(&previous_items, &items);
        if !diff.removed.is_empty() {
            self.retire(job, &diff.removed).await?;
        }

        let children = self.graph.children_jobs(job, &items);
        debug!("{} succeeded; {} children jobs", job, children.len());

        Ok(JobOutcome {
            job: job.clone(),
            skipped: false,
            status: Some(CacheStatus::Success),
            diff,
            children,
        })
    }

    /// Delete the entries of split-level children of `job` for items that
    /// are no longer discovered
    async fn retire(&self, job: &JobInfo, removed: &HashSet<SplitFullName>) -> Result<()> {
        for child in self.graph.children(&job.identity.job_type) {
            if child.input_type != InputType::Split {
                continue;
            }
            for item in removed {
                let identity = JobIdentity::for_item(&child.job_type, child.input_type, item);
                if self.cache.delete(&identity).await?.is_some() {
                    debug!("Retired {}", identity);
                }
            }
        }
        Ok(())
    }

    /// Record that `job` could not be run to completion, e.g. because its
    /// worker timed out. `reason` is stored as an undisclosed cause.
    pub async fn set_crashed(&self, job: &JobInfo, reason: &str) -> Result<()> {
        let runner = self.runner_for(job)?;
        warn!("{} crashed: {}", job, reason);

        let envelope = ErrorEnvelope::new(
            JOB_RUNNER_CRASHED_MESSAGE,
            StatusCode::NOT_IMPLEMENTED,
            ErrorCode::JobRunnerCrashedError,
        )
        .with_cause(reason);
        self.cache
            .upsert(CacheEntry::failure(
                job.identity.clone(),
                runner.job_version(),
                envelope,
            ))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    };
    use viewer_core::data::{JobContent, JobType, JobVersion, Priority, ProcessingStep};

    /// Discovers the splits it is currently configured with, or fails when
    /// configured with none.
    #[derive(Clone)]
    struct DiscoveryRunner {
        version: &'static str,
        splits: Arc<Mutex<Vec<&'static str>>>,
        calls: Arc<AtomicUsize>,
    }

    impl DiscoveryRunner {
        fn new(version: &'static str, splits: Vec<&'static str>) -> Self {
            DiscoveryRunner {
                version,
                splits: Arc::new(Mutex::new(splits)),
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    #[async_trait]
    impl JobRunner for DiscoveryRunner {
        fn job_type(&self) -> JobType {
            JobType::from("/dummy")
        }

        fn job_version(&self) -> JobVersion {
            JobVersion::from(self.version)
        }

        async fn compute(&self, identity: &JobIdentity) -> Result<JobContent, JobError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let config = identity.require_config()?;
            let splits = self.splits.lock().unwrap().clone();
            if splits.is_empty() {
                return Err(ErrorEnvelope::new(
                    "The dataset is empty.",
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorCode::EmptyDatasetError,
                )
                .into());
            }
            let mut content = JobContent::new();
            content.insert("config".into(), json!(config));
            content.insert("splits".into(), json!(splits));
            Ok(content)
        }

        fn new_items(&self, content: &JobContent) -> Result<HashSet<SplitFullName>, JobError> {
            let config = content["config"].as_str().unwrap_or_default();
            Ok(content["splits"]
                .as_array()
                .into_iter()
                .flatten()
                .filter_map(|split| split.as_str())
                .map(|split| SplitFullName::new("dataset", config, split))
                .collect())
        }
    }

    fn graph() -> ProcessingGraph {
        ProcessingGraph::new(vec![
            ProcessingStep::new("/dummy", InputType::Config),
            ProcessingStep::new("/child-dataset", InputType::Dataset).requires("/dummy"),
            ProcessingStep::new("/child-split", InputType::Split).requires("/dummy"),
        ])
        .unwrap()
    }

    fn executor(runner: DiscoveryRunner) -> JobExecutor<viewer_core::cache::MemoryCache> {
        let registry = JobRunnerRegistry::new().with_runner(runner).unwrap();
        JobExecutor::new(registry, graph(), Default::default())
    }

    fn job() -> JobInfo {
        JobInfo::new(JobIdentity::config("/dummy", "dataset", "config"))
    }

    #[tokio::test]
    async fn it_computes_and_reuses_fresh_entries() -> Result<()> {
        let runner = DiscoveryRunner::new("1.0.0", vec!["train", "test"]);
        let executor = executor(runner.clone());

        let first = executor.run(&job()).await?;
        assert!(!first.skipped);
        assert_eq!(first.status, Some(CacheStatus::Success));
        assert_eq!(first.diff.added.len(), 2);

        let second = executor.run(&job()).await?;
        assert!(second.skipped);
        assert_eq!(runner.calls.load(Ordering::SeqCst), 1);

        let forced = executor.run(&job().with_force(true)).await?;
        assert!(!forced.skipped);
        assert!(forced.diff.is_empty());
        assert_eq!(runner.calls.load(Ordering::SeqCst), 2);
        Ok(())
    }

    #[tokio::test]
    async fn it_recomputes_entries_of_another_version() -> Result<()> {
        let old_runner = DiscoveryRunner::new("1.0.0", vec!["train"]);
        let old_executor = executor(old_runner);
        old_executor.run(&job()).await?;

        let new_runner = DiscoveryRunner::new("2.0.0", vec!["train", "test"]);
        let registry = JobRunnerRegistry::new().with_runner(new_runner.clone())?;
        let new_executor = JobExecutor::new(registry, graph(), old_executor.cache().clone());

        assert!(!new_executor.should_skip(&job()).await?);
        let outcome = new_executor.run(&job()).await?;

        assert!(!outcome.skipped);
        assert_eq!(new_runner.calls.load(Ordering::SeqCst), 1);
        // Items of another version are not compared
        assert_eq!(outcome.diff.added.len(), 2);

        let entry = new_executor.cache().get(&job().identity).await?.unwrap();
        assert_eq!(entry.job_version, JobVersion::from("2.0.0"));
        assert_eq!(new_executor.cache().len().await, 1);
        Ok(())
    }

    #[tokio::test]
    async fn it_persists_failures_and_serves_them_while_fresh() -> Result<()> {
        let runner = DiscoveryRunner::new("1.0.0", vec![]);
        let executor = executor(runner.clone());

        let outcome = executor.run(&job()).await?;
        assert_eq!(outcome.status, Some(CacheStatus::Error));
        assert!(outcome.children.is_empty());

        let entry = executor.cache().get(&job().identity).await?.unwrap();
        assert_eq!(entry.error_code(), Some(ErrorCode::EmptyDatasetError));
        assert_eq!(entry.http_status, 500);

        assert!(executor.run(&job()).await?.skipped);
        assert_eq!(runner.calls.load(Ordering::SeqCst), 1);

        runner.splits.lock().unwrap().push("train");
        let forced = executor.run(&job().with_force(true)).await?;
        assert_eq!(forced.status, Some(CacheStatus::Success));
        Ok(())
    }

    #[tokio::test]
    async fn it_creates_children_jobs_with_the_parent_priority() -> Result<()> {
        let executor = executor(DiscoveryRunner::new("1.0.0", vec!["train", "test"]));

        let outcome = executor.run(&job().with_priority(Priority::Low)).await?;

        let identities: Vec<JobIdentity> = outcome
            .children
            .iter()
            .map(|child| child.identity.clone())
            .collect();
        assert_eq!(
            identities,
            vec![
                JobIdentity::dataset("/child-dataset", "dataset"),
                JobIdentity::split("/child-split", "dataset", "config", "test"),
                JobIdentity::split("/child-split", "dataset", "config", "train"),
            ]
        );
        assert!(outcome
            .children
            .iter()
            .all(|child| child.priority == Priority::Low && !child.force));
        Ok(())
    }

    #[tokio::test]
    async fn it_retires_entries_of_items_that_disappeared() -> Result<()> {
        let runner = DiscoveryRunner::new("1.0.0", vec!["train", "test"]);
        let executor = executor(runner.clone());
        executor.run(&job()).await?;

        let retired = JobIdentity::split("/child-split", "dataset", "config", "test");
        let kept = JobIdentity::split("/child-split", "dataset", "config", "train");
        for identity in [&retired, &kept] {
            executor
                .cache()
                .upsert(CacheEntry::success(
                    identity.clone(),
                    JobVersion::from("1.0.0"),
                    JobContent::new(),
                ))
                .await?;
        }

        *runner.splits.lock().unwrap() = vec!["train"];
        let outcome = executor.run(&job().with_force(true)).await?;

        assert_eq!(
            outcome.diff.removed,
            HashSet::from([SplitFullName::new("dataset", "config", "test")])
        );
        assert!(executor.cache().get(&retired).await?.is_none());
        assert!(executor.cache().get(&kept).await?.is_some());
        Ok(())
    }

    #[tokio::test]
    async fn it_propagates_programming_errors_without_persisting() -> Result<()> {
        let executor = executor(DiscoveryRunner::new("1.0.0", vec!["train"]));
        let without_config = JobInfo::new(JobIdentity::dataset("/dummy", "dataset"));

        assert!(matches!(
            executor.run(&without_config).await,
            Err(ExecutionError::Programming { .. })
        ));
        assert!(executor.cache().is_empty().await);

        let unknown = JobInfo::new(JobIdentity::dataset("/unknown", "dataset"));
        assert!(matches!(
            executor.run(&unknown).await,
            Err(ExecutionError::Programming { .. })
        ));
        assert!(executor.cache().is_empty().await);
        Ok(())
    }

    #[tokio::test]
    async fn it_records_crashed_jobs() -> Result<()> {
        let executor = executor(DiscoveryRunner::new("1.0.0", vec!["train"]));

        executor.set_crashed(&job(), "Job timed out").await?;

        let entry = executor.cache().get(&job().identity).await?.unwrap();
        assert_eq!(entry.http_status, 501);
        assert_eq!(entry.error_code(), Some(ErrorCode::JobRunnerCrashedError));
        assert!(executor.should_skip(&job()).await?);
        Ok(())
    }

    #[tokio::test]
    async fn it_keeps_the_crash_reason_out_of_the_served_body() -> Result<()> {
        let executor = executor(DiscoveryRunner::new("1.0.0", vec!["train"]));

        executor
            .set_crashed(&job(), "worker 3 panicked at src/runner.rs:12")
            .await?;

        let entry = executor.cache().get(&job().identity).await?.unwrap();
        assert_eq!(
            serde_json::Value::Object(entry.content),
            json!({ "error": "Job runner crashed while running this job." })
        );
        let error = entry.error.unwrap();
        assert_eq!(error.cause(), Some("worker 3 panicked at src/runner.rs:12"));
        assert!(!error.discloses_cause());
        Ok(())
    }
}
