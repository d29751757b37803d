use async_trait::async_trait;
use std::collections::HashSet;
use thiserror::Error;

use crate::{
    data::{JobContent, JobIdentity, JobType, JobVersion, SplitFullName},
    error::ErrorEnvelope,
};

/// The ways a job execution can fail.
#[derive(Error, Debug)]
pub enum JobError {
    /// A classified failure. It is the terminal state of the job and is
    /// persisted in the response cache in place of content.
    #[error(transparent)]
    Failed(#[from] ErrorEnvelope),

    /// The job was dispatched with arguments its runner cannot accept (for
    /// example a config-level job without a config). This is a bug in the
    /// caller or in the endpoint mapping; it is never persisted nor shown to
    /// API clients.
    #[error("Programming error: {0}")]
    Programming(String),
}

impl JobIdentity {
    /// The config of this identity, or a [JobError::Programming] if the
    /// identity has none
    pub fn require_config(&self) -> Result<&str, JobError> {
        self.config.as_deref().ok_or_else(|| {
            JobError::Programming(format!("config is required by {}", self.job_type))
        })
    }

    /// The split of this identity, or a [JobError::Programming] if the
    /// identity has none
    pub fn require_split(&self) -> Result<&str, JobError> {
        self.split
            .as_deref()
            .ok_or_else(|| JobError::Programming(format!("split is required by {}", self.job_type)))
    }
}

/// The contract every kind of job implements.
///
/// A runner is stateless with respect to individual jobs: it is constructed
/// once, registered in a [crate::job::JobRunnerRegistry], and then asked to
/// [JobRunner::compute] any number of identities, possibly concurrently.
#[async_trait]
pub trait JobRunner: Send + Sync {
    /// The job type this runner computes. Constant per implementation.
    fn job_type(&self) -> JobType;

    /// The version of the content this runner produces. Constant per
    /// implementation; cached content is only reused when it was produced at
    /// exactly this version.
    fn job_version(&self) -> JobVersion;

    /// Perform the job against whatever external source it needs. Every
    /// fault must be classified into a [JobError].
    async fn compute(&self, identity: &JobIdentity) -> Result<JobContent, JobError>;

    /// Project freshly computed `content` to the set of items it discovered.
    ///
    /// Must be pure: it only reads `content`, never the external source, so
    /// that it is safe to call at any time after [JobRunner::compute]
    /// returned. Runners without discovery return the empty set.
    fn new_items(&self, _content: &JobContent) -> Result<HashSet<SplitFullName>, JobError> {
        Ok(HashSet::new())
    }
}
