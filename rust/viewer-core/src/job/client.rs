use crate::data::JobInfo;
use anyhow::Result;

/// [JobClient] allows the public API, or any other service, to submit jobs
/// to be processed.
pub trait JobClient: Clone + Send + Sync {
    /// Submit a [JobInfo] to be processed. Submitting a job whose identity
    /// is already waiting has no additional effect.
    fn submit(&self, job: JobInfo) -> Result<()>;
}
