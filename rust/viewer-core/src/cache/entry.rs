use http::StatusCode;
use serde::{Deserialize, Serialize};

use crate::{
    data::{JobContent, JobIdentity, JobVersion},
    error::{ErrorCode, ErrorEnvelope},
};

/// Terminal state of the execution that produced a [CacheEntry].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheStatus {
    /// The job produced content
    Success,
    /// The job failed; the entry carries an [ErrorEnvelope]
    Error,
}

/// The record stored for a [JobIdentity]. Each execution writes exactly one
/// entry, which supersedes (never merges with) the previous one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// What was computed
    pub identity: JobIdentity,
    /// The content on success, or the error body on failure
    pub content: JobContent,
    /// The version of the runner that produced this entry
    pub job_version: JobVersion,
    /// Whether the execution succeeded
    pub status: CacheStatus,
    /// The HTTP-like status to answer with
    pub http_status: u16,
    /// The failure, when `status` is [CacheStatus::Error]
    pub error: Option<ErrorEnvelope>,
}

impl CacheEntry {
    /// An entry for a successful execution
    pub fn success(identity: JobIdentity, job_version: JobVersion, content: JobContent) -> Self {
        CacheEntry {
            identity,
            content,
            job_version,
            status: CacheStatus::Success,
            http_status: StatusCode::OK.as_u16(),
            error: None,
        }
    }

    /// An entry for a failed execution. The stored content is the error
    /// body as callers will see it.
    pub fn failure(identity: JobIdentity, job_version: JobVersion, error: ErrorEnvelope) -> Self {
        let content = match error.to_body() {
            serde_json::Value::Object(map) => map,
            _ => JobContent::new(),
        };
        CacheEntry {
            identity,
            content,
            job_version,
            status: CacheStatus::Error,
            http_status: error.status().as_u16(),
            error: Some(error),
        }
    }

    /// True when this entry was produced by `current_version` of its runner,
    /// regardless of whether it records a success or a failure
    pub fn is_fresh(&self, current_version: &JobVersion) -> bool {
        &self.job_version == current_version
    }

    /// The error code of a failed execution
    pub fn error_code(&self) -> Option<ErrorCode> {
        self.error.as_ref().map(|error| error.code())
    }
}
