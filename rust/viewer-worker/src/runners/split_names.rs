use async_trait::async_trait;
use http::StatusCode;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use viewer_core::{
    data::{JobContent, JobIdentity, JobType, JobVersion, SplitFullName},
    error::{ErrorCode, ErrorEnvelope},
    job::{JobError, JobRunner},
};

use crate::inspector::{DatasetInspector, InspectError};

/// The job type of [SplitNamesFromStreamingJobRunner]
pub const SPLIT_NAMES_FROM_STREAMING: &str = "/split-names-from-streaming";

const SPLIT_NAMES_FROM_STREAMING_VERSION: &str = "1.0.0";

/// The content produced by [SplitNamesFromStreamingJobRunner]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitNamesResponse {
    /// The splits of the configuration, in the order the source lists them
    pub split_names: Vec<SplitFullName>,
}

/// Lists the splits of one configuration of a dataset by inspecting the
/// dataset in place, and reports each split as a discovered item.
pub struct SplitNamesFromStreamingJobRunner<I: DatasetInspector> {
    inspector: I,
    hf_token: Option<String>,
}

impl<I: DatasetInspector> SplitNamesFromStreamingJobRunner<I> {
    /// Create a runner that reads datasets through `inspector`, with
    /// `hf_token` when one is given and anonymously otherwise.
    pub fn new(inspector: I, hf_token: Option<String>) -> Self {
        SplitNamesFromStreamingJobRunner {
            inspector,
            hf_token,
        }
    }
}

fn classify(config: &str, error: InspectError) -> ErrorEnvelope {
    match error {
        InspectError::EmptyDataset(cause) => ErrorEnvelope::new(
            "The dataset is empty.",
            StatusCode::INTERNAL_SERVER_ERROR,
            ErrorCode::EmptyDatasetError,
        )
        .with_cause(cause)
        .disclosed(),
        InspectError::Other(cause) => ErrorEnvelope::new(
            format!("Cannot get the split names for the config '{config}' of the dataset."),
            StatusCode::INTERNAL_SERVER_ERROR,
            ErrorCode::ComputationError,
        )
        .with_cause(cause)
        .disclosed(),
    }
}

#[async_trait]
impl<I> JobRunner for SplitNamesFromStreamingJobRunner<I>
where
    I: DatasetInspector + 'static,
{
    fn job_type(&self) -> JobType {
        JobType::from(SPLIT_NAMES_FROM_STREAMING)
    }

    fn job_version(&self) -> JobVersion {
        JobVersion::from(SPLIT_NAMES_FROM_STREAMING_VERSION)
    }

    async fn compute(&self, identity: &JobIdentity) -> Result<JobContent, JobError> {
        let dataset = identity.dataset.as_str();
        let config = identity.require_config()?;

        debug!("Getting split names of {dataset}/{config}");

        let splits = self
            .inspector
            .get_split_names(dataset, config, self.hf_token.as_deref())
            .await
            .map_err(|error| classify(config, error))?;

        let response = SplitNamesResponse {
            split_names: splits
                .into_iter()
                .map(|split| SplitFullName::new(dataset, config, split))
                .collect(),
        };

        match serde_json::to_value(response) {
            Ok(serde_json::Value::Object(content)) => Ok(content),
            Ok(_) => Err(JobError::Programming(
                "split names did not serialize to an object".into(),
            )),
            Err(error) => Err(JobError::Programming(error.to_string())),
        }
    }

    fn new_items(&self, content: &JobContent) -> Result<HashSet<SplitFullName>, JobError> {
        let response: SplitNamesResponse =
            serde_json::from_value(serde_json::Value::Object(content.clone()))
                .map_err(|error| JobError::Programming(format!("Unexpected content: {error}")))?;

        Ok(response.split_names.into_iter().collect())
    }
}
