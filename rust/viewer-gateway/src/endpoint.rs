use anyhow::{anyhow, Result};
use std::collections::BTreeMap;
use viewer_core::{
    data::{InputType, JobIdentity, JobType, ProcessingGraph},
    error::ErrorEnvelope,
};
use viewer_worker::runners::SPLIT_NAMES_FROM_STREAMING;

use crate::extractors::QueryParams;

/// The public endpoints and, for each of them, the job types whose cached
/// responses may answer it, in order of preference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointConfig {
    /// Endpoint path to job types
    pub endpoints: BTreeMap<String, Vec<JobType>>,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        EndpointConfig {
            endpoints: BTreeMap::from([
                (
                    "/split-names-from-streaming".to_owned(),
                    vec![JobType::from(SPLIT_NAMES_FROM_STREAMING)],
                ),
                (
                    "/splits".to_owned(),
                    vec![JobType::from(SPLIT_NAMES_FROM_STREAMING)],
                ),
            ]),
        }
    }
}

#[derive(Debug, Clone)]
struct EndpointSteps {
    input_type: InputType,
    steps: Vec<JobType>,
}

/// Parameters that passed validation for an endpoint: everything its input
/// type requires is present and non-empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetParams {
    /// The dataset, always present
    pub dataset: String,
    /// Present when the endpoint works at config or split level
    pub config: Option<String>,
    /// Present when the endpoint works at split level
    pub split: Option<String>,
}

/// Resolves public endpoints to the job types that serve them, and checks
/// request parameters against what those job types require.
#[derive(Debug, Clone)]
pub struct EndpointStepMapping {
    endpoints: BTreeMap<String, EndpointSteps>,
}

impl EndpointStepMapping {
    /// Build the mapping of `config`. Every job type must be a step of
    /// `graph`, and all the steps of one endpoint must share an input type.
    pub fn new(config: &EndpointConfig, graph: &ProcessingGraph) -> Result<Self> {
        let mut endpoints = BTreeMap::new();

        for (endpoint, job_types) in &config.endpoints {
            let mut input_types = job_types.iter().map(|job_type| {
                graph
                    .step(job_type)
                    .map(|step| step.input_type)
                    .ok_or_else(|| anyhow!("Endpoint {endpoint} names unknown job type {job_type}"))
            });

            let input_type = input_types
                .next()
                .ok_or_else(|| anyhow!("Endpoint {endpoint} has no processing step"))??;
            for other in input_types {
                if other? != input_type {
                    return Err(anyhow!("The steps of endpoint {endpoint} mix input types"));
                }
            }

            endpoints.insert(
                endpoint.clone(),
                EndpointSteps {
                    input_type,
                    steps: job_types.clone(),
                },
            );
        }

        Ok(EndpointStepMapping { endpoints })
    }

    fn get(&self, endpoint: &str) -> Result<&EndpointSteps, ErrorEnvelope> {
        self.endpoints.get(endpoint).ok_or_else(|| {
            ErrorEnvelope::validation(format!("The endpoint '{endpoint}' does not exist"))
        })
    }

    /// Every mapped endpoint
    pub fn endpoints(&self) -> impl Iterator<Item = &str> {
        self.endpoints.keys().map(String::as_str)
    }

    /// The job types serving `endpoint`, in order of preference
    pub fn steps_for(&self, endpoint: &str) -> Result<&[JobType], ErrorEnvelope> {
        Ok(&self.get(endpoint)?.steps)
    }

    /// The parameters `endpoint` requires
    pub fn required_params(&self, endpoint: &str) -> Result<InputType, ErrorEnvelope> {
        Ok(self.get(endpoint)?.input_type)
    }

    /// Check `params` against what `endpoint` requires. Parameters the
    /// endpoint does not use are dropped.
    pub fn validate(
        &self,
        endpoint: &str,
        params: QueryParams,
    ) -> Result<DatasetParams, ErrorEnvelope> {
        let input_type = self.required_params(endpoint)?;

        fn required(name: &str, value: Option<String>) -> Result<String, ErrorEnvelope> {
            value.ok_or_else(|| {
                ErrorEnvelope::validation(format!("Parameter '{name}' is required"))
            })
        }

        let dataset = required("dataset", params.dataset)?;
        let config = match input_type.requires_config() {
            true => Some(required("config", params.config)?),
            false => None,
        };
        let split = match input_type.requires_split() {
            true => Some(required("split", params.split)?),
            false => None,
        };

        Ok(DatasetParams {
            dataset,
            config,
            split,
        })
    }

    /// The identity of the `job_type` step of `endpoint` for validated
    /// `params`
    pub fn identity_for(
        &self,
        endpoint: &str,
        job_type: &JobType,
        params: &DatasetParams,
    ) -> Result<JobIdentity, ErrorEnvelope> {
        let input_type = self.required_params(endpoint)?;
        let identity = match (input_type, &params.config, &params.split) {
            (InputType::Dataset, _, _) => {
                JobIdentity::dataset(job_type.clone(), params.dataset.as_str())
            }
            (InputType::Config, Some(config), _) => {
                JobIdentity::config(job_type.clone(), params.dataset.as_str(), config.as_str())
            }
            (InputType::Split, Some(config), Some(split)) => JobIdentity::split(
                job_type.clone(),
                params.dataset.as_str(),
                config.as_str(),
                split.as_str(),
            ),
            _ => {
                return Err(ErrorEnvelope::validation(format!(
                    "Parameters do not match the requirements of {endpoint}"
                )))
            }
        };
        Ok(identity)
    }
}
