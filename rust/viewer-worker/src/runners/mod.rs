//! The job runners bundled with the worker, and the processing graph that
//! relates their job types.

mod split_names;

pub use split_names::*;

use anyhow::Result;
use viewer_core::{
    data::{InputType, ProcessingGraph, ProcessingStep},
    job::JobRunnerRegistry,
};

use crate::inspector::DatasetInspector;

/// The processing graph of the bundled runners
pub fn default_processing_graph() -> Result<ProcessingGraph> {
    ProcessingGraph::new(vec![ProcessingStep::new(
        SPLIT_NAMES_FROM_STREAMING,
        InputType::Config,
    )])
}

/// A registry holding every bundled runner, reading datasets through
/// `inspector` with `hf_token` when one is given.
pub fn default_registry<I>(inspector: I, hf_token: Option<String>) -> Result<JobRunnerRegistry>
where
    I: DatasetInspector + 'static,
{
    JobRunnerRegistry::new().with_runner(SplitNamesFromStreamingJobRunner::new(inspector, hf_token))
}
