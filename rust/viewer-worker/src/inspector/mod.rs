//! Access to the external data source that knows how datasets are laid out.
//! Runners only see the [DatasetInspector] trait and its two failure shapes;
//! [HubInspector] is the implementation backed by the Hub HTTP API.

mod hub;

pub use hub::*;

use async_trait::async_trait;
use thiserror::Error;

/// Failures reported by a [DatasetInspector].
#[derive(Error, Debug)]
pub enum InspectError {
    /// The dataset exists but has no retrievable content
    #[error("The dataset has no data files: {0}")]
    EmptyDataset(String),

    /// Any other failure (network, access, unexpected payload...)
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Introspects the configurations of externally hosted datasets.
#[async_trait]
pub trait DatasetInspector: Send + Sync {
    /// List the split names of `config` in `dataset`, in the order the
    /// source reports them. When `token` is `None` the source is accessed
    /// anonymously.
    async fn get_split_names(
        &self,
        dataset: &str,
        config: &str,
        token: Option<&str>,
    ) -> Result<Vec<String>, InspectError>;
}
