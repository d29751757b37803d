use std::{net::IpAddr, time::Duration};
use url::Url;
use viewer_worker::WorkerSettings;

use crate::authority::{AuthorityConfig, UnreachablePolicy};

/// `Cache-Control: max-age` values, in seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaxAge {
    /// For successful responses
    pub long: u64,
    /// For error responses
    pub short: u64,
}

impl Default for MaxAge {
    fn default() -> Self {
        MaxAge {
            long: 120,
            short: 10,
        }
    }
}

/// Everything the gateway needs to start; built once from the command line
/// and passed down by value.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// The interface to bind to
    pub interface: IpAddr,
    /// The port to listen on
    pub port: u16,
    /// Origin allowed to make cross-origin requests
    pub cors_origin: Option<Url>,
    /// Base URL of the Hub, where datasets are read
    pub hf_endpoint: Url,
    /// Token used by the workers to read datasets
    pub hf_token: Option<String>,
    /// The authority to check requests against; `None` disables checks
    pub authority: Option<AuthorityConfig>,
    /// What to do when the authority cannot be reached
    pub unreachable_policy: UnreachablePolicy,
    /// Caching directives of responses
    pub max_age: MaxAge,
    /// Tuning of the in-process workers
    pub workers: WorkerSettings,
    /// Bound on a single request to the Hub made by a worker
    pub hub_timeout: Duration,
}
