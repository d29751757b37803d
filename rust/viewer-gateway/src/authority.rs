//! Authorization of dataset requests against an external authority.
//!
//! The authority is asked, for each request, whether the presented
//! credentials may read a dataset. It answers with a status code only; the
//! [AccessGate] turns that status into an [AuthDecision], and applies the
//! configured [UnreachablePolicy] when no decision could be obtained.

use anyhow::Result;
use http::{HeaderValue, StatusCode};
use reqwest::header::{AUTHORIZATION, COOKIE};
use std::time::Duration;
use url::Url;
use viewer_core::error::{ErrorCode, ErrorEnvelope};

/// The credentials a client presented, forwarded verbatim to the authority.
/// Values are kept as raw header bytes, which need not be visible ASCII.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    /// The value of the `Cookie` request header
    pub cookie: Option<HeaderValue>,
    /// The value of the `Authorization` request header
    pub authorization: Option<HeaderValue>,
}

impl Credentials {
    /// Credentials made of a cookie only
    pub fn cookie(cookie: HeaderValue) -> Self {
        Credentials {
            cookie: Some(cookie),
            authorization: None,
        }
    }

    /// Credentials made of an `Authorization` header only
    pub fn authorization(authorization: HeaderValue) -> Self {
        Credentials {
            cookie: None,
            authorization: Some(authorization),
        }
    }
}

/// The answer of an [AccessGate] for one dataset and one set of
/// [Credentials].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthDecision {
    /// The request may proceed
    Allowed,
    /// The authority refused the request; the envelope is what the client
    /// must be answered
    Denied(ErrorEnvelope),
    /// No decision could be obtained (network failure, timeout or an
    /// unexpected answer)
    Unreachable(String),
}

/// What to do with a request when the authority is unreachable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnreachablePolicy {
    /// Refuse the request
    #[default]
    FailClosed,
    /// Let the request proceed
    FailOpen,
}

/// Where the authority lives, and how long to wait for it
#[derive(Debug, Clone)]
pub struct AuthorityConfig {
    /// Base URL of the authority
    pub base_url: Url,
    /// Path appended to `base_url`; its `%s` slot receives the dataset
    pub path_template: String,
    /// Bound on the duration of one authorization request
    pub timeout: Duration,
}

#[derive(Clone)]
struct Authority {
    client: reqwest::Client,
    base_url: Url,
    path_template: String,
}

/// Checks that a client may access a dataset before any work is done on its
/// behalf. Clones share the same HTTP connection pool.
#[derive(Clone)]
pub struct AccessGate {
    authority: Option<Authority>,
    policy: UnreachablePolicy,
}

const UNAUTHENTICATED_MESSAGE: &str = "The dataset does not exist, or is not accessible without \
     authentication (private or gated). Please check the spelling of the dataset name or retry \
     with authentication.";
const UNAUTHORIZED_MESSAGE: &str = "The dataset does not exist, or is not accessible with the \
     current credentials (private or gated). Please check the spelling of the dataset name or \
     retry with other authentication credentials.";
const UNREACHABLE_MESSAGE: &str =
    "The server cannot verify access to the dataset right now. Please retry later.";

impl AccessGate {
    /// Create a gate asking the authority described by `config`
    pub fn new(config: &AuthorityConfig, policy: UnreachablePolicy) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(AccessGate {
            authority: Some(Authority {
                client,
                base_url: config.base_url.clone(),
                path_template: config.path_template.clone(),
            }),
            policy,
        })
    }

    /// A gate that allows every request without asking anyone
    pub fn disabled() -> Self {
        AccessGate {
            authority: None,
            policy: UnreachablePolicy::default(),
        }
    }

    /// The URL the authority is asked about `dataset` at, if enabled
    pub fn authority_url(&self, dataset: &str) -> Option<Url> {
        let authority = self.authority.as_ref()?;
        let path = authority.path_template.replacen("%s", dataset, 1);
        let mut url = authority.base_url.clone();
        url.set_path(&format!(
            "{}{}",
            authority.base_url.path().trim_end_matches('/'),
            path
        ));
        Some(url)
    }

    /// Ask the authority whether `credentials` may access `dataset`.
    ///
    /// Exactly one request is sent, without retries.
    pub async fn authorize(&self, dataset: &str, credentials: &Credentials) -> AuthDecision {
        let (Some(authority), Some(url)) = (&self.authority, self.authority_url(dataset)) else {
            return AuthDecision::Allowed;
        };

        let mut request = authority.client.get(url);
        // The client speaks another `http` major, so values cross as bytes
        if let Some(cookie) = &credentials.cookie {
            request = request.header(COOKIE, cookie.as_bytes());
        }
        if let Some(authorization) = &credentials.authorization {
            request = request.header(AUTHORIZATION, authorization.as_bytes());
        }

        let status = match request.send().await {
            Ok(response) => response.status().as_u16(),
            Err(error) => {
                let cause = format!("The authority could not be reached: {error}");
                warn!("Cannot authorize access to {}: {}", dataset, cause);
                return AuthDecision::Unreachable(cause);
            }
        };

        let decision = match status {
            200 => AuthDecision::Allowed,
            401 => AuthDecision::Denied(ErrorEnvelope::new(
                UNAUTHENTICATED_MESSAGE,
                StatusCode::UNAUTHORIZED,
                ErrorCode::ExternalUnauthenticatedError,
            )),
            403 | 404 => AuthDecision::Denied(ErrorEnvelope::new(
                UNAUTHORIZED_MESSAGE,
                StatusCode::NOT_FOUND,
                ErrorCode::ExternalAuthenticatedError,
            )),
            other => AuthDecision::Unreachable(format!(
                "The authority answered with an unexpected status code: {other}"
            )),
        };

        match &decision {
            AuthDecision::Allowed => debug!("Access to {} is allowed", dataset),
            AuthDecision::Denied(envelope) => {
                info!("Access to {} is denied ({})", dataset, envelope.code())
            }
            AuthDecision::Unreachable(cause) => {
                warn!("Cannot authorize access to {}: {}", dataset, cause)
            }
        }

        decision
    }

    /// Authorize the request, applying the configured [UnreachablePolicy]
    /// when no decision could be obtained
    pub async fn check(
        &self,
        dataset: &str,
        credentials: &Credentials,
    ) -> Result<(), ErrorEnvelope> {
        match self.authorize(dataset, credentials).await {
            AuthDecision::Allowed => Ok(()),
            AuthDecision::Denied(envelope) => Err(envelope),
            AuthDecision::Unreachable(cause) => match self.policy {
                UnreachablePolicy::FailOpen => {
                    warn!("Letting the request for {} through unauthorized", dataset);
                    Ok(())
                }
                UnreachablePolicy::FailClosed => Err(ErrorEnvelope::new(
                    UNREACHABLE_MESSAGE,
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorCode::AuthorityUnreachableError,
                )
                .with_cause(cause)),
            },
        }
    }
}
