use anyhow::anyhow;
use axum::{
    extract::{rejection::QueryRejection, MatchedPath, Query, State},
    http::{header::CACHE_CONTROL, HeaderValue},
    response::{IntoResponse, Response},
    Json,
};
use http::StatusCode;
use viewer_core::{
    cache::{lookup, CacheLookup, CacheStatus, ResponseCache},
    data::{JobContent, JobInfo},
    error::{ErrorCode, ErrorEnvelope},
    job::JobClient,
};

use crate::{authority::Credentials, extractors::QueryParams, ApiError, ApiState};

const RESPONSE_NOT_READY_MESSAGE: &str =
    "The server is busier than usual and the response is not ready yet. Please retry later.";

fn with_max_age(mut response: Response, max_age: u64) -> Response {
    if let Ok(value) = HeaderValue::from_str(&format!("max-age={max_age}")) {
        response.headers_mut().insert(CACHE_CONTROL, value);
    }
    response
}

/// Serve a dataset endpoint from the response cache.
///
/// The parameters are validated first, then access to the dataset is
/// checked. The steps of the endpoint are then tried in order: the first
/// fresh cached response is served (success or error alike), and a job is
/// submitted for every step that has none. When no step has a fresh
/// response, the client is asked to retry later.
pub async fn endpoint_route<C, J>(
    State(state): State<ApiState<C, J>>,
    path: MatchedPath,
    credentials: Credentials,
    query: Result<Query<QueryParams>, QueryRejection>,
) -> Response
where
    C: ResponseCache + 'static,
    J: JobClient + 'static,
{
    let max_age = state.max_age;
    match respond(&state, path.as_str(), &credentials, query).await {
        Ok(content) => with_max_age(Json(content).into_response(), max_age.long),
        Err(error) => with_max_age(error.into_response(), max_age.short),
    }
}

async fn respond<C, J>(
    state: &ApiState<C, J>,
    endpoint: &str,
    credentials: &Credentials,
    query: Result<Query<QueryParams>, QueryRejection>,
) -> Result<JobContent, ApiError>
where
    C: ResponseCache,
    J: JobClient,
{
    let Query(params) =
        query.map_err(|rejection| ErrorEnvelope::validation(rejection.body_text()))?;
    let params = state.mapping.validate(endpoint, params)?;

    state.gate.check(&params.dataset, credentials).await?;

    for job_type in state.mapping.steps_for(endpoint)? {
        let identity = state.mapping.identity_for(endpoint, job_type, &params)?;
        let version = state
            .registry
            .version_of(job_type)
            .ok_or_else(|| anyhow!("No runner is registered for {job_type}"))?;

        match lookup(&state.cache, &identity, &version).await? {
            CacheLookup::Fresh(entry) => {
                return match (entry.status, entry.error) {
                    (CacheStatus::Success, _) => Ok(entry.content),
                    (CacheStatus::Error, Some(envelope)) => Err(envelope.into()),
                    (CacheStatus::Error, None) => {
                        Err(anyhow!("Cached error for {identity} has no envelope").into())
                    }
                };
            }
            CacheLookup::Stale(_) | CacheLookup::Missing => {
                debug!("No fresh response for {}; submitting a job", identity);
                state.job_client.submit(JobInfo::new(identity))?;
            }
        }
    }

    Err(ErrorEnvelope::new(
        RESPONSE_NOT_READY_MESSAGE,
        StatusCode::INTERNAL_SERVER_ERROR,
        ErrorCode::ResponseNotReady,
    )
    .into())
}
