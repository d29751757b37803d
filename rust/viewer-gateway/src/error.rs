use axum::{
    http::{HeaderName, HeaderValue},
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use viewer_core::error::ErrorEnvelope;

/// The response header carrying the [viewer_core::error::ErrorCode] of a
/// failed request
pub static X_ERROR_CODE: HeaderName = HeaderName::from_static("x-error-code");

/// A failed request, rendered from its [ErrorEnvelope]: the envelope's
/// status, an `X-Error-Code` header and the caller-facing body.
#[derive(Error, Debug)]
#[error(transparent)]
pub struct ApiError(#[from] pub ErrorEnvelope);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut response = (self.0.status(), Json(self.0.to_body())).into_response();
        if let Ok(code) = HeaderValue::from_str(self.0.code().as_ref()) {
            response.headers_mut().insert(X_ERROR_CODE.clone(), code);
        }
        response
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(value: anyhow::Error) -> Self {
        error!("Unexpected error: {:#}", value);
        ApiError(ErrorEnvelope::unexpected(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use viewer_core::error::ErrorCode;

    #[test]
    fn it_tags_error_responses_with_their_code() {
        let response = ApiError(ErrorEnvelope::validation("Parameter 'dataset' is required"))
            .into_response();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(
            response.headers().get("X-Error-Code").map(|value| value.as_bytes()),
            Some("ValidationError".as_bytes())
        );
    }

    #[test]
    fn it_hides_unexpected_causes() {
        let response = ApiError::from(anyhow::anyhow!("database is down")).into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            response.headers().get(&X_ERROR_CODE).map(|value| value.as_bytes()),
            Some(ErrorCode::UnexpectedError.as_ref().as_bytes())
        );
    }
}
