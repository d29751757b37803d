//! The error envelope shared by job runners, the access gate and the public
//! API. A failure is described once, by value, and then either persisted in
//! the response cache or rendered as an HTTP response.
use http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt::Display;
use strum_macros::{AsRefStr, Display as StrumDisplay, EnumString};
use thiserror::Error;

/// The machine-readable tag attached to every failure. It is rendered
/// verbatim in the `X-Error-Code` response header, so the variant names are
/// part of the public API and must not change.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    StrumDisplay,
    EnumString,
    AsRefStr,
)]
pub enum ErrorCode {
    /// A request parameter is missing, empty, or names an unknown endpoint
    ValidationError,
    /// The authority refused an anonymous (or cookie-only) request
    ExternalUnauthenticatedError,
    /// The authority refused the presented credentials, or the dataset does
    /// not exist
    ExternalAuthenticatedError,
    /// The authority could not be reached or did not answer in time
    AuthorityUnreachableError,
    /// The external data source reports that the dataset has no content
    EmptyDatasetError,
    /// Any other failure while computing a job
    ComputationError,
    /// A worker stopped while running the job
    JobRunnerCrashedError,
    /// No fresh cached response exists yet; a job has been scheduled
    ResponseNotReady,
    /// An infrastructure failure unrelated to the request
    UnexpectedError,
}

/// An immutable description of a failure: an HTTP-like status, a stable
/// [ErrorCode], a human-readable message, and optionally the underlying
/// cause.
///
/// The cause is always kept (it is logged and persisted), but it is only
/// rendered to callers when `disclose_cause` is set.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{message}")]
pub struct ErrorEnvelope {
    message: String,
    status: u16,
    code: ErrorCode,
    cause: Option<String>,
    disclose_cause: bool,
}

impl ErrorEnvelope {
    /// Create an envelope with no cause attached
    pub fn new<M: Into<String>>(message: M, status: StatusCode, code: ErrorCode) -> Self {
        ErrorEnvelope {
            message: message.into(),
            status: status.as_u16(),
            code,
            cause: None,
            disclose_cause: false,
        }
    }

    /// A 422 [ErrorCode::ValidationError]
    pub fn validation<M: Into<String>>(message: M) -> Self {
        Self::new(
            message,
            StatusCode::UNPROCESSABLE_ENTITY,
            ErrorCode::ValidationError,
        )
    }

    /// A 500 [ErrorCode::UnexpectedError]; the cause is never disclosed
    pub fn unexpected<E: Display>(cause: E) -> Self {
        Self::new(
            "Unexpected error.",
            StatusCode::INTERNAL_SERVER_ERROR,
            ErrorCode::UnexpectedError,
        )
        .with_cause(cause)
    }

    /// Attach the underlying cause. Error chains (e.g. [anyhow::Error]) are
    /// flattened into a single line.
    pub fn with_cause<E: Display>(mut self, cause: E) -> Self {
        self.cause = Some(format!("{cause:#}"));
        self
    }

    /// Mark the cause as safe to show to callers
    pub fn disclosed(mut self) -> Self {
        self.disclose_cause = true;
        self
    }

    /// The caller-facing message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The HTTP-like status of this failure
    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// The machine-readable tag of this failure
    pub fn code(&self) -> ErrorCode {
        self.code
    }

    /// The underlying cause, whether or not it may be disclosed
    pub fn cause(&self) -> Option<&str> {
        self.cause.as_deref()
    }

    /// Whether [ErrorEnvelope::cause] may be shown to callers
    pub fn discloses_cause(&self) -> bool {
        self.disclose_cause
    }

    /// The JSON body rendered to callers: the message, plus the cause only
    /// when it is disclosed
    pub fn to_body(&self) -> Value {
        match (&self.cause, self.disclose_cause) {
            (Some(cause), true) => json!({ "error": self.message, "cause": cause }),
            _ => json!({ "error": self.message }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::str::FromStr;

    #[test]
    fn it_hides_the_cause_unless_disclosed() {
        let hidden = ErrorEnvelope::new(
            "Cannot compute.",
            StatusCode::INTERNAL_SERVER_ERROR,
            ErrorCode::ComputationError,
        )
        .with_cause(anyhow!("secret detail"));

        assert_eq!(hidden.cause(), Some("secret detail"));
        assert_eq!(hidden.to_body(), json!({ "error": "Cannot compute." }));

        let disclosed = hidden.disclosed();
        assert_eq!(
            disclosed.to_body(),
            json!({ "error": "Cannot compute.", "cause": "secret detail" })
        );
    }

    #[test]
    fn it_flattens_error_chains_into_the_cause() {
        let error = anyhow!("connection refused").context("request failed");
        let envelope = ErrorEnvelope::unexpected(error);

        assert_eq!(envelope.cause(), Some("request failed: connection refused"));
        assert!(!envelope.discloses_cause());
        assert_eq!(envelope.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn it_renders_error_codes_by_variant_name() {
        assert_eq!(
            ErrorCode::ExternalAuthenticatedError.to_string(),
            "ExternalAuthenticatedError"
        );
        assert_eq!(
            ErrorCode::from_str("EmptyDatasetError").ok(),
            Some(ErrorCode::EmptyDatasetError)
        );
        assert_eq!(
            serde_json::to_value(ErrorCode::ValidationError).ok(),
            Some(json!("ValidationError"))
        );
    }

    #[test]
    fn it_builds_validation_errors_as_unprocessable() {
        let envelope = ErrorEnvelope::validation("Parameter 'dataset' is required");

        assert_eq!(envelope.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(envelope.code(), ErrorCode::ValidationError);
        assert_eq!(envelope.to_string(), "Parameter 'dataset' is required");
    }
}
