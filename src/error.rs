use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Failure talking to the execution sandbox
#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("sandbox request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("sandbox answered HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed sandbox response: {0}")]
    Malformed(String),
}

impl SandboxError {
    /// Whether repeating the same call can succeed
    ///
    /// Client errors other than 408/429 mean the request itself is wrong.
    pub fn is_retryable(&self) -> bool {
        match self {
            SandboxError::Transport(_) | SandboxError::Malformed(_) => true,
            SandboxError::Status { status, .. } => {
                !(400..500).contains(status) || *status == 408 || *status == 429
            }
        }
    }
}

/// Failure talking to the platform backend
#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("not authenticated")]
    Unauthenticated,
    #[error("{0} not found")]
    NotFound(String),
    #[error("rate limited by the platform")]
    RateLimited { retry_after: Option<u64> },
    #[error("platform request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("platform answered HTTP {status}: {message}")]
    Http { status: u16, message: String },
}

/// Errors surfaced by the grader routes
#[derive(Debug, Error)]
pub enum SubmissionError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Please write some code before running")]
    EmptyCode,
    #[error("Please login to submit solutions")]
    Unauthenticated,
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("Problem {0} not found")]
    ProblemNotFound(String),
    #[error("Problem {0} has no test cases")]
    NoTestCases(String),
    #[error("Unsupported language: {0}")]
    UnsupportedLanguage(String),
    #[error("Code execution service is unavailable, please try again later")]
    SandboxUnavailable,
    #[error("Too many submissions, please slow down")]
    RateLimited { retry_after: Option<u64> },
    /// The platform refused the request (4xx); its message is passed on
    #[error("{message}")]
    PlatformRejected { status: u16, message: String },
    #[error("Platform error: {0}")]
    Platform(PlatformError),
}

impl From<PlatformError> for SubmissionError {
    fn from(err: PlatformError) -> Self {
        match err {
            PlatformError::Unauthenticated => SubmissionError::Unauthenticated,
            PlatformError::RateLimited { retry_after } => SubmissionError::RateLimited { retry_after },
            PlatformError::Http { status, message } if (400..500).contains(&status) => {
                SubmissionError::PlatformRejected { status, message }
            }
            other => SubmissionError::Platform(other),
        }
    }
}

/// Error body returned by the grader routes
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub code: &'static str,
}

impl SubmissionError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            SubmissionError::EmptyCode | SubmissionError::UnsupportedLanguage(_) => {
                StatusCode::BAD_REQUEST
            }
            SubmissionError::Unauthenticated | SubmissionError::InvalidCredentials => {
                StatusCode::UNAUTHORIZED
            }
            SubmissionError::ProblemNotFound(_) => StatusCode::NOT_FOUND,
            SubmissionError::InvalidRequest(_) | SubmissionError::NoTestCases(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            SubmissionError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            SubmissionError::PlatformRejected { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_REQUEST)
            }
            SubmissionError::Platform(_) => StatusCode::BAD_GATEWAY,
            SubmissionError::SandboxUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            SubmissionError::InvalidRequest(_) => "INVALID_REQUEST",
            SubmissionError::EmptyCode => "EMPTY_CODE",
            SubmissionError::Unauthenticated => "UNAUTHENTICATED",
            SubmissionError::InvalidCredentials => "INVALID_CREDENTIALS",
            SubmissionError::ProblemNotFound(_) => "PROBLEM_NOT_FOUND",
            SubmissionError::NoTestCases(_) => "NO_TEST_CASES",
            SubmissionError::UnsupportedLanguage(_) => "UNSUPPORTED_LANGUAGE",
            SubmissionError::SandboxUnavailable => "SANDBOX_UNAVAILABLE",
            SubmissionError::RateLimited { .. } => "RATE_LIMITED",
            SubmissionError::PlatformRejected { .. } => "PLATFORM_REJECTED",
            SubmissionError::Platform(_) => "PLATFORM_ERROR",
        }
    }
}

impl IntoResponse for SubmissionError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        }

        let retry_after = match &self {
            SubmissionError::RateLimited { retry_after } => *retry_after,
            _ => None,
        };
        let body = ErrorBody {
            error: self.to_string(),
            code: self.code(),
        };

        let mut response = (status, Json(body)).into_response();
        if let Some(secs) = retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}
