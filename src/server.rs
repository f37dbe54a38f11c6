//! HTTP routes for the editor
//!
//! Every request gets its own platform client carrying the caller's bearer
//! token. Run and submit answers are wrapped in `{ "result": ... }`; the auth
//! routes answer with the platform's own `{ "user", "token" }` shapes. Failures
//! use the `{ "error": ..., "code": ... }` body from `SubmissionError`.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::info;
use uuid::Uuid;

use crate::core::languages::get_supported_languages;
use crate::core::{Status, TestCase, TestCaseResult, VerdictSummary};
use crate::engine::sandbox::Sandbox;
use crate::engine::{PollerConfig, SubmissionPoller};
use crate::error::{PlatformError, SubmissionError};
use crate::jobs::submission::{RunOutcome, SubmissionFlow, SubmitOutcome};
use crate::jobs::{CodeJob, JobKind};
use crate::platform::{AuthContext, PlatformClient, ProfileUpdate, User};

#[derive(Clone)]
pub struct AppState {
    pub sandbox: Arc<dyn Sandbox>,
    /// Anonymous client; each request derives its own with the caller's token
    pub platform: PlatformClient,
    pub poller: PollerConfig,
    pub shutdown: CancellationToken,
}

impl AppState {
    fn flow(&self, auth: AuthContext) -> SubmissionFlow<PlatformClient> {
        let poller = SubmissionPoller::new(self.sandbox.clone(), self.poller.clone())
            .with_cancellation(self.shutdown.child_token());
        SubmissionFlow::new(self.platform.with_auth(auth), poller)
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/submissions/run", post(run))
        .route("/submissions/submit", post(submit))
        .route("/auth/login", post(login))
        .route("/auth/register", post(register))
        .route("/auth/profile", get(profile).put(update_profile))
        .with_state(state)
}

#[derive(Serialize)]
struct Envelope<T> {
    result: T,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TestCaseDetail<'a> {
    test_case_id: &'a str,
    passed: bool,
    status: Status,
    /// Only revealed for sample test cases
    #[serde(skip_serializing_if = "Option::is_none")]
    input: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    expected_output: Option<&'a str>,
    actual_output: &'a str,
    runtime_ms: u32,
    memory_kb: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<&'a str>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RunResponse<'a> {
    output: &'a str,
    #[serde(flatten)]
    summary: VerdictSummary,
    details: Vec<TestCaseDetail<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SubmitResponse<'a> {
    submission_id: Uuid,
    #[serde(flatten)]
    summary: VerdictSummary,
    runtime: String,
    memory: String,
    /// Failure explanation shown under the verdict
    output: &'a str,
    submitted_at: DateTime<Utc>,
    details: Vec<TestCaseDetail<'a>>,
}

fn details<'a>(test_cases: &'a [TestCase], results: &'a [TestCaseResult]) -> Vec<TestCaseDetail<'a>> {
    results
        .iter()
        .map(|result| {
            let sample = test_cases
                .iter()
                .find(|tc| tc.id == result.test_case_id)
                .filter(|tc| tc.is_sample);
            TestCaseDetail {
                test_case_id: &result.test_case_id,
                passed: result.passed,
                status: result.status(),
                input: sample.map(|tc| tc.input.as_str()),
                expected_output: sample.map(|tc| tc.expected_output.as_str()),
                actual_output: &result.actual_output,
                runtime_ms: result.runtime_ms,
                memory_kb: result.memory_kb,
                detail: result.detail.as_deref(),
            }
        })
        .collect()
}

fn run_response(outcome: &RunOutcome) -> Response {
    Json(Envelope {
        result: RunResponse {
            output: &outcome.output,
            summary: VerdictSummary::from(&outcome.verdict),
            details: details(&outcome.test_cases, &outcome.results),
        }
    })
    .into_response()
}

fn submit_response(outcome: &SubmitOutcome) -> Response {
    let submission = &outcome.submission;
    Json(Envelope {
        result: SubmitResponse {
            submission_id: submission.id,
            summary: VerdictSummary::from(&outcome.verdict),
            runtime: format!("{} ms", submission.runtime_ms),
            memory: format!("{} KB", submission.memory_kb),
            output: &outcome.explanation,
            submitted_at: submission.submitted_at,
            details: details(&outcome.test_cases, &outcome.results),
        }
    })
    .into_response()
}

fn auth_context(headers: &HeaderMap) -> AuthContext {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(AuthContext::from_header)
        .unwrap_or_default()
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, SubmissionError> {
    let Json(body) = payload.map_err(|e| SubmissionError::InvalidRequest(e.body_text()))?;
    Ok(body)
}

fn code_job(
    kind: JobKind,
    auth: &AuthContext,
    payload: Result<Json<CodeJob>, JsonRejection>,
) -> Result<CodeJob, SubmissionError> {
    let job = body(payload)?;
    info!(
        "Received {} request: problem={}, language={}, authenticated={}",
        kind,
        job.problem_id,
        job.language,
        auth.is_authenticated()
    );
    Ok(job)
}

#[derive(Deserialize)]
struct LoginRequest {
    email: String,
    password: String,
}

#[derive(Deserialize)]
struct RegisterRequest {
    username: String,
    email: String,
    password: String,
}

#[derive(Serialize)]
struct Session {
    user: User,
    token: String,
}

impl Session {
    fn new(user: User, auth: &AuthContext) -> Self {
        Self {
            user,
            token: auth.token().unwrap_or_default().to_string(),
        }
    }
}

#[derive(Serialize)]
struct UserEnvelope {
    user: User,
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "languages": get_supported_languages(),
    }))
}

async fn run(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<CodeJob>, JsonRejection>,
) -> Result<Response, SubmissionError> {
    let auth = auth_context(&headers);
    let job = code_job(JobKind::Run, &auth, payload)?;
    let outcome = state.flow(auth).run(&job).await?;
    Ok(run_response(&outcome))
}

async fn submit(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<CodeJob>, JsonRejection>,
) -> Result<Response, SubmissionError> {
    let auth = auth_context(&headers);
    let job = code_job(JobKind::Submit, &auth, payload)?;
    let outcome = state.flow(auth).submit(&job).await?;
    Ok(submit_response(&outcome))
}

async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<Session>, SubmissionError> {
    let request = body(payload)?;
    let (user, auth) = state
        .platform
        .login(&request.email, &request.password)
        .await
        .map_err(|e| match e {
            PlatformError::Unauthenticated => SubmissionError::InvalidCredentials,
            other => other.into(),
        })?;
    info!("User {} signed in", user.id);
    Ok(Json(Session::new(user, &auth)))
}

async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Session>), SubmissionError> {
    let request = body(payload)?;
    let (user, auth) = state
        .platform
        .register(&request.username, &request.email, &request.password)
        .await?;
    info!("Registered user {}", user.id);
    Ok((StatusCode::CREATED, Json(Session::new(user, &auth))))
}

async fn profile(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<UserEnvelope>, SubmissionError> {
    let user = state.platform.with_auth(auth_context(&headers)).profile().await?;
    Ok(Json(UserEnvelope { user }))
}

async fn update_profile(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<ProfileUpdate>, JsonRejection>,
) -> Result<Json<UserEnvelope>, SubmissionError> {
    let update = body(payload)?;
    let user = state
        .platform
        .with_auth(auth_context(&headers))
        .update_profile(&update)
        .await?;
    Ok(Json(UserEnvelope { user }))
}
