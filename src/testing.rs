//! Test doubles shared by the unit tests

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

use crate::core::{Submission, TestCase};
use crate::engine::poller::PollerConfig;
use crate::engine::retry::RetryPolicy;
use crate::engine::sandbox::{JobState, Sandbox, SandboxReport, SandboxRequest, SandboxToken};
use crate::error::{PlatformError, SandboxError};
use crate::platform::{AuthContext, Identity, Problem, ProblemCatalog, SubmissionStore, User};

/// Serve `app` on an ephemeral local port and return its base URL
pub async fn spawn_router(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

/// Poller settings with millisecond waits
pub fn fast_poller_config() -> PollerConfig {
    PollerConfig {
        poll_interval: Duration::from_millis(1),
        max_wait: Duration::from_millis(200),
        retry: RetryPolicy {
            max_attempts: 3,
            base_delay_ms: 1,
            max_delay_ms: 2,
        },
        fail_fast: false,
    }
}

/// How the scripted sandbox treats one stdin
#[derive(Debug, Clone)]
pub struct Script {
    dispatch_failures: u32,
    pending_polls: u32,
    outcome: Option<SandboxReport>,
}

impl Script {
    /// Program exits normally printing `stdout`
    pub fn output(stdout: &str) -> Self {
        Self::report(SandboxReport {
            state: JobState::Done,
            stdout: stdout.into(),
            time_ms: 10,
            memory_kb: 1024,
            ..SandboxReport::default()
        })
    }

    pub fn report(report: SandboxReport) -> Self {
        Self {
            dispatch_failures: 0,
            pending_polls: 0,
            outcome: Some(report),
        }
    }

    pub fn compile_error(message: &str) -> Self {
        Self::report(SandboxReport {
            state: JobState::CompileError,
            compile_output: message.into(),
            ..SandboxReport::default()
        })
    }

    /// Job never leaves the Running state
    pub fn hang() -> Self {
        Self {
            dispatch_failures: 0,
            pending_polls: u32::MAX,
            outcome: None,
        }
    }

    /// Every dispatch attempt fails with HTTP 503
    pub fn unreachable() -> Self {
        Self {
            dispatch_failures: u32::MAX,
            pending_polls: 0,
            outcome: None,
        }
    }

    pub fn after_polls(mut self, polls: u32) -> Self {
        self.pending_polls = polls;
        self
    }

    pub fn failing_dispatches(mut self, failures: u32) -> Self {
        self.dispatch_failures = failures;
        self
    }

    pub fn with_metrics(mut self, time_ms: u32, memory_kb: u32) -> Self {
        if let Some(report) = self.outcome.as_mut() {
            report.time_ms = time_ms;
            report.memory_kb = memory_kb;
        }
        self
    }
}

#[derive(Default)]
struct ScriptState {
    dispatch_attempts: HashMap<String, u32>,
    jobs: HashMap<String, (Script, u32)>,
    dispatched: Vec<SandboxRequest>,
}

/// In-memory sandbox answering by the stdin of each request
#[derive(Default)]
pub struct ScriptedSandbox {
    scripts: HashMap<String, Script>,
    state: Mutex<ScriptState>,
}

impl ScriptedSandbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(mut self, stdin: &str, script: Script) -> Self {
        self.scripts.insert(stdin.to_string(), script);
        self
    }

    /// Requests that were accepted, in dispatch order
    pub fn dispatched(&self) -> Vec<SandboxRequest> {
        self.state.lock().unwrap().dispatched.clone()
    }
}

#[async_trait]
impl Sandbox for ScriptedSandbox {
    async fn dispatch(&self, request: &SandboxRequest) -> Result<SandboxToken, SandboxError> {
        let script = self
            .scripts
            .get(&request.stdin)
            .cloned()
            .ok_or_else(|| SandboxError::Malformed(format!("no script for {:?}", request.stdin)))?;

        let mut state = self.state.lock().unwrap();
        let attempts = state
            .dispatch_attempts
            .entry(request.stdin.clone())
            .or_insert(0);
        *attempts += 1;
        if *attempts <= script.dispatch_failures {
            return Err(SandboxError::Status {
                status: 503,
                body: "sandbox overloaded".into(),
            });
        }

        let token = format!("tok-{}", state.jobs.len() + 1);
        state.jobs.insert(token.clone(), (script, 0));
        state.dispatched.push(request.clone());
        Ok(SandboxToken(token))
    }

    async fn fetch(&self, token: &SandboxToken) -> Result<SandboxReport, SandboxError> {
        let mut state = self.state.lock().unwrap();
        let (script, polls) = state.jobs.get_mut(&token.0).ok_or(SandboxError::Status {
            status: 404,
            body: "unknown token".into(),
        })?;
        *polls += 1;

        let running = SandboxReport {
            state: JobState::Running,
            ..SandboxReport::default()
        };
        if *polls <= script.pending_polls {
            return Ok(running);
        }
        Ok(script.outcome.clone().unwrap_or(running))
    }
}

fn test_case(id: &str, input: &str, expected: &str, is_sample: bool) -> TestCase {
    TestCase {
        id: id.into(),
        input: input.into(),
        expected_output: expected.into(),
        is_sample,
    }
}

/// "echo" (id 42): one sample ("hi") and two hidden cases ("1", "2"), each expecting its input
pub fn echo_problem() -> Problem {
    Problem {
        id: "42".into(),
        slug: "echo".into(),
        title: "Echo".into(),
        test_cases: vec![
            test_case("t1", "hi", "hi", true),
            test_case("t2", "1", "1", false),
            test_case("t3", "2", "2", false),
        ],
    }
}

pub fn ada() -> User {
    User {
        id: "u1".into(),
        username: "ada".into(),
        email: "ada@example.com".into(),
        role: "user".into(),
    }
}

/// In-memory platform for the submission flow tests
pub struct InMemoryPlatform {
    user: Option<User>,
    problems: HashMap<String, Problem>,
    recorded: Mutex<Vec<Submission>>,
}

impl InMemoryPlatform {
    pub fn signed_in() -> Self {
        Self {
            user: Some(ada()),
            problems: HashMap::from([("echo".to_string(), echo_problem())]),
            recorded: Mutex::new(Vec::new()),
        }
    }

    pub fn anonymous() -> Self {
        Self {
            user: None,
            ..Self::signed_in()
        }
    }

    pub fn with_problem(mut self, problem: Problem) -> Self {
        self.problems.insert(problem.slug.clone(), problem);
        self
    }

    pub fn recorded(&self) -> Vec<Submission> {
        self.recorded.lock().unwrap().clone()
    }
}

#[async_trait]
impl Identity for InMemoryPlatform {
    async fn current_user(&self) -> Result<User, PlatformError> {
        self.user.clone().ok_or(PlatformError::Unauthenticated)
    }
}

#[async_trait]
impl ProblemCatalog for InMemoryPlatform {
    async fn problem(&self, id_or_slug: &str) -> Result<Problem, PlatformError> {
        self.problems
            .values()
            .find(|p| p.slug == id_or_slug || p.id == id_or_slug)
            .cloned()
            .ok_or_else(|| PlatformError::NotFound(format!("problem {}", id_or_slug)))
    }
}

#[async_trait]
impl SubmissionStore for InMemoryPlatform {
    async fn record(&self, submission: &Submission) -> Result<(), PlatformError> {
        self.recorded.lock().unwrap().push(submission.clone());
        Ok(())
    }
}

/// Fake platform backend served over HTTP
#[derive(Clone, Default)]
pub struct FakeBackend {
    recorded: Arc<Mutex<Vec<Value>>>,
}

impl FakeBackend {
    pub const TOKEN: &'static str = "good-token";
    pub const RATE_LIMITED_SLUG: &'static str = "busy";
    pub const BROKEN_SLUG: &'static str = "broken";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/auth/login", post(login))
            .route("/auth/register", post(register))
            .route("/auth/profile", get(profile).put(update_profile))
            .route("/problems/{slug}", get(problem))
            .route("/submissions", post(record))
            .with_state(self.clone())
    }

    /// Submission bodies received so far
    pub fn recorded(&self) -> Vec<Value> {
        self.recorded.lock().unwrap().clone()
    }
}

fn signed_in(headers: &HeaderMap) -> bool {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(AuthContext::from_header)
        .is_some_and(|auth| auth.token() == Some(FakeBackend::TOKEN))
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"message": "Not authorized"})),
    )
        .into_response()
}

async fn login(Json(body): Json<Value>) -> Response {
    if body["password"] != "hunter2" {
        return unauthorized();
    }
    Json(json!({"user": ada(), "token": FakeBackend::TOKEN})).into_response()
}

async fn register(Json(body): Json<Value>) -> Response {
    if body["email"] == ada().email.as_str() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "User already exists"})),
        )
            .into_response();
    }
    let user = json!({
        "_id": "u2",
        "username": body["username"],
        "email": body["email"],
        "role": "user"
    });
    (
        StatusCode::CREATED,
        Json(json!({"user": user, "token": FakeBackend::TOKEN})),
    )
        .into_response()
}

async fn profile(headers: HeaderMap) -> Response {
    if !signed_in(&headers) {
        return unauthorized();
    }
    Json(json!({"user": ada()})).into_response()
}

async fn update_profile(headers: HeaderMap, Json(body): Json<Value>) -> Response {
    if !signed_in(&headers) {
        return unauthorized();
    }
    let mut user = ada();
    if let Some(username) = body["username"].as_str() {
        user.username = username.to_string();
    }
    Json(json!({"user": user})).into_response()
}

async fn problem(Path(id_or_slug): Path<String>) -> Response {
    match id_or_slug.as_str() {
        "echo" | "42" => Json(json!({"problem": echo_problem()})).into_response(),
        "empty" => Json(json!({
            "problem": {"id": "p-empty", "slug": "empty", "title": "Empty", "testCases": []}
        }))
        .into_response(),
        FakeBackend::RATE_LIMITED_SLUG => (
            StatusCode::TOO_MANY_REQUESTS,
            [(header::RETRY_AFTER, "30")],
            Json(json!({"message": "Too many requests"})),
        )
            .into_response(),
        FakeBackend::BROKEN_SLUG => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": "database offline"})),
        )
            .into_response(),
        _ => (
            StatusCode::NOT_FOUND,
            Json(json!({"message": "Problem not found"})),
        )
            .into_response(),
    }
}

async fn record(
    State(backend): State<FakeBackend>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if !signed_in(&headers) {
        return unauthorized();
    }
    backend.recorded.lock().unwrap().push(body.clone());
    (StatusCode::CREATED, Json(json!({"submission": body}))).into_response()
}
