//! Platform backend client
//!
//! Typed access to the coding platform's REST API: authentication, profiles,
//! problems and the submission record endpoint. The bearer token travels in an
//! explicit `AuthContext` fixed at construction; nothing is read from ambient
//! state.

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, RETRY_AFTER};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::core::models::de_id;
use crate::core::{Submission, TestCase};
use crate::error::PlatformError;

/// Bearer token of the user a client acts for
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthContext {
    token: Option<String>,
}

impl AuthContext {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn bearer(token: impl Into<String>) -> Self {
        let token = token.into();
        Self {
            token: (!token.trim().is_empty()).then_some(token),
        }
    }

    /// Parse an `Authorization: Bearer <token>` header value
    pub fn from_header(value: &str) -> Self {
        match value.trim().split_once(' ') {
            Some((scheme, token)) if scheme.eq_ignore_ascii_case("bearer") => {
                Self::bearer(token.trim())
            }
            _ => Self::anonymous(),
        }
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(alias = "_id", deserialize_with = "de_id")]
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub role: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Problem {
    #[serde(alias = "_id", deserialize_with = "de_id")]
    pub id: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, alias = "test_cases")]
    pub test_cases: Vec<TestCase>,
}

impl Problem {
    /// Fill in positional ids ("1", "2", ...) for test cases stored without one
    pub fn with_test_case_ids(mut self) -> Self {
        for (idx, tc) in self.test_cases.iter_mut().enumerate() {
            if tc.id.is_empty() {
                tc.id = (idx + 1).to_string();
            }
        }
        self
    }

    /// Sample test cases, or the first test case when none is marked sample
    pub fn sample_cases(&self) -> Vec<TestCase> {
        let samples: Vec<TestCase> = self
            .test_cases
            .iter()
            .filter(|tc| tc.is_sample)
            .cloned()
            .collect();
        if samples.is_empty() {
            self.test_cases.iter().take(1).cloned().collect()
        } else {
            samples
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

#[derive(Serialize)]
struct Credentials<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct Registration<'a> {
    username: &'a str,
    email: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct SessionEnvelope {
    user: User,
    token: String,
}

#[derive(Deserialize)]
struct UserEnvelope {
    user: User,
}

#[derive(Deserialize)]
struct ProblemEnvelope {
    problem: Problem,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    #[serde(alias = "message")]
    error: String,
}

/// Who is calling
#[async_trait]
pub trait Identity: Send + Sync {
    async fn current_user(&self) -> Result<User, PlatformError>;
}

/// Where problems and their test cases come from
#[async_trait]
pub trait ProblemCatalog: Send + Sync {
    async fn problem(&self, id_or_slug: &str) -> Result<Problem, PlatformError>;
}

/// Where judged submissions go
#[async_trait]
pub trait SubmissionStore: Send + Sync {
    async fn record(&self, submission: &Submission) -> Result<(), PlatformError>;
}

/// REST client for the platform backend
#[derive(Debug, Clone)]
pub struct PlatformClient {
    http: Client,
    base_url: String,
    auth: AuthContext,
}

impl PlatformClient {
    pub fn new(http: Client, base_url: impl Into<String>, auth: AuthContext) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            auth,
        }
    }

    /// Same connection pool, different user
    pub fn with_auth(&self, auth: AuthContext) -> Self {
        Self {
            http: self.http.clone(),
            base_url: self.base_url.clone(),
            auth,
        }
    }

    /// Exchange credentials for a session; the returned context authenticates later calls
    pub async fn login(&self, email: &str, password: &str) -> Result<(User, AuthContext), PlatformError> {
        let request = self
            .http
            .post(self.url("/auth/login"))
            .json(&Credentials { email, password });
        let session: SessionEnvelope = self.send(request, "account").await?;
        Ok((session.user, AuthContext::bearer(session.token)))
    }

    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<(User, AuthContext), PlatformError> {
        let request = self.http.post(self.url("/auth/register")).json(&Registration {
            username,
            email,
            password,
        });
        let session: SessionEnvelope = self.send(request, "account").await?;
        Ok((session.user, AuthContext::bearer(session.token)))
    }

    pub async fn profile(&self) -> Result<User, PlatformError> {
        let request = self.authorized(self.http.get(self.url("/auth/profile")))?;
        let envelope: UserEnvelope = self.send(request, "profile").await?;
        Ok(envelope.user)
    }

    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<User, PlatformError> {
        let request = self.authorized(self.http.put(self.url("/auth/profile")).json(update))?;
        let envelope: UserEnvelope = self.send(request, "profile").await?;
        Ok(envelope.user)
    }

    /// Problem by id or slug
    pub async fn get_problem(&self, id_or_slug: &str) -> Result<Problem, PlatformError> {
        if !is_valid_key(id_or_slug) {
            return Err(PlatformError::NotFound(format!("problem {}", id_or_slug)));
        }
        let mut request = self.http.get(self.url(&format!("/problems/{}", id_or_slug)));
        if let Some(token) = self.auth.token() {
            request = request.header(AUTHORIZATION, format!("Bearer {}", token));
        }
        let envelope: ProblemEnvelope = self.send(request, &format!("problem {}", id_or_slug)).await?;
        Ok(envelope.problem.with_test_case_ids())
    }

    pub async fn record_submission(&self, submission: &Submission) -> Result<(), PlatformError> {
        let request = self.authorized(self.http.post(self.url("/submissions")).json(submission))?;
        let response = request.send().await?;
        check_status(response, "submission").await?;
        debug!("Recorded submission {}", submission.id);
        Ok(())
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorized(&self, request: RequestBuilder) -> Result<RequestBuilder, PlatformError> {
        let token = self.auth.token().ok_or(PlatformError::Unauthenticated)?;
        Ok(request.header(AUTHORIZATION, format!("Bearer {}", token)))
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder, what: &str) -> Result<T, PlatformError> {
        let response = check_status(request.send().await?, what).await?;
        Ok(response.json::<T>().await?)
    }
}

async fn check_status(response: Response, what: &str) -> Result<Response, PlatformError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    match status {
        StatusCode::UNAUTHORIZED => Err(PlatformError::Unauthenticated),
        StatusCode::NOT_FOUND => Err(PlatformError::NotFound(what.to_string())),
        StatusCode::TOO_MANY_REQUESTS => {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok());
            warn!("Platform rate limited {} request", what);
            Err(PlatformError::RateLimited { retry_after })
        }
        _ => {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorEnvelope>(&body)
                .map(|e| e.error)
                .unwrap_or(body);
            Err(PlatformError::Http {
                status: status.as_u16(),
                message,
            })
        }
    }
}

fn is_valid_key(key: &str) -> bool {
    !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

#[async_trait]
impl Identity for PlatformClient {
    async fn current_user(&self) -> Result<User, PlatformError> {
        self.profile().await
    }
}

#[async_trait]
impl ProblemCatalog for PlatformClient {
    async fn problem(&self, id_or_slug: &str) -> Result<Problem, PlatformError> {
        self.get_problem(id_or_slug).await
    }
}

#[async_trait]
impl SubmissionStore for PlatformClient {
    async fn record(&self, submission: &Submission) -> Result<(), PlatformError> {
        self.record_submission(submission).await
    }
}
