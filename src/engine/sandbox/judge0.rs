//! Judge0 HTTP client
//!
//! Submissions are created with `wait=false` and polled by token. All text
//! fields travel base64 encoded so arbitrary program output survives.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{
    Judge0Config, JobState, Sandbox, SandboxReport, SandboxRequest, SandboxToken,
};
use crate::error::SandboxError;

const RESULT_FIELDS: &str = "stdout,stderr,compile_output,message,status,time,memory";

/// Judge0 implementation of `Sandbox`
#[derive(Debug, Clone)]
pub struct Judge0Client {
    http: Client,
    config: Judge0Config,
}

#[derive(Debug, Serialize)]
struct CreateSubmission {
    source_code: String,
    language_id: u32,
    stdin: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    cpu_time_limit: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    memory_limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct CreatedSubmission {
    token: String,
}

#[derive(Debug, Deserialize)]
struct SubmissionDetails {
    stdout: Option<String>,
    stderr: Option<String>,
    compile_output: Option<String>,
    message: Option<String>,
    status: Option<StatusDetails>,
    /// Seconds, usually sent as a decimal string ("0.013")
    time: Option<serde_json::Value>,
    /// KB
    memory: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct StatusDetails {
    id: u32,
    #[serde(default)]
    description: String,
}

impl Judge0Client {
    pub fn new(config: Judge0Config) -> Result<Self, SandboxError> {
        let http = Client::builder().timeout(config.request_timeout).build()?;
        Ok(Self { http, config })
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let mut request = request;
        if let Some(key) = &self.config.api_key {
            request = request.header("X-RapidAPI-Key", key);
        }
        if let Some(host) = &self.config.api_host {
            request = request.header("X-RapidAPI-Host", host);
        }
        if let Some(token) = &self.config.auth_token {
            request = request.header("X-Auth-Token", token);
        }
        request
    }
}

#[async_trait]
impl Sandbox for Judge0Client {
    async fn dispatch(&self, request: &SandboxRequest) -> Result<SandboxToken, SandboxError> {
        let body = CreateSubmission {
            source_code: STANDARD.encode(&request.source_code),
            language_id: request.language_id,
            stdin: STANDARD.encode(&request.stdin),
            cpu_time_limit: request.cpu_time_limit,
            memory_limit: request.memory_limit_kb,
        };

        let response = self
            .authorize(self.http.post(self.config.endpoint("/submissions")))
            .query(&[("base64_encoded", "true"), ("wait", "false")])
            .json(&body)
            .send()
            .await?;

        let created: CreatedSubmission = parse_json(response).await?;
        if created.token.is_empty() {
            return Err(SandboxError::Malformed("empty submission token".into()));
        }
        debug!("Dispatched Judge0 submission {}", created.token);
        Ok(SandboxToken(created.token))
    }

    async fn fetch(&self, token: &SandboxToken) -> Result<SandboxReport, SandboxError> {
        let url = self.config.endpoint(&format!("/submissions/{}", token.0));
        let response = self
            .authorize(self.http.get(url))
            .query(&[("base64_encoded", "true"), ("fields", RESULT_FIELDS)])
            .send()
            .await?;

        let details: SubmissionDetails = parse_json(response).await?;
        into_report(details)
    }
}

async fn parse_json<T: serde::de::DeserializeOwned>(response: Response) -> Result<T, SandboxError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(SandboxError::Status {
            status: status.as_u16(),
            body,
        });
    }

    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| SandboxError::Malformed(e.to_string()))
}

fn into_report(details: SubmissionDetails) -> Result<SandboxReport, SandboxError> {
    let status = details
        .status
        .ok_or_else(|| SandboxError::Malformed("missing status".into()))?;
    let state = JobState::from_judge0(status.id);

    let mut message = decode_field(details.message.as_deref())?;
    if message.is_empty() && state == JobState::Failed {
        message = status.description;
    }

    Ok(SandboxReport {
        state,
        stdout: decode_field(details.stdout.as_deref())?,
        stderr: decode_field(details.stderr.as_deref())?,
        compile_output: decode_field(details.compile_output.as_deref())?,
        message,
        time_ms: parse_seconds(details.time.as_ref()),
        memory_kb: details.memory.map(|m| m.min(u32::MAX as u64) as u32).unwrap_or(0),
    })
}

/// Decode a base64 text field; Judge0 wraps long values across lines
fn decode_field(value: Option<&str>) -> Result<String, SandboxError> {
    let Some(value) = value else {
        return Ok(String::new());
    };
    let cleaned: String = value.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    let bytes = STANDARD
        .decode(cleaned)
        .map_err(|e| SandboxError::Malformed(format!("invalid base64 field: {}", e)))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn parse_seconds(value: Option<&serde_json::Value>) -> u32 {
    let seconds = match value {
        Some(serde_json::Value::String(s)) => s.trim().parse::<f64>().ok(),
        Some(serde_json::Value::Number(n)) => n.as_f64(),
        _ => None,
    };
    seconds
        .filter(|s| s.is_finite() && *s >= 0.0)
        .map(|s| (s * 1000.0).round() as u32)
        .unwrap_or(0)
}
