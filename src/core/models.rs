//! Submission records and per-test-case data

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use super::utils::{truncate_chars, OUTPUT_PREVIEW_CHARS};
use super::verdict::{FailureKind, Status, Verdict};

/// One input/expected-output pair of a problem
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCase {
    #[serde(default, alias = "_id", deserialize_with = "de_id")]
    pub id: String,
    #[serde(default)]
    pub input: String,
    #[serde(default, alias = "expected_output")]
    pub expected_output: String,
    #[serde(default, alias = "is_sample")]
    pub is_sample: bool,
}

/// Outcome of running a submission against one test case
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCaseResult {
    pub test_case_id: String,
    pub passed: bool,
    pub actual_output: String,
    pub runtime_ms: u32,
    pub memory_kb: u32,
    pub error_kind: Option<FailureKind>,
    /// Compile output, stderr or transport error text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Set when the sandbox could not be reached within the retry budget
    #[serde(skip)]
    pub sandbox_unavailable: bool,
}

impl TestCaseResult {
    pub fn passed(test_case_id: impl Into<String>, stdout: &str, runtime_ms: u32, memory_kb: u32) -> Self {
        Self {
            test_case_id: test_case_id.into(),
            passed: true,
            actual_output: truncate_chars(stdout, OUTPUT_PREVIEW_CHARS),
            runtime_ms,
            memory_kb,
            error_kind: None,
            detail: None,
            sandbox_unavailable: false,
        }
    }

    pub fn failed(
        test_case_id: impl Into<String>,
        kind: FailureKind,
        stdout: &str,
        runtime_ms: u32,
        memory_kb: u32,
    ) -> Self {
        Self {
            test_case_id: test_case_id.into(),
            passed: false,
            actual_output: truncate_chars(stdout, OUTPUT_PREVIEW_CHARS),
            runtime_ms,
            memory_kb,
            error_kind: Some(kind),
            detail: None,
            sandbox_unavailable: false,
        }
    }

    /// Internal error after the sandbox stayed unreachable
    pub fn unavailable(test_case_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            detail: Some(reason.into()),
            sandbox_unavailable: true,
            ..Self::failed(test_case_id, FailureKind::InternalError, "", 0, 0)
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        let detail = detail.into();
        if !detail.trim().is_empty() {
            self.detail = Some(detail);
        }
        self
    }

    pub fn status(&self) -> Status {
        match self.error_kind {
            _ if self.passed => Status::Accepted,
            Some(kind) => kind.into(),
            None => Status::InternalError,
        }
    }
}

/// A submission waiting for its verdict
#[derive(Debug, Clone)]
pub struct PendingSubmission {
    pub id: Uuid,
    pub problem_id: String,
    pub user_id: String,
    pub code: String,
    pub language: String,
    pub submitted_at: DateTime<Utc>,
}

impl PendingSubmission {
    pub fn new(
        problem_id: impl Into<String>,
        user_id: impl Into<String>,
        code: impl Into<String>,
        language: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            problem_id: problem_id.into(),
            user_id: user_id.into(),
            code: code.into(),
            language: language.into(),
            submitted_at: Utc::now(),
        }
    }

    /// Attach the verdict, producing the record that gets persisted
    pub fn resolve(self, verdict: &Verdict) -> Submission {
        Submission {
            id: self.id,
            problem_id: self.problem_id,
            user_id: self.user_id,
            code: self.code,
            language: self.language,
            submitted_at: self.submitted_at,
            status: verdict.status(),
            runtime_ms: verdict.runtime_ms(),
            memory_kb: verdict.memory_kb(),
            test_cases_passed: verdict.test_cases_passed(),
            total_test_cases: verdict.total_test_cases(),
        }
    }
}

/// A judged submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub id: Uuid,
    pub problem_id: String,
    pub user_id: String,
    pub code: String,
    pub language: String,
    pub submitted_at: DateTime<Utc>,
    pub status: Status,
    pub runtime_ms: u32,
    pub memory_kb: u32,
    pub test_cases_passed: usize,
    pub total_test_cases: usize,
}

/// Accept ids sent either as JSON strings or as integers
pub fn de_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(i64),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(s) => s,
        RawId::Number(n) => n.to_string(),
    })
}
