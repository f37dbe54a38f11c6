//! Verdict types
//!
//! A `Verdict` is only ever produced by the aggregator from an ordered list of
//! test case results. It is flattened into `VerdictSummary` when it crosses
//! the HTTP boundary.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Status of a single test case or of a whole submission
///
/// Serialized with the labels the platform stores ("Wrong Answer", ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Status {
    Accepted,
    #[serde(rename = "Wrong Answer", alias = "WrongAnswer")]
    WrongAnswer,
    #[serde(rename = "Time Limit Exceeded", alias = "TimeLimitExceeded")]
    TimeLimitExceeded,
    #[serde(rename = "Runtime Error", alias = "RuntimeError")]
    RuntimeError,
    #[serde(rename = "Compilation Error", alias = "CompilationError")]
    CompilationError,
    #[serde(rename = "Internal Error", alias = "InternalError")]
    InternalError,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Accepted => "Accepted",
            Status::WrongAnswer => "Wrong Answer",
            Status::TimeLimitExceeded => "Time Limit Exceeded",
            Status::RuntimeError => "Runtime Error",
            Status::CompilationError => "Compilation Error",
            Status::InternalError => "Internal Error",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Accepted" => Ok(Status::Accepted),
            "WrongAnswer" | "Wrong Answer" => Ok(Status::WrongAnswer),
            "TimeLimitExceeded" | "Time Limit Exceeded" => Ok(Status::TimeLimitExceeded),
            "RuntimeError" | "Runtime Error" => Ok(Status::RuntimeError),
            "CompilationError" | "Compilation Error" => Ok(Status::CompilationError),
            "InternalError" | "Internal Error" => Ok(Status::InternalError),
            _ => Err(format!("Unknown status: {}", s)),
        }
    }
}

/// Why a test case did not pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureKind {
    #[serde(rename = "Wrong Answer", alias = "WrongAnswer")]
    WrongAnswer,
    #[serde(rename = "Time Limit Exceeded", alias = "TimeLimitExceeded")]
    TimeLimitExceeded,
    #[serde(rename = "Runtime Error", alias = "RuntimeError")]
    RuntimeError,
    #[serde(rename = "Compilation Error", alias = "CompilationError")]
    CompilationError,
    #[serde(rename = "Internal Error", alias = "InternalError")]
    InternalError,
}

impl From<FailureKind> for Status {
    fn from(kind: FailureKind) -> Self {
        match kind {
            FailureKind::WrongAnswer => Status::WrongAnswer,
            FailureKind::TimeLimitExceeded => Status::TimeLimitExceeded,
            FailureKind::RuntimeError => Status::RuntimeError,
            FailureKind::CompilationError => Status::CompilationError,
            FailureKind::InternalError => Status::InternalError,
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", Status::from(*self))
    }
}

/// Aggregate outcome of a submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(into = "VerdictSummary")]
pub enum Verdict {
    Accepted {
        runtime_ms: u32,
        memory_kb: u32,
        test_cases_passed: usize,
        total_test_cases: usize,
    },
    Rejected {
        reason: FailureKind,
        runtime_ms: u32,
        memory_kb: u32,
        test_cases_passed: usize,
        total_test_cases: usize,
        /// Position of the first failing test case in submission order
        failing_index: usize,
    },
}

impl Verdict {
    pub fn status(&self) -> Status {
        match self {
            Verdict::Accepted { .. } => Status::Accepted,
            Verdict::Rejected { reason, .. } => (*reason).into(),
        }
    }

    pub fn runtime_ms(&self) -> u32 {
        match self {
            Verdict::Accepted { runtime_ms, .. } | Verdict::Rejected { runtime_ms, .. } => {
                *runtime_ms
            }
        }
    }

    pub fn memory_kb(&self) -> u32 {
        match self {
            Verdict::Accepted { memory_kb, .. } | Verdict::Rejected { memory_kb, .. } => *memory_kb,
        }
    }

    pub fn test_cases_passed(&self) -> usize {
        match self {
            Verdict::Accepted {
                test_cases_passed, ..
            }
            | Verdict::Rejected {
                test_cases_passed, ..
            } => *test_cases_passed,
        }
    }

    pub fn total_test_cases(&self) -> usize {
        match self {
            Verdict::Accepted {
                total_test_cases, ..
            }
            | Verdict::Rejected {
                total_test_cases, ..
            } => *total_test_cases,
        }
    }

    pub fn failing_index(&self) -> Option<usize> {
        match self {
            Verdict::Accepted { .. } => None,
            Verdict::Rejected { failing_index, .. } => Some(*failing_index),
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Accepted {
                test_cases_passed,
                total_test_cases,
                ..
            } => write!(
                f,
                "Accepted ({}/{})",
                test_cases_passed, total_test_cases
            ),
            Verdict::Rejected {
                reason,
                test_cases_passed,
                total_test_cases,
                failing_index,
                ..
            } => write!(
                f,
                "{} on test case {} ({}/{})",
                Status::from(*reason),
                failing_index + 1,
                test_cases_passed,
                total_test_cases
            ),
        }
    }
}

/// Flat wire form of a `Verdict`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerdictSummary {
    pub status: Status,
    pub test_cases_passed: usize,
    pub total_test_cases: usize,
    pub runtime_ms: u32,
    pub memory_kb: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failing_index: Option<usize>,
}

impl From<&Verdict> for VerdictSummary {
    fn from(verdict: &Verdict) -> Self {
        Self {
            status: verdict.status(),
            test_cases_passed: verdict.test_cases_passed(),
            total_test_cases: verdict.total_test_cases(),
            runtime_ms: verdict.runtime_ms(),
            memory_kb: verdict.memory_kb(),
            failing_index: verdict.failing_index(),
        }
    }
}

impl From<Verdict> for VerdictSummary {
    fn from(verdict: Verdict) -> Self {
        VerdictSummary::from(&verdict)
    }
}
