pub mod submission;

use serde::{Deserialize, Serialize};

use crate::core::models::de_id;

/// Code sent from the editor for a run or a submit
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeJob {
    pub code: String,
    pub language: String,
    #[serde(alias = "problem_id", alias = "slug", deserialize_with = "de_id")]
    pub problem_id: String,
}

/// Which evaluation a job asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    /// Sample test cases only, nothing persisted
    Run,
    /// Every test case, result persisted
    Submit,
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobKind::Run => write!(f, "run"),
            JobKind::Submit => write!(f, "submit"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_job_accepts_numeric_problem_id() {
        let job: CodeJob = serde_json::from_value(serde_json::json!({
            "code": "print(1)",
            "language": "python",
            "problemId": 12
        }))
        .unwrap();
        assert_eq!(job.problem_id, "12");

        let job: CodeJob = serde_json::from_value(serde_json::json!({
            "code": "print(1)",
            "language": "python",
            "problem_id": "two-sum"
        }))
        .unwrap();
        assert_eq!(job.problem_id, "two-sum");
    }
}
