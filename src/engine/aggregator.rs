//! Verdict aggregation
//!
//! Folds per-test-case results into one `Verdict`: the first failure in
//! submission order decides the status, runtime and memory are the maxima.

use crate::core::{FailureKind, TestCaseResult, Verdict};

/// Aggregate `results` (in submission order) out of `total_test_cases`
///
/// Fewer results than test cases with no failure among them means the run was
/// cut short, which is reported as an internal error rather than Accepted.
pub fn aggregate(results: &[TestCaseResult], total_test_cases: usize) -> Verdict {
    let total_test_cases = total_test_cases.max(results.len());
    let test_cases_passed = results.iter().filter(|r| r.passed).count();
    let runtime_ms = results.iter().map(|r| r.runtime_ms).max().unwrap_or(0);
    let memory_kb = results.iter().map(|r| r.memory_kb).max().unwrap_or(0);

    let first_failure = results.iter().position(|r| !r.passed);

    match first_failure {
        Some(failing_index) => Verdict::Rejected {
            reason: results[failing_index]
                .error_kind
                .unwrap_or(FailureKind::InternalError),
            runtime_ms,
            memory_kb,
            test_cases_passed,
            total_test_cases,
            failing_index,
        },
        None if results.len() < total_test_cases => Verdict::Rejected {
            reason: FailureKind::InternalError,
            runtime_ms,
            memory_kb,
            test_cases_passed,
            total_test_cases,
            failing_index: results.len(),
        },
        None => Verdict::Accepted {
            runtime_ms,
            memory_kb,
            test_cases_passed,
            total_test_cases,
        },
    }
}
