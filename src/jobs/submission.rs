//! Run and submit
//!
//! Checks happen in the order the editor reports them to users: sign-in,
//! blank code, problem lookup, language lookup. Only then is the sandbox
//! involved. `run` evaluates sample test cases and persists nothing; `submit`
//! evaluates everything and records the judged submission.

use tracing::{info, warn};

use super::CodeJob;
use crate::core::languages::{get_language_config, LanguageConfig};
use crate::core::utils::display_output;
use crate::core::{PendingSubmission, Submission, TestCase, TestCaseResult, Verdict};
use crate::engine::{aggregate, EvaluationRequest, SubmissionPoller};
use crate::error::{PlatformError, SubmissionError};
use crate::platform::{Identity, Problem, ProblemCatalog, SubmissionStore};

/// Result of a sample-only run
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// Text shown in the editor's output pane
    pub output: String,
    pub verdict: Verdict,
    pub test_cases: Vec<TestCase>,
    pub results: Vec<TestCaseResult>,
}

/// Result of a full submission
#[derive(Debug, Clone)]
pub struct SubmitOutcome {
    pub submission: Submission,
    pub verdict: Verdict,
    /// Why the verdict is what it is, for display
    pub explanation: String,
    pub test_cases: Vec<TestCase>,
    pub results: Vec<TestCaseResult>,
}

pub struct SubmissionFlow<P> {
    platform: P,
    poller: SubmissionPoller,
}

impl<P> SubmissionFlow<P>
where
    P: Identity + ProblemCatalog + SubmissionStore,
{
    pub fn new(platform: P, poller: SubmissionPoller) -> Self {
        Self { platform, poller }
    }

    /// Evaluate the sample test cases without persisting anything
    pub async fn run(&self, job: &CodeJob) -> Result<RunOutcome, SubmissionError> {
        let user = self.platform.current_user().await?;
        let (problem, language) = self.prepare(job).await?;
        let test_cases = problem.sample_cases();

        info!(
            "Received run job: user={}, problem={}, language={}, samples={}",
            user.id,
            problem.slug,
            language.name,
            test_cases.len()
        );

        let results = self.evaluate(job, &language, &test_cases, true).await?;
        let verdict = aggregate(&results, test_cases.len());
        let output = run_output(&results);

        info!(
            "Run finished: user={}, problem={}, verdict={}",
            user.id, problem.slug, verdict
        );

        Ok(RunOutcome {
            output,
            verdict,
            test_cases,
            results,
        })
    }

    /// Evaluate every test case and record the judged submission
    pub async fn submit(&self, job: &CodeJob) -> Result<SubmitOutcome, SubmissionError> {
        let user = self.platform.current_user().await?;
        let (problem, language) = self.prepare(job).await?;
        let pending = PendingSubmission::new(&problem.id, &user.id, &job.code, &language.name);

        info!(
            "Received submission {}: user={}, problem={}, language={}, test_cases={}",
            pending.id,
            user.id,
            problem.slug,
            language.name,
            problem.test_cases.len()
        );

        let results = self
            .evaluate(job, &language, &problem.test_cases, false)
            .await?;
        let verdict = aggregate(&results, problem.test_cases.len());
        let submission = pending.resolve(&verdict);

        if let Err(e) = self.platform.record(&submission).await {
            warn!("Failed to record submission {}: {}", submission.id, e);
            return Err(e.into());
        }

        info!(
            "Submission {} judged: verdict={}, runtime_ms={}, memory_kb={}",
            submission.id,
            verdict,
            verdict.runtime_ms(),
            verdict.memory_kb()
        );

        Ok(SubmitOutcome {
            explanation: explain(&verdict, &results),
            submission,
            verdict,
            test_cases: problem.test_cases,
            results,
        })
    }

    async fn prepare(&self, job: &CodeJob) -> Result<(Problem, LanguageConfig), SubmissionError> {
        if job.code.trim().is_empty() {
            return Err(SubmissionError::EmptyCode);
        }

        let problem = match self.platform.problem(&job.problem_id).await {
            Ok(problem) => problem,
            Err(PlatformError::NotFound(_)) => {
                return Err(SubmissionError::ProblemNotFound(job.problem_id.clone()))
            }
            Err(e) => return Err(e.into()),
        };

        let language = get_language_config(&job.language)
            .ok_or_else(|| SubmissionError::UnsupportedLanguage(job.language.clone()))?;

        if problem.test_cases.is_empty() {
            return Err(SubmissionError::NoTestCases(job.problem_id.clone()));
        }

        Ok((problem, language))
    }

    async fn evaluate(
        &self,
        job: &CodeJob,
        language: &LanguageConfig,
        test_cases: &[TestCase],
        only_samples: bool,
    ) -> Result<Vec<TestCaseResult>, SubmissionError> {
        let request = EvaluationRequest {
            code: job.code.clone(),
            language: language.clone(),
            test_cases: test_cases.to_vec(),
            only_samples,
        };
        let results = self.poller.evaluate_all(request).await;

        let complete = results.len() == test_cases.len()
            || results
                .last()
                .is_some_and(|r| self.poller.halts_after(r, only_samples));
        if !complete && self.poller.is_cancelled() {
            warn!("Evaluation of {} cancelled before completion", job.problem_id);
            return Err(SubmissionError::SandboxUnavailable);
        }
        if !results.is_empty() && results.iter().all(|r| r.sandbox_unavailable) {
            warn!("Sandbox unavailable for every test case of {}", job.problem_id);
            return Err(SubmissionError::SandboxUnavailable);
        }
        Ok(results)
    }
}

/// Output of the first failing sample, or of the first sample when all pass
///
/// Surrounding whitespace is trimmed before falling back to `[No Output]`.
fn run_output(results: &[TestCaseResult]) -> String {
    let shown = results
        .iter()
        .find(|r| !r.passed)
        .or_else(|| results.first());

    match shown {
        Some(result) => display_output(
            result.actual_output.trim(),
            result.detail.as_deref().unwrap_or_default().trim(),
            "",
        ),
        None => display_output("", "", ""),
    }
}

fn explain(verdict: &Verdict, results: &[TestCaseResult]) -> String {
    match verdict {
        Verdict::Accepted {
            total_test_cases, ..
        } => format!("All {} test cases passed", total_test_cases),
        Verdict::Rejected { failing_index, .. } => {
            let headline = verdict.to_string();
            match results.get(*failing_index).and_then(|r| r.detail.as_deref()) {
                Some(detail) => format!("{}\n{}", headline, detail),
                None => headline,
            }
        }
    }
}
