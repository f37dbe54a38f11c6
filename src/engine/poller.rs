//! Submission poller
//!
//! Drives one submission through the sandbox, one test case at a time. Each
//! test case is dispatched, then polled at a fixed interval until the sandbox
//! reports a terminal state or the maximum wait elapses. Results come out as a
//! lazy stream in test case order.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, BoxStream, StreamExt};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::core::languages::LanguageConfig;
use crate::core::utils::compare_output;
use crate::core::{FailureKind, TestCase, TestCaseResult};
use crate::engine::retry::{with_retry, RetryPolicy};
use crate::engine::sandbox::{JobState, Sandbox, SandboxReport, SandboxRequest};

/// Poller timing and failure policy
#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Delay between two status polls of the same job (default: 1.5s)
    pub poll_interval: Duration,
    /// Wall-clock budget per test case before it counts as timed out (default: 20s)
    pub max_wait: Duration,
    pub retry: RetryPolicy,
    /// Stop after the first failing test case (never applied to sample-only runs)
    pub fail_fast: bool,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(1_500),
            max_wait: Duration::from_secs(20),
            retry: RetryPolicy::default(),
            fail_fast: false,
        }
    }
}

/// Everything needed to evaluate one submission
#[derive(Debug, Clone)]
pub struct EvaluationRequest {
    pub code: String,
    pub language: LanguageConfig,
    pub test_cases: Vec<TestCase>,
    pub only_samples: bool,
}

#[derive(Clone)]
pub struct SubmissionPoller {
    sandbox: Arc<dyn Sandbox>,
    config: PollerConfig,
    cancel: Option<CancellationToken>,
}

impl SubmissionPoller {
    pub fn new(sandbox: Arc<dyn Sandbox>, config: PollerConfig) -> Self {
        Self {
            sandbox,
            config,
            cancel: None,
        }
    }

    /// End the stream early once `token` is cancelled
    ///
    /// Jobs already handed to the sandbox keep running there.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Evaluate `request`, yielding one result per test case in order
    pub fn evaluate(&self, request: EvaluationRequest) -> BoxStream<'static, TestCaseResult> {
        let run = Evaluation {
            poller: self.clone(),
            code: request.code,
            language: request.language,
            only_samples: request.only_samples,
            halted: false,
        };
        let cases = request.test_cases.into_iter().enumerate();

        stream::unfold((run, cases), |(mut run, mut cases)| async move {
            if run.halted || run.poller.is_cancelled() {
                return None;
            }
            let (index, test_case) = cases.next()?;
            let result = run.evaluate_case(index, &test_case).await?;
            if run.poller.halts_after(&result, run.only_samples) {
                run.halted = true;
            }
            Some((result, (run, cases)))
        })
        .boxed()
    }

    /// Evaluate and collect every result
    pub async fn evaluate_all(&self, request: EvaluationRequest) -> Vec<TestCaseResult> {
        self.evaluate(request).collect().await
    }

    /// Whether evaluation stops after `result`
    ///
    /// Results lost to an unreachable sandbox never halt evaluation.
    pub fn halts_after(&self, result: &TestCaseResult, only_samples: bool) -> bool {
        if result.passed || result.sandbox_unavailable {
            return false;
        }
        result.error_kind == Some(FailureKind::CompilationError)
            || (self.config.fail_fast && !only_samples)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|c| c.is_cancelled())
    }

    /// Sleep for `duration`; false if cancelled meanwhile
    async fn wait(&self, duration: Duration) -> bool {
        match &self.cancel {
            Some(cancel) => tokio::select! {
                _ = cancel.cancelled() => false,
                _ = tokio::time::sleep(duration) => true,
            },
            None => {
                tokio::time::sleep(duration).await;
                true
            }
        }
    }
}

struct Evaluation {
    poller: SubmissionPoller,
    code: String,
    language: LanguageConfig,
    only_samples: bool,
    halted: bool,
}

impl Evaluation {
    /// Run one test case to completion; None when cancelled
    async fn evaluate_case(&self, index: usize, test_case: &TestCase) -> Option<TestCaseResult> {
        let config = &self.poller.config;
        let sandbox = self.poller.sandbox.as_ref();
        let request = SandboxRequest {
            source_code: self.code.clone(),
            language_id: self.language.language_id,
            stdin: test_case.input.clone(),
            cpu_time_limit: self.language.cpu_time_limit,
            memory_limit_kb: self.language.memory_limit_kb,
        };
        let request = &request;

        let token = match with_retry(&config.retry, "dispatch", move || sandbox.dispatch(request)).await {
            Ok(token) => token,
            Err(e) => {
                warn!(test_case = index, "Failed to dispatch test case: {}", e);
                return Some(TestCaseResult::unavailable(&test_case.id, e.to_string()));
            }
        };
        debug!(test_case = index, token = %token, language = %self.language.display_name, "Dispatched test case");

        let deadline = Instant::now() + config.max_wait;
        let mut state = JobState::Queued;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if !self.poller.wait(config.poll_interval.min(remaining)).await {
                info!(test_case = index, token = %token, "Evaluation cancelled");
                return None;
            }

            let token_ref = &token;
            let report = match with_retry(&config.retry, "fetch", move || sandbox.fetch(token_ref)).await {
                Ok(report) => report,
                Err(e) => {
                    warn!(test_case = index, token = %token, "Failed to poll test case: {}", e);
                    return Some(TestCaseResult::unavailable(&test_case.id, e.to_string()));
                }
            };

            if report.state != state {
                if !state.can_advance_to(report.state) {
                    warn!(
                        token = %token,
                        "Unexpected job transition {:?} -> {:?}",
                        state, report.state
                    );
                }
                debug!(token = %token, "Job state {:?} -> {:?}", state, report.state);
                state = report.state;
            }

            if state.is_terminal() {
                let result = judge_report(test_case, &report);
                info!(
                    test_case = index,
                    passed = result.passed,
                    runtime_ms = result.runtime_ms,
                    memory_kb = result.memory_kb,
                    "Test case finished: {}",
                    result.status()
                );
                return Some(result);
            }

            if Instant::now() >= deadline {
                warn!(
                    test_case = index,
                    token = %token,
                    "No verdict after {}ms, recording time limit exceeded",
                    config.max_wait.as_millis()
                );
                return Some(
                    TestCaseResult::failed(&test_case.id, FailureKind::TimeLimitExceeded, "", 0, 0)
                        .with_detail(format!(
                            "No result from the sandbox within {}ms",
                            config.max_wait.as_millis()
                        )),
                );
            }
        }
    }
}

/// Turn a terminal sandbox report into a test case result
pub fn judge_report(test_case: &TestCase, report: &SandboxReport) -> TestCaseResult {
    let id = test_case.id.as_str();
    let (time, memory) = (report.time_ms, report.memory_kb);

    match report.state {
        JobState::Done if compare_output(&report.stdout, &test_case.expected_output) => {
            TestCaseResult::passed(id, &report.stdout, time, memory)
        }
        JobState::Done => {
            TestCaseResult::failed(id, FailureKind::WrongAnswer, &report.stdout, time, memory)
        }
        JobState::CompileError => {
            TestCaseResult::failed(id, FailureKind::CompilationError, &report.stdout, time, memory)
                .with_detail(first_non_empty(&[&report.compile_output, &report.message]))
        }
        JobState::RuntimeError => {
            TestCaseResult::failed(id, FailureKind::RuntimeError, &report.stdout, time, memory)
                .with_detail(first_non_empty(&[&report.stderr, &report.message]))
        }
        JobState::TimedOut => {
            TestCaseResult::failed(id, FailureKind::TimeLimitExceeded, &report.stdout, time, memory)
        }
        JobState::Failed | JobState::Queued | JobState::Running => {
            TestCaseResult::failed(id, FailureKind::InternalError, &report.stdout, time, memory)
                .with_detail(first_non_empty(&[&report.message, &report.stderr]))
        }
    }
}

fn first_non_empty(candidates: &[&String]) -> String {
    candidates
        .iter()
        .find(|s| !s.trim().is_empty())
        .map(|s| s.to_string())
        .unwrap_or_default()
}
