pub mod languages;
pub mod models;
pub mod utils;
pub mod verdict;

pub use models::{PendingSubmission, Submission, TestCase, TestCaseResult};
pub use verdict::{FailureKind, Status, Verdict, VerdictSummary};
