pub mod aggregator;
pub mod poller;
pub mod retry;
pub mod sandbox;

pub use aggregator::aggregate;
pub use poller::{EvaluationRequest, PollerConfig, SubmissionPoller};
