//! Judge0 status mapping
//!
//! Judge0 reports progress as a numeric `status.id`. This module folds those
//! ids into the small job state machine the poller drives.

/// Lifecycle of one sandbox job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JobState {
    /// Waiting in the sandbox queue
    #[default]
    Queued,
    /// Compiling or executing
    Running,
    /// Program exited normally (output not yet judged)
    Done,
    /// Source failed to compile
    CompileError,
    /// Crash, signal or non-zero exit
    RuntimeError,
    /// Sandbox CPU time limit hit
    TimedOut,
    /// Internal sandbox error or exec format error
    Failed,
}

impl JobState {
    /// Map a Judge0 `status.id` onto a job state
    ///
    /// | id   | Judge0 description                        |
    /// |------|-------------------------------------------|
    /// | 1    | In Queue                                  |
    /// | 2    | Processing                                |
    /// | 3    | Accepted                                  |
    /// | 4    | Wrong Answer (only with `expected_output`) |
    /// | 5    | Time Limit Exceeded                       |
    /// | 6    | Compilation Error                         |
    /// | 7-12 | Runtime Error (SIGSEGV, NZEC, ...)        |
    /// | 13   | Internal Error                            |
    /// | 14   | Exec Format Error                         |
    pub fn from_judge0(status_id: u32) -> Self {
        match status_id {
            1 => JobState::Queued,
            2 => JobState::Running,
            3 | 4 => JobState::Done,
            5 => JobState::TimedOut,
            6 => JobState::CompileError,
            7..=12 => JobState::RuntimeError,
            _ => JobState::Failed,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobState::Queued | JobState::Running)
    }

    /// Whether moving from `self` to `next` follows the state machine
    pub fn can_advance_to(&self, next: JobState) -> bool {
        match self {
            JobState::Queued => true,
            JobState::Running => next != JobState::Queued,
            terminal => *terminal == next,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_judge0_status_ids() {
        assert_eq!(JobState::from_judge0(1), JobState::Queued);
        assert_eq!(JobState::from_judge0(2), JobState::Running);
        assert_eq!(JobState::from_judge0(3), JobState::Done);
        assert_eq!(JobState::from_judge0(4), JobState::Done);
        assert_eq!(JobState::from_judge0(5), JobState::TimedOut);
        assert_eq!(JobState::from_judge0(6), JobState::CompileError);
        for id in 7..=12 {
            assert_eq!(JobState::from_judge0(id), JobState::RuntimeError);
        }
        assert_eq!(JobState::from_judge0(13), JobState::Failed);
        assert_eq!(JobState::from_judge0(14), JobState::Failed);
        assert_eq!(JobState::from_judge0(99), JobState::Failed);
        assert_eq!(JobState::from_judge0(0), JobState::Failed);
    }

    #[test]
    fn test_terminal_states() {
        assert!(!JobState::Queued.is_terminal());
        assert!(!JobState::Running.is_terminal());
        assert!(JobState::Done.is_terminal());
        assert!(JobState::Failed.is_terminal());
    }

    #[test]
    fn test_transitions() {
        assert!(JobState::Queued.can_advance_to(JobState::Running));
        assert!(JobState::Queued.can_advance_to(JobState::Done));
        assert!(JobState::Running.can_advance_to(JobState::TimedOut));
        assert!(!JobState::Running.can_advance_to(JobState::Queued));
        assert!(!JobState::Done.can_advance_to(JobState::Running));
    }
}
