//! Execution sandbox seam
//!
//! The poller only needs two calls from a sandbox: hand over a program with
//! its stdin, and ask how that job is doing. `Judge0Client` implements them
//! over HTTP; tests use scripted in-memory sandboxes.

pub mod config;
pub mod judge0;
pub mod status;

use async_trait::async_trait;

use crate::error::SandboxError;

pub use config::Judge0Config;
pub use judge0::Judge0Client;
pub use status::JobState;

/// One program run against one stdin
#[derive(Debug, Clone, PartialEq)]
pub struct SandboxRequest {
    pub source_code: String,
    pub language_id: u32,
    pub stdin: String,
    /// Seconds
    pub cpu_time_limit: Option<f32>,
    pub memory_limit_kb: Option<u32>,
}

/// Opaque handle of a dispatched job
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SandboxToken(pub String);

impl std::fmt::Display for SandboxToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Snapshot of a job as reported by the sandbox
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SandboxReport {
    pub state: JobState,
    pub stdout: String,
    pub stderr: String,
    pub compile_output: String,
    /// Sandbox-side explanation (signal name, internal error text)
    pub message: String,
    pub time_ms: u32,
    pub memory_kb: u32,
}

#[async_trait]
pub trait Sandbox: Send + Sync {
    /// Submit a job without waiting for it
    async fn dispatch(&self, request: &SandboxRequest) -> Result<SandboxToken, SandboxError>;

    /// Current state of a dispatched job
    async fn fetch(&self, token: &SandboxToken) -> Result<SandboxReport, SandboxError>;
}
