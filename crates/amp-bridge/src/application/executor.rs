//! CommandExecutor: the seam between the router and the relay helper program.
//!
//! The router only needs "run this command line and tell me how it went".
//! Production uses [`crate::infrastructure::ProcessExecutor`], which spawns the
//! helper; tests inject doubles that succeed, fail, stall, or panic on demand.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Why a helper invocation did not succeed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecError {
    /// The helper could not be started at all (missing binary, permissions).
    #[error("failed to start helper: {0}")]
    Spawn(String),

    /// The helper ran and exited with a non-zero status.
    #[error("helper exited with status {0}")]
    ExitStatus(i32),

    /// The helper was killed by a signal before it could exit.
    #[error("helper terminated by signal")]
    Terminated,

    /// The helper did not finish within the configured timeout.
    #[error("helper timed out after {0:?}")]
    Timeout(Duration),

    /// The helper call panicked inside the bridge.
    #[error("helper call aborted: {0}")]
    Fault(String),
}

/// Outcome of one helper invocation: status plus captured output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecOutput {
    pub result: Result<(), ExecError>,
    pub stdout: String,
    pub stderr: String,
}

impl ExecOutput {
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            result: Ok(()),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn failure(error: ExecError, stderr: impl Into<String>) -> Self {
        Self {
            result: Err(error),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Runs helper command lines.
///
/// Implementations report failures inside [`ExecOutput`] rather than as a
/// `Result`, so the router always has captured output to show the user.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    /// Runs the helper with `command_line` (e.g. `"power on"`).
    async fn execute(&self, command_line: &str) -> ExecOutput;
}
