//! ProcessExecutor: runs the relay helper as a child process.
//!
//! The command line is split on whitespace and passed as arguments, so
//! `"volume up 2"` becomes `helper volume up 2`.  No shell is involved.
//!
//! The child is spawned with `kill_on_drop`, so when the router's timeout
//! abandons the future the helper is killed instead of left running.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::application::executor::{CommandExecutor, ExecError, ExecOutput};

#[derive(Debug, Clone)]
pub struct ProcessExecutor {
    program: PathBuf,
}

impl ProcessExecutor {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

#[async_trait]
impl CommandExecutor for ProcessExecutor {
    async fn execute(&self, command_line: &str) -> ExecOutput {
        debug!("running {} {command_line}", self.program.display());

        let output = Command::new(&self.program)
            .args(command_line.split_whitespace())
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await;

        let output = match output {
            Ok(output) => output,
            Err(e) => {
                let detail = format!("{}: {e}", self.program.display());
                return ExecOutput::failure(ExecError::Spawn(detail.clone()), detail);
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        let result = if output.status.success() {
            Ok(())
        } else {
            match output.status.code() {
                Some(code) => Err(ExecError::ExitStatus(code)),
                None => Err(ExecError::Terminated),
            }
        };

        ExecOutput {
            result,
            stdout,
            stderr,
        }
    }
}
