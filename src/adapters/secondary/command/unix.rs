/*
Copyright 2024 San Francisco Compute Company

Licensed under the Apache License, Version 2.0 (the "License");
you may not use this file except in compliance with the License.
You may obtain a copy of the License at

    http://www.apache.org/licenses/LICENSE-2.0

Unless required by applicable law or agreed to in writing, software
distributed under the License is distributed on an "AS IS" BASIS,
WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
See the License for the specific language governing permissions and
limitations under the License.
*/

//! Unix command execution adapter

use crate::domain::{CommandError, SystemError};
use crate::ports::{CommandExecutor, CommandOutput, SystemCommand};
use async_trait::async_trait;
use log::{debug, warn};
use std::io::ErrorKind;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;

/// Unix-based command executor with timeouts and retries
pub struct UnixCommandExecutor {
    /// Default timeout for commands
    default_timeout: Duration,
    /// Number of retry attempts for commands that could not be run
    retry_count: u32,
}

impl UnixCommandExecutor {
    /// Create a new Unix command executor
    ///
    /// # Arguments
    /// * `default_timeout` - Timeout for commands that don't set their own
    /// * `retry_count` - Number of retry attempts
    pub fn new(default_timeout: Duration, retry_count: u32) -> Self {
        Self {
            default_timeout,
            retry_count,
        }
    }

    /// Create a Unix command executor with default settings
    pub fn with_defaults() -> Self {
        Self::new(Duration::from_secs(30), 2)
    }

    /// Execute a command, retrying when it failed to run or timed out
    ///
    /// A non-zero exit is a result, not a failure, and is never retried.
    /// Neither is a missing or non-executable program.
    async fn execute_with_retry(
        &self,
        command: &SystemCommand,
    ) -> Result<CommandOutput, CommandError> {
        let mut attempt = 0;
        loop {
            match self.execute_once(command).await {
                Ok(output) => return Ok(output),
                Err(e) if attempt < self.retry_count && is_retryable(&e) => {
                    attempt += 1;
                    warn!("{e} (attempt {attempt}), retrying");
                    tokio::time::sleep(Duration::from_millis(100 * attempt as u64)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Execute a command once
    async fn execute_once(&self, command: &SystemCommand) -> Result<CommandOutput, CommandError> {
        let command_timeout = command.timeout.unwrap_or(self.default_timeout);

        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args);

        cmd.stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .stdin(Stdio::null())
            .kill_on_drop(true);

        debug!("Executing: {}", command.display());

        match timeout(command_timeout, cmd.output()).await {
            Ok(Ok(output)) => {
                let stdout = String::from_utf8_lossy(&output.stdout).to_string();
                let stderr = String::from_utf8_lossy(&output.stderr).to_string();
                let success = output.status.success();
                let exit_code = output.status.code();

                if !success {
                    debug!(
                        "{} exited with {exit_code:?}: {}",
                        command.program,
                        stderr.trim()
                    );
                }

                Ok(CommandOutput {
                    stdout,
                    stderr,
                    exit_code,
                    success,
                })
            }
            Ok(Err(e)) => Err(match e.kind() {
                ErrorKind::NotFound => SystemError::CommandNotFound(command.program.clone()).into(),
                ErrorKind::PermissionDenied => {
                    SystemError::PermissionDenied(format!("{}: {e}", command.program)).into()
                }
                _ => CommandError::ExecutionFailed(format!(
                    "Failed to execute command '{}': {}",
                    command.program, e
                )),
            }),
            Err(_) => Err(SystemError::Timeout(format!(
                "Command '{}' timed out after {:?}",
                command.program, command_timeout
            ))
            .into()),
        }
    }

    async fn which(&self, command_name: &str) -> Option<String> {
        let which_cmd = SystemCommand::new("which")
            .args(&[command_name])
            .timeout(Duration::from_secs(5));

        match self.execute_once(&which_cmd).await {
            Ok(output) if output.success => {
                let path = output.stdout.trim();
                (!path.is_empty()).then(|| path.to_string())
            }
            _ => None,
        }
    }
}

fn is_retryable(err: &CommandError) -> bool {
    !matches!(
        err,
        CommandError::System(SystemError::CommandNotFound(_))
            | CommandError::System(SystemError::PermissionDenied(_))
    )
}

#[async_trait]
impl CommandExecutor for UnixCommandExecutor {
    async fn execute(&self, command: &SystemCommand) -> Result<CommandOutput, CommandError> {
        self.execute_with_retry(command).await
    }

    async fn is_command_available(&self, command_name: &str) -> Result<bool, CommandError> {
        // An absolute or relative path is checked directly
        if command_name.contains('/') {
            return Ok(tokio::fs::metadata(command_name)
                .await
                .map(|meta| meta.is_file())
                .unwrap_or(false));
        }
        Ok(self.which(command_name).await.is_some())
    }
}
