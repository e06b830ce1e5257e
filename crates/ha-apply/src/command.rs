//! External command execution
//!
//! Commands are token lists, program first, executed without a shell.
//! Nothing here applies a timeout: a hung command stalls the run.

use std::io::ErrorKind;
use std::process::Stdio;
use std::time::Instant;

use async_trait::async_trait;
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use tokio::process::Command;

use hapair_core::error::CommandError;
use hapair_core::CommandResult;

/// Captured result of a finished command
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommandOutput {
    /// Whether the command exited with status 0
    pub success: bool,
    /// Exit code, `None` when killed by a signal
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u64,
}

/// Executes external commands
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `command` to completion and capture its output
    ///
    /// A non-zero exit is reported in the output, not as an error; only
    /// failing to start the program is an error.
    async fn execute(&self, command: &[String]) -> Result<CommandOutput, CommandError>;

    /// Start `command` without waiting for it
    async fn spawn_background(&self, command: &[String]) -> Result<(), CommandError>;

    /// Run `command` and fail unless it exits with status 0
    async fn run_checked(&self, command: &[String]) -> Result<CommandOutput, CommandError> {
        let output = self.execute(command).await?;

        if output.success {
            Ok(output)
        } else {
            Err(CommandError::NonZeroExit {
                command: command.join(" "),
                code: output.exit_code,
                stderr: output.stderr.trim().to_string(),
            })
        }
    }

    /// Run every command in order, recording each outcome
    ///
    /// A failing line never stops the lines after it. Empty or
    /// whitespace-only lines are skipped and produce no result.
    async fn run_lines(&self, commands: &[Vec<String>]) -> Vec<CommandResult> {
        let mut results = Vec::new();

        for command in commands {
            let command: Vec<String> = command
                .iter()
                .map(|token| token.trim())
                .filter(|token| !token.is_empty())
                .map(str::to_string)
                .collect();

            if command.is_empty() {
                continue;
            }

            let outcome = self.run_checked(&command).await;
            let result = match outcome {
                Ok(output) => CommandResult::success(command, output.exit_code),
                Err(err) => {
                    warn!("Command `{}` failed: {}", command.join(" "), err);
                    let exit_code = match &err {
                        CommandError::NonZeroExit { code, .. } => *code,
                        _ => None,
                    };
                    CommandResult::failure(command, exit_code, err.to_string())
                }
            };
            results.push(result);
        }

        results
    }
}

/// Runs commands on the local system
#[derive(Debug, Default, Clone)]
pub struct SystemCommandRunner;

impl SystemCommandRunner {
    /// Create new system command runner
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CommandRunner for SystemCommandRunner {
    async fn execute(&self, command: &[String]) -> Result<CommandOutput, CommandError> {
        let (program, args) = command.split_first().ok_or(CommandError::Empty)?;
        let start_time = Instant::now();

        debug!("Executing {:?}", command);

        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| spawn_error(program, e))?;

        let duration_ms = start_time.elapsed().as_millis() as u64;
        let success = output.status.success();
        let exit_code = output.status.code();
        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        if success {
            debug!("{} completed successfully in {}ms", program, duration_ms);
        } else {
            debug!("{} exited with {:?}: {}", program, exit_code, stderr.trim());
        }

        Ok(CommandOutput {
            success,
            exit_code,
            stdout,
            stderr,
            duration_ms,
        })
    }

    async fn spawn_background(&self, command: &[String]) -> Result<(), CommandError> {
        let (program, args) = command.split_first().ok_or(CommandError::Empty)?;

        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| spawn_error(program, e))?;

        info!("Started {:?} in background (pid {:?})", command, child.id());
        Ok(())
    }
}

fn spawn_error(program: &str, source: std::io::Error) -> CommandError {
    error!("{} failed to execute: {}", program, source);
    match source.kind() {
        ErrorKind::NotFound => CommandError::MissingBinary {
            program: program.to_string(),
        },
        ErrorKind::PermissionDenied => CommandError::PermissionDenied {
            program: program.to_string(),
        },
        _ => CommandError::Spawn {
            program: program.to_string(),
            source,
        },
    }
}

/// Split a shell-free command line into tokens
pub fn tokenize(line: &str) -> Vec<String> {
    line.split_whitespace().map(str::to_string).collect()
}
