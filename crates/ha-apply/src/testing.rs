//! Command runner and file store fakes for tests

use std::collections::{HashMap, HashSet};
use std::io;
use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;

use hapair_core::error::{CommandError, FileError};
use hapair_core::Result;

use crate::command::{CommandOutput, CommandRunner};
use crate::files::{BackupFile, ConfigFileManager, ConfigStore};

/// Records every command and answers from canned responses
///
/// Commands are matched by their space-joined form. Unknown commands
/// succeed with empty output.
#[derive(Default)]
pub struct RecordingRunner {
    failing: HashSet<String>,
    missing: HashSet<String>,
    stdout: HashMap<String, String>,
    executed: Mutex<Vec<String>>,
    background: Mutex<Vec<String>>,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `line` exit with status 1
    pub fn fail_on(mut self, line: &str) -> Self {
        self.failing.insert(line.to_string());
        self
    }

    /// Make the program of `line` unavailable
    pub fn missing(mut self, line: &str) -> Self {
        self.missing.insert(line.to_string());
        self
    }

    /// Answer `line` with `stdout`
    pub fn with_stdout(mut self, line: &str, stdout: &str) -> Self {
        self.stdout.insert(line.to_string(), stdout.to_string());
        self
    }

    /// Command lines run to completion, in order
    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }

    /// Command lines started in the background, in order
    pub fn background(&self) -> Vec<String> {
        self.background.lock().unwrap().clone()
    }

    /// Number of executed lines equal to `line`
    pub fn count(&self, line: &str) -> usize {
        self.executed().iter().filter(|l| l.as_str() == line).count()
    }
}

#[async_trait]
impl CommandRunner for RecordingRunner {
    async fn execute(&self, command: &[String]) -> std::result::Result<CommandOutput, CommandError> {
        if command.is_empty() {
            return Err(CommandError::Empty);
        }

        let line = command.join(" ");
        self.executed.lock().unwrap().push(line.clone());

        if self.missing.contains(&line) {
            return Err(CommandError::MissingBinary {
                program: command[0].clone(),
            });
        }

        let success = !self.failing.contains(&line);
        Ok(CommandOutput {
            success,
            exit_code: Some(if success { 0 } else { 1 }),
            stdout: self.stdout.get(&line).cloned().unwrap_or_default(),
            stderr: if success {
                String::new()
            } else {
                format!("{}: failed", command[0])
            },
            duration_ms: 0,
        })
    }

    async fn spawn_background(&self, command: &[String]) -> std::result::Result<(), CommandError> {
        if command.is_empty() {
            return Err(CommandError::Empty);
        }

        let line = command.join(" ");
        self.background.lock().unwrap().push(line.clone());

        if self.missing.contains(&line) {
            return Err(CommandError::MissingBinary {
                program: command[0].clone(),
            });
        }
        Ok(())
    }
}

/// Filesystem store whose commit truncates the live file and then fails
///
/// Stands in for a copy interrupted half way, e.g. by a full disk.
#[derive(Default)]
pub struct TornCommitStore {
    inner: ConfigFileManager,
    restores: Mutex<usize>,
}

impl TornCommitStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of restore calls
    pub fn restores(&self) -> usize {
        *self.restores.lock().unwrap()
    }
}

#[async_trait]
impl ConfigStore for TornCommitStore {
    fn exists(&self, path: &Path) -> bool {
        self.inner.exists(path)
    }

    async fn backup(&self, live: &Path, backup: &Path) -> Result<BackupFile> {
        self.inner.backup(live, backup).await
    }

    async fn stage(&self, template: &Path, staging: &Path) -> Result<()> {
        self.inner.stage(template, staging).await
    }

    async fn append(&self, staging: &Path, text: &str) -> Result<()> {
        self.inner.append(staging, text).await
    }

    async fn commit(&self, staging: &Path, live: &Path) -> Result<()> {
        std::fs::write(live, "listen app 0.0")?;
        Err(FileError::Commit {
            staging: staging.to_path_buf(),
            live: live.to_path_buf(),
            source: io::Error::new(io::ErrorKind::Other, "No space left on device"),
        }
        .into())
    }

    async fn write(&self, live: &Path, content: &str) -> Result<()> {
        self.inner.write(live, content).await
    }

    async fn restore(&self, backup: &BackupFile) -> Result<()> {
        *self.restores.lock().unwrap() += 1;
        self.inner.restore(backup).await
    }

    async fn discard(&self, staging: &Path) {
        self.inner.discard(staging).await
    }
}
