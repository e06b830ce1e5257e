//! Error types for provisioning operations

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for provisioning operations
#[derive(Debug, Error)]
pub enum HaError {
    #[error("Template error: {0}")]
    Template(#[from] TemplateError),

    #[error("File error: {0}")]
    File(#[from] FileError),

    #[error("Command error: {0}")]
    Command(#[from] CommandError),

    #[error("Network identity error: {0}")]
    Identity(#[from] IdentityError),

    #[error("Service error: {0}")]
    Service(#[from] ServiceError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Template loading and substitution errors
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("Template not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("Failed to read template {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Template references undefined variable: {name}")]
    MissingVariable { name: String },

    #[error("Invalid placeholder at line {line}, column {column}")]
    InvalidPlaceholder { line: usize, column: usize },
}

/// Live/backup/staging file errors
#[derive(Debug, Error)]
pub enum FileError {
    #[error("Backup of {} to {} failed: {source}", live.display(), backup.display())]
    Backup {
        live: PathBuf,
        backup: PathBuf,
        source: std::io::Error,
    },

    #[error("Staging {} to {} failed: {source}", template.display(), staging.display())]
    Stage {
        template: PathBuf,
        staging: PathBuf,
        source: std::io::Error,
    },

    #[error("Refusing to write empty content to {}", path.display())]
    EmptyContent { path: PathBuf },

    #[error("Append to {} failed: {source}", path.display())]
    Append {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Commit of {} to {} failed: {source}", staging.display(), live.display())]
    Commit {
        staging: PathBuf,
        live: PathBuf,
        source: std::io::Error,
    },

    #[error("Write of {} failed: {source}", path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Restore of {} from {} failed: {source}", live.display(), backup.display())]
    Restore {
        backup: PathBuf,
        live: PathBuf,
        source: std::io::Error,
    },

    #[error("Backup file {} checksum mismatch", path.display())]
    ChecksumMismatch { path: PathBuf },
}

/// External command errors
///
/// Spawn failures are split by cause so a missing binary is not reported
/// the same way as a permission problem or a rule the kernel rejected.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Empty command")]
    Empty,

    #[error("Executable not found: {program}")]
    MissingBinary { program: String },

    #[error("Permission denied executing {program}")]
    PermissionDenied { program: String },

    #[error("Failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("Command `{command}` exited with status {code:?}: {stderr}")]
    NonZeroExit {
        command: String,
        code: Option<i32>,
        stderr: String,
    },
}

/// Interface and address discovery errors
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("No non-loopback interface found")]
    NotFound,

    #[error("No interface owns address {address}: {reason}")]
    Lookup { address: String, reason: String },

    #[error("Failed to parse interface listing: {message}")]
    Parse { message: String },

    #[error("Failed to determine hostname: {reason}")]
    Hostname { reason: String },
}

/// Daemon control errors
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Service {service} is not installed ({} missing)", path.display())]
    NotInstalled { service: String, path: PathBuf },

    #[error("Restart of {service} failed: {source}")]
    Restart {
        service: String,
        source: CommandError,
    },
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {message}")]
    Load { message: String },

    #[error("Parse error at entry {entry}: {message}")]
    Parse { entry: usize, message: String },

    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid configuration value for {field}: {value}")]
    InvalidValue { field: String, value: String },
}
