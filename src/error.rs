//! Error types and exit codes for dexshard

use std::path::PathBuf;
use std::process::ExitCode;
use thiserror::Error;

/// Main error type for sharding and merging operations
#[derive(Error, Debug)]
pub enum ShardError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Corrupt input {unit}: {message}")]
    CorruptInput { unit: String, message: String },

    #[error("Merge capacity exceeded for {units} units: {message}")]
    MergeCapacity { units: usize, message: String },

    #[error("Merge failed: {message}")]
    Merge { message: String },

    #[error("Background task failed: {message}")]
    Concurrency { message: String },

    #[error("Invalid manifest {}: {message}", path.display())]
    Manifest { path: PathBuf, message: String },

    #[error("Invalid config file {}: {message}", path.display())]
    Config { path: PathBuf, message: String },

    #[error("Failed to render report: {message}")]
    Report { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ShardError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn corrupt(unit: impl Into<String>, message: impl Into<String>) -> Self {
        Self::CorruptInput {
            unit: unit.into(),
            message: message.into(),
        }
    }

    /// Convert error to a process exit code:
    /// - 1: IO error or report output failure
    /// - 2: Configuration, config file or manifest problem
    /// - 3: Corrupt input
    /// - 4: Merge failure (capacity or codec)
    /// - 5: Background task failure
    pub fn exit_code(&self) -> ExitCode {
        match self {
            Self::Io(_) => ExitCode::from(1),
            Self::Report { .. } => ExitCode::from(1),
            Self::Configuration { .. } => ExitCode::from(2),
            Self::Manifest { .. } => ExitCode::from(2),
            Self::Config { .. } => ExitCode::from(2),
            Self::CorruptInput { .. } => ExitCode::from(3),
            Self::MergeCapacity { .. } => ExitCode::from(4),
            Self::Merge { .. } => ExitCode::from(4),
            Self::Concurrency { .. } => ExitCode::from(5),
        }
    }
}

/// Result type alias for dexshard operations
pub type Result<T> = std::result::Result<T, ShardError>;
