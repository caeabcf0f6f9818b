//! Error taxonomy for compilation jobs.
//!
//! Only fatal-to-job conditions are ever returned from [`crate::Compiler::compile`].
//! Per-cell and advisory failures use the same variants internally but are
//! logged and swallowed at the call site.

use std::path::PathBuf;

/// gox-core errors.
#[derive(Debug, thiserror::Error)]
pub enum ForgeError {
    #[error("failed to create build directory {path}: {source}")]
    BuildDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to find package {0}")]
    PackageNotFound(String),

    #[error("failed to get dependencies {package} ({reason})")]
    Dependencies { package: String, reason: String },

    #[error("failed to load commit {commitish}: {package} is not a git repo")]
    NotARepository { package: String, commitish: String },

    #[error("failed to load commit {commitish} of {package}: {reason}")]
    Checkout {
        package: String,
        commitish: String,
        reason: String,
    },

    #[error("invalid platform {0:?}: expected \"os/arch\"")]
    InvalidPlatform(String),

    #[error("compiler produced no readable output at {path}: {source}")]
    MissingOutput {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No files compiled")]
    NoFilesCompiled,

    #[error("{program} exited with {status}: {stderr}")]
    Command {
        program: String,
        status: String,
        stderr: String,
    },

    #[error("changelog error: {0}")]
    Changelog(String),

    #[error("http error: {0}")]
    Http(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for ForgeError {
    fn from(err: reqwest::Error) -> Self {
        ForgeError::Http(err.to_string())
    }
}

/// Result type for gox-core operations.
pub type Result<T> = std::result::Result<T, ForgeError>;
