//! Error types for gox-release

use thiserror::Error;

/// Result type for release channel operations
pub type ReleaseResult<T> = std::result::Result<T, ReleaseError>;

/// Errors a release channel can report
#[derive(Error, Debug)]
pub enum ReleaseError {
    /// The remote release entry could not be created
    #[error("release setup failed for {package} ({version}): {reason}")]
    Setup {
        package: String,
        version: String,
        reason: String,
    },

    /// An asset could not be attached to the release
    #[error("upload of {filename} failed: {reason}")]
    Upload { filename: String, reason: String },

    /// The channel rejected the request (auth, quota, ...)
    #[error("release channel rejected request: {0}")]
    Rejected(String),
}
