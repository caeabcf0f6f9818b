//! In-memory fakes for the release channel traits (testing only)
//!
//! `MemoryReleaser` records every `setup` call and every uploaded asset so
//! tests can assert on exactly what reached the channel.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::channel::{Release, Releaser};
use crate::error::{ReleaseError, ReleaseResult};

/// A `setup` call as seen by the fake channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetupCall {
    pub package: String,
    pub version: String,
    pub changelog: String,
}

/// An asset stored by the fake channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedAsset {
    pub filename: String,
    pub payload: Vec<u8>,
}

#[derive(Debug, Default)]
struct ReleaserState {
    setups: Vec<SetupCall>,
    uploads: Vec<UploadedAsset>,
}

/// In-memory release channel.
#[derive(Debug, Default)]
pub struct MemoryReleaser {
    state: Arc<Mutex<ReleaserState>>,
    fail_setup: bool,
    failing_uploads: HashSet<String>,
}

impl MemoryReleaser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every `setup` call fail.
    pub fn failing_setup(mut self) -> Self {
        self.fail_setup = true;
        self
    }

    /// Make uploads of `filename` fail.
    pub fn failing_upload(mut self, filename: &str) -> Self {
        self.failing_uploads.insert(filename.to_string());
        self
    }

    pub fn setup_calls(&self) -> Vec<SetupCall> {
        self.state.lock().unwrap().setups.clone()
    }

    pub fn uploads(&self) -> Vec<UploadedAsset> {
        self.state.lock().unwrap().uploads.clone()
    }

    pub fn uploaded_names(&self) -> Vec<String> {
        self.uploads().into_iter().map(|a| a.filename).collect()
    }
}

#[async_trait]
impl Releaser for MemoryReleaser {
    async fn setup(
        &self,
        package: &str,
        version: &str,
        changelog: &str,
    ) -> ReleaseResult<Arc<dyn Release>> {
        self.state.lock().unwrap().setups.push(SetupCall {
            package: package.to_string(),
            version: version.to_string(),
            changelog: changelog.to_string(),
        });

        if self.fail_setup {
            return Err(ReleaseError::Setup {
                package: package.to_string(),
                version: version.to_string(),
                reason: "release already exists".to_string(),
            });
        }

        Ok(Arc::new(MemoryRelease {
            state: Arc::clone(&self.state),
            failing_uploads: self.failing_uploads.clone(),
        }))
    }
}

/// Handle returned by `MemoryReleaser::setup`.
#[derive(Debug)]
pub struct MemoryRelease {
    state: Arc<Mutex<ReleaserState>>,
    failing_uploads: HashSet<String>,
}

#[async_trait]
impl Release for MemoryRelease {
    async fn upload(&self, filename: &str, payload: &[u8]) -> ReleaseResult<()> {
        if self.failing_uploads.contains(filename) {
            return Err(ReleaseError::Upload {
                filename: filename.to_string(),
                reason: "asset rejected".to_string(),
            });
        }
        self.state.lock().unwrap().uploads.push(UploadedAsset {
            filename: filename.to_string(),
            payload: payload.to_vec(),
        });
        Ok(())
    }
}
