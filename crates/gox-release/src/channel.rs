//! Release channel trait definitions
//!
//! These traits define the boundary between the build orchestrator and an
//! external artifact host:
//! - `Releaser`: creates a release for a package/version
//! - `Release`: a created release that accepts asset uploads
//!
//! Both traits are async and backend-agnostic.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::ReleaseResult;

/// A release channel able to create remote releases.
///
/// Guarantees expected by callers:
/// - `setup` is side-effecting (it creates a remote entry); the orchestrator
///   calls it at most once per job.
/// - The returned handle stays valid for every upload of that job.
#[async_trait]
pub trait Releaser: Send + Sync {
    /// Create the release entry and return a handle for uploads.
    async fn setup(
        &self,
        package: &str,
        version: &str,
        changelog: &str,
    ) -> ReleaseResult<Arc<dyn Release>>;
}

/// A created release accepting artifact uploads.
#[async_trait]
pub trait Release: Send + Sync {
    /// Attach one artifact payload under `filename`.
    async fn upload(&self, filename: &str, payload: &[u8]) -> ReleaseResult<()>;
}

/// Named set of configured release channels.
///
/// Jobs select a channel by name; an unknown name simply resolves to `None`.
#[derive(Clone, Default)]
pub struct Releasers {
    channels: BTreeMap<String, Arc<dyn Releaser>>,
}

impl Releasers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a channel under `name`, replacing any previous one.
    pub fn register(mut self, name: impl Into<String>, releaser: Arc<dyn Releaser>) -> Self {
        self.channels.insert(name.into(), releaser);
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Releaser>> {
        self.channels.get(name).cloned()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.channels.keys().map(String::as_str)
    }
}

impl std::fmt::Debug for Releasers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Releasers")
            .field("channels", &self.names().collect::<Vec<_>>())
            .finish()
    }
}
