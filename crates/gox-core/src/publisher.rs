//! Lazy, once-per-job release publishing.
//!
//! The release entry is created the first time any artifact is published and
//! reused for every later artifact of the same job. A failed setup is
//! remembered too, so later uploads are skipped instead of retrying setup.

use std::sync::Arc;

use gox_release::{Release, Releaser};
use tokio::sync::OnceCell;
use tracing::{info, warn};

use crate::changelog::ChangelogSource;
use crate::obs;

/// What happened to one artifact at the publish step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    Uploaded,
    Failed,
    /// No release handle (setup failed earlier).
    Skipped,
}

/// Publisher scoped to a single job.
pub struct ReleasePublisher {
    name: String,
    releaser: Arc<dyn Releaser>,
    changelog: Arc<dyn ChangelogSource>,
    package: String,
    version: String,
    release: OnceCell<Option<Arc<dyn Release>>>,
}

impl ReleasePublisher {
    pub fn new(
        name: impl Into<String>,
        releaser: Arc<dyn Releaser>,
        changelog: Arc<dyn ChangelogSource>,
        package: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            releaser,
            changelog,
            package: package.into(),
            version: version.into(),
            release: OnceCell::new(),
        }
    }

    /// Whether setup has run (successfully or not).
    pub fn setup_attempted(&self) -> bool {
        self.release.initialized()
    }

    /// Return the job's release handle, running setup on first use.
    ///
    /// Concurrent callers wait for the single in-flight setup.
    pub async fn ensure_release(&self) -> Option<Arc<dyn Release>> {
        self.release.get_or_init(|| self.setup()).await.clone()
    }

    async fn setup(&self) -> Option<Arc<dyn Release>> {
        let description = match self.changelog.generate(&self.package).await {
            Ok(text) => text,
            Err(e) => {
                warn!(package = %self.package, error = %e, "changelog generation failed");
                String::new()
            }
        };

        match self
            .releaser
            .setup(&self.package, &self.version, &description)
            .await
        {
            Ok(release) => {
                obs::emit_release_setup(&self.name, &self.package, &self.version, true);
                Some(release)
            }
            Err(e) => {
                obs::emit_release_setup(&self.name, &self.package, &self.version, false);
                warn!(
                    releaser = %self.name,
                    package = %self.package,
                    error = %e,
                    "failed to setup release"
                );
                None
            }
        }
    }

    /// Ensure the release exists, then upload `payload` as `filename`.
    pub async fn ensure_release_and_upload(
        &self,
        filename: &str,
        payload: &[u8],
    ) -> PublishOutcome {
        let Some(release) = self.ensure_release().await else {
            return PublishOutcome::Skipped;
        };

        match release.upload(filename, payload).await {
            Ok(()) => {
                obs::emit_release_uploaded(&self.name, filename);
                info!(releaser = %self.name, file = filename, "included asset in release");
                PublishOutcome::Uploaded
            }
            Err(e) => {
                warn!(
                    releaser = %self.name,
                    file = filename,
                    error = %e,
                    "failed to release asset"
                );
                PublishOutcome::Failed
            }
        }
    }
}
