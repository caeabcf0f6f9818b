//! Per-job workspace: build directory, source location and commit pinning.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::{ForgeError, Result};
use crate::toolchain::{SourceControl, Toolchain};

/// Result of pinning a source tree.
///
/// `commit_hash` is the build variable value resolved from version control;
/// it is merged into the linker flags instead of being written back into the
/// job's variables.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PinOutcome {
    /// A checkout happened and must be reverted.
    pub pinned: bool,
    pub commit_hash: Option<String>,
}

/// Filesystem and VCS operations for a job.
pub struct Workspace {
    build_root: PathBuf,
    source_root: PathBuf,
    vcs: Arc<dyn SourceControl>,
    toolchain: Arc<dyn Toolchain>,
}

impl Workspace {
    pub fn new(
        build_root: impl Into<PathBuf>,
        source_root: impl Into<PathBuf>,
        vcs: Arc<dyn SourceControl>,
        toolchain: Arc<dyn Toolchain>,
    ) -> Self {
        Self {
            build_root: build_root.into(),
            source_root: source_root.into(),
            vcs,
            toolchain,
        }
    }

    /// Create `<build_root>/<job_id>`. An existing directory is reused.
    pub fn prepare_build_dir(&self, job_id: &str) -> Result<PathBuf> {
        let dir = self.build_root.join(job_id);
        std::fs::create_dir_all(&self.build_root).map_err(|source| ForgeError::BuildDir {
            path: self.build_root.clone(),
            source,
        })?;
        match std::fs::create_dir(&dir) {
            Ok(()) => Ok(dir),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(dir),
            Err(source) => Err(ForgeError::BuildDir { path: dir, source }),
        }
    }

    /// `<source_root>/src/<package>`, which must exist.
    pub fn resolve_source_dir(&self, package: &str) -> Result<PathBuf> {
        let dir = self.source_root.join("src").join(package);
        if !dir.exists() {
            return Err(ForgeError::PackageNotFound(package.to_string()));
        }
        Ok(dir)
    }

    /// Fetch the whole package's dependencies. Failure is fatal to the job.
    ///
    /// The source root may not exist yet on a fresh GOPATH; it is created so
    /// the fetch has somewhere to run.
    pub async fn fetch_package(&self, package: &str) -> Result<()> {
        info!(package, "fetching dependencies");
        let dependencies = |reason: String| ForgeError::Dependencies {
            package: package.to_string(),
            reason,
        };
        tokio::fs::create_dir_all(&self.source_root)
            .await
            .map_err(|e| dependencies(e.to_string()))?;
        self.toolchain
            .fetch(&self.source_root, package)
            .await
            .map_err(|e| dependencies(e.to_string()))
    }

    /// Fetch a sub-target's dependencies. Returns `false` on failure so the
    /// caller can skip that sub-target.
    pub async fn fetch_target(&self, target_dir: &Path, target: &str) -> bool {
        match self.toolchain.fetch(target_dir, ".").await {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    sub_target = target,
                    error = %e,
                    "failed to get dependencies of subdirectory"
                );
                false
            }
        }
    }

    /// Check out `commitish` (when given) and resolve the commit hash.
    ///
    /// Without a ref the current hash is read best-effort; a failed read just
    /// leaves `commit_hash` empty.
    pub async fn pin(
        &self,
        dir: &Path,
        package: &str,
        commitish: Option<&str>,
    ) -> Result<PinOutcome> {
        let Some(commitish) = commitish else {
            debug!("retrieving current commit hash");
            let commit_hash = match self.vcs.short_head(dir).await {
                Ok(hash) => Some(hash),
                Err(e) => {
                    debug!(error = %e, "no commit hash available");
                    None
                }
            };
            return Ok(PinOutcome {
                pinned: false,
                commit_hash,
            });
        };

        info!(commitish, "loading specific commit");
        if self.vcs.status(dir).await.is_err() {
            return Err(ForgeError::NotARepository {
                package: package.to_string(),
                commitish: commitish.to_string(),
            });
        }
        self.vcs
            .checkout(dir, commitish)
            .await
            .map_err(|e| ForgeError::Checkout {
                package: package.to_string(),
                commitish: commitish.to_string(),
                reason: e.to_string(),
            })?;

        let commit_hash = match self.vcs.short_head(dir).await {
            Ok(hash) => hash,
            Err(_) => commitish.to_string(),
        };
        Ok(PinOutcome {
            pinned: true,
            commit_hash: Some(commit_hash),
        })
    }

    /// Return a pinned tree to its previous ref. Never fails the job.
    pub async fn revert(&self, dir: &Path, package: &str, pin: &PinOutcome) {
        if !pin.pinned {
            return;
        }
        info!("revert repo back to latest commit");
        if let Err(e) = self.vcs.checkout(dir, "-").await {
            warn!(package, error = %e, "failed to revert commit");
        }
    }
}
