//! Build matrix orchestration.
//!
//! [`Compiler::compile`] runs one job end to end: workspace setup, commit
//! pinning, the sequential (target × platform) loop, and revert. A failing
//! cell is logged and skipped; only the conditions in [`ForgeError`] that are
//! returned here abort the job.

use std::collections::{BTreeMap, HashMap};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use flate2::write::GzEncoder;
use flate2::Compression;
use gox_release::Releasers;
use sha2::{Digest, Sha256};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn, Instrument};

use crate::changelog::{ChangelogSource, GithubChangelog, StaticChangelog};
use crate::config::ForgeConfig;
use crate::domain::{artifact_name, compressed_name, Compilation, Platform};
use crate::error::{ForgeError, Result};
use crate::flags::LinkerFlags;
use crate::obs;
use crate::progress::{NoopObserver, ProgressObserver};
use crate::publisher::ReleasePublisher;
use crate::toolchain::{BuildRequest, GoToolchain, SourceControl, SystemGit, Toolchain};
use crate::workspace::Workspace;

/// One (sub-target, platform) unit of work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatrixCell {
    /// Sub-target path relative to the package root.
    pub target: String,
    /// Base name used in artifact filenames.
    pub target_name: String,
    pub platform: Platform,
    /// Uncompressed artifact filename.
    pub filename: String,
}

/// Base name of a sub-target: the last path segment of `package/target`.
pub fn target_base_name(package: &str, target: &str) -> String {
    Path::new(package)
        .join(target)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| package.to_string())
}

/// Expand a job into its matrix cells, sub-target major.
pub fn plan(job: &Compilation) -> Result<Vec<MatrixCell>> {
    let platforms = job.platforms()?;
    let mut cells = Vec::with_capacity(job.targets.len() * platforms.len());
    for target in &job.targets {
        let target_name = target_base_name(&job.package, target);
        for platform in &platforms {
            cells.push(MatrixCell {
                target: target.clone(),
                filename: artifact_name(&target_name, platform),
                target_name: target_name.clone(),
                platform: platform.clone(),
            });
        }
    }
    Ok(cells)
}

/// Compiler environment for one cell: job env plus platform overrides.
pub fn build_env(job: &Compilation, platform: &Platform) -> BTreeMap<String, String> {
    let mut env = job.env.clone();
    env.insert("GOOS".to_string(), platform.os.clone());
    env.insert("GOARCH".to_string(), platform.arch.clone());
    if !job.cgo {
        env.insert("CGO_ENABLED".to_string(), "0".to_string());
    }
    env
}

/// Gzip `bytes` at the default level.
pub fn gzip(bytes: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder =
        GzEncoder::new(Vec::with_capacity(bytes.len() / 2), Compression::default());
    encoder.write_all(bytes)?;
    encoder.finish()
}

async fn write_executable(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(0o755);
    let mut file = options.open(path).await?;
    file.write_all(bytes).await?;
    file.flush().await?;

    // mode() is filtered by the umask and ignored for pre-existing files
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).await?;
    }
    Ok(())
}

enum CellOutcome {
    Compiled(String),
    Skipped,
}

/// Per-job values shared by every cell.
struct JobContext<'a> {
    build_dir: &'a Path,
    pkg_dir: &'a Path,
    ldflags: String,
    publisher: Option<ReleasePublisher>,
}

/// Runs compilation jobs.
pub struct Compiler {
    workspace: Workspace,
    toolchain: Arc<dyn Toolchain>,
    releasers: Releasers,
    changelog: Arc<dyn ChangelogSource>,
    observer: Arc<dyn ProgressObserver>,
}

impl Compiler {
    pub fn new(
        build_root: impl Into<PathBuf>,
        source_root: impl Into<PathBuf>,
        vcs: Arc<dyn SourceControl>,
        toolchain: Arc<dyn Toolchain>,
    ) -> Self {
        Self {
            workspace: Workspace::new(build_root, source_root, vcs, Arc::clone(&toolchain)),
            toolchain,
            releasers: Releasers::new(),
            changelog: Arc::new(StaticChangelog::default()),
            observer: Arc::new(NoopObserver),
        }
    }

    /// Compiler using system `git`, `go` and the configured changelog API.
    pub fn from_config(config: &ForgeConfig) -> Result<Self> {
        let changelog = GithubChangelog::new(&config.github_api, config.github_token.clone())?;
        Ok(Self::new(
            &config.build_root,
            &config.source_root,
            Arc::new(SystemGit),
            Arc::new(GoToolchain::new()),
        )
        .with_changelog(Arc::new(changelog)))
    }

    pub fn with_releasers(mut self, releasers: Releasers) -> Self {
        self.releasers = releasers;
        self
    }

    pub fn with_changelog(mut self, changelog: Arc<dyn ChangelogSource>) -> Self {
        self.changelog = changelog;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Run `job` to completion, appending artifacts to `job.files`.
    pub async fn compile(&self, job: &mut Compilation) -> Result<()> {
        let span = obs::job_span(&job.id, &job.package);
        self.compile_job(job).instrument(span).await
    }

    async fn compile_job(&self, job: &mut Compilation) -> Result<()> {
        let start = Instant::now();
        info!(package = %job.package, version = %job.version, "compiling");
        job.started_at = Some(Utc::now());

        let result = match plan(job) {
            Ok(cells) => {
                obs::emit_job_started(&job.id, &job.package, &job.version, cells.len());
                self.run(job, &cells).await
            }
            Err(e) => Err(e),
        };

        obs::emit_job_finished(
            &job.id,
            start.elapsed().as_millis() as u64,
            job.files.len(),
            result.is_ok(),
        );
        result
    }

    async fn run(&self, job: &mut Compilation, cells: &[MatrixCell]) -> Result<()> {
        let build_dir = self.workspace.prepare_build_dir(&job.id)?;
        if job.go_get {
            self.workspace.fetch_package(&job.package).await?;
        }
        let pkg_dir = self.workspace.resolve_source_dir(&job.package)?;
        let pin = self
            .workspace
            .pin(&pkg_dir, &job.package, job.pinned_commit())
            .await?;

        let commit = pin
            .commit_hash
            .as_deref()
            .filter(|_| !job.commit_var.is_empty())
            .map(|hash| (job.commit_var.as_str(), hash));
        let flags =
            LinkerFlags::compile(&job.variables, commit, job.shrink, Utc::now().timestamp());
        for flag in flags.flags() {
            debug!(%flag, "ld-flag");
        }

        let ctx = JobContext {
            build_dir: &build_dir,
            pkg_dir: &pkg_dir,
            ldflags: flags.to_ldflags(),
            publisher: self.publisher_for(job),
        };
        let matrix = self.run_matrix(job, cells, &ctx).await;

        self.workspace.revert(&pkg_dir, &job.package, &pin).await;
        matrix?;

        if job.files.is_empty() {
            return Err(ForgeError::NoFilesCompiled);
        }
        job.completed_at = Some(Utc::now());
        info!(
            package = %job.package,
            version = %job.version,
            files = job.files.len(),
            "compiled"
        );
        Ok(())
    }

    fn publisher_for(&self, job: &Compilation) -> Option<ReleasePublisher> {
        let name = job.releaser.as_deref().filter(|n| !n.is_empty())?;
        match self.releasers.get(name) {
            Some(releaser) => Some(ReleasePublisher::new(
                name,
                releaser,
                Arc::clone(&self.changelog),
                &job.package,
                &job.version,
            )),
            None => {
                let known = self.releasers.names().collect::<Vec<_>>().join(",");
                warn!(
                    releaser = name,
                    known = %known,
                    "unknown releaser, artifacts will not be published"
                );
                None
            }
        }
    }

    async fn run_matrix(
        &self,
        job: &mut Compilation,
        cells: &[MatrixCell],
        ctx: &JobContext<'_>,
    ) -> Result<()> {
        let mut deps_ready: HashMap<&str, bool> = HashMap::new();

        for cell in cells {
            let target_dir = ctx.pkg_dir.join(&cell.target);

            if job.go_get
                && target_dir != ctx.pkg_dir
                && !deps_ready.contains_key(cell.target.as_str())
            {
                let ok = self.workspace.fetch_target(&target_dir, &cell.target).await;
                deps_ready.insert(cell.target.as_str(), ok);
            }
            if deps_ready.get(cell.target.as_str()) == Some(&false) {
                obs::emit_artifact_skipped(
                    &cell.target,
                    &cell.platform.to_string(),
                    &"dependencies unavailable",
                );
                continue;
            }

            let outcome = self.compile_cell(job, cell, &target_dir, ctx).await?;
            if let CellOutcome::Compiled(file) = outcome {
                job.record_artifact(file.clone());
                self.observer.artifact_completed(job, &file);
            }
        }
        Ok(())
    }

    async fn compile_cell(
        &self,
        job: &Compilation,
        cell: &MatrixCell,
        target_dir: &Path,
        ctx: &JobContext<'_>,
    ) -> Result<CellOutcome> {
        let platform = cell.platform.to_string();
        if !target_dir.is_dir() {
            obs::emit_artifact_skipped(&cell.target, &platform, &"target directory not found");
            return Ok(CellOutcome::Skipped);
        }

        let output = ctx.build_dir.join(&cell.filename);
        let env = build_env(job, &cell.platform);
        for (key, value) in &env {
            debug!(sub_target = %cell.target, "env: {}={}", key, value);
        }
        let request = BuildRequest {
            output: output.clone(),
            ldflags: ctx.ldflags.clone(),
            env,
        };

        if let Err(e) = self.toolchain.build(target_dir, &request).await {
            warn!(file = %cell.filename, error = %e, "failed to build");
            obs::emit_artifact_skipped(&cell.target, &platform, &e);
            return Ok(CellOutcome::Skipped);
        }

        let binary = tokio::fs::read(&output)
            .await
            .map_err(|source| ForgeError::MissingOutput {
                path: output.clone(),
                source,
            })?;
        let payload = gzip(&binary)?;
        let filename = compressed_name(&cell.filename);

        if let Some(publisher) = &ctx.publisher {
            publisher.ensure_release_and_upload(&filename, &payload).await;
        }

        if let Err(e) = tokio::fs::remove_file(&output).await {
            warn!(file = %cell.filename, error = %e, "asset local remove failed");
            obs::emit_artifact_skipped(&cell.target, &platform, &e);
            return Ok(CellOutcome::Skipped);
        }

        let stored = ctx.build_dir.join(&filename);
        if let Err(e) = write_executable(&stored, &payload).await {
            warn!(file = %filename, error = %e, "asset local write failed");
            obs::emit_artifact_skipped(&cell.target, &platform, &e);
            return Ok(CellOutcome::Skipped);
        }

        let digest = hex::encode(Sha256::digest(&payload));
        obs::emit_artifact_compiled(&filename, payload.len(), &digest);
        Ok(CellOutcome::Compiled(filename))
    }
}
