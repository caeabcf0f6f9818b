//! External process adapters: version control and the Go toolchain.
//!
//! The orchestrator only sees the [`SourceControl`] and [`Toolchain`] traits;
//! [`SystemGit`] and [`GoToolchain`] shell out via `tokio::process`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::error::{ForgeError, Result};

/// Captured output of a successful process run.
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub stdout: String,
}

/// Run `program args..` in `dir`, failing on non-zero exit.
///
/// Children are killed if the future is dropped, so cancelling a job stops
/// any build in flight.
pub async fn run_command(
    dir: &Path,
    program: &str,
    args: &[String],
    env: &BTreeMap<String, String>,
) -> Result<CommandOutput> {
    debug!(program, ?args, dir = %dir.display(), "exec");

    let child = Command::new(program)
        .args(args)
        .envs(env)
        .current_dir(dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| ForgeError::Command {
            program: program.to_string(),
            status: "spawn failure".to_string(),
            stderr: e.to_string(),
        })?;

    let output = child.wait_with_output().await?;
    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();

    for line in stdout.lines().chain(stderr.lines()) {
        debug!(program, "{}", line);
    }

    if !output.status.success() {
        return Err(ForgeError::Command {
            program: program.to_string(),
            status: output.status.to_string(),
            stderr: stderr.trim().to_string(),
        });
    }

    Ok(CommandOutput { stdout })
}

fn strings(args: &[&str]) -> Vec<String> {
    args.iter().map(|s| s.to_string()).collect()
}

// ---------------------------------------------------------------------------
// SourceControl
// ---------------------------------------------------------------------------

/// Version control operations on a source tree.
#[async_trait]
pub trait SourceControl: Send + Sync {
    /// Succeeds when `dir` is under version control.
    async fn status(&self, dir: &Path) -> Result<()>;

    /// Check out `reference`; `"-"` returns to the previous reference.
    async fn checkout(&self, dir: &Path, reference: &str) -> Result<()>;

    /// Short hash of the current commit.
    async fn short_head(&self, dir: &Path) -> Result<String>;
}

/// `git` on the `PATH`.
#[derive(Debug, Clone, Default)]
pub struct SystemGit;

#[async_trait]
impl SourceControl for SystemGit {
    async fn status(&self, dir: &Path) -> Result<()> {
        run_command(dir, "git", &strings(&["status"]), &BTreeMap::new()).await?;
        Ok(())
    }

    async fn checkout(&self, dir: &Path, reference: &str) -> Result<()> {
        run_command(dir, "git", &strings(&["checkout", reference]), &BTreeMap::new()).await?;
        Ok(())
    }

    async fn short_head(&self, dir: &Path) -> Result<String> {
        let out = run_command(
            dir,
            "git",
            &strings(&["rev-parse", "--short", "HEAD"]),
            &BTreeMap::new(),
        )
        .await?;
        let sha = out.stdout.trim().to_string();
        if sha.is_empty() {
            return Err(ForgeError::Command {
                program: "git".to_string(),
                status: "empty output".to_string(),
                stderr: "git rev-parse --short HEAD returned nothing".to_string(),
            });
        }
        Ok(sha)
    }
}

// ---------------------------------------------------------------------------
// Toolchain
// ---------------------------------------------------------------------------

/// Inputs for one cross-compilation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRequest {
    /// Where the binary must be written.
    pub output: PathBuf,
    /// Joined linker flags.
    pub ldflags: String,
    /// Environment overrides (OS, arch, interop toggle, job env).
    pub env: BTreeMap<String, String>,
}

impl BuildRequest {
    /// `build -a -v -ldflags <flags> -o <output> .`
    pub fn args(&self) -> Vec<String> {
        vec![
            "build".to_string(),
            "-a".to_string(),
            "-v".to_string(),
            "-ldflags".to_string(),
            self.ldflags.clone(),
            "-o".to_string(),
            self.output.to_string_lossy().to_string(),
            ".".to_string(),
        ]
    }
}

/// Dependency fetching and compilation.
#[async_trait]
pub trait Toolchain: Send + Sync {
    /// Fetch dependencies of `target`, running from `dir`.
    async fn fetch(&self, dir: &Path, target: &str) -> Result<()>;

    /// Compile the program in `dir` as described by `request`.
    async fn build(&self, dir: &Path, request: &BuildRequest) -> Result<()>;
}

/// The `go` command.
#[derive(Debug, Clone)]
pub struct GoToolchain {
    program: String,
}

impl GoToolchain {
    pub fn new() -> Self {
        Self {
            program: "go".to_string(),
        }
    }

    /// Use a specific `go` binary.
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for GoToolchain {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Toolchain for GoToolchain {
    async fn fetch(&self, dir: &Path, target: &str) -> Result<()> {
        run_command(dir, &self.program, &strings(&["get", "-v", target]), &BTreeMap::new())
            .await?;
        Ok(())
    }

    async fn build(&self, dir: &Path, request: &BuildRequest) -> Result<()> {
        run_command(dir, &self.program, &request.args(), &request.env).await?;
        Ok(())
    }
}
