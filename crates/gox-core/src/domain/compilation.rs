//! Compilation job model.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ForgeError, Result};

/// OS identifier whose artifacts carry an `.exe` suffix.
pub const WINDOWS: &str = "windows";

/// Default name of the build variable receiving the commit hash.
pub const DEFAULT_COMMIT_VAR: &str = "main.COMMIT";

/// One request to build a package across a target/platform matrix.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Compilation {
    /// Opaque job identity; also names the job's build directory.
    #[serde(default = "new_job_id")]
    pub id: String,

    /// Source package, e.g. `github.com/owner/repo`.
    pub package: String,

    /// Version label used for the release.
    pub version: String,

    /// Optional commit to pin the source tree to.
    #[serde(default)]
    pub commitish: Option<String>,

    /// Build variable that receives the resolved commit hash.
    #[serde(default = "default_commit_var")]
    pub commit_var: String,

    /// Sub-targets relative to the package root (`"."` is the root itself).
    #[serde(default = "default_targets")]
    pub targets: Vec<String>,

    /// Platform pairs as `"os/arch"`.
    pub os_arch: Vec<String>,

    /// Caller-supplied build variables, injected as `-X name=value`.
    #[serde(default)]
    pub variables: BTreeMap<String, String>,

    /// Extra process environment for the compiler.
    #[serde(default)]
    pub env: BTreeMap<String, String>,

    /// Fetch dependencies before building.
    #[serde(default)]
    pub go_get: bool,

    /// Strip symbol and debug information.
    #[serde(default)]
    pub shrink: bool,

    /// Keep native-code interop enabled.
    #[serde(default)]
    pub cgo: bool,

    /// Name of the release channel to publish to.
    #[serde(default)]
    pub releaser: Option<String>,

    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,

    /// Compressed artifact filenames, in completion order.
    #[serde(default)]
    pub files: Vec<String>,
}

fn new_job_id() -> String {
    Uuid::new_v4().to_string()
}

fn default_commit_var() -> String {
    DEFAULT_COMMIT_VAR.to_string()
}

fn default_targets() -> Vec<String> {
    vec![".".to_string()]
}

impl Compilation {
    /// Create a job for `package` at `version` with a fresh id.
    pub fn new(package: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            id: new_job_id(),
            package: package.into(),
            version: version.into(),
            commitish: None,
            commit_var: default_commit_var(),
            targets: default_targets(),
            os_arch: Vec::new(),
            variables: BTreeMap::new(),
            env: BTreeMap::new(),
            go_get: false,
            shrink: false,
            cgo: false,
            releaser: None,
            started_at: None,
            completed_at: None,
            files: Vec::new(),
        }
    }

    pub fn with_targets<I, S>(mut self, targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.targets = targets.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_platforms<I, S>(mut self, os_arch: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.os_arch = os_arch.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_variable(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }

    pub fn with_commitish(mut self, commitish: impl Into<String>) -> Self {
        self.commitish = Some(commitish.into());
        self
    }

    pub fn with_releaser(mut self, releaser: impl Into<String>) -> Self {
        self.releaser = Some(releaser.into());
        self
    }

    /// Parse every `os_arch` entry.
    pub fn platforms(&self) -> Result<Vec<Platform>> {
        self.os_arch.iter().map(|s| Platform::parse(s)).collect()
    }

    /// Append a completed artifact. The list never shrinks.
    pub fn record_artifact(&mut self, filename: impl Into<String>) {
        self.files.push(filename.into());
    }

    /// Requested commit, ignoring an empty string.
    pub fn pinned_commit(&self) -> Option<&str> {
        self.commitish.as_deref().filter(|c| !c.is_empty())
    }
}

/// An (operating system, architecture) pair to cross-compile for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Platform {
    pub os: String,
    pub arch: String,
}

impl Platform {
    /// Parse `"os/arch"`. Everything after the first `/` is the arch.
    pub fn parse(s: &str) -> Result<Self> {
        match s.split_once('/') {
            Some((os, arch)) if !os.is_empty() && !arch.is_empty() => Ok(Self {
                os: os.to_string(),
                arch: arch.to_string(),
            }),
            _ => Err(ForgeError::InvalidPlatform(s.to_string())),
        }
    }

    pub fn is_windows(&self) -> bool {
        self.os == WINDOWS
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.os, self.arch)
    }
}

/// Uncompressed artifact name: `{base}_{os}_{arch}[.exe]`.
pub fn artifact_name(base: &str, platform: &Platform) -> String {
    let mut name = format!("{}_{}_{}", base, platform.os, platform.arch);
    if platform.is_windows() {
        name.push_str(".exe");
    }
    name
}

/// Name under which a compressed artifact is stored and published.
pub fn compressed_name(filename: &str) -> String {
    format!("{filename}.gz")
}
