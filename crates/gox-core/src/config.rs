//! Service configuration.
//!
//! Read once at process start; the API token is never re-read per job.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::changelog::DEFAULT_API_BASE;

/// Directory name under the system temp dir holding per-job build dirs.
pub const BUILD_DIR_NAME: &str = "cloudgox";

/// gox-forge configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ForgeConfig {
    /// Root containing `src/<package>` source trees (a GOPATH).
    pub source_root: PathBuf,
    /// Root of per-job build directories.
    pub build_root: PathBuf,
    /// Release/compare API endpoint.
    pub github_api: String,
    /// Bearer token for the API (optional for public repos).
    #[serde(default, skip_serializing)]
    pub github_token: Option<String>,
}

impl Default for ForgeConfig {
    fn default() -> Self {
        ForgeConfig {
            source_root: std::env::var_os("GOPATH")
                .map(PathBuf::from)
                .unwrap_or_else(default_gopath),
            build_root: std::env::var_os("GOX_BUILD_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| std::env::temp_dir().join(BUILD_DIR_NAME)),
            github_api: std::env::var("GOX_GITHUB_API")
                .unwrap_or_else(|_| DEFAULT_API_BASE.to_string()),
            github_token: std::env::var("GH_TOKEN").ok().filter(|t| !t.is_empty()),
        }
    }
}

fn default_gopath() -> PathBuf {
    std::env::var_os("HOME")
        .map(|home| Path::new(&home).join("go"))
        .unwrap_or_else(|| PathBuf::from("go"))
}

impl ForgeConfig {
    /// Create a new config from environment variables
    pub fn from_env() -> Self {
        Self::default()
    }

    /// Config with explicit roots and no token.
    pub fn new(source_root: impl Into<PathBuf>, build_root: impl Into<PathBuf>) -> Self {
        ForgeConfig {
            source_root: source_root.into(),
            build_root: build_root.into(),
            github_api: DEFAULT_API_BASE.to_string(),
            github_token: None,
        }
    }

    pub fn with_token(mut self, token: &str) -> Self {
        self.github_token = Some(token.to_string());
        self
    }

    pub fn with_api_base(mut self, api: &str) -> Self {
        self.github_api = api.to_string();
        self
    }
}
