//! Changelog generation from a GitHub-compatible release API.
//!
//! The changelog lists the commits between a previous release tag and its
//! target branch:
//! 1. `GET /repos/{owner}/{repo}/releases`
//! 2. `GET /repos/{owner}/{repo}/compare/{tag}...{target}`
//! 3. render a markdown bullet list

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ForgeError, Result};

/// Default API endpoint.
pub const DEFAULT_API_BASE: &str = "https://api.github.com";

const HEADER: &str = "***ChangeLog:***\n---------\n";

/// Produces release notes for a package.
#[async_trait]
pub trait ChangelogSource: Send + Sync {
    async fn generate(&self, package: &str) -> Result<String>;
}

/// A published release as returned by the release listing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReleaseRef {
    pub tag_name: String,
    pub target_commitish: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CommitDetail {
    #[serde(default)]
    pub message: String,
}

/// A commit in a comparison.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CommitEntry {
    pub sha: String,
    #[serde(default)]
    pub html_url: String,
    #[serde(default)]
    pub commit: CommitDetail,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ParentRef {
    pub sha: String,
    #[serde(default)]
    pub html_url: String,
}

/// The common ancestor reported by a comparison.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MergeBaseCommit {
    pub sha: String,
    #[serde(default)]
    pub commit: CommitDetail,
    #[serde(default)]
    pub parents: Vec<ParentRef>,
}

/// Result of comparing two refs.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CompareResult {
    #[serde(default)]
    pub commits: Vec<CommitEntry>,
    #[serde(default)]
    pub merge_base_commit: Option<MergeBaseCommit>,
}

/// Extract `(owner, repo)` from `host/owner/repo[/...]`.
pub fn parse_repo(package: &str) -> Result<(&str, &str)> {
    let mut parts = package.split('/');
    let _host = parts.next();
    match (parts.next(), parts.next()) {
        (Some(owner), Some(repo)) if !owner.is_empty() && !repo.is_empty() => Ok((owner, repo)),
        _ => Err(ForgeError::Changelog(format!(
            "cannot derive owner/repo from package {package}"
        ))),
    }
}

/// Comparison base: the second-most-recent release when there is one,
/// otherwise the only release.
pub fn select_base_release(releases: &[ReleaseRef]) -> Option<&ReleaseRef> {
    if releases.len() > 1 {
        releases.get(1)
    } else {
        releases.first()
    }
}

fn short_sha(sha: &str) -> &str {
    sha.get(..7).unwrap_or(sha)
}

/// Append one bullet. Continuation lines of a multi-line message are
/// indented under the bullet; blank lines are dropped.
fn push_entry(out: &mut String, sha: &str, url: &str, message: &str) {
    let mut lines = message.lines().map(str::trim_end).filter(|l| !l.is_empty());
    let subject = lines.next().unwrap_or("");
    out.push_str(&format!("- [`{}`]({}) {}\n", short_sha(sha), url, subject));
    for line in lines {
        out.push_str("  ");
        out.push_str(line);
        out.push('\n');
    }
}

/// Render the markdown changelog.
///
/// With no discrete commits, a single entry for the merge base's first parent
/// is emitted instead.
pub fn render_changelog(compare: &CompareResult) -> String {
    let mut out = String::from(HEADER);
    if !compare.commits.is_empty() {
        for c in &compare.commits {
            push_entry(&mut out, &c.sha, &c.html_url, &c.commit.message);
        }
    } else if let Some(base) = &compare.merge_base_commit {
        if let Some(parent) = base.parents.first() {
            push_entry(&mut out, &parent.sha, &parent.html_url, &base.commit.message);
        }
    }
    out
}

/// Changelog source backed by the GitHub REST API.
pub struct GithubChangelog {
    api_base: String,
    token: Option<String>,
    http_client: reqwest::Client,
}

impl GithubChangelog {
    pub fn new(api_base: impl Into<String>, token: Option<String>) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("gox-forge/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            api_base: api_base.into().trim_end_matches('/').to_string(),
            token,
            http_client,
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T> {
        debug!(url, "changelog request");
        let mut request = self
            .http_client
            .get(url)
            .header("Accept", "application/vnd.github+json");
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ForgeError::Http(format!("GET {url} returned {status}")));
        }
        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    pub async fn list_releases(&self, owner: &str, repo: &str) -> Result<Vec<ReleaseRef>> {
        let url = format!("{}/repos/{}/{}/releases", self.api_base, owner, repo);
        self.get_json(&url).await
    }

    pub async fn compare(
        &self,
        owner: &str,
        repo: &str,
        base: &str,
        head: &str,
    ) -> Result<CompareResult> {
        let url = format!(
            "{}/repos/{}/{}/compare/{}...{}",
            self.api_base, owner, repo, base, head
        );
        self.get_json(&url).await
    }
}

#[async_trait]
impl ChangelogSource for GithubChangelog {
    async fn generate(&self, package: &str) -> Result<String> {
        let (owner, repo) = parse_repo(package)?;
        let releases = self.list_releases(owner, repo).await?;
        let base = select_base_release(&releases)
            .ok_or_else(|| ForgeError::Changelog(format!("no releases found for {package}")))?;
        let compare = self
            .compare(owner, repo, &base.tag_name, &base.target_commitish)
            .await?;
        Ok(render_changelog(&compare))
    }
}

/// Changelog source that always yields the same text.
#[derive(Debug, Clone, Default)]
pub struct StaticChangelog(pub String);

#[async_trait]
impl ChangelogSource for StaticChangelog {
    async fn generate(&self, _package: &str) -> Result<String> {
        Ok(self.0.clone())
    }
}
