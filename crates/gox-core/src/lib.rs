//! gox-forge core library
//!
//! Drives a single compilation job: prepares a workspace, optionally pins the
//! source to a commit, cross-compiles every (sub-target × platform) cell with
//! injected linker variables, gzips the artifacts, optionally publishes them to
//! a release channel and records each completed artifact on the job.

pub mod changelog;
pub mod config;
pub mod domain;
pub mod error;
pub mod flags;
pub mod matrix;
pub mod obs;
pub mod progress;
pub mod publisher;
pub mod telemetry;
pub mod toolchain;
pub mod workspace;

pub use changelog::{
    parse_repo, render_changelog, select_base_release, ChangelogSource, CompareResult,
    GithubChangelog, ReleaseRef, StaticChangelog,
};
pub use config::ForgeConfig;
pub use domain::{artifact_name, compressed_name, Compilation, Platform};
pub use error::{ForgeError, Result};
pub use flags::{LinkerFlag, LinkerFlags};
pub use matrix::{build_env, plan, Compiler, MatrixCell};
pub use progress::{ChannelObserver, NoopObserver, ProgressEvent, ProgressObserver};
pub use publisher::{PublishOutcome, ReleasePublisher};
pub use toolchain::{BuildRequest, GoToolchain, SourceControl, SystemGit, Toolchain};
pub use workspace::{PinOutcome, Workspace};

pub use gox_release::{Release, ReleaseError, Releaser, Releasers};
