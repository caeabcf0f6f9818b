//! Structured observability hooks for compilation job lifecycle events.
//!
//! This module provides:
//! - A job-scoped tracing span, attached with `tracing::Instrument`
//! - Emission functions for key lifecycle events: job start/finish, artifact
//!   completion or skip, release setup and upload
//!
//! Events are emitted at `info!` level; skips and failures at `warn!`.

use tracing::{info, warn};

/// Span tagged with the job id and package.
pub fn job_span(job_id: &str, package: &str) -> tracing::Span {
    tracing::info_span!("gox.job", job_id = %job_id, package = %package)
}

/// Emit event: job started.
pub fn emit_job_started(job_id: &str, package: &str, version: &str, cells: usize) {
    info!(
        event = "job.started",
        job_id = %job_id,
        package = %package,
        version = %version,
        cells = cells,
    );
}

/// Emit event: job finished.
pub fn emit_job_finished(job_id: &str, duration_ms: u64, artifacts: usize, success: bool) {
    info!(
        event = "job.finished",
        job_id = %job_id,
        duration_ms = duration_ms,
        artifacts = artifacts,
        success = success,
    );
}

/// Emit event: an artifact was persisted and recorded.
pub fn emit_artifact_compiled(file: &str, size: usize, sha256: &str) {
    info!(event = "artifact.compiled", file = %file, size = size, sha256 = %sha256);
}

/// Emit event: a matrix cell did not produce an artifact.
pub fn emit_artifact_skipped(target: &str, platform: &str, reason: &dyn std::fmt::Display) {
    warn!(
        event = "artifact.skipped",
        sub_target = %target,
        platform = %platform,
        reason = %reason,
    );
}

/// Emit event: release setup attempted.
pub fn emit_release_setup(releaser: &str, package: &str, version: &str, success: bool) {
    info!(
        event = "release.setup",
        releaser = %releaser,
        package = %package,
        version = %version,
        success = success,
    );
}

/// Emit event: asset uploaded to a release.
pub fn emit_release_uploaded(releaser: &str, file: &str) {
    info!(event = "release.uploaded", releaser = %releaser, file = %file);
}
