//! Gox-Release: release channel contract for gox-forge
//!
//! A release channel hosts versioned, downloadable artifacts. The build
//! orchestrator only ever talks to it through two calls:
//!
//! - `Releaser::setup` creates the remote release entry for a package/version
//!   and returns a handle.
//! - `Release::upload` attaches one compressed artifact to that release.
//!
//! Concrete hosting providers live outside this workspace. In-memory fakes are
//! provided for testing via the `fakes` module.

pub mod channel;
mod error;
pub mod fakes;

pub use channel::{Release, Releaser, Releasers};
pub use error::{ReleaseError, ReleaseResult};
