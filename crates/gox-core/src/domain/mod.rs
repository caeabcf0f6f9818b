//! Domain models for gox-forge.
//!
//! - `Compilation`: one build job and its accumulating artifact list
//! - `Platform`: an OS/architecture pair

pub mod compilation;

pub use compilation::{
    artifact_name, compressed_name, Compilation, Platform, DEFAULT_COMMIT_VAR, WINDOWS,
};
