//! Tracing initialisation for gox-forge binaries.
//!
//! Toolchain and VCS output is logged at `debug`, so `-v` is what surfaces
//! the `go build -v` package list. Only the first call installs a subscriber.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Log line format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    /// Newline-delimited JSON, for log shipping.
    Json,
}

/// Filter directive used when `RUST_LOG` is unset.
pub fn default_directive(verbose: bool) -> String {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    // dependency crates stay at warn so HTTP client chatter does not drown job logs
    format!("warn,gox_core={level},goxd={level}").to_lowercase()
}

/// Install the global subscriber. `RUST_LOG` overrides `verbose`.
pub fn init_tracing(format: LogFormat, verbose: bool) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));

    let registry = tracing_subscriber::registry().with(env_filter);
    let installed = match format {
        LogFormat::Json => registry
            .with(fmt::layer().with_target(false).json())
            .try_init(),
        LogFormat::Pretty => registry.with(fmt::layer().with_target(false)).try_init(),
    };
    installed.ok();
}
