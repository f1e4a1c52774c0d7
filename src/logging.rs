//! Tracing subscriber setup for hosts embedding the engine.
//!
//! The library itself only emits `tracing` events; a host calls one of these
//! once at startup. `RUST_LOG` always takes precedence over the default
//! filter.

use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Log file name prefix used by [`init_with_file`].
pub const LOG_FILE_PREFIX: &str = "colorpipe.log";

fn env_filter(default_filter: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter))
}

/// Install a stderr formatter. Returns `false` if a global subscriber was
/// already set.
pub fn init(default_filter: &str) -> bool {
    tracing_subscriber::registry()
        .with(env_filter(default_filter))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init()
        .is_ok()
}

/// Install a stderr formatter plus a daily rolling file in `dir`.
///
/// The returned guard flushes the file writer on drop and must be kept alive
/// for as long as logging is needed.
pub fn init_with_file(dir: impl AsRef<Path>, default_filter: &str) -> WorkerGuard {
    let appender = tracing_appender::rolling::daily(dir.as_ref(), LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let installed = tracing_subscriber::registry()
        .with(env_filter(default_filter))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer),
        )
        .try_init()
        .is_ok();
    if !installed {
        tracing::debug!("Global subscriber already set, file logging not installed");
    }
    guard
}
