//! # Logging Initialization
//!
//! Sets up the global `tracing` subscriber exactly once per process.
//!
//! - **Filter**: taken from `RUST_LOG` when set, otherwise `{level},umlgate=debug`.
//! - **File logging** (`log_to_file = true`): a daily rolling `umlgate.log` in the
//!   user cache directory (via the `directories` crate), written through a
//!   non-blocking `tracing_appender` writer without ANSI colors.
//! - **Stderr logging** (`log_to_file = false`, or when the cache directory is not
//!   available): colored output on stderr.
//!
//! Stdout is never used for logs; the CLI writes rendered diagrams there.
//!
//! For terminal debugging: `init_logging("debug", false)`.
//! For a long-running service: `init_logging("info", true)`.

use anyhow::Result;
use directories::ProjectDirs;
use std::{io::stderr, path::Path, sync::Once};
use tracing_subscriber::{EnvFilter, fmt::layer, prelude::*};

static INIT: Once = Once::new();

pub const LOG_FILE_PREFIX: &str = "umlgate.log";

pub fn init_test_logging() {
    let _ = init_logging("trace", false);
}

/// Directory used for log files, if the platform has a cache directory.
pub fn log_dir() -> Option<std::path::PathBuf> {
    ProjectDirs::from("com", "Umlgate", "umlgate").map(|dirs| dirs.cache_dir().to_path_buf())
}

/// Initializes the logging system. Later calls are no-ops.
///
/// # Errors
///
/// Currently infallible; the `Result` leaves room for stricter setups.
pub fn init_logging(log_level: &str, log_to_file: bool) -> Result<()> {
    INIT.call_once(|| {
        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(format!("{log_level},umlgate=debug")));

        if log_to_file {
            if let Some(dir) = log_dir() {
                if let Some(writer) = file_writer(&dir) {
                    let _ = tracing_subscriber::registry()
                        .with(env_filter)
                        .with(layer().with_writer(writer).with_ansi(false))
                        .try_init();
                    return;
                }
            }
        }

        let _ = tracing_subscriber::registry()
            .with(env_filter)
            .with(layer().with_writer(stderr).with_ansi(true))
            .try_init();
    });

    Ok(())
}

/// Non-blocking daily rolling writer in `dir`, or `None` when the directory
/// cannot be created or the appender cannot be opened.
fn file_writer(dir: &Path) -> Option<tracing_appender::non_blocking::NonBlocking> {
    std::fs::create_dir_all(dir).ok()?;
    let appender =
        std::panic::catch_unwind(|| tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX)).ok()?;
    let (non_blocking, guard) = tracing_appender::non_blocking(appender);
    // Leaked so buffered lines are flushed at exit.
    Box::leak(Box::new(guard));
    Some(non_blocking)
}
