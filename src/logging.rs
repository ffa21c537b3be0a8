//! Logging setup for the `piclib` binary.
//!
//! The library itself only emits `tracing` events; nothing is written
//! anywhere until a caller installs a subscriber, which is what [`init`] does
//! for the command-line tool.
//!
//! Log level is controlled via the `PICLIB_LOG` environment variable:
//! - `PICLIB_LOG=debug` shows duplicates and decode warnings
//! - `PICLIB_LOG=info` shows repairs and ingest summaries
//! - `PICLIB_LOG=warn` (default)

use anyhow::Result;
use std::path::Path;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LogTarget;

pub const LOG_ENV: &str = "PICLIB_LOG";

static GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();

/// Initialize the global subscriber. `default_level` applies when
/// `PICLIB_LOG` is unset.
pub fn init(target: LogTarget, log_dir: &Path, default_level: &str) -> Result<()> {
    let env_filter =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_level));

    match target {
        LogTarget::Journald => {
            #[cfg(target_os = "linux")]
            {
                if let Ok(journald_layer) = tracing_journald::layer() {
                    tracing_subscriber::registry()
                        .with(env_filter)
                        .with(journald_layer)
                        .try_init()?;
                    return Ok(());
                }
            }
            init_stderr(env_filter)?;
            tracing::warn!("journald unavailable, logging to stderr");
        }
        LogTarget::File => {
            std::fs::create_dir_all(log_dir)?;
            let file_appender = tracing_appender::rolling::daily(log_dir, "piclib.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            // Dropping the guard stops the writer thread.
            let _ = GUARD.set(guard);

            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
                .try_init()?;
        }
        LogTarget::Stderr => init_stderr(env_filter)?,
    }
    Ok(())
}

fn init_stderr(env_filter: EnvFilter) -> Result<()> {
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(std::io::stderr).without_time())
        .try_init()?;
    Ok(())
}
