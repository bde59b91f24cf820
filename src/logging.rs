//! File logging for movie-search
//!
//! stdout belongs to the line-command front end, so tracing output goes to a
//! daily file under the log directory instead.

use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

pub const DEFAULT_LOG_DIR: &str = ".logs";
const ENV_LOG_DIR: &str = "MOVIE_SEARCH_LOG_DIR";
const LOG_FILE_PREFIX: &str = "movie-search";
const DEFAULT_FILTER: &str = "movie_search=debug,reqwest=info,warn";

/// Log directory from `MOVIE_SEARCH_LOG_DIR`, or `.logs`
pub fn log_dir() -> PathBuf {
    log_dir_from(|key| std::env::var(key).ok())
}

fn log_dir_from(lookup: impl Fn(&str) -> Option<String>) -> PathBuf {
    lookup(ENV_LOG_DIR)
        .filter(|dir| !dir.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_DIR))
}

/// Install the global subscriber writing to `<dir>/movie-search.YYYY-MM-DD.log`.
///
/// `RUST_LOG` overrides the default filter (`movie_search` at DEBUG, `reqwest`
/// at INFO, everything else at WARN). Buffered lines are flushed when the
/// returned guard drops, so keep it alive until shutdown.
pub fn init_logging(dir: &Path) -> anyhow::Result<WorkerGuard> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("cannot create log directory {}", dir.display()))?;

    let appender = RollingFileAppender::new(Rotation::DAILY, dir, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let fmt_layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE); // fetch spans report their duration

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .context("a global tracing subscriber is already installed")?;

    tracing::info!(dir = %dir.display(), "Logging initialized");

    Ok(guard)
}

/// Log the result of a backend call, with its duration since `$started`
#[macro_export]
macro_rules! log_api_result {
    ($operation:expr, $result:expr, $started:expr) => {
        let elapsed_ms = $started.elapsed().as_millis() as u64;
        match &$result {
            Ok(_) => tracing::info!(operation = $operation, elapsed_ms, "API request successful"),
            Err(e) => tracing::error!(operation = $operation, elapsed_ms, error = %e, "API request failed"),
        }
    };
}

/// Log the start of a backend call with its request fields
#[macro_export]
macro_rules! log_api_request {
    ($operation:expr, $($field:tt)*) => {
        tracing::debug!(operation = $operation, $($field)*, "API request started");
    };
}
