//! Log routing for the server and operator CLI.
//!
//! Pipeline events (uploads, promotions, copy polling, indexer refreshes) are written to stdout in
//! compact form and mirrored to a log file with their module targets, so a promotion batch can be
//! traced per document after the fact. `DOCQNA_LOG_FILE` selects the file; without it the log
//! lands in `logs/docqna.log`. HTTP client chatter from `hyper`, `reqwest`, and `object_store` is
//! held at `warn` unless `RUST_LOG` says otherwise.
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const LOG_FILE_ENV: &str = "DOCQNA_LOG_FILE";
const DEFAULT_LOG_PATH: &str = "logs/docqna.log";
const DEFAULT_FILTER: &str = "info,hyper=warn,reqwest=warn,object_store=warn";

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Install the stdout and file subscribers.
///
/// Calling this again keeps the first subscriber and reports the conflict on stderr.
pub fn init_tracing() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(false).compact());

    let path = log_path(std::env::var_os(LOG_FILE_ENV).map(PathBuf::from));
    let result = if let Some(writer) = open_log_writer(&path) {
        let file_layer = fmt::layer()
            .with_writer(writer)
            .with_target(true)
            .with_ansi(false)
            .compact();
        registry.with(file_layer).try_init()
    } else {
        registry.try_init()
    };

    if let Err(err) = result {
        eprintln!("Tracing already initialized: {err}");
    }
}

fn log_path(explicit: Option<PathBuf>) -> PathBuf {
    explicit
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_PATH))
}

/// Open `path` for appending behind a non-blocking writer. Failures fall back to stdout only.
fn open_log_writer(path: &Path) -> Option<NonBlocking> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
        && let Err(err) = std::fs::create_dir_all(parent)
    {
        eprintln!("Failed to create log directory {}: {err}", parent.display());
        return None;
    }
    match OpenOptions::new().create(true).append(true).open(path) {
        Ok(file) => {
            let (writer, guard) = tracing_appender::non_blocking(file);
            let _ = LOG_GUARD.set(guard);
            Some(writer)
        }
        Err(err) => {
            eprintln!("Failed to open log file {}: {err}", path.display());
            None
        }
    }
}
