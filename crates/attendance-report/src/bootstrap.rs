use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Application directory under the user's home.
pub const APP_DIR_NAME: &str = ".attendance-report";

/// Store used when nothing else is found, relative to the working directory.
pub const LOCAL_STORE_DIR: &str = "attendance";

fn app_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME)
}

// ── Directory bootstrap ────────────────────────────────────────────────────────

/// Ensure the `~/.attendance-report/` directory hierarchy exists.
///
/// Creates the following directories if absent (including any missing parents):
/// - `~/.attendance-report/`
/// - `~/.attendance-report/logs/`
/// - `~/.attendance-report/data/`
pub fn ensure_directories() -> anyhow::Result<()> {
    let dir = app_dir();
    std::fs::create_dir_all(&dir)?;
    std::fs::create_dir_all(dir.join("logs"))?;
    std::fs::create_dir_all(dir.join("data"))?;
    Ok(())
}

// ── Logging bootstrap ──────────────────────────────────────────────────────────

/// Map a Python-style level name onto a tracing filter directive.
pub fn filter_directive(log_level: &str) -> String {
    match log_level.to_uppercase().as_str() {
        "DEBUG" | "CRITICAL" => "debug".to_string(),
        "INFO" => "info".to_string(),
        "WARNING" => "warn".to_string(),
        "ERROR" => "error".to_string(),
        _ => log_level.to_lowercase(),
    }
}

/// Initialise the global `tracing` subscriber.
///
/// `log_level` is mapped to a [`tracing_subscriber::EnvFilter`] directive,
/// falling back to `"info"` if it is not recognised. With `log_file` set,
/// output is appended to that file instead of stderr so it does not draw
/// over the TUI.
pub fn setup_logging(log_level: &str, log_file: Option<&PathBuf>) -> anyhow::Result<()> {
    let filter = EnvFilter::try_new(filter_directive(log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let (stderr_layer, file_layer) = match log_file {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            let layer = fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_writer(Mutex::new(file));
            (None, Some(layer))
        }
        None => {
            let layer = fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_writer(std::io::stderr);
            (Some(layer), None)
        }
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()?;

    Ok(())
}

// ── Data-path discovery ────────────────────────────────────────────────────────

fn has_entries(dir: &Path) -> bool {
    std::fs::read_dir(dir)
        .map(|mut entries| entries.next().is_some())
        .unwrap_or(false)
}

/// Locate the attendance store.
///
/// Checks in order:
/// 1. `explicit` (from `--data-path` or last-used), used as given.
/// 2. `~/.attendance-report/data/` if it holds anything.
/// 3. `./attendance/` if it is a directory.
///
/// Falls back to `~/.attendance-report/data/`.
pub fn discover_data_path(explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }
    let home_store = app_dir().join("data");
    if has_entries(&home_store) {
        return home_store;
    }
    let local = PathBuf::from(LOCAL_STORE_DIR);
    if local.is_dir() {
        return local;
    }
    home_store
}

// ── Tests ──────────────────────────────────────────────────────────────────────
