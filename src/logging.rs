//! Logging infrastructure for asktag.
//!
//! Provides structured file logging with daily rotation to platform-standard directories.
//! Nothing is written to the terminal, which carries the rendered replies.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use directories::ProjectDirs;
use tracing::{debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, Registry, reload};

/// Log file name prefix; the appender adds the date.
const LOG_FILE_PREFIX: &str = "asktag";

const RETENTION_DAYS: u64 = 7;

/// Level used until config has been read.
const STARTUP_LEVEL: &str = "info";

/// Handle for swapping the filter after the subscriber is installed.
pub type ReloadHandle = reload::Handle<EnvFilter, Registry>;

/// Result of initializing the logging system.
pub struct LoggingContext {
    /// Guard that must be held for the application lifetime to ensure logs are flushed.
    pub _guard: WorkerGuard,
    /// The session ID for this invocation.
    pub session_id: String,
    /// The directory where logs are written.
    pub log_directory: PathBuf,
    /// Swaps the level once config is loaded.
    pub level_handle: ReloadHandle,
    /// `RUST_LOG` was set; it wins over the configured level.
    pub env_filter_set: bool,
}

/// Error that occurred during logging initialization.
#[derive(Debug)]
pub struct LoggingError {
    pub message: String,
}

impl std::fmt::Display for LoggingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Generates a 6-character random hex session ID.
fn generate_session_id() -> String {
    use rand::Rng;
    let mut rng = rand::rng();
    let bytes: [u8; 3] = rng.random();
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Initializes the logging system at `info`, or at `RUST_LOG` when set.
///
/// Runs before config is read so config warnings reach the log file. Apply
/// the configured level afterwards with [`apply_configured_level`].
/// The returned `WorkerGuard` must be held for the application lifetime.
pub fn init() -> Result<LoggingContext, LoggingError> {
    let session_id = generate_session_id();
    let log_dir = log_directory()?;

    fs::create_dir_all(&log_dir).map_err(|e| LoggingError {
        message: format!("Failed to create log directory: {}", e),
    })?;

    let file_appender = tracing_appender::rolling::daily(&log_dir, LOG_FILE_PREFIX);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let (env_filter, env_filter_set) = match EnvFilter::try_from_default_env() {
        Ok(filter) => (filter, true),
        Err(_) => (EnvFilter::new(STARTUP_LEVEL), false),
    };
    let (filter_layer, level_handle) = reload::Layer::new(env_filter);

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_span_events(FmtSpan::NONE)
        .with_target(true);

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| LoggingError {
            message: format!("Failed to install log subscriber: {}", e),
        })?;

    info!(session_id = %session_id, "session_start");

    Ok(LoggingContext {
        _guard: guard,
        session_id,
        log_directory: log_dir,
        level_handle,
        env_filter_set,
    })
}

/// Replaces the active filter with `level`.
pub fn update_log_level(handle: &ReloadHandle, level: &str) -> Result<(), LoggingError> {
    let filter = EnvFilter::try_new(level).map_err(|e| LoggingError {
        message: format!("Invalid log level `{}`: {}", level, e),
    })?;
    handle.reload(filter).map_err(|e| LoggingError {
        message: format!("Failed to update log level: {}", e),
    })
}

/// Applies the level from config unless `RUST_LOG` already chose one.
pub fn apply_configured_level(ctx: &LoggingContext, level: &str) {
    if ctx.env_filter_set || level == STARTUP_LEVEL {
        return;
    }
    match update_log_level(&ctx.level_handle, level) {
        Ok(()) => debug!(level = %level, "log_level_updated"),
        Err(e) => warn!(error = %e, "log_level_update_failed"),
    }
}

/// Platform log directory.
///
/// macOS: ~/Library/Logs/asktag/
/// Linux: ~/.local/state/asktag/
/// Windows: %LocalAppData%\asktag\
fn log_directory() -> Result<PathBuf, LoggingError> {
    let project_dirs = ProjectDirs::from("dev", "asktag", "asktag").ok_or_else(|| LoggingError {
        message: "Failed to determine platform directories".to_string(),
    })?;

    if cfg!(target_os = "macos") {
        dirs::home_dir().map(|home| home.join("Library").join("Logs").join("asktag"))
    } else {
        project_dirs
            .state_dir()
            .map(PathBuf::from)
            .or_else(|| Some(project_dirs.data_local_dir().to_path_buf()))
    }
    .ok_or_else(|| LoggingError {
        message: "Failed to determine log directory".to_string(),
    })
}

/// Rotated log files look like `asktag.2026-10-18`.
fn is_rotated_log(file_name: &str) -> bool {
    file_name
        .strip_prefix(LOG_FILE_PREFIX)
        .is_some_and(|rest| rest.len() > 1 && rest.starts_with('.'))
}

/// Cleans up log files older than the retention period.
///
/// Errors are logged at WARN level but never stop the command.
pub fn cleanup_old_logs(log_dir: &Path) {
    let retention = Duration::from_secs(RETENTION_DAYS * 24 * 60 * 60);
    let deleted = remove_logs_older_than(log_dir, retention, SystemTime::now());
    if deleted > 0 {
        debug!(count = deleted, "Log cleanup completed");
    }
}

fn remove_logs_older_than(log_dir: &Path, retention: Duration, now: SystemTime) -> u32 {
    let entries = match fs::read_dir(log_dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(error = %e, "Failed to read log directory for cleanup");
            return 0;
        }
    };

    let mut deleted_count = 0u32;

    for entry in entries.filter_map(Result::ok) {
        let path = entry.path();

        let file_name = match path.file_name().and_then(|n| n.to_str()) {
            Some(name) if is_rotated_log(name) => name.to_string(),
            _ => continue,
        };

        let modified = match fs::metadata(&path).and_then(|m| m.modified()) {
            Ok(t) => t,
            Err(e) => {
                warn!(file = %file_name, error = %e, "Failed to get modification time for log file");
                continue;
            }
        };

        let age = match now.duration_since(modified) {
            Ok(d) => d,
            Err(_) => continue, // File is in the future, skip
        };

        if age > retention {
            match fs::remove_file(&path) {
                Ok(()) => {
                    debug!(file = %file_name, age_days = age.as_secs() / 86400, "Deleted old log file");
                    deleted_count += 1;
                }
                Err(e) => {
                    warn!(file = %file_name, error = %e, "Failed to delete old log file");
                }
            }
        }
    }

    deleted_count
}

/// Runs `f` under a scoped subscriber at `info` and returns what it logged.
#[cfg(test)]
pub(crate) fn capture_logs<F: FnOnce(&ReloadHandle)>(f: F) -> String {
    use std::io;
    use std::sync::{Arc, Mutex};

    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, data: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(data);
            Ok(data.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    let buf = Arc::new(Mutex::new(Vec::new()));
    let writer = {
        let buf = Arc::clone(&buf);
        move || Captured(Arc::clone(&buf))
    };
    let (filter, handle) = reload::Layer::new(EnvFilter::new(STARTUP_LEVEL));
    let subscriber = tracing_subscriber::registry().with(filter).with(
        tracing_subscriber::fmt::layer()
            .with_writer(writer)
            .with_ansi(false),
    );

    tracing::subscriber::with_default(subscriber, || f(&handle));

    let bytes = buf.lock().unwrap().clone();
    String::from_utf8_lossy(&bytes).into_owned()
}
