// src/logging.rs
//
// Timestamped stderr logging with an optional mirror to a log file.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Global log file handle. When `Some`, `tlog!` writes to both stderr and this file.
pub(crate) static LOG_FILE: Mutex<Option<std::fs::File>> = Mutex::new(None);

/// Timestamped logging macro.
/// Prepends `HH:MM:SS.mmm` local time to every message written to stderr.
/// Also writes to the log file when file logging is enabled.
macro_rules! tlog {
    ($($arg:tt)*) => {{
        use std::io::Write as _;
        let msg = format!("{} {}", chrono::Local::now().format("%H:%M:%S%.3f"), format_args!($($arg)*));
        eprintln!("{}", msg);
        if let Ok(mut guard) = $crate::logging::LOG_FILE.lock() {
            if let Some(ref mut f) = *guard {
                let _ = writeln!(f, "{}", msg);
            }
        }
    }};
}

const LOG_LINK_NAME: &str = "switchboard.log";
const LOG_FILE_SUFFIX: &str = "-switchboard.log";

/// Per-run log files kept in the log directory, newest first.
pub const MAX_LOG_FILES: usize = 10;

/// Initialise file logging to the given directory.
/// Creates a timestamped log file and a `switchboard.log` symlink (Unix only),
/// then prunes older runs down to `MAX_LOG_FILES`.
/// Returns the path of the new log file.
pub fn init_file_logging(log_dir: &Path) -> Result<PathBuf, String> {
    std::fs::create_dir_all(log_dir)
        .map_err(|e| format!("Failed to create log dir: {}", e))?;

    let filename = chrono::Local::now()
        .format("%Y%m%d-%H%M%S")
        .to_string()
        + LOG_FILE_SUFFIX;
    let log_path = log_dir.join(&filename);

    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .map_err(|e| format!("Failed to create log file: {}", e))?;

    // Windows symlinks require elevated privileges
    #[cfg(unix)]
    {
        let symlink_path = log_dir.join(LOG_LINK_NAME);
        let _ = std::fs::remove_file(&symlink_path);
        if let Err(e) = std::os::unix::fs::symlink(&filename, &symlink_path) {
            eprintln!(
                "{} [logging] Failed to create {} symlink: {}",
                chrono::Local::now().format("%H:%M:%S%.3f"),
                LOG_LINK_NAME,
                e
            );
        }
    }

    if let Ok(mut guard) = LOG_FILE.lock() {
        *guard = Some(file);
    }

    let removed = prune_old_logs(log_dir, MAX_LOG_FILES);

    tlog!(
        "[logging] File logging started: {} ({} old run(s) pruned)",
        log_path.display(),
        removed
    );

    Ok(log_path)
}

/// Delete the oldest per-run log files so at most `keep` remain.
/// Timestamped names sort chronologically. Returns how many were removed.
pub fn prune_old_logs(log_dir: &Path, keep: usize) -> usize {
    let mut runs: Vec<PathBuf> = match std::fs::read_dir(log_dir) {
        Ok(entries) => entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                path.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.ends_with(LOG_FILE_SUFFIX))
            })
            .collect(),
        Err(_) => return 0,
    };
    if runs.len() <= keep {
        return 0;
    }

    runs.sort();
    let excess = runs.len() - keep;
    runs.iter()
        .take(excess)
        .filter(|path| std::fs::remove_file(path).is_ok())
        .count()
}

/// Stop file logging and close the log file.
pub fn stop_file_logging() {
    if let Ok(mut guard) = LOG_FILE.lock() {
        if guard.is_some() {
            *guard = None;
            eprintln!(
                "{} [logging] File logging stopped",
                chrono::Local::now().format("%H:%M:%S%.3f")
            );
        }
    }
}

/// Whether a log file is currently attached.
pub fn file_logging_active() -> bool {
    LOG_FILE.lock().map(|guard| guard.is_some()).unwrap_or(false)
}
