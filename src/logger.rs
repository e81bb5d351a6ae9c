//! Session logger: the `log` backend that writes every record to one file.
//!
//! The file is **truncated (overwritten) at each launch**, so it only ever
//! contains output from the most-recent session.
//!
//! Default location:
//!   Windows:  `%APPDATA%\dctpaint\dctpaint.log`
//!   Linux:    `~/.local/share/dctpaint/dctpaint.log`
//!   macOS:    `~/Library/Application Support/dctpaint/dctpaint.log`
//!
//! `LogSettings::path` overrides it.  Library code logs through the `log`
//! macros; nothing is written until [`init`] has installed the backend.
//! Panics are mirrored into the file by a hook installed alongside.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};
use std::time::{SystemTime, UNIX_EPOCH};

use log::{LevelFilter, Log, Metadata, Record};

use crate::config::LogSettings;

const APP_DIR: &str = "dctpaint";
const LOG_FILE_NAME: &str = "dctpaint.log";

struct SessionLogger {
    file: Mutex<File>,
    path: PathBuf,
    level: LevelFilter,
}

/// Set only once the backend is registered with `log`.
static LOGGER: OnceLock<&'static SessionLogger> = OnceLock::new();

impl Log for SessionLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = format_line(&timestamp(), record.level().as_str(), record.target(), &record.args().to_string());
        self.write_line(&line);
    }

    fn flush(&self) {
        if let Ok(mut file) = self.file.lock() {
            let _ = file.flush();
        }
    }
}

impl SessionLogger {
    /// Silently ignores I/O errors so that logging never crashes the caller.
    fn write_line(&self, line: &str) {
        if let Ok(mut file) = self.file.lock() {
            let _ = writeln!(file, "{}", line);
        }
    }
}

/// Returns the path to the current session log file.
pub fn log_path() -> Option<&'static Path> {
    LOGGER.get().map(|l| l.path.as_path())
}

/// Write an untagged line to the session log, if one is open.
pub fn write_line(line: &str) {
    if let Some(logger) = LOGGER.get() {
        logger.write_line(line);
    }
}

/// Initialise the session logger.
///
/// * Creates (or truncates) the log file.
/// * Registers it as the `log` backend with `settings.level` as max level.
/// * Installs a panic hook that writes the panic message to the log before
///   propagating to the default handler.
///
/// Only the first successful call does anything; later sequential calls
/// return the same path.  Two threads racing through the first call may
/// both open a file, and the loser gets `None` even though a backend is
/// installed.  Returns `None` when the file cannot be opened or another
/// `log` backend is already registered.
pub fn init(settings: &LogSettings) -> Option<&'static Path> {
    if let Some(path) = log_path() {
        return Some(path);
    }

    let path = settings.path.clone().unwrap_or_else(default_log_path);
    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }

    let file = match OpenOptions::new().create(true).write(true).truncate(true).open(&path) {
        Ok(f) => f,
        Err(e) => {
            // Can't open log file; not fatal, just skip
            eprintln!("[logger] Failed to open log file {:?}: {}", path, e);
            return None;
        }
    };

    let logger: &'static SessionLogger = Box::leak(Box::new(SessionLogger {
        file: Mutex::new(file),
        path,
        level: settings.level,
    }));
    if log::set_logger(logger).is_err() {
        eprintln!("[logger] another log backend is already installed; session file unused");
        return None;
    }
    let _ = LOGGER.set(logger);
    log::set_max_level(logger.level);

    logger.write_line(&format!("=== dctpaint session started {} ===", human_timestamp()));
    logger.write_line(&format!("Log file: {}", logger.path.display()));
    logger.write_line("");

    let prev = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        write_line(&format_line(&timestamp(), "PANIC", "panic", &info.to_string()));
        prev(info);
    }));

    Some(logger.path.as_path())
}

/// `[HH:MM:SS] [LEVEL] target: message`
fn format_line(ts: &str, level: &str, target: &str, msg: &str) -> String {
    format!("[{}] [{}] {}: {}", ts, level, target, msg)
}

pub fn default_log_path() -> PathBuf {
    data_dir().join(APP_DIR).join(LOG_FILE_NAME)
}

/// Platform data directory (without the app sub-folder).
fn data_dir() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        if let Ok(appdata) = std::env::var("APPDATA") {
            return PathBuf::from(appdata);
        }
    }
    #[cfg(target_os = "macos")]
    {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join("Library").join("Application Support");
        }
    }
    // Linux / fallback
    if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
        return PathBuf::from(xdg);
    }
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".local").join("share");
    }
    // Last resort: current working directory
    PathBuf::from(".")
}

fn timestamp() -> String {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(d) => clock_time(d.as_secs()),
        Err(_) => "??:??:??".to_string(),
    }
}

/// HH:MM:SS within the UTC day.
fn clock_time(secs: u64) -> String {
    let h = (secs % 86400) / 3600;
    let m = (secs % 3600) / 60;
    let s = secs % 60;
    format!("{:02}:{:02}:{:02}", h, m, s)
}

fn human_timestamp() -> String {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(d) => format!("(unix {})", d.as_secs()),
        Err(_) => "(unknown time)".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_time_wraps_at_midnight() {
        assert_eq!(clock_time(0), "00:00:00");
        assert_eq!(clock_time(3_661), "01:01:01");
        assert_eq!(clock_time(86_400 + 59), "00:00:59");
    }

    #[test]
    fn line_format_carries_level_and_target() {
        let line = format_line("12:00:00", "WARN", "dctpaint::sync", "dct propagation aborted");
        assert_eq!(line, "[12:00:00] [WARN] dctpaint::sync: dct propagation aborted");
    }

    #[test]
    fn default_path_ends_in_app_folder() {
        let path = default_log_path();
        assert!(path.ends_with(Path::new(APP_DIR).join(LOG_FILE_NAME)));
    }

    // The backend is process-global, so the whole init lifecycle lives in
    // one test.
    #[test]
    fn init_truncates_file_and_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("session.log");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "stale line from a previous session\n").unwrap();

        let settings = LogSettings {
            level: LevelFilter::Debug,
            path: Some(path.clone()),
        };
        let Some(opened) = init(&settings) else {
            // Some other backend already owns this process.
            return;
        };
        assert_eq!(opened, path.as_path());
        assert_eq!(init(&LogSettings::default()), Some(path.as_path()));

        log::debug!("marker {}", 42);
        log::trace!("below max level");
        log::logger().flush();

        let text = fs::read_to_string(&path).unwrap();
        assert!(!text.contains("stale line"));
        assert!(text.contains("=== dctpaint session started"));
        assert!(text.contains("[DEBUG]"));
        assert!(text.contains("marker 42"));
        assert!(!text.contains("below max level"));
    }
}
