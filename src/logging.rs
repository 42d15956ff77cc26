//! Logging setup
//!
//! The TUI owns the terminal, so interactive sessions log to a file in the
//! cache directory. Print mode logs to stderr. `RUST_LOG` overrides the
//! default `info` filter in both cases.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use env_logger::{Env, Target};

/// Log file name inside the cache directory
const LOG_FILE_NAME: &str = "cumbre.log";

/// Where log records go
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    Stderr,
    File(PathBuf),
    /// Drop every record
    Discard,
}

/// Returns `~/.cache/cumbre/cumbre.log` on Linux, or the platform equivalent
///
/// Returns `None` if the cache directory cannot be determined (e.g., no home directory).
pub fn default_log_path() -> Option<PathBuf> {
    let project_dirs = ProjectDirs::from("", "", "cumbre")?;
    Some(project_dirs.cache_dir().join(LOG_FILE_NAME))
}

/// Opens a log file for appending, creating its directory if missing
pub fn open_log_file(path: &Path) -> io::Result<File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}

/// Installs the global logger
///
/// A file target that cannot be opened falls back to discarding records
/// rather than writing over the TUI.
pub fn init(target: LogTarget) {
    let mut builder = env_logger::Builder::from_env(Env::default().default_filter_or("info"));

    match target {
        LogTarget::Stderr => {
            builder.target(Target::Stderr);
        }
        LogTarget::File(path) => match open_log_file(&path) {
            Ok(file) => {
                builder.target(Target::Pipe(Box::new(file)));
            }
            Err(_) => {
                builder.target(Target::Pipe(Box::new(io::sink())));
            }
        },
        LogTarget::Discard => {
            builder.target(Target::Pipe(Box::new(io::sink())));
        }
    }

    let _ = builder.try_init();
}
