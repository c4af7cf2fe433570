use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};

/// Filesystem-safe timestamp used for console log names and backup
/// directories. Colons are not portable across filesystems, so time
/// components are dash-separated.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H-%M-%S";

pub fn fs_timestamp(now: DateTime<Local>) -> String {
    now.format(TIMESTAMP_FORMAT).to_string()
}

/// Lifecycle artifact locations under one server's working directory.
///
/// Everything the manager persists for a server lives under its working
/// directory: the PID marker, the current-log pointer, and the rotated
/// console logs. The managed process itself never reads any of these.
#[derive(Clone)]
pub struct ServerPaths {
    working_dir: PathBuf,
}

impl ServerPaths {
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: working_dir.into(),
        }
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// The PID marker: exists iff the manager believes a process is running.
    pub fn pid_marker(&self) -> PathBuf {
        self.working_dir.join("server.pid")
    }

    /// The current-log pointer: one line naming the active console log.
    pub fn log_pointer(&self) -> PathBuf {
        self.working_dir.join("current.log")
    }

    pub fn log_dir(&self) -> PathBuf {
        self.working_dir.join("logs")
    }

    /// A console log is opened fresh at every start, named by launch time.
    pub fn console_log(&self, timestamp: &str) -> PathBuf {
        self.log_dir().join(format!("console_{timestamp}.log"))
    }
}
