use crate::paths::ServerPaths;
use crate::sys;
use std::fs;
use std::io;

pub fn write_pid_marker(paths: &ServerPaths, pid: u32) -> io::Result<()> {
    fs::write(paths.pid_marker(), pid.to_string())
}

/// Read the recorded PID. A marker whose content does not parse is treated
/// the same as a stale one: deleted on sight, reported as absent.
pub fn read_pid_marker(paths: &ServerPaths) -> Option<u32> {
    let content = fs::read_to_string(paths.pid_marker()).ok()?;
    match content.trim().parse() {
        Ok(pid) => Some(pid),
        Err(_) => {
            tracing::warn!(
                marker = %paths.pid_marker().display(),
                "unparsable PID marker, removing"
            );
            remove_pid_marker(paths);
            None
        }
    }
}

pub fn remove_pid_marker(paths: &ServerPaths) {
    let _ = fs::remove_file(paths.pid_marker());
}

/// The liveness oracle: marker contents reconciled against the OS process
/// table on every call. No cached result; these checks run at interactive
/// rates, never in a hot path.
pub fn is_marker_alive(paths: &ServerPaths) -> io::Result<bool> {
    let pid = match read_pid_marker(paths) {
        Some(p) => p,
        None => return Ok(false),
    };

    if sys::check_pid(pid)? {
        return Ok(true);
    }

    // Process is gone; a crashed server must not appear running forever
    tracing::info!(pid, "stale PID marker, removing");
    remove_pid_marker(paths);
    Ok(false)
}
