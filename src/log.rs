//! Console output resolution.
//!
//! The current-log pointer names whichever rotated console log is live;
//! tailing goes through it so console reads never depend on the liveness
//! oracle. No cursor is kept between calls.

use crate::paths::ServerPaths;
use std::io::{self, Read, Seek};
use std::path::{Path, PathBuf};

/// Resolve the active console log. `Ok(None)` means the server has never
/// been started; other read failures propagate.
pub fn read_log_pointer(paths: &ServerPaths) -> io::Result<Option<PathBuf>> {
    match std::fs::read_to_string(paths.log_pointer()) {
        Ok(content) => {
            let trimmed = content.trim();
            if trimmed.is_empty() {
                Ok(None)
            } else {
                Ok(Some(PathBuf::from(trimmed)))
            }
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

pub fn write_log_pointer(paths: &ServerPaths, log_path: &Path) -> io::Result<()> {
    std::fs::write(paths.log_pointer(), log_path.to_string_lossy().as_bytes())
}

/// Last `n` lines of the console, oldest first.
///
/// A server that never started has no console (empty, not an error), and a
/// transient read failure becomes one diagnostic line so display layers
/// never crash on it.
pub fn console_output(paths: &ServerPaths, n: usize) -> Vec<String> {
    let target = match read_log_pointer(paths) {
        Ok(Some(path)) => path,
        Ok(None) => return Vec::new(),
        Err(e) => return vec![format!("error reading console: {e}")],
    };
    match tail_file(&target, n) {
        Ok(lines) => lines,
        Err(e) => vec![format!("error reading console: {e}")],
    }
}

const TAIL_CHUNK: usize = 8192;

/// Read the last `n` lines of a file, oldest first. A missing file reads
/// as empty: the log may have been rotated or deleted out from under us.
pub fn tail_file(path: &Path, n: usize) -> io::Result<Vec<String>> {
    if n == 0 {
        return Ok(Vec::new());
    }

    let mut file = match std::fs::File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let len = file.metadata()?.len();

    // Scan backwards chunk by chunk until n+1 newlines are behind us; the
    // tail starts just after that newline.
    let mut tail_start: u64 = 0;
    let mut seen: usize = 0;
    let mut pos = len;
    'scan: while pos > 0 {
        let chunk_start = pos.saturating_sub(TAIL_CHUNK as u64);
        let mut buf = vec![0u8; (pos - chunk_start) as usize];
        file.seek(io::SeekFrom::Start(chunk_start))?;
        file.read_exact(&mut buf)?;

        for (i, &byte) in buf.iter().enumerate().rev() {
            if byte == b'\n' {
                seen += 1;
                if seen > n {
                    tail_start = chunk_start + i as u64 + 1;
                    break 'scan;
                }
            }
        }
        pos = chunk_start;
    }

    file.seek(io::SeekFrom::Start(tail_start))?;
    let mut tail = String::new();
    file.read_to_string(&mut tail)?;

    let mut lines: Vec<String> = tail.lines().map(String::from).collect();
    lines.truncate(n);
    Ok(lines)
}
