//! Working-directory snapshots.
//!
//! A backup is a recursive copy of a server's working directory under the
//! backups root, named `{id}_{timestamp}`. Manager-local transient state
//! (PID markers, the current-log pointer) is excluded: a live PID file
//! inside a backup would be a lie. The copy never pauses the server, so a
//! file mid-write may land torn; that is accepted.

use crate::paths::TIMESTAMP_FORMAT;
use chrono::{DateTime, Local, NaiveDateTime};
use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};

const PID_MARKER_SUFFIX: &str = ".pid";
const LOG_POINTER_NAME: &str = "current.log";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BackupRecord {
    pub name: String,
    pub path: PathBuf,
    pub created_at: NaiveDateTime,
    pub size_bytes: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum BackupError {
    #[error("server directory not found: {0}")]
    MissingSource(PathBuf),
    #[error("backup already exists: {0}")]
    AlreadyExists(PathBuf),
    #[error("{0}")]
    Io(#[from] io::Error),
}

pub fn backup_name(id: &str, timestamp: &str) -> String {
    format!("{id}_{timestamp}")
}

/// Manager-local lifecycle artifacts, skipped at every directory level.
fn is_excluded(file_name: &str) -> bool {
    file_name == LOG_POINTER_NAME || file_name.ends_with(PID_MARKER_SUFFIX)
}

/// Snapshot `source` into `{backups_root}/{id}_{now}`. Returns the backup
/// name. The source server may be running; no locking is attempted.
pub fn create_backup(id: &str, source: &Path, backups_root: &Path) -> Result<String, BackupError> {
    if !source.is_dir() {
        return Err(BackupError::MissingSource(source.to_path_buf()));
    }

    let name = backup_name(id, &crate::paths::fs_timestamp(Local::now()));
    let dest = backups_root.join(&name);
    if dest.exists() {
        // Two backups within the same second; the timestamp is the identity
        return Err(BackupError::AlreadyExists(dest));
    }

    std::fs::create_dir_all(backups_root)?;
    copy_dir_recursive(source, &dest)?;
    tracing::info!(backup = %name, "snapshot complete");
    Ok(name)
}

fn copy_dir_recursive(src: &Path, dst: &Path) -> io::Result<()> {
    std::fs::create_dir_all(dst)?;
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let name = entry.file_name();
        if is_excluded(&name.to_string_lossy()) {
            continue;
        }
        let target = dst.join(&name);
        if entry.file_type()?.is_dir() {
            copy_dir_recursive(&entry.path(), &target)?;
        } else {
            std::fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

/// Backups under the root, newest first. With a server filter, only
/// directories named `{id}_...` are included.
///
/// Ordering uses the timestamp embedded in the name: restores and rsync
/// rewrite mtimes, the name never changes. mtime is a fallback for
/// directories whose name does not parse.
pub fn list_backups(
    backups_root: &Path,
    server_id: Option<&str>,
) -> io::Result<Vec<BackupRecord>> {
    let entries = match std::fs::read_dir(backups_root) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let prefix = server_id.map(|id| format!("{id}_"));
    let mut records = Vec::new();

    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if let Some(ref prefix) = prefix
            && !name.starts_with(prefix)
        {
            continue;
        }

        let path = entry.path();
        let created_at = match embedded_timestamp(&name) {
            Some(ts) => ts,
            None => {
                let modified = entry.metadata()?.modified()?;
                DateTime::<Local>::from(modified).naive_local()
            }
        };
        records.push(BackupRecord {
            size_bytes: dir_size(&path)?,
            name,
            path,
            created_at,
        });
    }

    records.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.name.cmp(&a.name)));
    Ok(records)
}

/// Backup names are `{id}_{timestamp}`; the id itself may contain
/// underscores, the timestamp never does.
fn embedded_timestamp(name: &str) -> Option<NaiveDateTime> {
    let (_, ts) = name.rsplit_once('_')?;
    NaiveDateTime::parse_from_str(ts, TIMESTAMP_FORMAT).ok()
}

fn dir_size(path: &Path) -> io::Result<u64> {
    let mut total = 0;
    for entry in std::fs::read_dir(path)? {
        let entry = entry?;
        let meta = entry.metadata()?;
        if meta.is_dir() {
            total += dir_size(&entry.path())?;
        } else {
            total += meta.len();
        }
    }
    Ok(total)
}
