use crate::config::ServerDefinition;
use crate::paths::{ServerPaths, fs_timestamp};
use crate::{log, pid, sys};
use chrono::Local;
use std::io;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Poll cadence while waiting for a signalled server to exit.
pub const STOP_POLL_INTERVAL: Duration = Duration::from_secs(1);
/// How long a server gets to shut down gracefully before SIGKILL.
pub const STOP_ESCALATION_CEILING: Duration = Duration::from_secs(30);
/// The PID marker is removed this long after a stop is requested,
/// regardless of whether exit has been confirmed.
pub const MARKER_CLEANUP_DELAY: Duration = Duration::from_secs(3);

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("server jar not found at {0}")]
    JarMissing(PathBuf),
    #[error("failed to spawn {java}: {source}")]
    SpawnFailed { java: String, source: io::Error },
    #[error("{0}")]
    Io(#[from] io::Error),
}

// ---------------------------------------------------------------------------
// Launcher
// ---------------------------------------------------------------------------

/// The JVM invocation: min and max heap pinned to the same spec, console
/// UI disabled.
pub fn build_launch_command(def: &ServerDefinition) -> (String, Vec<String>) {
    let args = vec![
        format!("-Xmx{}", def.memory),
        format!("-Xms{}", def.memory),
        "-jar".to_string(),
        def.jar.clone(),
        "nogui".to_string(),
    ];
    (def.java_bin().to_string(), args)
}

/// Launch a server detached from the manager's lifetime.
///
/// Combined stdout/stderr goes to a fresh timestamped console log; on
/// success the PID marker and current-log pointer are both written, so
/// `is_marker_alive` reports running until the process actually exits.
pub fn spawn_server(def: &ServerDefinition, paths: &ServerPaths) -> Result<u32, ProcessError> {
    std::fs::create_dir_all(paths.working_dir())?;

    let jar = def.jar_path();
    if !jar.is_file() {
        return Err(ProcessError::JarMissing(jar));
    }

    std::fs::create_dir_all(paths.log_dir())?;
    let log_path = paths.console_log(&fs_timestamp(Local::now()));
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;
    let stderr_sink = log_file.try_clone()?;

    let (program, args) = build_launch_command(def);
    let mut cmd = std::process::Command::new(&program);
    cmd.args(&args)
        .current_dir(paths.working_dir())
        .stdin(Stdio::null())
        .stdout(Stdio::from(log_file))
        .stderr(Stdio::from(stderr_sink));
    sys::detach(&mut cmd);

    let mut child = cmd.spawn().map_err(|source| ProcessError::SpawnFailed {
        java: program,
        source,
    })?;
    let pid_value = child.id();

    // Reap the child if it exits while this process is still around, so a
    // dead server never lingers as a zombie that the liveness probe would
    // count as alive. Its own process group keeps the server running if
    // the manager exits first.
    std::thread::spawn(move || {
        let _ = child.wait();
    });

    pid::write_pid_marker(paths, pid_value)?;
    log::write_log_pointer(paths, &log_path)?;
    tracing::info!(pid = pid_value, log = %log_path.display(), "server launched");
    Ok(pid_value)
}

// ---------------------------------------------------------------------------
// Terminator
// ---------------------------------------------------------------------------

/// Request shutdown and return as soon as SIGTERM is sent.
///
/// Two detached tasks carry on independently: one polls for exit and
/// escalates to SIGKILL at the ceiling, the other removes the PID marker
/// after a fixed delay whether or not exit has been confirmed. A stop
/// followed immediately by a start can therefore race the dying process;
/// `stop_and_wait` is the strict variant.
pub fn request_stop(pid_value: u32, paths: &ServerPaths) -> io::Result<()> {
    sys::send_signal(pid_value, sys::Signal::SIGTERM)?;
    spawn_kill_escalation(pid_value);
    spawn_marker_cleanup(paths.clone());
    Ok(())
}

fn spawn_kill_escalation(pid_value: u32) {
    tokio::spawn(async move {
        let deadline = tokio::time::Instant::now() + STOP_ESCALATION_CEILING;
        while sys::is_pid_alive(pid_value) {
            if tokio::time::Instant::now() >= deadline {
                tracing::warn!(pid = pid_value, "graceful window elapsed, sending SIGKILL");
                let _ = sys::force_kill(pid_value);
                break;
            }
            tokio::time::sleep(STOP_POLL_INTERVAL).await;
        }
    });
}

fn spawn_marker_cleanup(paths: ServerPaths) {
    tokio::spawn(async move {
        tokio::time::sleep(MARKER_CLEANUP_DELAY).await;
        pid::remove_pid_marker(&paths);
    });
}

/// Strict stop: block until the process is confirmed gone (escalating at
/// the same ceiling), then remove the marker synchronously.
pub async fn stop_and_wait(pid_value: u32, paths: &ServerPaths) -> io::Result<()> {
    sys::send_signal(pid_value, sys::Signal::SIGTERM)?;

    let deadline = tokio::time::Instant::now() + STOP_ESCALATION_CEILING;
    while sys::is_pid_alive(pid_value) {
        if tokio::time::Instant::now() >= deadline {
            tracing::warn!(pid = pid_value, "graceful window elapsed, sending SIGKILL");
            let _ = sys::force_kill(pid_value);
            tokio::time::sleep(Duration::from_millis(100)).await;
            break;
        }
        tokio::time::sleep(STOP_POLL_INTERVAL).await;
    }

    pid::remove_pid_marker(paths);
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn test_definition(dir: &Path) -> ServerDefinition {
        ServerDefinition {
            name: "Test".to_string(),
            dir: dir.to_string_lossy().into_owned(),
            jar: "server.jar".to_string(),
            memory: "2G".to_string(),
            port: 25565,
            autostart: false,
            java: None,
        }
    }

    /// A stand-in for the JVM: ignores the -Xmx/-jar arguments and sleeps.
    fn install_stub_java(dir: &Path) -> String {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join("fake-java");
        std::fs::write(&path, "#!/bin/sh\nexec sleep 30\n").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[test]
    fn test_launch_command_shape() {
        let dir = tempfile::tempdir().unwrap();
        let def = test_definition(dir.path());
        let (program, args) = build_launch_command(&def);
        assert_eq!(program, "java");
        assert_eq!(args, vec!["-Xmx2G", "-Xms2G", "-jar", "server.jar", "nogui"]);
    }

    #[test]
    fn test_launch_command_uses_java_override() {
        let dir = tempfile::tempdir().unwrap();
        let mut def = test_definition(dir.path());
        def.java = Some("/opt/jdk/bin/java".to_string());
        let (program, _) = build_launch_command(&def);
        assert_eq!(program, "/opt/jdk/bin/java");
    }

    #[test]
    fn test_spawn_missing_jar_names_expected_path() {
        let dir = tempfile::tempdir().unwrap();
        let def = test_definition(dir.path());
        let paths = ServerPaths::new(dir.path());

        let err = spawn_server(&def, &paths).unwrap_err();
        match err {
            ProcessError::JarMissing(path) => {
                assert!(path.ends_with("server.jar"));
                assert!(path.starts_with(dir.path()));
            }
            other => panic!("expected JarMissing, got: {other}"),
        }
    }

    #[test]
    fn test_spawn_failure_is_an_error_not_a_panic() {
        let dir = tempfile::tempdir().unwrap();
        let mut def = test_definition(dir.path());
        def.java = Some("/nonexistent/java".to_string());
        std::fs::write(dir.path().join("server.jar"), "jar").unwrap();

        let err = spawn_server(&def, &ServerPaths::new(dir.path())).unwrap_err();
        assert!(matches!(err, ProcessError::SpawnFailed { .. }));
    }

    #[tokio::test]
    async fn test_spawn_records_identity_and_stop_wait_clears_it() {
        let dir = tempfile::tempdir().unwrap();
        let mut def = test_definition(dir.path());
        def.java = Some(install_stub_java(dir.path()));
        std::fs::write(dir.path().join("server.jar"), "jar").unwrap();
        let paths = ServerPaths::new(dir.path());

        let pid_value = spawn_server(&def, &paths).unwrap();
        assert_eq!(pid::read_pid_marker(&paths), Some(pid_value));
        assert!(pid::is_marker_alive(&paths).unwrap());

        // Pointer names a log inside logs/
        let pointed = log::read_log_pointer(&paths).unwrap().unwrap();
        assert!(pointed.starts_with(paths.log_dir()));
        assert!(pointed.exists());

        stop_and_wait(pid_value, &paths).await.unwrap();
        assert!(!sys::is_pid_alive(pid_value));
        assert!(!paths.pid_marker().exists());
        assert!(!pid::is_marker_alive(&paths).unwrap());
    }

    #[tokio::test]
    async fn test_request_stop_returns_before_cleanup() {
        let dir = tempfile::tempdir().unwrap();
        let mut def = test_definition(dir.path());
        def.java = Some(install_stub_java(dir.path()));
        std::fs::write(dir.path().join("server.jar"), "jar").unwrap();
        let paths = ServerPaths::new(dir.path());

        let pid_value = spawn_server(&def, &paths).unwrap();
        request_stop(pid_value, &paths).unwrap();

        // Marker removal is delayed, not immediate
        assert!(paths.pid_marker().exists());

        tokio::time::sleep(MARKER_CLEANUP_DELAY + Duration::from_secs(1)).await;
        assert!(!paths.pid_marker().exists());
        assert!(!sys::is_pid_alive(pid_value));
    }

    #[test]
    fn test_stop_timing_constants() {
        assert_eq!(STOP_POLL_INTERVAL, Duration::from_secs(1));
        assert_eq!(STOP_ESCALATION_CEILING, Duration::from_secs(30));
        assert_eq!(MARKER_CLEANUP_DELAY, Duration::from_secs(3));
    }
}
