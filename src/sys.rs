//! Thin shims over the unix process table.
//!
//! Minecraft servers are spawned into their own process group so they
//! survive a manager exit; everything here is keyed by raw PID.

use std::io;
use std::os::unix::process::CommandExt;

pub use nix::sys::signal::Signal;

pub fn send_signal(pid: u32, signal: Signal) -> io::Result<()> {
    nix::sys::signal::kill(nix::unistd::Pid::from_raw(pid as i32), signal)
        .map_err(io::Error::other)
}

/// Probe whether a PID names a live process.
///
/// EPERM means the process exists but belongs to someone else, so it
/// counts as alive; ESRCH means it is gone.
pub fn check_pid(pid: u32) -> Result<bool, io::Error> {
    match nix::sys::signal::kill(nix::unistd::Pid::from_raw(pid as i32), None) {
        Ok(()) => Ok(true),
        Err(nix::errno::Errno::ESRCH) => Ok(false),
        Err(nix::errno::Errno::EPERM) => Ok(true),
        Err(e) => Err(io::Error::other(e)),
    }
}

pub fn is_pid_alive(pid: u32) -> bool {
    check_pid(pid).unwrap_or(false)
}

pub fn force_kill(pid: u32) -> io::Result<()> {
    send_signal(pid, Signal::SIGKILL)
}

/// Place the child in a fresh process group so its lifetime is decoupled
/// from the manager's. The manager never waits on the child.
pub fn detach(cmd: &mut std::process::Command) {
    cmd.process_group(0);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_pid_self() {
        assert!(check_pid(std::process::id()).unwrap());
    }

    #[test]
    fn test_check_pid_dead() {
        // PID far above any default pid_max
        assert!(!check_pid(4_000_000).unwrap());
    }

    #[test]
    fn test_is_pid_alive_self() {
        assert!(is_pid_alive(std::process::id()));
    }

    #[test]
    fn test_send_signal_to_dead_pid_errors() {
        assert!(send_signal(4_000_000, Signal::SIGTERM).is_err());
    }
}
