// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Process control seam
//!
//! The supervisor only ever spawns, probes and signals a pid through
//! [`ProcessControl`], so tests can substitute a fake process table.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::Mutex;

/// Signals used during termination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TermSignal {
    /// SIGTERM
    Terminate,
    /// SIGKILL
    Kill,
}

/// Everything needed to launch the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpawnRequest {
    pub program: PathBuf,
    pub args: Vec<String>,
    /// stdout and stderr are appended here
    pub log_path: PathBuf,
}

pub trait ProcessControl: Send + Sync {
    /// Launch detached from the caller's process group; returns the pid.
    fn spawn(&self, request: &SpawnRequest) -> io::Result<u32>;

    fn is_alive(&self, pid: u32) -> bool;

    /// Send a signal. `Ok(false)` means the process no longer exists.
    fn signal(&self, pid: u32, signal: TermSignal) -> io::Result<bool>;
}

/// Real processes.
///
/// Children spawned here are kept so exited ones can be reaped; otherwise a
/// zombie would keep answering liveness probes until this process exits.
#[derive(Debug, Default)]
pub struct OsProcessControl {
    children: Mutex<HashMap<u32, Child>>,
}

impl OsProcessControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// `Some(alive)` when `pid` is one of our children.
    fn child_alive(&self, pid: u32) -> Option<bool> {
        let Ok(mut children) = self.children.lock() else {
            return None;
        };
        let child = children.get_mut(&pid)?;
        match child.try_wait() {
            Ok(None) => Some(true),
            Ok(Some(status)) => {
                tracing::debug!("llama-server (pid {}) exited with {}", pid, status);
                children.remove(&pid);
                Some(false)
            }
            Err(e) => {
                tracing::warn!("Failed to poll pid {}: {}", pid, e);
                children.remove(&pid);
                Some(false)
            }
        }
    }
}

impl ProcessControl for OsProcessControl {
    fn spawn(&self, request: &SpawnRequest) -> io::Result<u32> {
        let stdout = open_session_log(&request.log_path, request)?;
        let stderr = stdout.try_clone()?;

        let mut cmd = Command::new(&request.program);
        cmd.args(&request.args)
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr));

        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }

        let child = cmd.spawn()?;
        let pid = child.id();
        if let Ok(mut children) = self.children.lock() {
            children.insert(pid, child);
        }
        Ok(pid)
    }

    fn is_alive(&self, pid: u32) -> bool {
        if let Some(alive) = self.child_alive(pid) {
            return alive;
        }
        platform::is_alive(pid)
    }

    fn signal(&self, pid: u32, signal: TermSignal) -> io::Result<bool> {
        if self.child_alive(pid) == Some(false) {
            return Ok(false);
        }
        platform::signal(pid, signal)
    }
}

/// Open the log for appending and write the session header.
fn open_session_log(path: &Path, request: &SpawnRequest) -> io::Result<File> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(
        file,
        "\n=== llama-server session {} ===\n$ {} {}",
        chrono::Utc::now().to_rfc3339(),
        request.program.display(),
        request.args.join(" ")
    )?;
    file.flush()?;
    Ok(file)
}

#[cfg(unix)]
mod platform {
    use std::io;

    use nix::errno::Errno;
    use nix::sys::signal::{self, Signal};
    use nix::unistd::Pid;

    use super::TermSignal;

    /// Pids 0 and anything past `i32::MAX` would address process groups.
    fn to_pid(pid: u32) -> Option<Pid> {
        if pid == 0 || pid > i32::MAX as u32 {
            None
        } else {
            Some(Pid::from_raw(pid as i32))
        }
    }

    pub fn is_alive(pid: u32) -> bool {
        let Some(pid) = to_pid(pid) else {
            return false;
        };
        match signal::kill(pid, None) {
            Ok(()) => true,
            // Exists but belongs to someone else
            Err(Errno::EPERM) => true,
            Err(_) => false,
        }
    }

    pub fn signal(pid: u32, sig: TermSignal) -> io::Result<bool> {
        let Some(pid) = to_pid(pid) else {
            return Ok(false);
        };
        let sig = match sig {
            TermSignal::Terminate => Signal::SIGTERM,
            TermSignal::Kill => Signal::SIGKILL,
        };
        match signal::kill(pid, sig) {
            Ok(()) => Ok(true),
            Err(Errno::ESRCH) => Ok(false),
            Err(e) => Err(io::Error::from(e)),
        }
    }
}

#[cfg(not(unix))]
mod platform {
    use std::io;

    use sysinfo::{Pid, ProcessesToUpdate, Signal, System};

    use super::TermSignal;

    fn refreshed(pid: Pid) -> System {
        let mut sys = System::new();
        sys.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
        sys
    }

    pub fn is_alive(pid: u32) -> bool {
        let pid = Pid::from_u32(pid);
        refreshed(pid).process(pid).is_some()
    }

    pub fn signal(pid: u32, sig: TermSignal) -> io::Result<bool> {
        let pid = Pid::from_u32(pid);
        let sys = refreshed(pid);
        let Some(process) = sys.process(pid) else {
            return Ok(false);
        };
        let sent = match sig {
            TermSignal::Terminate => process
                .kill_with(Signal::Term)
                .unwrap_or_else(|| process.kill()),
            TermSignal::Kill => process.kill(),
        };
        if sent {
            Ok(true)
        } else {
            Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("failed to signal pid {}", pid),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    #[cfg(unix)]
    fn test_spawn_signal_and_reap() {
        let temp = TempDir::new().unwrap();
        let control = OsProcessControl::new();
        let request = SpawnRequest {
            program: PathBuf::from("sleep"),
            args: vec!["30".to_string()],
            log_path: temp.path().join("logs/server.log"),
        };

        let pid = control.spawn(&request).unwrap();
        assert!(control.is_alive(pid));
        assert!(control.signal(pid, TermSignal::Terminate).unwrap());

        let mut alive = true;
        for _ in 0..50 {
            if !control.is_alive(pid) {
                alive = false;
                break;
            }
            std::thread::sleep(Duration::from_millis(20));
        }
        assert!(!alive, "terminated child should be reaped");
        assert!(!control.signal(pid, TermSignal::Kill).unwrap());

        let log = std::fs::read_to_string(&request.log_path).unwrap();
        assert!(log.contains("=== llama-server session"));
        assert!(log.contains("$ sleep 30"));
    }

    #[test]
    #[cfg(unix)]
    fn test_log_is_appended_across_sessions() {
        let temp = TempDir::new().unwrap();
        let control = OsProcessControl::new();
        let request = SpawnRequest {
            program: PathBuf::from("true"),
            args: Vec::new(),
            log_path: temp.path().join("server.log"),
        };
        control.spawn(&request).unwrap();
        control.spawn(&request).unwrap();

        let log = std::fs::read_to_string(&request.log_path).unwrap();
        assert_eq!(log.matches("=== llama-server session").count(), 2);
    }

    #[test]
    fn test_spawn_missing_binary_fails() {
        let temp = TempDir::new().unwrap();
        let control = OsProcessControl::new();
        let request = SpawnRequest {
            program: temp.path().join("does-not-exist"),
            args: Vec::new(),
            log_path: temp.path().join("server.log"),
        };
        assert!(control.spawn(&request).is_err());
    }

    #[test]
    #[cfg(unix)]
    fn test_unknown_pids_are_dead() {
        let control = OsProcessControl::new();
        assert!(!control.is_alive(0));
        assert!(!control.is_alive(u32::MAX));
        assert!(!control.signal(0, TermSignal::Terminate).unwrap());
    }
}
