// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Bounded execution of vendor tools (nvidia-smi, rocm-smi, ioreg)

use std::io::Read;
use std::process::{Command, Stdio};
use std::sync::mpsc;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Runs an external program and hands back its stdout.
///
/// `None` covers every failure: missing binary, non-zero exit, timeout,
/// or empty output.
pub trait CommandRunner: Send + Sync {
    fn run(&self, program: &str, args: &[&str]) -> Option<String>;
}

/// Spawns real processes, killing any that outlive `timeout`.
#[derive(Debug, Clone)]
pub struct SystemCommandRunner {
    timeout: Duration,
}

impl SystemCommandRunner {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl CommandRunner for SystemCommandRunner {
    fn run(&self, program: &str, args: &[&str]) -> Option<String> {
        let deadline = Instant::now() + self.timeout;
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .ok()?;

        // Drain stdout on a helper thread so a chatty tool cannot fill the pipe
        // and stall until the deadline. A grandchild may keep the pipe open
        // after the tool exits; the read is still bounded by the deadline.
        let mut stdout = child.stdout.take()?;
        let (tx, rx) = mpsc::channel();
        std::thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = stdout.read_to_end(&mut buf);
            let _ = tx.send(buf);
        });

        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => {
                    if Instant::now() >= deadline {
                        tracing::debug!("{} timed out after {:?}", program, self.timeout);
                        let _ = child.kill();
                        let _ = child.wait();
                        return None;
                    }
                    std::thread::sleep(POLL_INTERVAL);
                }
                Err(_) => return None,
            }
        };
        if !status.success() {
            tracing::debug!("{} exited with {}", program, status);
            return None;
        }

        let out = match rx.recv_timeout(deadline.saturating_duration_since(Instant::now())) {
            Ok(out) => out,
            Err(_) => {
                tracing::debug!(
                    "{} left its output open past {:?}",
                    program,
                    self.timeout
                );
                return None;
            }
        };
        let s = String::from_utf8_lossy(&out).trim().to_string();
        if s.is_empty() {
            None
        } else {
            Some(s)
        }
    }
}
