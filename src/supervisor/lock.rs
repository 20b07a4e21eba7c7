// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Cross-process exclusion around record changes
//!
//! Every `rigctl` invocation builds its own supervisor, so the in-process
//! mutex alone cannot keep two commands from racing on the record. The
//! lock file sits next to the record and is held for a whole start, stop
//! or switch.

use std::io;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct OperationLock {
    path: PathBuf,
}

/// Held until dropped.
pub struct OperationGuard {
    _held: platform::Held,
}

impl OperationLock {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Wait for exclusive ownership. Blocking happens off the async runtime.
    pub async fn acquire(&self) -> io::Result<OperationGuard> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let path = self.path.clone();
        let held = tokio::task::spawn_blocking(move || platform::lock(&path))
            .await
            .map_err(io::Error::other)??;
        tracing::trace!("Acquired {}", self.path.display());
        Ok(OperationGuard { _held: held })
    }
}

#[cfg(unix)]
mod platform {
    use std::fs::{File, OpenOptions};
    use std::io;
    use std::path::Path;

    use nix::fcntl::{Flock, FlockArg};

    pub type Held = Flock<File>;

    pub fn lock(path: &Path) -> io::Result<Held> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(path)?;
        Flock::lock(file, FlockArg::LockExclusive).map_err(|(_, errno)| io::Error::from(errno))
    }
}

#[cfg(not(unix))]
mod platform {
    use std::fs::{File, OpenOptions};
    use std::io;
    use std::path::{Path, PathBuf};
    use std::time::{Duration, Instant};

    const RETRY_INTERVAL: Duration = Duration::from_millis(50);
    const GIVE_UP_AFTER: Duration = Duration::from_secs(30);

    /// Lock file created exclusively; removed on drop.
    #[derive(Debug)]
    pub struct Held {
        path: PathBuf,
        _file: File,
    }

    impl Drop for Held {
        fn drop(&mut self) {
            let _ = std::fs::remove_file(&self.path);
        }
    }

    pub fn lock(path: &Path) -> io::Result<Held> {
        let start = Instant::now();
        loop {
            match OpenOptions::new().write(true).create_new(true).open(path) {
                Ok(file) => {
                    return Ok(Held {
                        path: path.to_path_buf(),
                        _file: file,
                    })
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    if start.elapsed() >= GIVE_UP_AFTER {
                        return Err(io::Error::new(
                            io::ErrorKind::TimedOut,
                            format!("{} is held by another rigctl", path.display()),
                        ));
                    }
                    std::thread::sleep(RETRY_INTERVAL);
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_creates_parent_directory() {
        let temp = TempDir::new().unwrap();
        let lock = OperationLock::new(temp.path().join("state/llama-server.lock"));
        let _guard = lock.acquire().await.unwrap();
        assert!(temp.path().join("state").is_dir());
    }

    #[tokio::test]
    async fn test_second_holder_waits_for_release() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("llama-server.lock");
        let first = OperationLock::new(&path);
        let second = OperationLock::new(&path);

        let guard = first.acquire().await.unwrap();
        let acquired = Arc::new(AtomicBool::new(false));
        let flag = acquired.clone();
        let waiter = tokio::spawn(async move {
            let guard = second.acquire().await.unwrap();
            flag.store(true, Ordering::SeqCst);
            drop(guard);
        });

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(!acquired.load(Ordering::SeqCst));

        drop(guard);
        waiter.await.unwrap();
        assert!(acquired.load(Ordering::SeqCst));
    }
}
