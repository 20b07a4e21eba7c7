// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Persisted pid/model record
//!
//! Two text lines: the decimal pid, then the absolute model path. The file
//! outlives the supervising process so a restarted service can still find
//! and stop the server it launched earlier.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// The running server as last recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupervisorRecord {
    pub pid: u32,
    pub model_path: PathBuf,
}

impl SupervisorRecord {
    pub fn new(pid: u32, model_path: impl Into<PathBuf>) -> Self {
        Self {
            pid,
            model_path: model_path.into(),
        }
    }

    /// Parse record contents; anything short of a pid line plus a
    /// non-empty path line is treated as no record.
    pub fn parse(contents: &str) -> Option<Self> {
        let mut lines = contents.lines();
        let pid = lines.next()?.trim().parse::<u32>().ok()?;
        let model_path = lines.next()?.trim();
        if model_path.is_empty() {
            return None;
        }
        Some(Self::new(pid, model_path))
    }

    pub fn to_contents(&self) -> String {
        format!("{}\n{}\n", self.pid, self.model_path.display())
    }
}

/// Location of the record on disk.
#[derive(Debug, Clone)]
pub struct RecordFile {
    path: PathBuf,
}

impl RecordFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Current record, if the file exists and parses.
    pub fn read(&self) -> Option<SupervisorRecord> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => {
                let record = SupervisorRecord::parse(&contents);
                if record.is_none() {
                    tracing::warn!("Ignoring malformed record at {}", self.path.display());
                }
                record
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => {
                tracing::warn!("Failed to read record {}: {}", self.path.display(), e);
                None
            }
        }
    }

    /// Replace the record atomically via a sibling temp file.
    pub fn write(&self, record: &SupervisorRecord) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let temp_path = self.path.with_extension("pid.tmp");
        fs::write(&temp_path, record.to_contents())?;
        fs::rename(&temp_path, &self.path)
    }

    /// Delete the record; a missing file is not an error.
    pub fn remove(&self) -> io::Result<()> {
        match fs::remove_file(&self.path) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}
