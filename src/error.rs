// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Error types for rigctl
//!
//! Telemetry never produces errors (every probe failure degrades to an
//! absent field), so the types here cover configuration, persistence and
//! the process supervisor.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for rigctl operations
#[derive(Error, Debug)]
pub enum RigError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Supervisor operation failed
    #[error("Supervisor error: {0}")]
    Supervisor(#[from] SupervisorError),
}

/// Reasons a supervisor operation can fail.
///
/// Each variant is a distinct, user-presentable reason; the `Display` text is
/// what callers surface as the failure message.
#[derive(Error, Debug)]
pub enum SupervisorError {
    /// The server binary is missing from the configured directory
    #[error("llama-server binary not found at {}", .0.display())]
    BinaryNotFound(PathBuf),

    /// The requested model file does not exist
    #[error("Model file not found: {}", .0.display())]
    ModelNotFound(PathBuf),

    /// The requested model file has the wrong extension
    #[error("Model file {} is not a .{expected} file", .path.display())]
    WrongExtension { path: PathBuf, expected: String },

    /// A server is already recorded as running
    #[error("llama-server is already running (pid {pid})")]
    AlreadyRunning { pid: u32 },

    /// The process could not be spawned at all
    #[error("Failed to launch llama-server: {0}")]
    Spawn(String),

    /// The process was spawned but died before the settle delay elapsed
    #[error("llama-server (pid {pid}) exited during startup; see {}", .log.display())]
    ExitedDuringStartup { pid: u32, log: PathBuf },

    /// The process survived forceful termination; the record was cleared anyway
    #[error("llama-server (pid {pid}) did not exit after SIGKILL")]
    Unkillable { pid: u32 },

    /// Reading or writing the supervisor record failed
    #[error("Supervisor record error: {0}")]
    Record(#[from] std::io::Error),
}

/// Result type alias for rigctl operations
pub type Result<T> = std::result::Result<T, RigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rig_error_config() {
        let err = RigError::Config("bad config".to_string());
        assert!(err.to_string().contains("Configuration error"));
    }

    #[test]
    fn test_rig_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let rig_err: RigError = io_err.into();
        assert!(rig_err.to_string().contains("IO error"));
    }

    #[test]
    fn test_rig_error_from_supervisor() {
        let err: RigError = SupervisorError::AlreadyRunning { pid: 42 }.into();
        assert!(err.to_string().contains("Supervisor error"));
        assert!(err.to_string().contains("42"));
    }

    #[test]
    fn test_supervisor_error_wrong_extension() {
        let err = SupervisorError::WrongExtension {
            path: PathBuf::from("/models/a.bin"),
            expected: "gguf".to_string(),
        };
        assert_eq!(err.to_string(), "Model file /models/a.bin is not a .gguf file");
    }

    #[test]
    fn test_supervisor_error_messages_are_distinct() {
        let messages = [
            SupervisorError::BinaryNotFound(PathBuf::from("/bin/llama-server")).to_string(),
            SupervisorError::ModelNotFound(PathBuf::from("/models/a.gguf")).to_string(),
            SupervisorError::WrongExtension {
                path: PathBuf::from("/models/a.bin"),
                expected: "gguf".to_string(),
            }
            .to_string(),
            SupervisorError::ExitedDuringStartup {
                pid: 7,
                log: PathBuf::from("/tmp/server.log"),
            }
            .to_string(),
        ];
        for (i, a) in messages.iter().enumerate() {
            for b in messages.iter().skip(i + 1) {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_supervisor_error_debug() {
        let err = SupervisorError::Unkillable { pid: 9 };
        assert!(format!("{:?}", err).contains("Unkillable"));
    }
}
