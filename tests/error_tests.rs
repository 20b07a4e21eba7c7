// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use std::io;
use std::path::PathBuf;

use rigctl::error::{RigError, SupervisorError};

#[test]
fn test_io_error_conversion() {
    let io_error = io::Error::new(io::ErrorKind::NotFound, "File not found");
    let rig_error: RigError = io_error.into();

    match rig_error {
        RigError::Io(_) => {}
        _ => panic!("Expected Io error, got different error type"),
    }
}

#[test]
fn test_config_error_display() {
    let error = RigError::Config("max_watts below idle_watts".to_string());
    assert_eq!(
        error.to_string(),
        "Configuration error: max_watts below idle_watts"
    );
}

#[test]
fn test_supervisor_error_wraps() {
    let error: RigError = SupervisorError::AlreadyRunning { pid: 77 }.into();
    assert_eq!(
        error.to_string(),
        "Supervisor error: llama-server is already running (pid 77)"
    );
}

#[test]
fn test_supervisor_reasons_are_distinct() {
    let reasons = [
        SupervisorError::BinaryNotFound(PathBuf::from("/bin/llama-server")).to_string(),
        SupervisorError::ModelNotFound(PathBuf::from("/m/a.gguf")).to_string(),
        SupervisorError::WrongExtension {
            path: PathBuf::from("/m/a.bin"),
            expected: "gguf".to_string(),
        }
        .to_string(),
        SupervisorError::ExitedDuringStartup {
            pid: 5,
            log: PathBuf::from("/s/llama-server.log"),
        }
        .to_string(),
        SupervisorError::Unkillable { pid: 5 }.to_string(),
        SupervisorError::Spawn("permission denied".to_string()).to_string(),
    ];
    for (i, a) in reasons.iter().enumerate() {
        for b in reasons.iter().skip(i + 1) {
            assert_ne!(a, b);
        }
    }
    assert_eq!(reasons[2], "Model file /m/a.bin is not a .gguf file");
}

#[test]
fn test_record_error_from_io() {
    let error: SupervisorError = io::Error::new(io::ErrorKind::PermissionDenied, "denied").into();
    assert!(matches!(error, SupervisorError::Record(_)));
}
