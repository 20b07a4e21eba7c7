// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Settings management for rigctl
//!
//! Handles loading and saving settings from ~/.rigctl/settings.json.
//! Settings are loaded once at startup and passed explicitly to the
//! telemetry sampler and the process supervisor.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

mod io;
mod migration;
mod validation;

/// Main settings structure, stored in ~/.rigctl/settings.json
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    /// Power budget and probe limits for telemetry sampling
    #[serde(default)]
    pub telemetry: TelemetryConfig,

    /// llama-server supervision settings
    #[serde(default)]
    pub supervisor: SupervisorConfig,
}

/// Telemetry sampling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Estimated draw when the host is idle
    #[serde(default = "default_idle_watts")]
    pub idle_watts: f64,

    /// Estimated draw under full CPU load
    #[serde(default = "default_max_watts")]
    pub max_watts: f64,

    /// Per-invocation limit for external tools (nvidia-smi, rocm-smi, ...)
    #[serde(default = "default_command_timeout_ms")]
    pub command_timeout_ms: u64,
}

impl TelemetryConfig {
    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            idle_watts: default_idle_watts(),
            max_watts: default_max_watts(),
            command_timeout_ms: default_command_timeout_ms(),
        }
    }
}

/// llama-server supervisor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupervisorConfig {
    /// Directory containing the llama-server binary
    #[serde(default = "default_binary_dir")]
    pub binary_dir: PathBuf,

    /// Directory scanned for model files
    #[serde(default = "default_model_dir")]
    pub model_dir: PathBuf,

    /// Model file extension (without the dot)
    #[serde(default = "default_model_extension")]
    pub model_extension: String,

    /// Host the server binds to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port the server listens on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Additional arguments passed through to llama-server
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra_args: Vec<String>,

    /// Model file name chosen by the last successful switch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,

    /// Where the pid record and server log live (defaults to the rigctl home)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_dir: Option<PathBuf>,

    /// Time to wait after spawning before checking the process is alive
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,

    /// Interval between liveness polls while stopping
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Polls after SIGTERM before escalating
    #[serde(default = "default_graceful_polls")]
    pub graceful_polls: u32,

    /// Polls after SIGKILL before giving up
    #[serde(default = "default_forceful_polls")]
    pub forceful_polls: u32,
}

impl SupervisorConfig {
    /// Full path of the server executable.
    pub fn binary_path(&self) -> PathBuf {
        let name = if cfg!(windows) {
            "llama-server.exe"
        } else {
            "llama-server"
        };
        self.binary_dir.join(name)
    }

    pub fn state_dir(&self) -> PathBuf {
        self.state_dir.clone().unwrap_or_else(Settings::rigctl_home)
    }

    /// Path of the two-line pid/model record.
    pub fn record_path(&self) -> PathBuf {
        self.state_dir().join("llama-server.pid")
    }

    /// Lock file serializing start, stop and switch across processes.
    pub fn lock_path(&self) -> PathBuf {
        self.state_dir().join("llama-server.lock")
    }

    /// Path of the append-only server log.
    pub fn log_path(&self) -> PathBuf {
        self.state_dir().join("llama-server.log")
    }

    /// Resolve the configured default model against the model directory.
    pub fn default_model_path(&self) -> Option<PathBuf> {
        self.default_model
            .as_ref()
            .map(|name| self.model_dir.join(name))
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            binary_dir: default_binary_dir(),
            model_dir: default_model_dir(),
            model_extension: default_model_extension(),
            host: default_host(),
            port: default_port(),
            extra_args: Vec::new(),
            default_model: None,
            state_dir: None,
            settle_delay_ms: default_settle_delay_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            graceful_polls: default_graceful_polls(),
            forceful_polls: default_forceful_polls(),
        }
    }
}

fn default_idle_watts() -> f64 {
    15.0
}

fn default_max_watts() -> f64 {
    65.0
}

fn default_command_timeout_ms() -> u64 {
    1500
}

fn default_binary_dir() -> PathBuf {
    Settings::rigctl_home().join("bin")
}

fn default_model_dir() -> PathBuf {
    Settings::rigctl_home().join("models")
}

fn default_model_extension() -> String {
    "gguf".to_string()
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_settle_delay_ms() -> u64 {
    1500
}

fn default_poll_interval_ms() -> u64 {
    500
}

fn default_graceful_polls() -> u32 {
    10
}

fn default_forceful_polls() -> u32 {
    4
}
