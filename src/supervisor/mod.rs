// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! llama-server supervisor
//!
//! Owns at most one llama-server process. The pid and model of the running
//! server are persisted in a record file so a restarted supervisor can still
//! report on and stop it. Start, stop and switch are serialized by an async
//! mutex within the process and by a lock file next to the record across
//! processes.

pub mod catalog;
pub mod lock;
pub mod process;
pub mod record;
pub mod store;
pub mod termination;

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::config::SupervisorConfig;
use crate::error::SupervisorError;

pub use catalog::{has_extension, scan_models, ModelCatalog, ModelCatalogEntry};
pub use lock::{OperationGuard, OperationLock};
pub use process::{OsProcessControl, ProcessControl, SpawnRequest, TermSignal};
pub use record::{RecordFile, SupervisorRecord};
pub use store::{ModelChoiceStore, SettingsFileStore};
pub use termination::{terminate, Termination, TerminationPolicy};

/// Lifecycle state. `Starting` and `Stopping` are only observable while an
/// operation is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SupervisorState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

impl std::fmt::Display for SupervisorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            SupervisorState::Stopped => "stopped",
            SupervisorState::Starting => "starting",
            SupervisorState::Running => "running",
            SupervisorState::Stopping => "stopping",
        };
        write!(f, "{}", label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupervisorStatus {
    pub state: SupervisorState,
    pub pid: Option<u32>,
    pub model_path: Option<PathBuf>,
    /// Whether the recorded pid answered a liveness probe
    pub alive: bool,
    pub host: String,
    pub port: u16,
    pub log_path: PathBuf,
}

/// What `stop` found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// No record, nothing to do
    NotRunning,
    Stopped { pid: u32, termination: Termination },
}

/// Result of a model switch, reported rather than raised.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwitchOutcome {
    pub success: bool,
    pub message: String,
    pub new_model_path: Option<PathBuf>,
    /// Whether a previously running server was stopped
    pub previous_stopped: bool,
}

impl SwitchOutcome {
    fn failed(error: &SupervisorError, previous_stopped: bool) -> Self {
        Self {
            success: false,
            message: error.to_string(),
            new_model_path: None,
            previous_stopped,
        }
    }
}

pub struct Supervisor {
    config: SupervisorConfig,
    record: RecordFile,
    lock: OperationLock,
    control: Arc<dyn ProcessControl>,
    store: Arc<dyn ModelChoiceStore>,
    policy: TerminationPolicy,
    state: Mutex<SupervisorState>,
    op_lock: tokio::sync::Mutex<()>,
}

impl Supervisor {
    pub fn new(
        config: SupervisorConfig,
        control: Arc<dyn ProcessControl>,
        store: Arc<dyn ModelChoiceStore>,
    ) -> Self {
        Self {
            record: RecordFile::new(config.record_path()),
            lock: OperationLock::new(config.lock_path()),
            policy: TerminationPolicy::from_config(&config),
            config,
            control,
            store,
            state: Mutex::new(SupervisorState::Stopped),
            op_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Real processes, with model choices written to `settings_path`.
    pub fn system(config: SupervisorConfig, settings_path: impl Into<PathBuf>) -> Self {
        Self::new(
            config,
            Arc::new(OsProcessControl::new()),
            Arc::new(SettingsFileStore::new(settings_path)),
        )
    }

    pub fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    /// Model files available to start, with the running one flagged.
    pub fn list_models(&self) -> ModelCatalog {
        let active_model_path = self.current_model();
        let models = scan_models(
            &absolute_path(&self.config.model_dir),
            &self.config.model_extension,
            active_model_path.as_deref(),
        );
        ModelCatalog {
            models,
            active_model_path,
        }
    }

    /// Model of the recorded server; `None` if there is no usable record.
    pub fn current_model(&self) -> Option<PathBuf> {
        self.record.read().map(|record| record.model_path)
    }

    pub fn status(&self) -> SupervisorStatus {
        let record = self.record.read();
        let alive = record
            .as_ref()
            .is_some_and(|r| self.control.is_alive(r.pid));
        let state = match self.state() {
            in_flight @ (SupervisorState::Starting | SupervisorState::Stopping) => in_flight,
            _ if alive => SupervisorState::Running,
            _ => SupervisorState::Stopped,
        };
        SupervisorStatus {
            state,
            pid: record.as_ref().map(|r| r.pid),
            model_path: record.map(|r| r.model_path),
            alive,
            host: self.config.host.clone(),
            port: self.config.port,
            log_path: self.config.log_path(),
        }
    }

    /// Launch the server on `model_path` and return its pid.
    pub async fn start(&self, model_path: &Path) -> Result<u32, SupervisorError> {
        let _guard = self.op_lock.lock().await;
        let _held = self.lock.acquire().await?;
        self.start_locked(model_path).await
    }

    /// Stop the recorded server. The record is gone afterwards even when
    /// the process survived.
    pub async fn stop(&self) -> Result<StopOutcome, SupervisorError> {
        if !self.record.exists() {
            return Ok(StopOutcome::NotRunning);
        }
        let _guard = self.op_lock.lock().await;
        let _held = self.lock.acquire().await?;
        self.stop_locked().await
    }

    /// Replace the running server with one on `model_path`.
    ///
    /// The new model is validated before anything is stopped. A failed start
    /// after a successful stop leaves nothing running; the previous model is
    /// not restored.
    pub async fn switch_model(&self, model_path: &Path) -> SwitchOutcome {
        let _guard = self.op_lock.lock().await;

        if let Err(e) = self.check_preconditions(model_path) {
            return SwitchOutcome::failed(&e, false);
        }
        let _held = match self.lock.acquire().await {
            Ok(held) => held,
            Err(e) => return SwitchOutcome::failed(&SupervisorError::Record(e), false),
        };

        let previous_stopped = match self.stop_locked().await {
            Ok(StopOutcome::Stopped { .. }) => true,
            Ok(StopOutcome::NotRunning) => false,
            Err(e) => return SwitchOutcome::failed(&e, false),
        };

        let pid = match self.start_locked(model_path).await {
            Ok(pid) => pid,
            Err(e) => return SwitchOutcome::failed(&e, previous_stopped),
        };

        let file_name = model_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        if let Err(e) = self.store.persist_model_choice(&file_name) {
            tracing::warn!("Failed to persist model choice {}: {}", file_name, e);
        }

        SwitchOutcome {
            success: true,
            message: format!("Switched to {} (pid {})", file_name, pid),
            new_model_path: Some(absolute_path(model_path)),
            previous_stopped,
        }
    }

    fn state(&self) -> SupervisorState {
        self.state
            .lock()
            .map(|s| *s)
            .unwrap_or(SupervisorState::Stopped)
    }

    fn set_state(&self, state: SupervisorState) {
        if let Ok(mut current) = self.state.lock() {
            *current = state;
        }
    }

    fn check_preconditions(&self, model_path: &Path) -> Result<(), SupervisorError> {
        let binary = self.config.binary_path();
        if !binary.is_file() {
            return Err(SupervisorError::BinaryNotFound(binary));
        }
        if !model_path.is_file() {
            return Err(SupervisorError::ModelNotFound(model_path.to_path_buf()));
        }
        if !has_extension(model_path, &self.config.model_extension) {
            return Err(SupervisorError::WrongExtension {
                path: model_path.to_path_buf(),
                expected: self
                    .config
                    .model_extension
                    .trim_start_matches('.')
                    .to_string(),
            });
        }
        Ok(())
    }

    fn spawn_request(&self, model_path: &Path) -> SpawnRequest {
        let mut args = vec![
            "-m".to_string(),
            model_path.display().to_string(),
            "--host".to_string(),
            self.config.host.clone(),
            "--port".to_string(),
            self.config.port.to_string(),
        ];
        args.extend(self.config.extra_args.iter().cloned());
        SpawnRequest {
            program: self.config.binary_path(),
            args,
            log_path: self.config.log_path(),
        }
    }

    async fn start_locked(&self, model_path: &Path) -> Result<u32, SupervisorError> {
        self.check_preconditions(model_path)?;
        let model_path = absolute_path(model_path);

        if let Some(existing) = self.record.read() {
            if self.control.is_alive(existing.pid) {
                return Err(SupervisorError::AlreadyRunning { pid: existing.pid });
            }
            tracing::info!(
                "Clearing stale record for exited llama-server (pid {})",
                existing.pid
            );
            self.record.remove()?;
        }

        self.set_state(SupervisorState::Starting);
        let request = self.spawn_request(&model_path);
        let pid = match self.control.spawn(&request) {
            Ok(pid) => pid,
            Err(e) => {
                self.set_state(SupervisorState::Stopped);
                return Err(SupervisorError::Spawn(format!(
                    "{}: {}",
                    request.program.display(),
                    e
                )));
            }
        };

        tokio::time::sleep(self.config.settle_delay()).await;
        if !self.control.is_alive(pid) {
            self.set_state(SupervisorState::Stopped);
            return Err(SupervisorError::ExitedDuringStartup {
                pid,
                log: request.log_path,
            });
        }

        if let Err(e) = self.record.write(&SupervisorRecord::new(pid, &model_path)) {
            tracing::warn!("Failed to write record, stopping pid {}: {}", pid, e);
            terminate(self.control.as_ref(), pid, &self.policy).await;
            self.set_state(SupervisorState::Stopped);
            return Err(SupervisorError::Record(e));
        }

        self.set_state(SupervisorState::Running);
        tracing::info!(
            "llama-server started (pid {}) on {}:{} with model {}",
            pid,
            self.config.host,
            self.config.port,
            model_path.display()
        );
        Ok(pid)
    }

    async fn stop_locked(&self) -> Result<StopOutcome, SupervisorError> {
        if !self.record.exists() {
            return Ok(StopOutcome::NotRunning);
        }
        let Some(record) = self.record.read() else {
            self.record.remove()?;
            return Ok(StopOutcome::NotRunning);
        };

        self.set_state(SupervisorState::Stopping);
        let termination = terminate(self.control.as_ref(), record.pid, &self.policy).await;
        let removed = self.record.remove();
        self.set_state(SupervisorState::Stopped);

        if !termination.is_stopped() {
            return Err(SupervisorError::Unkillable { pid: record.pid });
        }
        removed?;
        tracing::info!(
            "llama-server (pid {}) stopped: {:?}",
            record.pid,
            termination
        );
        Ok(StopOutcome::Stopped {
            pid: record.pid,
            termination,
        })
    }
}

/// `path` made absolute against the working directory, without resolving
/// symlinks. Record, catalog and CLI output all use this form.
pub fn absolute_path(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}
