// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! llama-server management commands

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::cli::OutputFormat;
use crate::error::{Result, RigError};
use crate::supervisor::{
    absolute_path, ModelCatalog, StopOutcome, Supervisor, SupervisorStatus, SwitchOutcome,
    Termination,
};

use super::{emit, format_bytes, or_dash};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CurrentModel {
    model_path: Option<PathBuf>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Started {
    pid: u32,
    model_path: PathBuf,
}

impl Started {
    /// Reported with the same absolute path the record holds.
    fn new(pid: u32, model_path: &Path) -> Self {
        Self {
            pid,
            model_path: absolute_path(model_path),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Stopped {
    stopped: bool,
    pid: Option<u32>,
    forced: bool,
}

pub fn models(supervisor: &Supervisor, format: OutputFormat) -> Result<()> {
    emit(format, &supervisor.list_models(), render_catalog)
}

pub fn current(supervisor: &Supervisor, format: OutputFormat) -> Result<()> {
    let current = CurrentModel {
        model_path: supervisor.current_model(),
    };
    emit(format, &current, |c| match &c.model_path {
        Some(path) => format!("{}\n", path.display()),
        None => "No model running\n".to_string(),
    })
}

pub fn status(supervisor: &Supervisor, format: OutputFormat) -> Result<()> {
    emit(format, &supervisor.status(), render_status)
}

/// Start on `model`, or on the configured default model when none is given.
pub async fn start(
    supervisor: &Supervisor,
    model: Option<&Path>,
    format: OutputFormat,
) -> Result<()> {
    let model_path = match model {
        Some(path) => path.to_path_buf(),
        None => supervisor.config().default_model_path().ok_or_else(|| {
            RigError::InvalidInput(
                "No model given and supervisor.default_model is not set".to_string(),
            )
        })?,
    };

    let pid = supervisor.start(&model_path).await?;
    let started = Started::new(pid, &model_path);
    emit(format, &started, |s| {
        format!(
            "Started llama-server (pid {}) with {}\n",
            s.pid,
            s.model_path.display()
        )
    })
}

pub async fn stop(supervisor: &Supervisor, format: OutputFormat) -> Result<()> {
    let stopped = match supervisor.stop().await? {
        StopOutcome::NotRunning => Stopped {
            stopped: false,
            pid: None,
            forced: false,
        },
        StopOutcome::Stopped { pid, termination } => Stopped {
            stopped: true,
            pid: Some(pid),
            forced: termination == Termination::Forced,
        },
    };
    emit(format, &stopped, |s| match (s.pid, s.forced) {
        (None, _) => "llama-server is not running\n".to_string(),
        (Some(pid), true) => format!("Killed llama-server (pid {})\n", pid),
        (Some(pid), false) => format!("Stopped llama-server (pid {})\n", pid),
    })
}

/// A failed switch is reported in the output and as a non-zero exit.
pub async fn switch(supervisor: &Supervisor, model: &Path, format: OutputFormat) -> Result<()> {
    let outcome = supervisor.switch_model(model).await;
    emit(format, &outcome, render_switch)?;
    if outcome.success {
        Ok(())
    } else {
        Err(RigError::InvalidInput(outcome.message))
    }
}

pub(crate) fn render_catalog(catalog: &ModelCatalog) -> String {
    if catalog.models.is_empty() {
        return "No models found\n".to_string();
    }
    let mut out = String::new();
    for model in &catalog.models {
        let marker = if model.is_current { "*" } else { " " };
        out.push_str(&format!(
            "{} {:<48} {:>9}\n",
            marker,
            model.name,
            format_bytes(model.size_bytes)
        ));
    }
    out
}

pub(crate) fn render_status(status: &SupervisorStatus) -> String {
    let mut out = format!("State: {}\n", status.state);
    out.push_str(&format!("PID: {}\n", or_dash(status.pid)));
    out.push_str(&format!(
        "Model: {}\n",
        or_dash(status.model_path.as_ref().map(|p| p.display()))
    ));
    if status.pid.is_some() && !status.alive {
        out.push_str("Recorded process is not alive\n");
    }
    out.push_str(&format!("Endpoint: http://{}:{}\n", status.host, status.port));
    out.push_str(&format!("Log: {}\n", status.log_path.display()));
    out
}

pub(crate) fn render_switch(outcome: &SwitchOutcome) -> String {
    let mut out = format!("{}\n", outcome.message);
    if !outcome.success && outcome.previous_stopped {
        out.push_str("The previous server was stopped; nothing is running now.\n");
    }
    out
}
