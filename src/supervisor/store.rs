// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Durable record of the chosen model

use std::path::PathBuf;

use crate::config::Settings;
use crate::error::Result;

pub trait ModelChoiceStore: Send + Sync {
    /// Remember `file_name` as the model to start by default.
    fn persist_model_choice(&self, file_name: &str) -> Result<()>;
}

/// Writes `supervisor.default_model` into a settings file, keeping every
/// other key as it was.
#[derive(Debug, Clone)]
pub struct SettingsFileStore {
    path: PathBuf,
}

impl SettingsFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ModelChoiceStore for SettingsFileStore {
    fn persist_model_choice(&self, file_name: &str) -> Result<()> {
        let mut settings = Settings::load_from(&self.path)?;
        settings.supervisor.default_model = Some(file_name.to_string());
        settings.save_to(&self.path)?;
        tracing::debug!(
            "Persisted default model {} to {}",
            file_name,
            self.path.display()
        );
        Ok(())
    }
}
