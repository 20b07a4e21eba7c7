// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use crate::error::{Result, RigError};

use super::Settings;

const IDLE_WATTS_ENV: &str = "RIGCTL_IDLE_WATTS";
const MAX_WATTS_ENV: &str = "RIGCTL_MAX_WATTS";

impl Settings {
    /// Apply power budget overrides from the environment.
    /// Priority: env var > config file.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(value) = parse_watts(IDLE_WATTS_ENV, lookup(IDLE_WATTS_ENV)) {
            self.telemetry.idle_watts = value;
        }
        if let Some(value) = parse_watts(MAX_WATTS_ENV, lookup(MAX_WATTS_ENV)) {
            self.telemetry.max_watts = value;
        }
    }

    /// Reject settings the sampler and supervisor cannot work with.
    pub fn validate(&self) -> Result<()> {
        let t = &self.telemetry;
        if !t.idle_watts.is_finite() || t.idle_watts < 0.0 {
            return Err(RigError::Config(format!(
                "idle_watts must be a non-negative number, got {}",
                t.idle_watts
            )));
        }
        if !t.max_watts.is_finite() || t.max_watts < t.idle_watts {
            return Err(RigError::Config(format!(
                "max_watts ({}) must be at least idle_watts ({})",
                t.max_watts, t.idle_watts
            )));
        }
        if self.supervisor.model_extension.trim_start_matches('.').is_empty() {
            return Err(RigError::Config(
                "model_extension must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_watts(key: &str, raw: Option<String>) -> Option<f64> {
    let raw = raw?;
    match raw.trim().parse::<f64>() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!("Ignoring invalid {}='{}'", key, raw);
            None
        }
    }
}
