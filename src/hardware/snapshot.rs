// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Telemetry snapshot types
//!
//! Serialized camelCase for the request layer. Every numeric field is either
//! a reading or `null`; zero always means a real zero.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Confidence of the power figure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PowerStatus {
    /// Read directly from a sensor
    Ok,
    /// Synthesized from CPU load
    Estimated,
    /// A sensor exists but failed
    Error,
    /// No figure at all
    Unavailable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PowerTelemetry {
    pub watts: Option<f64>,
    pub plugged: Option<bool>,
    pub battery_percent: Option<f64>,
    pub status: PowerStatus,
    /// Human-readable reason, present whenever `status` is not `ok`
    pub detail: Option<String>,
    pub source: Option<String>,
}

impl PowerTelemetry {
    pub fn unavailable(detail: impl Into<String>) -> Self {
        Self {
            watts: None,
            plugged: None,
            battery_percent: None,
            status: PowerStatus::Unavailable,
            detail: Some(detail.into()),
            source: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryTelemetry {
    pub used_bytes: u64,
    pub total_bytes: u64,
    pub percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CpuTelemetry {
    pub usage_percent: Option<f64>,
    pub temperature_c: Option<f64>,
    pub temperature_source: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GpuTelemetry {
    pub vram_used_bytes: Option<u64>,
    /// `None` for shared-memory GPUs whose capacity is unknown
    pub vram_total_bytes: Option<u64>,
    /// `None` whenever the total is unknown; never rendered as 0%
    pub vram_percent: Option<f64>,
    pub vram_source: Option<String>,
    pub driver_name: Option<String>,
    pub vulkan_available: bool,
}

/// Static power budget echoed back with the derived utilization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PowerBudget {
    pub idle_watts: f64,
    pub max_watts: f64,
    pub utilization: Option<f64>,
}

/// One point-in-time view of the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetrySnapshot {
    pub timestamp: DateTime<Utc>,
    pub power: PowerTelemetry,
    pub memory: Option<MemoryTelemetry>,
    pub cpu: Option<CpuTelemetry>,
    pub gpu: Option<GpuTelemetry>,
    pub power_budget: PowerBudget,
}
