// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Telemetry snapshot command

use crate::cli::OutputFormat;
use crate::config::TelemetryConfig;
use crate::error::{Result, RigError};
use crate::hardware::{self, PowerStatus, TelemetrySnapshot};

use super::{emit, format_bytes, or_dash};

/// Execute the sample command.
///
/// Sampling blocks on sysfs reads and external tools, so it runs on the
/// blocking pool.
pub async fn execute(config: &TelemetryConfig, format: OutputFormat) -> Result<()> {
    let config = config.clone();
    let snapshot = tokio::task::spawn_blocking(move || hardware::sample(&config))
        .await
        .map_err(|e| RigError::Config(format!("Telemetry sampling failed: {}", e)))?;
    emit(format, &snapshot, render)
}

fn power_status_label(status: PowerStatus) -> &'static str {
    match status {
        PowerStatus::Ok => "ok",
        PowerStatus::Estimated => "estimated",
        PowerStatus::Error => "error",
        PowerStatus::Unavailable => "unavailable",
    }
}

pub(crate) fn render(snapshot: &TelemetrySnapshot) -> String {
    let mut out = String::new();
    out.push_str(&format!("\n=== Telemetry {} ===\n\n", snapshot.timestamp.to_rfc3339()));

    let power = &snapshot.power;
    out.push_str(&format!(
        "Power: {} W [{}]",
        or_dash(power.watts),
        power_status_label(power.status)
    ));
    if let Some(source) = &power.source {
        out.push_str(&format!(" via {}", source));
    }
    out.push('\n');
    if let Some(detail) = &power.detail {
        out.push_str(&format!("  {}\n", detail));
    }
    if power.battery_percent.is_some() || power.plugged.is_some() {
        let plugged = match power.plugged {
            Some(true) => "plugged in",
            Some(false) => "on battery",
            None => "adapter unknown",
        };
        out.push_str(&format!(
            "Battery: {}% ({})\n",
            or_dash(power.battery_percent),
            plugged
        ));
    }

    let budget = &snapshot.power_budget;
    out.push_str(&format!(
        "Budget: {}-{} W, utilization {}\n",
        budget.idle_watts,
        budget.max_watts,
        budget
            .utilization
            .map(|u| format!("{:.0}%", u * 100.0))
            .unwrap_or_else(|| "-".to_string())
    ));

    match &snapshot.cpu {
        Some(cpu) => {
            out.push_str(&format!("CPU: {}%", or_dash(cpu.usage_percent)));
            if let Some(t) = cpu.temperature_c {
                out.push_str(&format!(", {} °C", t));
                if let Some(source) = &cpu.temperature_source {
                    out.push_str(&format!(" ({})", source));
                }
            }
            out.push('\n');
        }
        None => out.push_str("CPU: unavailable\n"),
    }

    match &snapshot.memory {
        Some(memory) => out.push_str(&format!(
            "RAM: {} / {} ({}%)\n",
            format_bytes(memory.used_bytes),
            format_bytes(memory.total_bytes),
            memory.percent
        )),
        None => out.push_str("RAM: unavailable\n"),
    }

    match &snapshot.gpu {
        Some(gpu) => {
            let used = gpu.vram_used_bytes.map(format_bytes);
            let total = gpu.vram_total_bytes.map(format_bytes);
            out.push_str(&format!("VRAM: {} / {}", or_dash(used), or_dash(total)));
            if let Some(percent) = gpu.vram_percent {
                out.push_str(&format!(" ({}%)", percent));
            }
            if let Some(source) = &gpu.vram_source {
                out.push_str(&format!(" via {}", source));
            }
            out.push('\n');
            out.push_str(&format!(
                "Driver: {}, Vulkan: {}\n",
                gpu.driver_name.as_deref().unwrap_or("-"),
                if gpu.vulkan_available { "yes" } else { "no" }
            ));
        }
        None => out.push_str("GPU: none detected\n"),
    }

    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::{GpuTelemetry, PowerBudget, PowerTelemetry};
    use chrono::Utc;

    fn snapshot() -> TelemetrySnapshot {
        TelemetrySnapshot {
            timestamp: Utc::now(),
            power: PowerTelemetry {
                watts: Some(40.0),
                plugged: None,
                battery_percent: None,
                status: PowerStatus::Estimated,
                detail: Some("Estimated from CPU utilization".to_string()),
                source: Some("estimate".to_string()),
            },
            memory: None,
            cpu: None,
            gpu: Some(GpuTelemetry {
                vram_used_bytes: Some(2 * 1_073_741_824),
                vram_total_bytes: None,
                vram_percent: None,
                vram_source: Some("i915".to_string()),
                driver_name: Some("i915".to_string()),
                vulkan_available: true,
            }),
            power_budget: PowerBudget {
                idle_watts: 15.0,
                max_watts: 65.0,
                utilization: Some(0.5),
            },
        }
    }

    #[test]
    fn test_render_text() {
        let text = render(&snapshot());
        assert!(text.contains("Power: 40 W [estimated] via estimate"));
        assert!(text.contains("Estimated from CPU utilization"));
        assert!(text.contains("utilization 50%"));
        assert!(text.contains("VRAM: 2.0 GB / - via i915"));
        assert!(text.contains("Vulkan: yes"));
        assert!(text.contains("RAM: unavailable"));
        assert!(!text.contains("Battery:"));
    }
}
