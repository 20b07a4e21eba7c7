// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Snapshot assembly

use chrono::Utc;

use crate::config::TelemetryConfig;

use super::gpu::{driver_name, vram_chain, vulkan_available, VramReading};
use super::power::{power_utilization, probe_power};
use super::probe::{round_to, ProbeEnv};
use super::snapshot::{
    CpuTelemetry, GpuTelemetry, MemoryTelemetry, PowerBudget, TelemetrySnapshot,
};
use super::thermal::temperature_chain;

/// Sample the live host.
///
/// Blocks for the CPU measurement window plus any external tool calls.
pub fn sample(config: &TelemetryConfig) -> TelemetrySnapshot {
    sample_with(&ProbeEnv::system(config), config)
}

/// Sample through an explicit probe environment.
pub fn sample_with(env: &ProbeEnv, config: &TelemetryConfig) -> TelemetrySnapshot {
    let cpu_percent = env.host().cpu_usage_percent().map(|p| round_to(p, 1));

    let power = probe_power(env, config.idle_watts, config.max_watts, cpu_percent);
    let utilization = power
        .watts
        .and_then(|w| power_utilization(w, config.idle_watts, config.max_watts));

    TelemetrySnapshot {
        timestamp: Utc::now(),
        power,
        memory: sample_memory(env),
        cpu: sample_cpu(env, cpu_percent),
        gpu: sample_gpu(env),
        power_budget: PowerBudget {
            idle_watts: config.idle_watts,
            max_watts: config.max_watts,
            utilization,
        },
    }
}

fn sample_memory(env: &ProbeEnv) -> Option<MemoryTelemetry> {
    let memory = env.host().memory()?;
    if memory.total_bytes == 0 {
        return None;
    }
    Some(MemoryTelemetry {
        used_bytes: memory.used_bytes,
        total_bytes: memory.total_bytes,
        percent: round_to(
            memory.used_bytes as f64 / memory.total_bytes as f64 * 100.0,
            2,
        ),
    })
}

fn sample_cpu(env: &ProbeEnv, usage_percent: Option<f64>) -> Option<CpuTelemetry> {
    let temperature = temperature_chain().first(env);
    if usage_percent.is_none() && temperature.is_none() {
        return None;
    }
    let (temperature_c, temperature_source) = match temperature {
        Some(reading) => (Some(round_to(reading.value, 1)), Some(reading.source)),
        None => (None, None),
    };
    Some(CpuTelemetry {
        usage_percent,
        temperature_c,
        temperature_source,
    })
}

fn sample_gpu(env: &ProbeEnv) -> Option<GpuTelemetry> {
    let vram = vram_chain().first(env);
    let driver_name = driver_name(env);
    let vulkan_available = vulkan_available(env);
    if vram.is_none() && driver_name.is_none() && !vulkan_available {
        return None;
    }

    let mut gpu = GpuTelemetry {
        vram_used_bytes: None,
        vram_total_bytes: None,
        vram_percent: None,
        vram_source: None,
        driver_name,
        vulkan_available,
    };
    if let Some(reading) = vram {
        let VramReading {
            used_bytes,
            total_bytes,
        } = reading.value;
        gpu.vram_used_bytes = Some(used_bytes);
        gpu.vram_total_bytes = total_bytes;
        gpu.vram_percent = total_bytes
            .filter(|total| *total > 0)
            .map(|total| round_to(used_bytes as f64 / total as f64 * 100.0, 2));
        gpu.vram_source = Some(reading.source);
    }
    Some(gpu)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::host::MemoryReading;
    use crate::hardware::probe::testing::*;
    use crate::hardware::snapshot::PowerStatus;
    use tempfile::TempDir;

    fn config() -> TelemetryConfig {
        TelemetryConfig::default()
    }

    #[test]
    fn test_all_sources_absent() {
        let temp = TempDir::new().unwrap();
        let env = env_at(temp.path(), FakeRunner::default(), FakeHost::default());

        let snapshot = sample_with(&env, &config());
        assert_eq!(snapshot.power.status, PowerStatus::Unavailable);
        assert!(snapshot.power.watts.is_none());
        assert!(snapshot.power.detail.is_some());
        assert!(snapshot.memory.is_none());
        assert!(snapshot.cpu.is_none());
        assert!(snapshot.gpu.is_none());
        assert_eq!(snapshot.power_budget.idle_watts, 15.0);
        assert_eq!(snapshot.power_budget.max_watts, 65.0);
        assert!(snapshot.power_budget.utilization.is_none());

        let value = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(value["power"]["status"], "unavailable");
        assert!(value["gpu"].is_null());
    }

    #[test]
    fn test_estimate_feeds_budget() {
        let temp = TempDir::new().unwrap();
        let host = FakeHost {
            cpu_percent: Some(50.04),
            memory: Some(MemoryReading {
                used_bytes: 1,
                total_bytes: 3,
            }),
        };
        let env = env_at(temp.path(), FakeRunner::default(), host);

        let snapshot = sample_with(&env, &config());
        assert_eq!(snapshot.power.status, PowerStatus::Estimated);
        assert_eq!(snapshot.power.watts, Some(40.0));
        assert_eq!(snapshot.power_budget.utilization, Some(0.5));

        let cpu = snapshot.cpu.unwrap();
        assert_eq!(cpu.usage_percent, Some(50.0));
        assert!(cpu.temperature_c.is_none());

        let memory = snapshot.memory.unwrap();
        assert_eq!(memory.percent, 33.33);
    }

    #[test]
    fn test_gpu_and_temperature() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "sys/class/hwmon/hwmon0/name", "coretemp");
        write(temp.path(), "sys/class/hwmon/hwmon0/temp1_input", "55555");
        let runner = FakeRunner::default().with(
            "nvidia-smi --query-gpu=memory.used,memory.total --format=csv,noheader,nounits",
            "1024, 4096\n4096, 16384\n",
        );
        let env = env_at(temp.path(), runner, FakeHost::default());

        let snapshot = sample_with(&env, &config());
        let cpu = snapshot.cpu.unwrap();
        assert_eq!(cpu.temperature_c, Some(55.6));
        assert_eq!(cpu.temperature_source.as_deref(), Some("coretemp"));
        assert!(cpu.usage_percent.is_none());

        let gpu = snapshot.gpu.unwrap();
        assert_eq!(gpu.vram_total_bytes, Some(16384 * 1024 * 1024));
        assert_eq!(gpu.vram_percent, Some(25.0));
        assert_eq!(gpu.vram_source.as_deref(), Some("nvidia-smi:1"));
        assert!(!gpu.vulkan_available);
    }

    #[test]
    fn test_shared_memory_gpu_has_no_percent() {
        let temp = TempDir::new().unwrap();
        write(
            temp.path(),
            "sys/kernel/debug/dri/0/i915_gem_objects",
            "10 objects, 2048 bytes",
        );
        let env = env_at(temp.path(), FakeRunner::default(), FakeHost::default());

        let gpu = sample_with(&env, &config()).gpu.unwrap();
        assert_eq!(gpu.vram_used_bytes, Some(2048));
        assert!(gpu.vram_total_bytes.is_none());
        assert!(gpu.vram_percent.is_none());
    }

    #[test]
    fn test_zero_memory_total_is_absent() {
        let temp = TempDir::new().unwrap();
        let host = FakeHost {
            cpu_percent: None,
            memory: Some(MemoryReading {
                used_bytes: 0,
                total_bytes: 0,
            }),
        };
        let env = env_at(temp.path(), FakeRunner::default(), host);
        assert!(sample_with(&env, &config()).memory.is_none());
    }
}
