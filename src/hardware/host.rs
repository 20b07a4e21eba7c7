// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! CPU load and RAM statistics

use sysinfo::System;

/// System RAM in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryReading {
    pub used_bytes: u64,
    pub total_bytes: u64,
}

/// Host-wide statistics that are not tied to a single sysfs file.
pub trait HostStats: Send + Sync {
    /// Global CPU utilization, 0–100.
    fn cpu_usage_percent(&self) -> Option<f64>;

    fn memory(&self) -> Option<MemoryReading>;
}

/// Statistics from the `sysinfo` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct SysinfoStats;

impl HostStats for SysinfoStats {
    fn cpu_usage_percent(&self) -> Option<f64> {
        if !sysinfo::IS_SUPPORTED_SYSTEM {
            return None;
        }

        // Usage is a delta between two refreshes.
        let mut sys = System::new();
        sys.refresh_cpu_usage();
        std::thread::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);
        sys.refresh_cpu_usage();

        let usage = sys.global_cpu_usage() as f64;
        if usage.is_finite() {
            Some(usage.clamp(0.0, 100.0))
        } else {
            None
        }
    }

    fn memory(&self) -> Option<MemoryReading> {
        let mut sys = System::new();
        sys.refresh_memory();

        let total_bytes = sys.total_memory();
        if total_bytes == 0 {
            return None;
        }
        Some(MemoryReading {
            used_bytes: sys.used_memory(),
            total_bytes,
        })
    }
}
