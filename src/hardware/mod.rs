// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Hardware telemetry
//!
//! Read-only and stateless: each call to [`sample`] walks the probe chains
//! once and returns a [`TelemetrySnapshot`]. Probe failures never surface as
//! errors; a missing source leaves its field empty.

pub mod battery;
pub mod command;
pub mod gpu;
pub mod host;
pub mod power;
pub mod probe;
pub mod sampler;
pub mod snapshot;
pub mod thermal;

pub use battery::{read_battery, BatteryReading, BatteryStatus};
pub use command::{CommandRunner, SystemCommandRunner};
pub use gpu::{driver_name, vram_chain, vulkan_available, VramReading};
pub use host::{HostStats, MemoryReading, SysinfoStats};
pub use power::{estimate_watts, power_utilization, probe_power, watts_chain};
pub use probe::{ProbeChain, ProbeEnv, Reading};
pub use sampler::{sample, sample_with};
pub use snapshot::*;
pub use thermal::temperature_chain;
