// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Battery sensors
//!
//! Each platform sensor fills a [`BatteryReading`]; fields a sensor cannot
//! supply stay `None` rather than being guessed.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;

use super::probe::ProbeEnv;

pub(crate) const POWER_SUPPLY_DIR: &str = "/sys/class/power_supply";

/// What a battery sensor reported.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatteryReading {
    /// Charge level, 0–100
    pub percent: Option<f64>,
    /// Whether external power is connected
    pub plugged: Option<bool>,
    /// Instantaneous draw, only for sensors that bundle it (macOS smart battery)
    pub power_watts: Option<f64>,
    pub source: &'static str,
}

/// Outcome of looking for a battery.
#[derive(Debug, Clone, PartialEq)]
pub enum BatteryStatus {
    Present(BatteryReading),
    /// No battery on this host; the detail explains what was checked
    Absent(String),
    /// A battery exists but its sensor could not be read
    Error(String),
}

impl BatteryStatus {
    pub fn reading(&self) -> Option<&BatteryReading> {
        match self {
            BatteryStatus::Present(reading) => Some(reading),
            _ => None,
        }
    }
}

/// Query the platform battery sensor.
pub fn read_battery(env: &ProbeEnv) -> BatteryStatus {
    if cfg!(target_os = "macos") {
        return read_macos_battery(env);
    }
    read_linux_battery(env)
}

/// First power supply (by name) that looks like a battery.
pub(crate) fn find_battery_dir(env: &ProbeEnv) -> Option<PathBuf> {
    env.list_dir(&env.sys_path(POWER_SUPPLY_DIR))
        .into_iter()
        .find(|path| {
            path.file_name()
                .map(|n| {
                    let name = n.to_string_lossy();
                    name.starts_with("BAT") || name.to_lowercase().contains("battery")
                })
                .unwrap_or(false)
        })
}

fn read_linux_battery(env: &ProbeEnv) -> BatteryStatus {
    let Some(dir) = find_battery_dir(env) else {
        return BatteryStatus::Absent("Battery information unavailable".to_string());
    };

    let Some(percent) = env.read_number(&dir.join("capacity")) else {
        return BatteryStatus::Error(format!(
            "Battery sensor error: cannot read {}",
            dir.join("capacity").display()
        ));
    };

    let plugged = mains_online(env).or_else(|| plugged_from_status(env, &dir));

    BatteryStatus::Present(BatteryReading {
        percent: Some(percent.clamp(0.0, 100.0)),
        plugged,
        power_watts: None,
        source: "power_supply",
    })
}

/// `online` of any supply typed `Mains`; any online adapter counts.
fn mains_online(env: &ProbeEnv) -> Option<bool> {
    let mut seen = None;
    for dir in env.list_dir(&env.sys_path(POWER_SUPPLY_DIR)) {
        if env.read_trimmed(&dir.join("type")).as_deref() != Some("Mains") {
            continue;
        }
        if let Some(online) = env.read_number(&dir.join("online")) {
            if online > 0.0 {
                return Some(true);
            }
            seen = Some(false);
        }
    }
    seen
}

fn plugged_from_status(env: &ProbeEnv, battery_dir: &Path) -> Option<bool> {
    match env.read_trimmed(&battery_dir.join("status"))?.as_str() {
        "Charging" | "Full" | "Not charging" => Some(true),
        "Discharging" => Some(false),
        _ => None,
    }
}

fn read_macos_battery(env: &ProbeEnv) -> BatteryStatus {
    match env.run("ioreg", &["-rn", "AppleSmartBattery"]) {
        Some(output) => match parse_ioreg_battery(&output) {
            Some(reading) => BatteryStatus::Present(reading),
            None => BatteryStatus::Absent("Battery information unavailable".to_string()),
        },
        None => BatteryStatus::Absent("Battery sensors not supported on this platform".to_string()),
    }
}

fn ioreg_value<'a>(output: &'a str, key: &str) -> Option<&'a str> {
    static LINE: OnceLock<Regex> = OnceLock::new();
    let re = LINE.get_or_init(|| {
        Regex::new(r#"(?m)^\s*"([A-Za-z]+)"\s*=\s*(\S+)\s*$"#).expect("valid ioreg regex")
    });
    re.captures_iter(output)
        .find(|caps| &caps[1] == key)
        .and_then(|caps| caps.get(2))
        .map(|m| m.as_str())
}

/// Parse `ioreg -rn AppleSmartBattery`.
///
/// `Amperage` is signed but printed as an unsigned 64-bit wrap when
/// discharging, so it is reinterpreted as `i64`.
pub(crate) fn parse_ioreg_battery(output: &str) -> Option<BatteryReading> {
    let current = ioreg_value(output, "CurrentCapacity")?.parse::<f64>().ok()?;
    let max = ioreg_value(output, "MaxCapacity")?.parse::<f64>().ok()?;
    if max <= 0.0 {
        return None;
    }
    // Newer firmware reports CurrentCapacity as a percentage with MaxCapacity = 100.
    let percent = (current / max * 100.0).clamp(0.0, 100.0);

    let plugged = ioreg_value(output, "ExternalConnected").map(|v| v == "Yes");

    let voltage_mv = ioreg_value(output, "Voltage").and_then(|v| v.parse::<f64>().ok());
    let amperage_ma = ioreg_value(output, "Amperage").and_then(|v| {
        v.parse::<i64>()
            .ok()
            .or_else(|| v.parse::<u64>().ok().map(|u| u as i64))
    });
    let power_watts = match (voltage_mv, amperage_ma) {
        (Some(v), Some(a)) if a != 0 => Some((a as f64).abs() * v / 1_000_000.0),
        _ => None,
    };

    Some(BatteryReading {
        percent: Some(percent),
        plugged,
        power_watts,
        source: "ioreg",
    })
}
