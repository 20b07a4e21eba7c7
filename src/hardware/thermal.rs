// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! CPU temperature from hwmon sensors and thermal zones.

use std::path::Path;

use super::probe::{ProbeChain, ProbeEnv, Reading};

const HWMON_DIR: &str = "/sys/class/hwmon";
const THERMAL_ZONE_TEMP: &str = "/sys/class/thermal/thermal_zone0/temp";

/// hwmon driver names that measure the CPU package, best first.
const PREFERRED_SENSORS: &[&str] = &[
    "coretemp",
    "k10temp",
    "cpu_thermal",
    "cpu-thermal",
    "soc_thermal",
    "soc-thermal",
    "thermal-fan-est",
    "acpitz",
];

/// Temperature sources in priority order.
pub fn temperature_chain() -> ProbeChain<'static, f64> {
    ProbeChain::new("cpu temperature")
        .with("hwmon-preferred", read_preferred_hwmon)
        .with("hwmon-any", read_any_hwmon)
        .with("thermal-zone", read_thermal_zone)
}

fn read_preferred_hwmon(env: &ProbeEnv) -> Option<Reading<f64>> {
    let sensors = hwmon_sensors(env);
    PREFERRED_SENSORS.iter().find_map(|preferred| {
        sensors
            .iter()
            .filter(|(name, _)| name == preferred)
            .find_map(|(name, dir)| first_temperature(env, dir).map(|t| Reading::new(t, name)))
    })
}

fn read_any_hwmon(env: &ProbeEnv) -> Option<Reading<f64>> {
    hwmon_sensors(env)
        .into_iter()
        .find_map(|(name, dir)| first_temperature(env, &dir).map(|t| Reading::new(t, name)))
}

fn read_thermal_zone(env: &ProbeEnv) -> Option<Reading<f64>> {
    let raw = env.read_trimmed(&env.sys_path(THERMAL_ZONE_TEMP))?;
    let temperature_c = parse_linux_thermal_zone_temp(&raw)?;
    Some(Reading::new(temperature_c, "thermal_zone0"))
}

/// `(driver name, directory)` for every hwmon device that names itself.
fn hwmon_sensors(env: &ProbeEnv) -> Vec<(String, std::path::PathBuf)> {
    env.list_dir(&env.sys_path(HWMON_DIR))
        .into_iter()
        .filter_map(|dir| {
            let name = env.read_trimmed(&dir.join("name"))?;
            Some((name, dir))
        })
        .collect()
}

/// First readable `temp*_input` (millidegrees) in a hwmon directory.
fn first_temperature(env: &ProbeEnv, dir: &Path) -> Option<f64> {
    env.list_dir(dir).into_iter().find_map(|file| {
        let name = file.file_name()?.to_string_lossy().to_string();
        if !(name.starts_with("temp") && name.ends_with("_input")) {
            return None;
        }
        let millidegrees = env.read_number(&file)?;
        Some(millidegrees / 1000.0)
    })
}

/// Thermal zones report millidegrees; a few drivers report plain degrees.
fn parse_linux_thermal_zone_temp(raw: &str) -> Option<f64> {
    let value: f64 = raw.trim().parse().ok()?;
    if value > 1000.0 {
        Some(value / 1000.0)
    } else {
        Some(value)
    }
}
