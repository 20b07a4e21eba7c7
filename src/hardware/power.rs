// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Power draw: direct readings first, CPU-load estimate last

use super::battery::{find_battery_dir, read_battery, BatteryReading, BatteryStatus};
use super::probe::{clamp01, round_to, ProbeChain, ProbeEnv, Reading};
use super::snapshot::{PowerStatus, PowerTelemetry};

const HWMON_DIR: &str = "/sys/class/hwmon";

pub(crate) const ESTIMATED_DETAIL: &str = "Estimated from CPU utilization";
const UNAVAILABLE_DETAIL: &str = "Power telemetry unavailable on this host.";

/// Direct wattage sources in priority order.
///
/// The battery reading is passed in so its bundled power field can act as a
/// late fallback without querying the sensor twice.
pub fn watts_chain<'a>(battery: Option<&'a BatteryReading>) -> ProbeChain<'a, f64> {
    ProbeChain::new("power")
        .with("power_supply", read_power_supply_watts)
        .with("hwmon", read_hwmon_power_watts)
        .with("battery", move |_| {
            let reading = battery?;
            let watts = reading.power_watts.filter(|w| w.is_finite() && *w >= 0.0)?;
            Some(Reading::new(watts, reading.source))
        })
}

/// Sample power telemetry.
///
/// `cpu_percent` feeds the estimate when no sensor reports wattage.
pub fn probe_power(
    env: &ProbeEnv,
    idle_watts: f64,
    max_watts: f64,
    cpu_percent: Option<f64>,
) -> PowerTelemetry {
    let battery = read_battery(env);

    let mut telemetry = PowerTelemetry::unavailable(UNAVAILABLE_DETAIL);
    match &battery {
        BatteryStatus::Present(reading) => {
            telemetry.plugged = reading.plugged;
            telemetry.battery_percent = reading.percent.map(|p| round_to(p, 2));
        }
        BatteryStatus::Absent(detail) => telemetry.detail = Some(detail.clone()),
        BatteryStatus::Error(detail) => {
            telemetry.status = PowerStatus::Error;
            telemetry.detail = Some(detail.clone());
        }
    }

    if let Some(reading) = watts_chain(battery.reading()).first(env) {
        telemetry.watts = Some(round_to(reading.value, 2));
        telemetry.status = PowerStatus::Ok;
        telemetry.detail = None;
        telemetry.source = Some(reading.source);
        return telemetry;
    }

    if let Some(percent) = cpu_percent {
        let watts = estimate_watts(idle_watts, max_watts, percent / 100.0);
        telemetry.watts = Some(round_to(watts, 2));
        telemetry.status = PowerStatus::Estimated;
        telemetry.detail = Some(ESTIMATED_DETAIL.to_string());
        telemetry.source = Some("estimate".to_string());
        return telemetry;
    }

    if telemetry.status != PowerStatus::Error {
        telemetry.status = PowerStatus::Unavailable;
    }
    telemetry
}

/// Linear interpolation between the idle and max budget by CPU load (0–1).
pub fn estimate_watts(idle_watts: f64, max_watts: f64, cpu_load: f64) -> f64 {
    let span = (max_watts - idle_watts).max(0.0);
    idle_watts + span * clamp01(cpu_load)
}

/// Position of `watts` within the power budget, clamped to [0, 1].
pub fn power_utilization(watts: f64, idle_watts: f64, max_watts: f64) -> Option<f64> {
    let span = max_watts - idle_watts;
    if span <= 0.0 || !watts.is_finite() {
        return None;
    }
    Some(clamp01((watts - idle_watts) / span))
}

/// `power_now` (µW), else `current_now` (µA) × `voltage_now` (µV).
fn read_power_supply_watts(env: &ProbeEnv) -> Option<Reading<f64>> {
    let dir = find_battery_dir(env)?;

    if let Some(microwatts) = env.read_number(&dir.join("power_now")) {
        return Some(Reading::new(microwatts / 1_000_000.0, "power_supply:power_now"));
    }

    let microamps = env.read_number(&dir.join("current_now"))?;
    // Missing voltage is a probe failure, not zero watts.
    let microvolts = env.read_number(&dir.join("voltage_now"))?;
    Some(Reading::new(
        microamps.abs() * microvolts / 1_000_000_000_000.0,
        "power_supply:current_now",
    ))
}

/// First strictly positive `power*_input` (µW) across hwmon devices.
fn read_hwmon_power_watts(env: &ProbeEnv) -> Option<Reading<f64>> {
    for hwmon in env.list_dir(&env.sys_path(HWMON_DIR)) {
        let hwmon_name = hwmon
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        for file in env.list_dir(&hwmon) {
            let Some(name) = file.file_name().map(|n| n.to_string_lossy().to_string()) else {
                continue;
            };
            if !(name.starts_with("power") && name.ends_with("_input")) {
                continue;
            }
            match env.read_number(&file) {
                Some(value) if value > 0.0 => {
                    return Some(Reading::new(
                        value / 1_000_000.0,
                        format!("hwmon:{}/{}", hwmon_name, name),
                    ));
                }
                _ => continue,
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::probe::testing::*;
    use tempfile::TempDir;

    const BAT: &str = "sys/class/power_supply/BAT0";

    #[test]
    fn test_estimate_watts_bounds() {
        assert_eq!(estimate_watts(15.0, 65.0, 0.0), 15.0);
        assert_eq!(estimate_watts(15.0, 65.0, 1.0), 65.0);
        assert_eq!(estimate_watts(15.0, 65.0, 0.5), 40.0);
        assert_eq!(estimate_watts(15.0, 65.0, 3.0), 65.0);
        assert_eq!(estimate_watts(15.0, 65.0, -1.0), 15.0);
    }

    #[test]
    fn test_estimate_watts_inverted_budget() {
        assert_eq!(estimate_watts(30.0, 20.0, 0.8), 30.0);
    }

    #[test]
    fn test_power_utilization() {
        assert_eq!(power_utilization(40.0, 15.0, 65.0), Some(0.5));
        assert_eq!(power_utilization(5.0, 15.0, 65.0), Some(0.0));
        assert_eq!(power_utilization(100.0, 15.0, 65.0), Some(1.0));
        assert_eq!(power_utilization(40.0, 65.0, 65.0), None);
        assert_eq!(power_utilization(40.0, 70.0, 65.0), None);
    }

    #[test]
    fn test_power_now_microwatts() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), &format!("{BAT}/capacity"), "50");
        write(temp.path(), &format!("{BAT}/power_now"), "12345678");
        let env = env_at(temp.path(), FakeRunner::default(), FakeHost::default());

        let reading = read_power_supply_watts(&env).unwrap();
        assert!((reading.value - 12.345678).abs() < 1e-9);
    }

    #[test]
    fn test_current_times_voltage() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), &format!("{BAT}/current_now"), "1500000");
        write(temp.path(), &format!("{BAT}/voltage_now"), "12000000");
        let env = env_at(temp.path(), FakeRunner::default(), FakeHost::default());

        let reading = read_power_supply_watts(&env).unwrap();
        assert!((reading.value - 18.0).abs() < 1e-9);
        assert_eq!(reading.source, "power_supply:current_now");
    }

    #[test]
    fn test_current_without_voltage_fails() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), &format!("{BAT}/current_now"), "1500000");
        let env = env_at(temp.path(), FakeRunner::default(), FakeHost::default());
        assert!(read_power_supply_watts(&env).is_none());
    }

    #[test]
    fn test_hwmon_skips_zero_and_garbage() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "sys/class/hwmon/hwmon0/power1_input", "0");
        write(temp.path(), "sys/class/hwmon/hwmon1/power1_input", "n/a");
        write(temp.path(), "sys/class/hwmon/hwmon2/power1_input", "25500000");
        write(temp.path(), "sys/class/hwmon/hwmon3/power1_input", "99000000");
        let env = env_at(temp.path(), FakeRunner::default(), FakeHost::default());

        let reading = read_hwmon_power_watts(&env).unwrap();
        assert_eq!(reading.value, 25.5);
        assert_eq!(reading.source, "hwmon:hwmon2/power1_input");
    }

    #[test]
    #[cfg(not(target_os = "macos"))]
    fn test_probe_power_direct_reading_is_ok() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), &format!("{BAT}/capacity"), "66.666");
        write(temp.path(), &format!("{BAT}/status"), "Charging");
        write(temp.path(), &format!("{BAT}/power_now"), "9876543");
        let env = env_at(temp.path(), FakeRunner::default(), FakeHost::default());

        let power = probe_power(&env, 15.0, 65.0, Some(50.0));
        assert_eq!(power.status, PowerStatus::Ok);
        assert_eq!(power.watts, Some(9.88));
        assert_eq!(power.battery_percent, Some(66.67));
        assert_eq!(power.plugged, Some(true));
        assert!(power.detail.is_none());
    }

    #[test]
    fn test_probe_power_falls_back_to_estimate() {
        let temp = TempDir::new().unwrap();
        let env = env_at(temp.path(), FakeRunner::default(), FakeHost::default());

        let power = probe_power(&env, 15.0, 65.0, Some(50.0));
        assert_eq!(power.status, PowerStatus::Estimated);
        assert_eq!(power.watts, Some(40.0));
        assert_eq!(power.detail.as_deref(), Some(ESTIMATED_DETAIL));
        assert_eq!(power.source.as_deref(), Some("estimate"));
    }

    #[test]
    fn test_probe_power_unavailable() {
        let temp = TempDir::new().unwrap();
        let env = env_at(temp.path(), FakeRunner::default(), FakeHost::default());

        let power = probe_power(&env, 15.0, 65.0, None);
        assert_eq!(power.status, PowerStatus::Unavailable);
        assert!(power.watts.is_none());
        assert!(power.detail.is_some());
    }

    #[test]
    #[cfg(not(target_os = "macos"))]
    fn test_probe_power_sensor_error_upgraded_by_reading() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), &format!("{BAT}/capacity"), "???");
        write(temp.path(), "sys/class/hwmon/hwmon0/power1_input", "5000000");
        let env = env_at(temp.path(), FakeRunner::default(), FakeHost::default());

        let power = probe_power(&env, 15.0, 65.0, None);
        assert_eq!(power.status, PowerStatus::Ok);
        assert_eq!(power.watts, Some(5.0));
        assert!(power.detail.is_none());
    }

    #[test]
    #[cfg(not(target_os = "macos"))]
    fn test_probe_power_sensor_error_without_reading() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), &format!("{BAT}/capacity"), "???");
        let env = env_at(temp.path(), FakeRunner::default(), FakeHost::default());

        let power = probe_power(&env, 15.0, 65.0, None);
        assert_eq!(power.status, PowerStatus::Error);
        assert!(power.detail.unwrap().contains("Battery sensor error"));
    }

    #[test]
    fn test_bundled_battery_power_is_late_fallback() {
        let temp = TempDir::new().unwrap();
        let env = env_at(temp.path(), FakeRunner::default(), FakeHost::default());
        let battery = BatteryReading {
            percent: Some(80.0),
            plugged: Some(false),
            power_watts: Some(11.5),
            source: "ioreg",
        };

        let reading = watts_chain(Some(&battery)).first(&env).unwrap();
        assert_eq!(reading.value, 11.5);
        assert_eq!(reading.source, "ioreg");
    }

    #[test]
    fn test_watts_chain_order() {
        assert_eq!(
            watts_chain(None).names(),
            vec!["power_supply", "hwmon", "battery"]
        );
    }
}
