// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! GPU VRAM, driver and Vulkan probes
//!
//! VRAM vendors are tried in order and the first one that answers wins;
//! readings are never merged across vendors. When a vendor lists several
//! devices the one with the largest total is reported.

use std::path::PathBuf;
use std::sync::OnceLock;

use regex::Regex;

use super::probe::{ProbeChain, ProbeEnv, Reading};

const MIB: u64 = 1024 * 1024;
const DRM_DIR: &str = "/sys/class/drm";
const DRI_DEBUG_DIR: &str = "/sys/kernel/debug/dri";

/// Vulkan loader locations checked before falling back to `vulkaninfo`.
const VULKAN_LOADERS: &[&str] = &[
    "/usr/lib/x86_64-linux-gnu/libvulkan.so.1",
    "/usr/lib/aarch64-linux-gnu/libvulkan.so.1",
    "/usr/lib64/libvulkan.so.1",
    "/usr/lib/libvulkan.so.1",
    "/usr/local/lib/libvulkan.so.1",
    "/usr/local/lib/libvulkan.1.dylib",
    "/opt/homebrew/lib/libvulkan.1.dylib",
    "/Windows/System32/vulkan-1.dll",
];

/// Used/total VRAM for the selected device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VramReading {
    pub used_bytes: u64,
    /// `None` when the GPU shares system memory
    pub total_bytes: Option<u64>,
}

/// One device as listed by a vendor tool or sysfs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct DeviceVram {
    index: usize,
    used_bytes: u64,
    total_bytes: u64,
}

/// VRAM sources in priority order.
pub fn vram_chain() -> ProbeChain<'static, VramReading> {
    ProbeChain::new("vram")
        .with("nvidia-smi", probe_nvidia_smi)
        .with("rocm-smi", probe_rocm_smi)
        .with("amdgpu-sysfs", probe_amdgpu_sysfs)
        .with("i915-debugfs", probe_i915_debugfs)
}

/// Pick the device with the largest total; earlier devices win ties.
///
/// The source carries the device index only when there was a choice to make.
fn select_largest(devices: &[DeviceVram], tool: &str) -> Option<Reading<VramReading>> {
    let mut best: Option<&DeviceVram> = None;
    for device in devices {
        match best {
            Some(b) if device.total_bytes <= b.total_bytes => {}
            _ => best = Some(device),
        }
    }
    let best = best?;

    let source = if devices.len() > 1 {
        format!("{}:{}", tool, best.index)
    } else {
        tool.to_string()
    };
    Some(Reading::new(
        VramReading {
            used_bytes: best.used_bytes,
            total_bytes: Some(best.total_bytes),
        },
        source,
    ))
}

fn probe_nvidia_smi(env: &ProbeEnv) -> Option<Reading<VramReading>> {
    let output = env.run(
        "nvidia-smi",
        &[
            "--query-gpu=memory.used,memory.total",
            "--format=csv,noheader,nounits",
        ],
    )?;
    select_largest(&parse_nvidia_smi(&output), "nvidia-smi")
}

/// Rows of `used, total` in MiB.
fn parse_nvidia_smi(output: &str) -> Vec<DeviceVram> {
    output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .enumerate()
        .filter_map(|(index, line)| {
            let mut fields = line.split(',').map(str::trim);
            let used = fields.next()?.parse::<u64>().ok()?;
            let total = fields.next()?.parse::<u64>().ok()?;
            Some(DeviceVram {
                index,
                used_bytes: used * MIB,
                total_bytes: total * MIB,
            })
        })
        .collect()
}

/// rocm-smi output flags moved between releases, so JSON is tried before CSV.
fn probe_rocm_smi(env: &ProbeEnv) -> Option<Reading<VramReading>> {
    let devices = env
        .run("rocm-smi", &["--showmeminfo", "vram", "--json"])
        .map(|out| parse_rocm_json(&out))
        .filter(|devices| !devices.is_empty())
        .or_else(|| {
            env.run("rocm-smi", &["--showmeminfo", "vram", "--csv"])
                .map(|out| parse_rocm_csv(&out))
        })?;
    select_largest(&devices, "rocm-smi")
}

fn card_index(name: &str) -> Option<usize> {
    name.strip_prefix("card")?.parse().ok()
}

fn json_bytes(value: &serde_json::Value) -> Option<u64> {
    match value {
        serde_json::Value::Number(n) => n.as_u64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// `{"card0": {"VRAM Total Memory (B)": "...", "VRAM Total Used Memory (B)": "..."}}`
fn parse_rocm_json(output: &str) -> Vec<DeviceVram> {
    let Ok(serde_json::Value::Object(cards)) = serde_json::from_str::<serde_json::Value>(output)
    else {
        return Vec::new();
    };

    let mut devices: Vec<DeviceVram> = cards
        .iter()
        .filter_map(|(card, fields)| {
            let index = card_index(card)?;
            let fields = fields.as_object()?;
            let mut total = None;
            let mut used = None;
            for (key, value) in fields {
                if key.contains("Used Memory") {
                    used = json_bytes(value);
                } else if key.contains("Total Memory") {
                    total = json_bytes(value);
                }
            }
            Some(DeviceVram {
                index,
                used_bytes: used?,
                total_bytes: total?,
            })
        })
        .collect();
    devices.sort_by_key(|d| d.index);
    devices
}

/// Header row names the columns; data rows start with `cardN`.
fn parse_rocm_csv(output: &str) -> Vec<DeviceVram> {
    let mut lines = output.lines().filter(|l| !l.trim().is_empty());
    let Some(header) = lines.find(|l| l.to_lowercase().starts_with("device")) else {
        return Vec::new();
    };
    let columns: Vec<&str> = header.split(',').map(str::trim).collect();
    let Some(used_col) = columns.iter().position(|c| c.contains("Used Memory")) else {
        return Vec::new();
    };
    let Some(total_col) = columns
        .iter()
        .position(|c| c.contains("Total Memory") && !c.contains("Used"))
    else {
        return Vec::new();
    };

    let mut devices: Vec<DeviceVram> = lines
        .filter_map(|line| {
            let fields: Vec<&str> = line.split(',').map(str::trim).collect();
            Some(DeviceVram {
                index: card_index(fields.first()?)?,
                used_bytes: fields.get(used_col)?.parse().ok()?,
                total_bytes: fields.get(total_col)?.parse().ok()?,
            })
        })
        .collect();
    devices.sort_by_key(|d| d.index);
    devices
}

/// `cardN` directories (connectors like `card0-HDMI-A-1` excluded), by index.
fn drm_cards(env: &ProbeEnv) -> Vec<(usize, PathBuf)> {
    let mut cards: Vec<(usize, PathBuf)> = env
        .list_dir(&env.sys_path(DRM_DIR))
        .into_iter()
        .filter_map(|path| {
            let index = card_index(&path.file_name()?.to_string_lossy())?;
            Some((index, path))
        })
        .collect();
    cards.sort_by_key(|(index, _)| *index);
    cards
}

fn probe_amdgpu_sysfs(env: &ProbeEnv) -> Option<Reading<VramReading>> {
    let devices: Vec<DeviceVram> = drm_cards(env)
        .into_iter()
        .filter_map(|(index, card)| {
            let device = card.join("device");
            let used = env.read_number(&device.join("mem_info_vram_used"))?;
            let total = env.read_number(&device.join("mem_info_vram_total"))?;
            Some(DeviceVram {
                index,
                used_bytes: used as u64,
                total_bytes: total as u64,
            })
        })
        .collect();
    select_largest(&devices, "amdgpu-sysfs")
}

/// Best effort: debugfs usually needs root.
fn probe_i915_debugfs(env: &ProbeEnv) -> Option<Reading<VramReading>> {
    env.list_dir(&env.sys_path(DRI_DEBUG_DIR))
        .into_iter()
        .find_map(|dir| {
            let contents = std::fs::read_to_string(dir.join("i915_gem_objects")).ok()?;
            let used_bytes = parse_i915_gem_objects(&contents)?;
            Some(Reading::new(
                VramReading {
                    used_bytes,
                    total_bytes: None,
                },
                "i915",
            ))
        })
}

/// `"1234 shrinkable [0 free] objects, 56789 bytes"` or `"12 objects, 345 bytes"`.
fn parse_i915_gem_objects(contents: &str) -> Option<u64> {
    static OBJECTS: OnceLock<Regex> = OnceLock::new();
    let re = OBJECTS
        .get_or_init(|| Regex::new(r"objects,\s*(\d+)\s+bytes").expect("valid i915 regex"));
    re.captures(contents)?.get(1)?.as_str().parse().ok()
}

/// Kernel driver bound to the first DRM card.
pub fn driver_name(env: &ProbeEnv) -> Option<String> {
    drm_cards(env).into_iter().find_map(|(_, card)| {
        let target = std::fs::read_link(card.join("device").join("driver")).ok()?;
        Some(target.file_name()?.to_string_lossy().to_string())
    })
}

/// Whether a Vulkan loader or `vulkaninfo` is present.
pub fn vulkan_available(env: &ProbeEnv) -> bool {
    VULKAN_LOADERS
        .iter()
        .any(|loader| env.sys_path(loader).exists())
        || env.resolve_on_path("vulkaninfo").is_some()
}
