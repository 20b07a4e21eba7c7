// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Subcommand implementations
//!
//! Each command renders either human-readable text or pretty JSON depending
//! on `--format`.

pub mod sample;
pub mod server;

use serde::Serialize;

use crate::cli::OutputFormat;
use crate::error::Result;

/// Print `value` as JSON, or the text produced by `render`.
pub(crate) fn emit<T: Serialize>(
    format: OutputFormat,
    value: &T,
    render: impl FnOnce(&T) -> String,
) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Text => print!("{}", render(value)),
    }
    Ok(())
}

pub(crate) fn format_bytes(bytes: u64) -> String {
    let gb = bytes as f64 / 1_073_741_824.0;
    if gb >= 1.0 {
        format!("{:.1} GB", gb)
    } else {
        format!("{:.0} MB", bytes as f64 / 1_048_576.0)
    }
}

pub(crate) fn or_dash<T: std::fmt::Display>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(16 * 1_073_741_824), "16.0 GB");
        assert_eq!(format_bytes(512 * 1_048_576), "512 MB");
    }

    #[test]
    fn test_or_dash() {
        assert_eq!(or_dash(Some(3.5)), "3.5");
        assert_eq!(or_dash::<u32>(None), "-");
    }
}
