// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! CLI argument definitions using Clap

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// rigctl - hardware telemetry and llama-server control
#[derive(Parser, Debug)]
#[command(name = "rigctl")]
#[command(version, about = "Hardware telemetry and llama-server control")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Settings file path (defaults to $RIGCTL_HOME/settings.json)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Output format
    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Take one telemetry snapshot
    #[command(alias = "telemetry")]
    Sample,

    /// List model files in the model directory
    Models,

    /// Print the model the running server was started with
    Current,

    /// Show supervisor state
    Status,

    /// Start llama-server (defaults to the configured default model)
    Start(StartArgs),

    /// Stop the running llama-server
    Stop,

    /// Stop the running server and start it again on another model
    Switch(SwitchArgs),
}

/// Arguments for the start subcommand
#[derive(clap::Args, Debug)]
pub struct StartArgs {
    /// Model file to load
    pub model: Option<PathBuf>,
}

/// Arguments for the switch subcommand
#[derive(clap::Args, Debug)]
pub struct SwitchArgs {
    /// Model file to switch to
    pub model: PathBuf,
}

/// Output format options
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Plain text output
    #[default]
    Text,

    /// JSON output
    Json,
}
