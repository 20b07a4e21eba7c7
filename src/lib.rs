// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! rigctl - local hardware telemetry and llama-server supervision.
//!
//! This crate exposes the primitives used by the `rigctl` CLI
//! (`src/main.rs`) and by any request layer embedding it:
//! - `hardware`: read-only telemetry snapshots built from ordered probe chains
//! - `supervisor`: lifecycle of a single llama-server process and its record
//! - `config`: settings shared by both, loaded once and passed explicitly
//! - `cli`, `commands`: argument parsing and subcommand rendering

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod hardware;
pub mod supervisor;

pub use error::{Result, RigError, SupervisorError};
