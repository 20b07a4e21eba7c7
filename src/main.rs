// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! rigctl - hardware telemetry and llama-server control
//!
//! Entry point for the rigctl CLI.

use std::path::Path;

use clap::Parser;

use rigctl::cli::{Cli, Commands};
use rigctl::commands::{sample, server};
use rigctl::config::Settings;
use rigctl::error::Result;
use rigctl::supervisor::Supervisor;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so JSON on stdout stays parseable.
    let mut env_filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(tracing::Level::WARN.into());
    if cli.verbose > 0 {
        let directive = if cli.verbose > 1 {
            "rigctl=trace"
        } else {
            "rigctl=debug"
        };
        if let Ok(parsed) = directive.parse() {
            env_filter = env_filter.add_directive(parsed);
        }
    }
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let settings_path = cli.config.clone().unwrap_or_else(Settings::default_path);
    let settings = Settings::load_at(&settings_path)?;
    let format = cli.format;

    match cli.command {
        Commands::Sample => sample::execute(&settings.telemetry, format).await,
        Commands::Models => server::models(&supervisor(&settings, &settings_path)?, format),
        Commands::Current => server::current(&supervisor(&settings, &settings_path)?, format),
        Commands::Status => server::status(&supervisor(&settings, &settings_path)?, format),
        Commands::Start(args) => {
            let supervisor = supervisor(&settings, &settings_path)?;
            server::start(&supervisor, args.model.as_deref(), format).await
        }
        Commands::Stop => server::stop(&supervisor(&settings, &settings_path)?, format).await,
        Commands::Switch(args) => {
            let supervisor = supervisor(&settings, &settings_path)?;
            server::switch(&supervisor, &args.model, format).await
        }
    }
}

/// Supervisor for the server commands, with its state directory in place.
fn supervisor(settings: &Settings, settings_path: &Path) -> Result<Supervisor> {
    settings.ensure_directories()?;
    Ok(Supervisor::system(settings.supervisor.clone(), settings_path))
}
