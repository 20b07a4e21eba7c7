// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Probe chains and the environment probes read from
//!
//! Every telemetry source is a function from [`ProbeEnv`] to
//! `Option<Reading<T>>`. Sources for the same metric are grouped into a
//! [`ProbeChain`] and tried in order until one answers, so adding or
//! reordering a vendor is a data change.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::TelemetryConfig;

use super::command::{CommandRunner, SystemCommandRunner};
use super::host::{HostStats, SysinfoStats};

/// A value together with the name of the source that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading<T> {
    pub value: T,
    pub source: String,
}

impl<T> Reading<T> {
    pub fn new(value: T, source: impl Into<String>) -> Self {
        Self {
            value,
            source: source.into(),
        }
    }
}

type ProbeFn<'a, T> = Box<dyn Fn(&ProbeEnv) -> Option<Reading<T>> + 'a>;

/// Ordered list of alternative sources for one metric.
pub struct ProbeChain<'a, T> {
    metric: &'static str,
    probes: Vec<(&'static str, ProbeFn<'a, T>)>,
}

impl<'a, T> ProbeChain<'a, T> {
    pub fn new(metric: &'static str) -> Self {
        Self {
            metric,
            probes: Vec::new(),
        }
    }

    /// Append a probe; probes run in insertion order.
    pub fn with(
        mut self,
        name: &'static str,
        probe: impl Fn(&ProbeEnv) -> Option<Reading<T>> + 'a,
    ) -> Self {
        self.probes.push((name, Box::new(probe)));
        self
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.probes.iter().map(|(name, _)| *name).collect()
    }

    /// Run probes until one yields a reading. No retries.
    pub fn first(&self, env: &ProbeEnv) -> Option<Reading<T>> {
        for (name, probe) in &self.probes {
            if let Some(reading) = probe(env) {
                tracing::debug!("{} answered by {} ({})", self.metric, name, reading.source);
                return Some(reading);
            }
            tracing::debug!("{} probe {} unavailable", self.metric, name);
        }
        None
    }
}

/// Everything a probe is allowed to touch.
///
/// Filesystem paths are resolved against `root`, which is `/` on a real host
/// and a scratch directory in tests.
#[derive(Clone)]
pub struct ProbeEnv {
    root: PathBuf,
    runner: Arc<dyn CommandRunner>,
    host: Arc<dyn HostStats>,
    search_path: Option<OsString>,
}

impl ProbeEnv {
    pub fn new(
        root: impl Into<PathBuf>,
        runner: Arc<dyn CommandRunner>,
        host: Arc<dyn HostStats>,
    ) -> Self {
        Self {
            root: root.into(),
            runner,
            host,
            search_path: std::env::var_os("PATH"),
        }
    }

    /// The live host: real filesystem, real tools, sysinfo statistics.
    pub fn system(config: &TelemetryConfig) -> Self {
        Self::new(
            "/",
            Arc::new(SystemCommandRunner::new(config.command_timeout())),
            Arc::new(SysinfoStats),
        )
    }

    /// Override the executable search path (`None` disables lookups).
    pub fn with_search_path(mut self, search_path: Option<OsString>) -> Self {
        self.search_path = search_path;
        self
    }

    pub fn host(&self) -> &dyn HostStats {
        self.host.as_ref()
    }

    /// Map an absolute host path into the probe root.
    pub fn sys_path(&self, absolute: &str) -> PathBuf {
        self.root.join(absolute.trim_start_matches('/'))
    }

    /// Read a file and trim surrounding whitespace; empty files count as missing.
    pub fn read_trimmed(&self, path: &Path) -> Option<String> {
        let raw = std::fs::read_to_string(path).ok()?;
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }

    /// Read a file holding a single number.
    pub fn read_number(&self, path: &Path) -> Option<f64> {
        self.read_trimmed(path)?.parse::<f64>().ok()
    }

    /// List a directory's entries sorted by file name; unreadable ⇒ empty.
    pub fn list_dir(&self, path: &Path) -> Vec<PathBuf> {
        let mut entries: Vec<PathBuf> = match std::fs::read_dir(path) {
            Ok(entries) => entries.flatten().map(|entry| entry.path()).collect(),
            Err(_) => return Vec::new(),
        };
        entries.sort();
        entries
    }

    /// Run an external tool, returning stdout on success.
    pub fn run(&self, program: &str, args: &[&str]) -> Option<String> {
        self.runner.run(program, args)
    }

    /// Locate an executable on the configured search path.
    pub fn resolve_on_path(&self, program: &str) -> Option<PathBuf> {
        let search_path = self.search_path.as_ref()?;
        std::env::split_paths(search_path).find_map(|dir| {
            let candidate = dir.join(program);
            if candidate.is_file() {
                return Some(candidate);
            }
            if cfg!(windows) {
                let exe = dir.join(format!("{}.exe", program));
                if exe.is_file() {
                    return Some(exe);
                }
            }
            None
        })
    }
}

/// Round to a fixed number of decimal places.
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

/// Clamp into the unit interval; NaN maps to 0.
pub fn clamp01(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Fakes shared by the probe tests.

    use std::collections::HashMap;
    use std::path::Path;
    use std::sync::Arc;

    use super::ProbeEnv;
    use crate::hardware::command::CommandRunner;
    use crate::hardware::host::{HostStats, MemoryReading};

    /// Replays canned stdout keyed by `program arg arg...`.
    #[derive(Default)]
    pub struct FakeRunner {
        pub outputs: HashMap<String, String>,
    }

    impl FakeRunner {
        pub fn with(mut self, command: &str, stdout: &str) -> Self {
            self.outputs.insert(command.to_string(), stdout.to_string());
            self
        }
    }

    impl CommandRunner for FakeRunner {
        fn run(&self, program: &str, args: &[&str]) -> Option<String> {
            let mut key = program.to_string();
            for arg in args {
                key.push(' ');
                key.push_str(arg);
            }
            self.outputs.get(&key).cloned()
        }
    }

    #[derive(Default)]
    pub struct FakeHost {
        pub cpu_percent: Option<f64>,
        pub memory: Option<MemoryReading>,
    }

    impl HostStats for FakeHost {
        fn cpu_usage_percent(&self) -> Option<f64> {
            self.cpu_percent
        }

        fn memory(&self) -> Option<MemoryReading> {
            self.memory
        }
    }

    pub fn env_at(root: &Path, runner: FakeRunner, host: FakeHost) -> ProbeEnv {
        ProbeEnv::new(root, Arc::new(runner), Arc::new(host)).with_search_path(None)
    }

    /// Write `contents` to `root/relative`, creating parents.
    pub fn write(root: &Path, relative: &str, contents: &str) {
        let path = root.join(relative.trim_start_matches('/'));
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, contents).unwrap();
    }
}
