// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Bounded SIGTERM → SIGKILL escalation

use std::time::Duration;

use crate::config::SupervisorConfig;

use super::process::{ProcessControl, TermSignal};

/// How long to wait at each stage of termination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerminationPolicy {
    pub poll_interval: Duration,
    /// Polls after SIGTERM before escalating
    pub graceful_polls: u32,
    /// Polls after SIGKILL before giving up
    pub forceful_polls: u32,
}

impl TerminationPolicy {
    pub fn from_config(config: &SupervisorConfig) -> Self {
        Self {
            poll_interval: config.poll_interval(),
            graceful_polls: config.graceful_polls,
            forceful_polls: config.forceful_polls,
        }
    }

    /// Upper bound on the time spent polling.
    pub fn budget(&self) -> Duration {
        self.poll_interval * (self.graceful_polls + self.forceful_polls)
    }
}

impl Default for TerminationPolicy {
    fn default() -> Self {
        Self::from_config(&SupervisorConfig::default())
    }
}

/// How a termination ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Nothing was running under that pid
    AlreadyGone,
    /// Exited after SIGTERM
    Graceful,
    /// Exited after SIGKILL
    Forced,
    /// Still alive after every poll
    Survived,
}

impl Termination {
    pub fn is_stopped(self) -> bool {
        self != Termination::Survived
    }
}

/// Terminate `pid`, escalating once. Never blocks longer than
/// [`TerminationPolicy::budget`] plus signal delivery.
pub async fn terminate(
    control: &dyn ProcessControl,
    pid: u32,
    policy: &TerminationPolicy,
) -> Termination {
    if !control.is_alive(pid) {
        return Termination::AlreadyGone;
    }

    match control.signal(pid, TermSignal::Terminate) {
        Ok(true) => tracing::info!("Sent SIGTERM to llama-server (pid {})", pid),
        Ok(false) => return Termination::AlreadyGone,
        Err(e) => tracing::warn!("Failed to send SIGTERM to pid {}: {}", pid, e),
    }
    if wait_for_exit(control, pid, policy.graceful_polls, policy.poll_interval).await {
        return Termination::Graceful;
    }

    tracing::warn!(
        "llama-server (pid {}) still running after {} polls, sending SIGKILL",
        pid,
        policy.graceful_polls
    );
    match control.signal(pid, TermSignal::Kill) {
        Ok(true) => {}
        Ok(false) => return Termination::Forced,
        Err(e) => tracing::warn!("Failed to send SIGKILL to pid {}: {}", pid, e),
    }
    if wait_for_exit(control, pid, policy.forceful_polls, policy.poll_interval).await {
        return Termination::Forced;
    }

    Termination::Survived
}

async fn wait_for_exit(
    control: &dyn ProcessControl,
    pid: u32,
    polls: u32,
    interval: Duration,
) -> bool {
    for _ in 0..polls {
        tokio::time::sleep(interval).await;
        if !control.is_alive(pid) {
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::supervisor::testing::FakeControl;

    fn quick_policy() -> TerminationPolicy {
        TerminationPolicy {
            poll_interval: Duration::from_millis(1),
            graceful_polls: 3,
            forceful_polls: 2,
        }
    }

    #[test]
    fn test_default_budget() {
        let policy = TerminationPolicy::default();
        assert_eq!(policy.budget(), Duration::from_millis(7000));
    }

    #[tokio::test]
    async fn test_already_gone() {
        let control = FakeControl::default();
        let outcome = terminate(&control, 99, &quick_policy()).await;
        assert_eq!(outcome, Termination::AlreadyGone);
        assert!(control.signals().is_empty());
    }

    #[tokio::test]
    async fn test_graceful() {
        let control = FakeControl::default();
        control.insert_alive(7);
        let outcome = terminate(&control, 7, &quick_policy()).await;
        assert_eq!(outcome, Termination::Graceful);
        assert_eq!(control.signals(), vec![(7, TermSignal::Terminate)]);
    }

    #[tokio::test]
    async fn test_escalates_to_kill() {
        let control = FakeControl {
            ignore_terminate: true,
            ..Default::default()
        };
        control.insert_alive(7);
        let outcome = terminate(&control, 7, &quick_policy()).await;
        assert_eq!(outcome, Termination::Forced);
        assert_eq!(
            control.signals(),
            vec![(7, TermSignal::Terminate), (7, TermSignal::Kill)]
        );
    }

    #[tokio::test]
    async fn test_survivor() {
        let control = FakeControl {
            ignore_terminate: true,
            ignore_kill: true,
            ..Default::default()
        };
        control.insert_alive(7);
        let outcome = terminate(&control, 7, &quick_policy()).await;
        assert_eq!(outcome, Termination::Survived);
        assert!(!outcome.is_stopped());
        // liveness probed once up front plus once per poll
        assert_eq!(control.alive_checks(), 1 + 3 + 2);
    }
}
