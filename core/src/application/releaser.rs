//! Port release orchestration.
//!
//! For one (pid, port) pair the releaser runs a bounded loop of
//! check, primary kill, re-check, fallback kill, wait, re-check. Success is
//! judged only from the listing: the exit code of a kill tool says nothing
//! about whether the socket was reclaimed.

use std::time::Duration;

use tokio::time;
use tracing::{debug, info, warn};

use super::resolver::PortResolver;
use crate::adapters::SystemCommands;
use crate::domain::{KillAttemptRecord, KillOutcome, KillPhase, PrimaryResult};
use crate::error::{Error, Result};
use crate::ports::CommandRunner;

/// Bounds and delays of the termination loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KillPolicy {
    /// Attempts before giving up, at least 1.
    pub max_attempts: u32,
    /// Timeout of the primary (process tree) kill.
    pub primary_timeout: Duration,
    /// Timeout of the fallback kill.
    pub fallback_timeout: Duration,
    /// Pause after the primary kill before re-checking the port.
    pub settle_delay: Duration,
    /// Pause after the fallback before the final re-check of an attempt.
    pub retry_delay: Duration,
}

impl Default for KillPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            primary_timeout: Duration::from_secs(45),
            fallback_timeout: Duration::from_secs(15),
            settle_delay: Duration::from_millis(800),
            retry_delay: Duration::from_millis(1000),
        }
    }
}

/// Drives the termination protocol for one PID holding one port.
pub struct PortReleaser<'a, R> {
    runner: &'a R,
    commands: SystemCommands,
    resolver: PortResolver<'a, R>,
    policy: KillPolicy,
}

impl<'a, R: CommandRunner> PortReleaser<'a, R> {
    pub fn new(runner: &'a R, commands: SystemCommands, resolver: PortResolver<'a, R>) -> Self {
        Self {
            runner,
            commands,
            resolver,
            policy: KillPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: KillPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn resolver(&self) -> &PortResolver<'a, R> {
        &self.resolver
    }

    /// Terminate `pid` until it no longer holds `port`.
    ///
    /// Returns the outcome on release. When the attempt budget runs out,
    /// fails with [`Error::KillFailed`] if `force_kill` is set, otherwise
    /// returns [`KillOutcome::Unreleased`].
    ///
    /// Listing failures abort the run: without a trustworthy listing the
    /// port state cannot be verified.
    pub async fn kill_pid(
        &self,
        pid: u32,
        port: u16,
        force_kill: bool,
        only_listening: bool,
    ) -> Result<KillOutcome> {
        let max_attempts = self.policy.max_attempts.max(1);

        for attempt in 1..=max_attempts {
            let holders = self.resolver.find_pids_by_port(port, only_listening).await?;
            if holders.is_free() {
                info!(pid, port, attempt, "Port is free");
                return Ok(KillOutcome::PortFree);
            }
            if !holders.contains(pid) {
                info!(pid, port, attempt, "Port no longer held by this PID");
                return Ok(KillOutcome::HolderGone);
            }

            let spec = self.commands.primary_kill(pid, force_kill);
            let mut record = KillAttemptRecord::start(attempt, pid, port, spec.to_string());

            record.enter(KillPhase::KillingPrimary);
            info!(pid, port, attempt, max_attempts, command = %spec, "Kill attempt");
            let primary = match self.runner.execute(&spec, self.policy.primary_timeout).await {
                Ok(output) => {
                    for line in output.lines.iter().filter(|l| !l.trim().is_empty()) {
                        info!(pid, "  {}", line);
                    }
                    info!(pid, port, exit_code = output.exit_code, "Primary kill finished");
                    PrimaryResult::Exited {
                        code: output.exit_code,
                    }
                }
                Err(e) if e.is_timeout() => {
                    warn!(pid, port, attempt, error = %e, "Primary kill timed out");
                    PrimaryResult::TimedOut
                }
                Err(e) => {
                    warn!(pid, port, attempt, error = %e, "Primary kill failed");
                    PrimaryResult::Failed {
                        reason: e.to_string(),
                    }
                }
            };
            let needs_fallback = primary.needs_fallback();
            record.primary = Some(primary);

            time::sleep(self.policy.settle_delay).await;
            if !self.still_held(pid, port, only_listening).await? {
                record.finish(false, attempt == max_attempts);
                debug!(record = ?record, "Kill attempt resolved");
                info!(pid, port, attempt, "Port released after primary kill");
                return Ok(KillOutcome::ReleasedAfterPrimary);
            }

            if needs_fallback {
                record.enter(KillPhase::KillingFallback);
                record.fallback_issued = true;
                let fallback = self.commands.fallback_kill(pid);
                info!(pid, port, attempt, command = %fallback, "Fallback kill");
                match self.runner.execute(&fallback, self.policy.fallback_timeout).await {
                    Ok(output) => debug!(pid, exit_code = output.exit_code, "Fallback kill finished"),
                    Err(e) => debug!(pid, error = %e, "Fallback kill failed"),
                }
            }

            record.enter(KillPhase::Waiting);
            time::sleep(self.policy.retry_delay).await;
            let still_held = self.still_held(pid, port, only_listening).await?;
            record.finish(still_held, attempt == max_attempts);
            if !still_held {
                debug!(record = ?record, "Kill attempt resolved");
                info!(pid, port, attempt, "Port released");
                return Ok(KillOutcome::ReleasedAfterWait);
            }

            if record.phase == KillPhase::Exhausted {
                debug!(record = ?record, "Kill attempts exhausted");
            } else {
                debug!(record = ?record, "Kill attempt did not release port");
            }
        }

        if force_kill {
            Err(Error::KillFailed {
                pid,
                port,
                attempts: max_attempts,
            })
        } else {
            warn!(
                pid,
                port,
                attempts = max_attempts,
                "Port still held after all attempts, continuing"
            );
            Ok(KillOutcome::Unreleased)
        }
    }

    async fn still_held(&self, pid: u32, port: u16, only_listening: bool) -> Result<bool> {
        self.resolver.is_held_by(pid, port, only_listening).await
    }
}
