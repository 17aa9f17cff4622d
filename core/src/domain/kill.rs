//! Termination protocol domain models.

use chrono::{DateTime, Local};
use serde::Serialize;

/// Exit code reported when the port was released.
pub const EXIT_RELEASED: i32 = 0;

/// Exit code reported when the port could not be released and the
/// failure is tolerated as a warning.
pub const EXIT_UNRELEASED: i32 = 2;

/// Phase of the per (pid, port) termination state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum KillPhase {
    Checking,
    KillingPrimary,
    KillingFallback,
    Waiting,
    Succeeded,
    Exhausted,
}

/// How a termination run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum KillOutcome {
    /// Nothing held the port when it was checked.
    PortFree,
    /// The port is still held, but no longer by this PID.
    HolderGone,
    /// The port was released after the primary termination command.
    ReleasedAfterPrimary,
    /// The port was released after the fallback and the reclaim wait.
    ReleasedAfterWait,
    /// The attempt budget ran out and the PID still holds the port.
    Unreleased,
}

impl KillOutcome {
    /// Whether the port is confirmed no longer held by the PID.
    pub fn is_released(self) -> bool {
        self != KillOutcome::Unreleased
    }

    /// Exit code reported for this outcome: 0 when released, 2 otherwise.
    pub fn exit_code(self) -> i32 {
        if self.is_released() {
            EXIT_RELEASED
        } else {
            EXIT_UNRELEASED
        }
    }
}

/// What happened to the primary termination command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum PrimaryResult {
    Exited { code: i32 },
    TimedOut,
    Failed { reason: String },
}

impl PrimaryResult {
    /// A primary step that did not exit cleanly triggers the fallback.
    pub fn needs_fallback(&self) -> bool {
        !matches!(self, PrimaryResult::Exited { code: 0 })
    }
}

/// Record of one termination attempt.
///
/// Only drives the loop and its logging; it is dropped once the
/// (pid, port) pair resolves.
#[derive(Debug, Clone, Serialize)]
pub struct KillAttemptRecord {
    pub attempt: u32,
    pub pid: u32,
    pub port: u16,
    pub started_at: DateTime<Local>,
    pub phase: KillPhase,
    pub command: String,
    pub primary: Option<PrimaryResult>,
    pub fallback_issued: bool,
    pub still_held: bool,
}

impl KillAttemptRecord {
    pub fn start(attempt: u32, pid: u32, port: u16, command: String) -> Self {
        Self {
            attempt,
            pid,
            port,
            started_at: Local::now(),
            phase: KillPhase::Checking,
            command,
            primary: None,
            fallback_issued: false,
            still_held: true,
        }
    }

    /// Move to the next phase.
    pub fn enter(&mut self, phase: KillPhase) {
        self.phase = phase;
    }

    /// Close the attempt with the result of its last port check.
    ///
    /// A released port ends in `Succeeded`. A port still held on the last
    /// attempt of the budget ends in `Exhausted`; on earlier attempts the
    /// phase stays where the loop left it.
    pub fn finish(&mut self, still_held: bool, last_attempt: bool) {
        self.still_held = still_held;
        if !still_held {
            self.enter(KillPhase::Succeeded);
        } else if last_attempt {
            self.enter(KillPhase::Exhausted);
        }
    }
}
