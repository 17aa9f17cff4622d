//! Test doubles shared by the unit tests.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::ports::{CommandOutput, CommandRunner, CommandSpec};

/// Canned result for one command execution.
#[derive(Debug, Clone)]
pub enum Reply {
    Output(CommandOutput),
    Timeout,
    SpawnError,
}

impl Reply {
    pub fn lines<I, S>(exit_code: i32, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Reply::Output(CommandOutput {
            lines: lines.into_iter().map(Into::into).collect(),
            exit_code,
        })
    }

    pub fn exit(exit_code: i32) -> Self {
        Reply::lines(exit_code, Vec::<String>::new())
    }
}

/// Runner that replays scripted replies per program and records every
/// command it was asked to run.
///
/// Replies for a program are consumed in order; the last one repeats.
#[derive(Default)]
pub struct ScriptedRunner {
    scripts: Mutex<HashMap<String, VecDeque<Reply>>>,
    calls: Mutex<Vec<CommandSpec>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on<I>(self, program: &str, replies: I) -> Self
    where
        I: IntoIterator<Item = Reply>,
    {
        self.scripts
            .lock()
            .insert(program.to_string(), replies.into_iter().collect());
        self
    }

    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.lock().clone()
    }

    pub fn count(&self, program: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|spec| spec.program == program)
            .count()
    }

    fn next_reply(&self, program: &str) -> Option<Reply> {
        let mut scripts = self.scripts.lock();
        let queue = scripts.get_mut(program)?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

impl CommandRunner for ScriptedRunner {
    async fn execute(&self, spec: &CommandSpec, timeout: Duration) -> Result<CommandOutput> {
        self.calls.lock().push(spec.clone());

        match self.next_reply(&spec.program) {
            Some(Reply::Output(output)) => Ok(output),
            Some(Reply::Timeout) => Err(Error::Timeout {
                command: spec.to_string(),
                timeout_ms: timeout.as_millis() as u64,
            }),
            Some(Reply::SpawnError) => Err(Error::CommandFailed(format!(
                "Failed to spawn {}: not found",
                spec
            ))),
            None => Err(Error::CommandFailed(format!("No script for {}", spec))),
        }
    }
}

/// A `netstat -ano` line for a socket on `port`.
pub fn netstat_line(port: u16, state: &str, pid: u32) -> String {
    format!("  TCP    0.0.0.0:{port}           0.0.0.0:0              {state}       {pid}")
}
