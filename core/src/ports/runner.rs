//! Command runner port (interface).

use std::time::Duration;

use serde::Serialize;

use crate::error::Result;

/// A system command: program plus arguments.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new<P, I, A>(program: P, args: I) -> Self
    where
        P: Into<String>,
        I: IntoIterator<Item = A>,
        A: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

impl std::fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            if arg.contains(char::is_whitespace) {
                write!(f, " \"{}\"", arg)?;
            } else {
                write!(f, " {}", arg)?;
            }
        }
        Ok(())
    }
}

/// Decoded output of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CommandOutput {
    /// Standard output and standard error, merged, one entry per line.
    pub lines: Vec<String>,
    /// Process exit code (-1 when terminated by a signal).
    pub exit_code: i32,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Port for running system commands.
///
/// Implementations must enforce the timeout and reclaim the child process
/// before returning `Error::Timeout`.
pub trait CommandRunner: Send + Sync {
    /// Run `spec` to completion or until `timeout` elapses.
    fn execute(
        &self,
        spec: &CommandSpec,
        timeout: Duration,
    ) -> impl std::future::Future<Output = Result<CommandOutput>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_display_quotes_spaced_args() {
        let spec = CommandSpec::new("tasklist.exe", ["/FO", "CSV", "/NH", "/FI", "PID eq 42"]);
        assert_eq!(
            spec.to_string(),
            "tasklist.exe /FO CSV /NH /FI \"PID eq 42\""
        );

        let spec = CommandSpec::new("netstat.exe", ["-ano"]);
        assert_eq!(spec.to_string(), "netstat.exe -ano");
    }
}
