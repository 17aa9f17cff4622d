//! Timeout-safe system command execution.
//!
//! Every command is spawned with piped output that a dedicated task drains
//! while the caller waits on the child with a deadline. A child that
//! outlives its deadline is terminated and reaped before the timeout error
//! is returned, so a hung tool never leaks across retries.

use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::time;
use tracing::{debug, warn};

use super::encoding::TextEncoding;
use crate::error::{Error, Result};
use crate::ports::{CommandOutput, CommandRunner, CommandSpec};

/// Grace period between SIGTERM and SIGKILL for a timed-out child.
#[cfg_attr(not(unix), allow(dead_code))]
const KILL_GRACE_PERIOD: Duration = Duration::from_millis(300);

/// How long the output reader may keep draining after the child exited.
const OUTPUT_DRAIN_GRACE: Duration = Duration::from_millis(200);

/// Runs system commands and decodes their output with a fixed encoding.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner {
    encoding: TextEncoding,
}

impl ProcessRunner {
    pub fn new(encoding: TextEncoding) -> Self {
        Self { encoding }
    }
}

impl CommandRunner for ProcessRunner {
    async fn execute(&self, spec: &CommandSpec, timeout: Duration) -> Result<CommandOutput> {
        let timeout_ms = timeout.as_millis() as u64;
        debug!(command = %spec, timeout_ms, "Executing command");

        let mut child = Command::new(&spec.program)
            .args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::CommandFailed(format!("Failed to spawn {}: {}", spec, e)))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::CommandFailed(format!("No stdout pipe for {}", spec)))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| Error::CommandFailed(format!("No stderr pipe for {}", spec)))?;

        let lines = Arc::new(Mutex::new(Vec::new()));
        let mut reader = tokio::spawn(drain_output(
            stdout,
            stderr,
            self.encoding,
            Arc::clone(&lines),
        ));

        let status = match time::timeout(timeout, child.wait()).await {
            Ok(status) => status?,
            Err(_) => {
                reader.abort();
                warn!(command = %spec, timeout_ms, "Command timed out, terminating");
                terminate(&mut child).await;
                return Err(Error::Timeout {
                    command: spec.to_string(),
                    timeout_ms,
                });
            }
        };

        // Let the reader pick up the last lines still sitting in the pipes
        if time::timeout(OUTPUT_DRAIN_GRACE, &mut reader).await.is_err() {
            debug!(command = %spec, "Output reader still busy after exit, detaching");
            reader.abort();
        }

        let lines = std::mem::take(&mut *lines.lock());
        let exit_code = status.code().unwrap_or(-1);
        debug!(command = %spec, exit_code, lines = lines.len(), "Command finished");

        Ok(CommandOutput { lines, exit_code })
    }
}

/// Read stdout and stderr line by line into `sink`, interleaved in
/// arrival order, until both streams are closed.
async fn drain_output<O, E>(
    stdout: O,
    stderr: E,
    encoding: TextEncoding,
    sink: Arc<Mutex<Vec<String>>>,
) where
    O: AsyncRead + Unpin,
    E: AsyncRead + Unpin,
{
    let mut stdout = BufReader::new(stdout);
    let mut stderr = BufReader::new(stderr);
    let mut out_buf = Vec::new();
    let mut err_buf = Vec::new();
    let mut out_open = true;
    let mut err_open = true;

    while out_open || err_open {
        tokio::select! {
            read = stdout.read_until(b'\n', &mut out_buf), if out_open => match read {
                Ok(0) | Err(_) => out_open = false,
                Ok(_) => {
                    sink.lock().push(encoding.decode_line(&out_buf));
                    out_buf.clear();
                }
            },
            read = stderr.read_until(b'\n', &mut err_buf), if err_open => match read {
                Ok(0) | Err(_) => err_open = false,
                Ok(_) => {
                    sink.lock().push(encoding.decode_line(&err_buf));
                    err_buf.clear();
                }
            },
        }
    }
}

/// Terminate a timed-out child: graceful signal first, then force.
/// The child is always reaped.
async fn terminate(child: &mut Child) {
    #[cfg(unix)]
    {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        if let Some(pid) = child.id() {
            if kill(Pid::from_raw(pid as i32), Signal::SIGTERM).is_ok()
                && time::timeout(KILL_GRACE_PERIOD, child.wait()).await.is_ok()
            {
                debug!(pid, "Child exited after SIGTERM");
                return;
            }
        }
    }

    if let Err(e) = child.kill().await {
        warn!(error = %e, "Failed to kill timed-out child");
    }
}

#[cfg(test)]
#[cfg(unix)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn sh(script: &str) -> CommandSpec {
        CommandSpec::new("sh", ["-c", script])
    }

    #[tokio::test]
    async fn test_captures_output_and_exit_code() {
        let runner = ProcessRunner::default();
        let output = runner
            .execute(&sh("echo first; echo second; exit 3"), Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(output.lines, vec!["first", "second"]);
        assert_eq!(output.exit_code, 3);
        assert!(!output.success());
    }

    #[tokio::test]
    async fn test_merges_stderr() {
        let runner = ProcessRunner::default();
        let output = runner
            .execute(&sh("echo out; echo err 1>&2"), Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(output.lines.len(), 2);
        assert!(output.lines.contains(&"out".to_string()));
        assert!(output.lines.contains(&"err".to_string()));
        assert!(output.success());
    }

    #[tokio::test]
    async fn test_keeps_unterminated_last_line() {
        let runner = ProcessRunner::default();
        let output = runner
            .execute(&sh("printf 'no newline'"), Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(output.lines, vec!["no newline"]);
    }

    #[tokio::test]
    async fn test_timeout_reclaims_child() {
        let runner = ProcessRunner::default();
        let started = Instant::now();

        let result = runner
            .execute(&sh("sleep 30"), Duration::from_millis(200))
            .await;

        assert!(matches!(result, Err(Error::Timeout { timeout_ms: 200, .. })));
        // Returned long before the child would have finished on its own
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_timeout_escalates_past_ignored_sigterm() {
        let runner = ProcessRunner::default();
        let started = Instant::now();

        let result = runner
            .execute(&sh("trap '' TERM; sleep 30"), Duration::from_millis(200))
            .await;

        assert!(result.unwrap_err().is_timeout());
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_spawn_failure() {
        let runner = ProcessRunner::default();
        let result = runner
            .execute(
                &CommandSpec::new("definitely-not-a-real-binary-4242", Vec::<String>::new()),
                Duration::from_secs(1),
            )
            .await;

        assert!(matches!(result, Err(Error::CommandFailed(_))));
    }
}
