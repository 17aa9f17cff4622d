//! Port holder resolution.

use std::time::Duration;

use tracing::debug;

use crate::adapters::SystemCommands;
use crate::domain::{PortHolders, PortObservation};
use crate::error::Result;
use crate::ports::CommandRunner;

/// Default timeout for the network listing command.
pub const DEFAULT_LISTING_TIMEOUT: Duration = Duration::from_millis(8000);

/// Resolves which processes hold a port, from a fresh listing every time.
///
/// Nothing is cached between queries: every check before and after a kill
/// attempt reflects the current state of the host.
pub struct PortResolver<'a, R> {
    runner: &'a R,
    commands: SystemCommands,
    timeout: Duration,
}

impl<'a, R: CommandRunner> PortResolver<'a, R> {
    pub fn new(runner: &'a R, commands: SystemCommands) -> Self {
        Self {
            runner,
            commands,
            timeout: DEFAULT_LISTING_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// All sockets on `port`, in listing order.
    pub async fn observe(&self, port: u16, only_listening: bool) -> Result<Vec<PortObservation>> {
        let spec = self.commands.listing();
        let output = self.runner.execute(&spec, self.timeout).await?;
        if !output.success() {
            debug!(command = %spec, exit_code = output.exit_code, "Listing exited non-zero, parsing anyway");
        }

        let format = self.commands.platform().listing_format();
        Ok(format.parse_output(&output.lines, port, only_listening))
    }

    /// PIDs holding `port`, first-seen order, no duplicates.
    ///
    /// An empty result is not an error; listing timeouts are.
    pub async fn find_pids_by_port(&self, port: u16, only_listening: bool) -> Result<PortHolders> {
        let observations = self.observe(port, only_listening).await?;
        let holders = PortHolders::collect(port, observations);
        debug!(port, pids = ?holders.pids(), "Resolved port holders");
        Ok(holders)
    }

    /// Whether `pid` currently holds `port`.
    pub async fn is_held_by(&self, pid: u32, port: u16, only_listening: bool) -> Result<bool> {
        Ok(self
            .find_pids_by_port(port, only_listening)
            .await?
            .contains(pid))
    }
}
