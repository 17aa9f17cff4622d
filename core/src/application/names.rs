//! Process name lookup with a per-run cache.
//!
//! Names are cosmetic: a failed lookup is remembered as an empty name and
//! never interrupts the release workflow.
//!
//! The cache is keyed by PID only. A PID that is reused by another process
//! during the same run would report the earlier name; runs are short enough
//! that this is accepted.

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::RwLock;
use tracing::debug;

use crate::adapters::SystemCommands;
use crate::ports::CommandRunner;

/// Default timeout for one name lookup.
pub const DEFAULT_NAME_LOOKUP_TIMEOUT: Duration = Duration::from_millis(2000);

/// Resolves PIDs to process names, running the lookup at most once per PID.
pub struct ProcessNameCache<'a, R> {
    runner: &'a R,
    commands: SystemCommands,
    timeout: Duration,
    names: RwLock<HashMap<u32, String>>,
}

impl<'a, R: CommandRunner> ProcessNameCache<'a, R> {
    pub fn new(runner: &'a R, commands: SystemCommands) -> Self {
        Self {
            runner,
            commands,
            timeout: DEFAULT_NAME_LOOKUP_TIMEOUT,
            names: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Name of `pid`, or an empty string when it cannot be resolved.
    pub async fn query_process_name(&self, pid: u32) -> String {
        if let Some(name) = self.cached(pid) {
            return name;
        }

        let name = self.lookup(pid).await.unwrap_or_default();
        self.names
            .write()
            .entry(pid)
            .or_insert(name)
            .clone()
    }

    /// Cached name, without running a lookup.
    pub fn cached(&self, pid: u32) -> Option<String> {
        self.names.read().get(&pid).cloned()
    }

    async fn lookup(&self, pid: u32) -> Option<String> {
        let spec = self.commands.process_name(pid);
        match self.runner.execute(&spec, self.timeout).await {
            Ok(output) => {
                let name = self.commands.platform().parse_process_name(&output.lines);
                debug!(pid, name = ?name, "Process name lookup");
                name
            }
            Err(e) => {
                debug!(pid, error = %e, "Process name lookup failed");
                None
            }
        }
    }
}
