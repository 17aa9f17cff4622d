//! Sweep over a list of ports.
//!
//! Ports are processed one at a time, and the PIDs of a port one at a
//! time, so each port's kill loop observes the effect of the previous one.
//! The first unrecoverable error ends the sweep; later ports are left
//! untouched.

use serde::Serialize;

use super::names::ProcessNameCache;
use super::releaser::PortReleaser;
use crate::domain::KillOutcome;
use crate::error::Result;
use crate::ports::CommandRunner;

/// Progress of a sweep, reported as it happens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SweepEvent {
    /// Nothing holds the port.
    PortFree { port: u16 },
    /// The port is held by these PIDs, in listing order.
    PortHeld { port: u16, pids: Vec<u32> },
    /// One holder, with its resolved name (empty if unknown).
    Holder { pid: u32, name: String },
    /// Dry run: the holder would have been killed.
    WouldKill { pid: u32 },
    /// The kill loop finished for the holder.
    Killed { pid: u32, outcome: KillOutcome },
}

/// What happened to one port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortReport {
    pub port: u16,
    pub holders: Vec<HolderReport>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HolderReport {
    pub pid: u32,
    pub process_name: String,
    /// `None` in dry-run mode.
    pub outcome: Option<KillOutcome>,
    pub exit_code: Option<i32>,
}

/// Settings of one sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepOptions {
    pub only_listening: bool,
    pub force_kill: bool,
    pub dry_run: bool,
}

impl Default for SweepOptions {
    fn default() -> Self {
        Self {
            only_listening: true,
            force_kill: true,
            dry_run: false,
        }
    }
}

/// Frees a list of ports using the name cache and the releaser.
pub struct PortSweeper<'s, 'a, R> {
    names: &'s ProcessNameCache<'a, R>,
    releaser: &'s PortReleaser<'a, R>,
    options: SweepOptions,
}

impl<'s, 'a, R: CommandRunner> PortSweeper<'s, 'a, R> {
    pub fn new(
        names: &'s ProcessNameCache<'a, R>,
        releaser: &'s PortReleaser<'a, R>,
        options: SweepOptions,
    ) -> Self {
        Self {
            names,
            releaser,
            options,
        }
    }

    /// Sweep `ports` in order, reporting progress through `on_event`.
    ///
    /// Fails on the first listing error, and with
    /// [`Error::KillFailed`](crate::Error::KillFailed) when a forced kill
    /// is exhausted.
    pub async fn sweep<F>(&self, ports: &[u16], mut on_event: F) -> Result<Vec<PortReport>>
    where
        F: FnMut(&SweepEvent),
    {
        let mut reports = Vec::with_capacity(ports.len());
        for &port in ports {
            reports.push(self.sweep_port(port, &mut on_event).await?);
        }
        Ok(reports)
    }

    /// Sweep a single port.
    pub async fn sweep_port<F>(&self, port: u16, on_event: &mut F) -> Result<PortReport>
    where
        F: FnMut(&SweepEvent),
    {
        let options = self.options;
        let holders = self
            .releaser
            .resolver()
            .find_pids_by_port(port, options.only_listening)
            .await?;

        let mut report = PortReport {
            port,
            holders: Vec::with_capacity(holders.len()),
        };

        if holders.is_free() {
            on_event(&SweepEvent::PortFree { port });
            return Ok(report);
        }

        on_event(&SweepEvent::PortHeld {
            port,
            pids: holders.pids().to_vec(),
        });

        for pid in holders.iter() {
            let name = self.names.query_process_name(pid).await;
            on_event(&SweepEvent::Holder {
                pid,
                name: name.clone(),
            });

            let outcome = if options.dry_run {
                on_event(&SweepEvent::WouldKill { pid });
                None
            } else {
                let outcome = self
                    .releaser
                    .kill_pid(pid, port, options.force_kill, options.only_listening)
                    .await?;
                on_event(&SweepEvent::Killed { pid, outcome });
                Some(outcome)
            };

            report.holders.push(HolderReport {
                pid,
                process_name: name,
                outcome,
                exit_code: outcome.map(KillOutcome::exit_code),
            });
        }

        Ok(report)
    }
}
