//! Sweep command - free every configured port.

use std::io::Write;
use std::path::Path;

use anyhow::Result;

use portreaper_core::{
    PortReleaser, PortReport, PortResolver, PortSweeper, ProcessNameCache, SweepEvent,
    SystemCommands,
};

use super::{load_config, system_runner, Overrides};

pub async fn run(config_path: Option<&Path>, overrides: Overrides, json: bool) -> Result<()> {
    let config = load_config(config_path, overrides).await?;

    if config.ports.is_empty() {
        if json {
            write_json(&[], &mut std::io::stdout().lock())?;
        } else {
            println!("No ports configured, nothing to do.");
        }
        return Ok(());
    }

    let commands = SystemCommands::current();
    let runner = system_runner(commands).await;

    let names =
        ProcessNameCache::new(&runner, commands).with_timeout(config.name_lookup_timeout());
    let releaser = PortReleaser::new(
        &runner,
        commands,
        PortResolver::new(&runner, commands).with_timeout(config.listing_timeout()),
    )
    .with_policy(config.kill_policy());
    let sweeper = PortSweeper::new(&names, &releaser, config.sweep_options());

    // KillFailed ends the whole run
    let reports = sweeper
        .sweep(&config.ports, |event| {
            if !json {
                println!("{}", report_line(event));
            }
        })
        .await?;

    if json {
        write_json(&reports, &mut std::io::stdout().lock())?;
    }

    Ok(())
}

/// Human readable line for one sweep event.
fn report_line(event: &SweepEvent) -> String {
    match event {
        SweepEvent::PortFree { port } => format!("[OK] Port {} not in use.", port),
        SweepEvent::PortHeld { port, pids } => {
            format!("[HIT] Port {} used by PIDs: {:?}", port, pids)
        }
        SweepEvent::Holder { pid, name } => format!("  PID={} PROC={}", pid, name),
        SweepEvent::WouldKill { pid } => format!("  [DRY-RUN] Would kill PID={}", pid),
        SweepEvent::Killed { outcome, .. } => {
            format!("  kill result exitCode={}", outcome.exit_code())
        }
    }
}

/// The JSON report: one document and nothing else.
fn write_json<W: Write>(reports: &[PortReport], out: &mut W) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, reports)?;
    writeln!(out)?;
    Ok(())
}
