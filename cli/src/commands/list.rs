//! List command - show the sockets on the ports.

use std::path::Path;

use anyhow::Result;
use serde::Serialize;

use portreaper_core::{ConnectionState, PortResolver, ProcessNameCache, SystemCommands};

use super::{load_config, system_runner, Overrides};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SocketRow {
    port: u16,
    pid: u32,
    state: ConnectionState,
    process_name: String,
}

pub async fn run(
    config_path: Option<&Path>,
    ports: Vec<u16>,
    all_states: bool,
    json: bool,
) -> Result<()> {
    let overrides = Overrides {
        ports,
        all_states,
        ..Overrides::default()
    };
    let config = load_config(config_path, overrides).await?;

    if config.ports.is_empty() {
        if json {
            println!("[]");
        } else {
            println!("No ports configured, nothing to list.");
        }
        return Ok(());
    }

    let commands = SystemCommands::current();
    let runner = system_runner(commands).await;
    let resolver = PortResolver::new(&runner, commands).with_timeout(config.listing_timeout());
    let names =
        ProcessNameCache::new(&runner, commands).with_timeout(config.name_lookup_timeout());

    let mut rows = Vec::new();
    for &port in &config.ports {
        for observation in resolver.observe(port, config.only_listening).await? {
            rows.push(SocketRow {
                port,
                pid: observation.pid,
                state: observation.state,
                process_name: names.query_process_name(observation.pid).await,
            });
        }
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    if rows.is_empty() {
        println!("No sockets found on ports {:?}.", config.ports);
        return Ok(());
    }

    // Table header
    println!("{:<6} {:<8} {:<12} PROCESS", "PORT", "PID", "STATE");
    println!("{}", "-".repeat(50));

    for row in &rows {
        println!(
            "{:<6} {:<8} {:<12} {}",
            row.port,
            row.pid,
            row.state,
            truncate(&row.process_name, 30)
        );
    }

    println!("\nTotal: {} sockets", rows.len());
    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max - 1).collect();
        format!("{}…", head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("node", 30), "node");
        assert_eq!(truncate("abcdef", 4), "abc…");
        assert_eq!(truncate("进程名称很长", 3), "进程…");
    }
}
