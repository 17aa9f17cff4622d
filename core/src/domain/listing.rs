//! Parsers for network listing output.
//!
//! Each platform prints sockets differently, but every dialect is reduced
//! to the same [`PortObservation`] records. Lines that do not parse are
//! skipped: partial information is still useful for a liveness check.

use std::sync::OnceLock;

use regex::Regex;

use super::observation::{ConnectionState, PortObservation};

/// Output dialect of the network listing command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingFormat {
    /// Windows `netstat -ano`.
    Netstat,
    /// Linux `ss -Htanp`.
    Ss,
    /// macOS `lsof -nP -iTCP`.
    Lsof,
}

/// State token followed by the PID, anchored to the end of the line so
/// digits inside address fields are never read as the PID.
fn netstat_tail() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+([A-Z][A-Z_]*)\s+(\d+)\s*$").unwrap())
}

fn ss_pid() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"pid=(\d+)").unwrap())
}

/// True when a local address field ends with `:<port>`.
///
/// Handles `0.0.0.0:8080`, `[::]:8080`, `*:8080` and `[::ffff:127.0.0.1]:8080`,
/// and never matches `:80` against `:8080`.
pub fn matches_port(local_address: &str, port: u16) -> bool {
    local_address
        .strip_suffix(&port.to_string())
        .is_some_and(|head| head.ends_with(':'))
}

impl ListingFormat {
    /// Parse one line of listing output into the observations it carries
    /// for `port`.
    ///
    /// Returns an empty vector for blank lines, headers, other ports,
    /// non-listening sockets when `only_listening` is set, and lines whose
    /// PID cannot be parsed.
    pub fn parse_line(self, line: &str, port: u16, only_listening: bool) -> Vec<PortObservation> {
        let line = line.trim();
        if line.is_empty() {
            return Vec::new();
        }

        match self {
            ListingFormat::Netstat => parse_netstat_line(line, port, only_listening)
                .into_iter()
                .collect(),
            ListingFormat::Ss => parse_ss_line(line, port, only_listening),
            ListingFormat::Lsof => parse_lsof_line(line, port, only_listening)
                .into_iter()
                .collect(),
        }
    }

    /// Parse a whole listing, in line order.
    pub fn parse_output<S: AsRef<str>>(
        self,
        lines: &[S],
        port: u16,
        only_listening: bool,
    ) -> Vec<PortObservation> {
        lines
            .iter()
            .flat_map(|line| self.parse_line(line.as_ref(), port, only_listening))
            .collect()
    }
}

/// Parse a `netstat -ano` line.
///
/// ```text
///   Proto  Local Address          Foreign Address        State           PID
///   TCP    0.0.0.0:135            0.0.0.0:0              LISTENING       1020
///   TCP    [::1]:6379             [::]:0                 LISTENING       8080
/// ```
fn parse_netstat_line(line: &str, port: u16, only_listening: bool) -> Option<PortObservation> {
    let local = line.split_whitespace().nth(1)?;
    if !matches_port(local, port) {
        return None;
    }

    if only_listening && !line.contains("LISTENING") {
        return None;
    }

    let caps = netstat_tail().captures(line)?;
    let pid: u32 = caps[2].parse().ok()?;

    Some(PortObservation::new(
        port,
        ConnectionState::from_token(&caps[1]),
        pid,
    ))
}

/// Parse an `ss -Htanp` line.
///
/// ```text
/// LISTEN 0 4096 0.0.0.0:8080 0.0.0.0:* users:(("node",pid=1234,fd=19))
/// LISTEN 0 511  *:80         *:*       users:(("nginx",pid=10,fd=6),("nginx",pid=11,fd=6))
/// ```
///
/// A shared socket lists several processes, each one is a holder.
fn parse_ss_line(line: &str, port: u16, only_listening: bool) -> Vec<PortObservation> {
    // [State] [Recv-Q] [Send-Q] [Local Address:Port] [Peer Address:Port] [Process]
    let components: Vec<&str> = line.split_whitespace().collect();
    if components.len() < 6 {
        return Vec::new();
    }

    if !matches_port(components[3], port) {
        return Vec::new();
    }

    let state = ConnectionState::from_token(components[0]);
    if only_listening && !state.is_listening() {
        return Vec::new();
    }

    let process = components[5..].join(" ");
    ss_pid()
        .captures_iter(&process)
        .filter_map(|caps| caps[1].parse::<u32>().ok())
        .map(|pid| PortObservation::new(port, state, pid))
        .collect()
}

/// Parse an `lsof -nP -iTCP` line.
///
/// ```text
/// COMMAND    PID  USER   FD   TYPE             DEVICE SIZE/OFF NODE NAME
/// node     34805  code   19u  IPv6 0x3d8015e195af1f3f      0t0  TCP [::1]:3000 (LISTEN)
/// curl      4242  code    5u  IPv4 0x1234567890abcdef      0t0  TCP 127.0.0.1:52000->127.0.0.1:3000 (ESTABLISHED)
/// ```
fn parse_lsof_line(line: &str, port: u16, only_listening: bool) -> Option<PortObservation> {
    if line.starts_with("COMMAND") {
        return None;
    }

    let components: Vec<&str> = line.split_whitespace().collect();
    if components.len() < 9 {
        return None;
    }

    // NAME column: search backwards for the address, skipping device IDs
    let name = components[8..]
        .iter()
        .rev()
        .find(|c| c.contains(':') && !c.starts_with("0x") && !c.starts_with("0t"))?;
    let local = name.split("->").next()?;
    if !matches_port(local, port) {
        return None;
    }

    let state = components
        .last()
        .and_then(|c| c.strip_prefix('('))
        .and_then(|c| c.strip_suffix(')'))
        .map(ConnectionState::from_token)
        .unwrap_or(ConnectionState::Other);
    if only_listening && !state.is_listening() {
        return None;
    }

    let pid: u32 = components[1].parse().ok()?;
    Some(PortObservation::new(port, state, pid))
}
