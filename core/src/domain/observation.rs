//! Port observation domain models.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

// ============================================================================
// ConnectionState
// ============================================================================

/// TCP connection state as reported by the network listing command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectionState {
    Listening,
    Established,
    TimeWait,
    CloseWait,
    /// Any other state (SYN_SENT, FIN_WAIT_2, LAST_ACK, ...)
    Other,
}

impl ConnectionState {
    /// Normalise a state token from netstat, ss or lsof.
    ///
    /// netstat prints `LISTENING` and `TIME_WAIT`, ss prints `LISTEN`,
    /// `ESTAB` and `TIME-WAIT`.
    pub fn from_token(token: &str) -> Self {
        match token.to_ascii_uppercase().replace('-', "_").as_str() {
            "LISTENING" | "LISTEN" => ConnectionState::Listening,
            "ESTABLISHED" | "ESTAB" => ConnectionState::Established,
            "TIME_WAIT" => ConnectionState::TimeWait,
            "CLOSE_WAIT" => ConnectionState::CloseWait,
            _ => ConnectionState::Other,
        }
    }

    pub fn is_listening(self) -> bool {
        self == ConnectionState::Listening
    }

    /// Display label, matching the netstat spelling.
    pub fn label(self) -> &'static str {
        match self {
            ConnectionState::Listening => "LISTENING",
            ConnectionState::Established => "ESTABLISHED",
            ConnectionState::TimeWait => "TIME_WAIT",
            ConnectionState::CloseWait => "CLOSE_WAIT",
            ConnectionState::Other => "OTHER",
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

// ============================================================================
// PortObservation
// ============================================================================

/// One socket seen in a single listing query.
///
/// Observations are produced fresh on every query and never mutated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PortObservation {
    /// Local port number.
    pub port: u16,
    /// Connection state token.
    pub state: ConnectionState,
    /// Owning process ID.
    pub pid: u32,
}

impl PortObservation {
    pub fn new(port: u16, state: ConnectionState, pid: u32) -> Self {
        Self { port, state, pid }
    }
}

// ============================================================================
// PortHolders
// ============================================================================

/// The set of PIDs holding a port at query time.
///
/// Keeps first-seen order and collapses duplicates, so a process with
/// several sockets on the same port appears once.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PortHolders {
    port: u16,
    pids: Vec<u32>,
}

impl PortHolders {
    /// Collect holders from observations, keeping first-seen order.
    pub fn collect<I>(port: u16, observations: I) -> Self
    where
        I: IntoIterator<Item = PortObservation>,
    {
        let mut seen: HashSet<u32> = HashSet::new();
        let pids = observations
            .into_iter()
            .map(|o| o.pid)
            .filter(|pid| seen.insert(*pid))
            .collect();
        Self { port, pids }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn pids(&self) -> &[u32] {
        &self.pids
    }

    /// True when nothing holds the port.
    pub fn is_free(&self) -> bool {
        self.pids.is_empty()
    }

    /// True when `pid` is among the holders.
    pub fn contains(&self, pid: u32) -> bool {
        self.pids.contains(&pid)
    }

    pub fn len(&self) -> usize {
        self.pids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pids.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.pids.iter().copied()
    }
}
