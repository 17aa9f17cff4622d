//! PortReaper Core Library
//!
//! Frees TCP ports held by unwanted processes and verifies that the port is
//! actually released. Provides functionality to:
//! - Resolve which processes hold a port from the OS network listing
//! - Terminate them through a bounded primary/fallback kill protocol
//! - Run system commands with a hard timeout that always reclaims the child
//! - Detect the console encoding command output is emitted in
//!
//! # Architecture
//! This library follows hexagonal architecture (ports & adapters):
//! - `domain`: Pure business logic and data models
//! - `ports`: Trait definitions (interfaces)
//! - `adapters`: External system implementations
//! - `application`: Use case services
//!
//! # Platform Support
//! - Windows: Uses `netstat`, `taskkill`, `tasklist` and PowerShell
//! - Linux: Uses `ss`, `kill` and `ps`
//! - macOS: Uses `lsof`, `kill` and `ps`

// Hexagonal architecture layers
pub mod adapters;
pub mod application;
pub mod domain;
pub mod ports;

pub mod config;
pub mod error;

#[cfg(test)]
mod testing;

// Re-export domain types (primary API)
pub use domain::{
    ConnectionState, KillOutcome, Platform, PortHolders, PortObservation, EXIT_RELEASED,
    EXIT_UNRELEASED,
};

// Re-export other commonly used types
pub use adapters::{EncodingDetector, ProcessRunner, SystemCommands, TextEncoding};
pub use application::{
    HolderReport, KillPolicy, PortReleaser, PortReport, PortResolver, PortSweeper,
    ProcessNameCache, SweepEvent, SweepOptions,
};
pub use config::{Config, ConfigStore};
pub use error::{Error, Result};
pub use ports::{CommandOutput, CommandRunner, CommandSpec};
