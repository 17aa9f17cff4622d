//! Adapters layer - External system implementations.
//!
//! This module contains implementations of the port traits defined in `ports`
//! and the platform knowledge needed to drive the OS tools.

pub mod commands;
pub mod encoding;
pub mod runner;

// Re-export main types for convenience
pub use commands::SystemCommands;
pub use encoding::{parse_codepage, EncodingDetector, TextEncoding};
pub use runner::ProcessRunner;
