//! Domain layer - Pure data models and output parsers.
//!
//! This module contains the types the release engine reasons about.
//! These types have no I/O dependencies and can be tested in isolation.

mod kill;
mod listing;
mod observation;
mod platform;

// Re-export all domain types
pub use kill::{
    KillAttemptRecord, KillOutcome, KillPhase, PrimaryResult, EXIT_RELEASED, EXIT_UNRELEASED,
};
pub use listing::{matches_port, ListingFormat};
pub use observation::{ConnectionState, PortHolders, PortObservation};
pub use platform::Platform;
