//! Application layer - Use case services.
//!
//! This module contains application services that orchestrate
//! domain logic and adapter interactions.
//!
//! Services are designed to be thin orchestrators that:
//! - Accept domain types as inputs
//! - Use ports (traits) for external dependencies
//! - Return domain types as outputs

mod names;
mod releaser;
mod resolver;
mod sweeper;

pub use names::{ProcessNameCache, DEFAULT_NAME_LOOKUP_TIMEOUT};
pub use releaser::{KillPolicy, PortReleaser};
pub use resolver::{PortResolver, DEFAULT_LISTING_TIMEOUT};
pub use sweeper::{HolderReport, PortReport, PortSweeper, SweepEvent, SweepOptions};
