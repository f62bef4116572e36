//! Snapshot installed npm dependency trees, diff them against earlier
//! runs and verify them against the tagged sources they claim to come from.

pub mod config;
pub mod diff;
pub mod executor;
pub mod fetch;
pub mod model;
pub mod snapshot;
pub mod traits;
pub mod verify;
pub mod warnings;

// Re-export common types for convenience
pub use config::*;
pub use executor::*;
pub use model::*;
pub use traits::*;
pub use warnings::Warnings;
