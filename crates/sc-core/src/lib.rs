//! sc-core: shared types, IDs, errors, configuration, and event system.
//!
//! This crate is the foundational dependency for the other sc-* crates,
//! providing the stream identifier, a unified error type, application
//! configuration, a broadcast event bus, and the catalog metadata model.

pub mod book;
pub mod config;
pub mod error;
pub mod events;
pub mod ids;

// Re-export the most commonly used items at the crate root.
pub use error::{Error, Result};
pub use ids::*;
