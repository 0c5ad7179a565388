//! Route handlers.

pub mod events;
pub mod health;
pub mod hls;
pub mod streams;
