//! Chunk-gated progression for a block world.
//!
//! Chunks start locked. Actors earn credits, spend them to unlock chunks
//! next to what is already open, and boundary walls keep everyone inside the
//! unlocked area.

pub mod block;
pub mod border;
pub mod config;
pub mod event_bus;
pub mod persistence;
pub mod progression;
