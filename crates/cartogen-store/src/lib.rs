//! cartogen store - Progress persistence ports and adapters
//!
//! This crate defines the key/value port used for generation-progress
//! records and provides an in-memory adapter with TTL expiry.

pub mod memory;
pub mod ports;

pub use memory::MemoryProgressStore;
pub use ports::ProgressStore;
