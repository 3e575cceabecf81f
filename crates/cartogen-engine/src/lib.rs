//! cartogen engine - External geometry engine orchestration
//!
//! This crate owns the process boundary with the cartogram binary: argv
//! construction behind a flag allow-list, concurrent stdout/stderr draining,
//! the line-oriented progress/warning/error protocol, and order-gated
//! progress tracking for polling callers.

pub mod command;
pub mod progress;
pub mod protocol;
pub mod runner;

pub use command::EngineCommand;
pub use progress::{poll_progress, ProgressTracker};
pub use protocol::EngineLine;
pub use runner::EngineRunner;
