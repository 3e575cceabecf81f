//! cartogen core - Error taxonomy, configuration, and shared domain models
//!
//! This crate contains the types shared by every stage of the cartogram
//! generation pipeline, plus filename and path-sandbox safety helpers.

pub mod config;
pub mod error;
pub mod models;
pub mod paths;

pub use error::{CartogenError, Result};
