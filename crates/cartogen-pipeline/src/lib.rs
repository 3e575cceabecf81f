//! cartogen pipeline - End-to-end cartogram generation
//!
//! This crate sequences the full request flow: tabular data normalization,
//! boundary preprocessing and equal-area projection, per-column generation
//! (contiguous via the external engine, noncontiguous via affine scaling,
//! choropleth with no geometry change), and the final bounding-box
//! reconciliation that gives every output one shared viewport.

pub mod boundary;
pub mod contiguous;
pub mod noncontiguous;
pub mod pipeline;
pub mod table;

pub use pipeline::{Pipeline, PipelineConfig, PipelineRequest};
pub use table::{process_table, ProcessedTable};
