//! cartogen geo - Boundary frames, geometry reductions, and postprocessing
//!
//! This crate handles all geospatial operations of the pipeline: loading and
//! saving boundary files while preserving side attributes, CRS
//! transformations, bounding-box and area reductions, cartogram output
//! postprocessing, and region color assignment.

pub mod color;
pub mod document;
pub mod frame;
pub mod geoms;
pub mod spatial;
pub mod transform;
pub mod validation;

pub use color::{assign_color_groups, Balance};
pub use document::CartoDocument;
pub use frame::{BoundaryFrame, ExtraAttributes, Region};
pub use geoms::{geoms_info, union_bounding_boxes, GeomsInfo};
