//! Shared domain models

pub mod column;
pub mod progress;
pub mod request;

pub use column::{parse_column_label, ColumnLabel, VisType};
pub use progress::{ProgressRecord, ProgressReport};
pub use request::{EngineOutput, GenerationRequest};
