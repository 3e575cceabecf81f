//! Error types for cartogen

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CartogenError {
    // Engine invocation errors
    #[error("Invalid cartogram option: {option}")]
    InvalidOption { option: String },

    #[error("Invalid boundary file path: {}", path.display())]
    InvalidBoundaryPath { path: PathBuf },

    #[error("Cartogram engine failed: {message}")]
    Engine { message: String },

    #[error("Cartogram engine did not finish within {seconds} seconds")]
    EngineTimeout { seconds: u64 },

    // Table errors
    #[error("Invalid table: {reason}")]
    InvalidTable { reason: String },

    #[error("{name} is invalid. Remove all invalid characters (\\ / : * ? ' \" < > |) to proceed")]
    InvalidColumnName { name: String },

    #[error("Missing data name. Please ensure each data column has a name in its header")]
    MissingDataName { column: String },

    #[error("Cannot process {column}: All rows are empty. Please enter some numeric values or remove the column")]
    DataColumnEmpty { column: String },

    #[error("Cannot process {column}: Sum is zero. Please ensure the sum of data is not zero")]
    DataColumnZeroSum { column: String },

    // Geometry errors
    #[error("Invalid geometry for region {region}: {reason}")]
    InvalidGeometry { region: String, reason: String },

    #[error("Geometries are not simple. Fix the boundary file and try again")]
    GeometryNotSimple,

    #[error("CRS transformation failed: {reason}")]
    Projection { reason: String },

    // Path safety: the resolved path is deliberately absent from the message.
    // It is logged operator-side only.
    #[error("File path escapes the allowed data directories")]
    UnsafePath,

    // Configuration errors
    #[error("Invalid configuration value for {key}: {reason}")]
    ConfigInvalid { key: String, reason: String },

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for CartogenError {
    fn from(e: serde_json::Error) -> Self {
        CartogenError::Serialization(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CartogenError>;
