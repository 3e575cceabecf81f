use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One invocation of the external geometry engine.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// Boundary file handed to the engine
    pub boundary_path: PathBuf,
    /// Optional tabular area data file, appended last to argv when present
    pub area_data_path: Option<PathBuf>,
    /// Engine flags; every entry must pass the allow-list
    pub flags: Vec<String>,
    /// Human-readable dataset name, used in progress reporting
    pub data_name: String,
}

impl GenerationRequest {
    pub fn new(boundary_path: impl Into<PathBuf>) -> Self {
        Self {
            boundary_path: boundary_path.into(),
            area_data_path: None,
            flags: Vec::new(),
            data_name: String::new(),
        }
    }

    pub fn with_area_data(mut self, path: impl Into<PathBuf>) -> Self {
        self.area_data_path = Some(path.into());
        self
    }

    pub fn with_flags(mut self, flags: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.flags.extend(flags.into_iter().map(Into::into));
        self
    }

    pub fn with_data_name(mut self, name: impl Into<String>) -> Self {
        self.data_name = name.into();
        self
    }
}

/// The engine's stdout payload: one JSON document with two
/// FeatureCollections, plus warnings collected from stderr.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineOutput {
    #[serde(rename = "Original")]
    pub original: serde_json::Value,
    #[serde(rename = "Simplified")]
    pub simplified: serde_json::Value,
    /// Warnings accumulated from the stderr protocol; not part of the
    /// engine's JSON payload
    #[serde(skip)]
    pub warnings: Vec<String>,
}

impl EngineOutput {
    /// Interpret one stdout document.
    ///
    /// Cartogram runs emit `{"Original": .., "Simplified": ..}`; equal-area
    /// runs emit a single FeatureCollection, which becomes `original` with
    /// no simplified variant.
    pub fn from_document(document: serde_json::Value) -> Self {
        match document {
            serde_json::Value::Object(mut map) if map.contains_key("Original") => Self {
                original: map.remove("Original").unwrap_or(serde_json::Value::Null),
                simplified: map.remove("Simplified").unwrap_or(serde_json::Value::Null),
                warnings: Vec::new(),
            },
            other => Self {
                original: other,
                simplified: serde_json::Value::Null,
                warnings: Vec::new(),
            },
        }
    }

    pub fn has_simplified(&self) -> bool {
        !self.simplified.is_null()
    }
}
