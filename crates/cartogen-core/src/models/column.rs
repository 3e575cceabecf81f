use serde::{Deserialize, Serialize};

/// How a data column is visualized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VisType {
    /// Density-equalizing cartogram generated by the external engine
    Cartogram,
    /// Per-region affine scaling about each region's own centroid
    Noncontiguous,
    /// No geometry change; the value is used at render time only
    Choropleth,
}

/// A data column header parsed into display name and unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnLabel {
    /// Original header, e.g. "Population (people)"
    pub header: String,
    /// Display name with the unit stripped, e.g. "Population"
    pub name: String,
    /// Unit from the trailing parenthesized group, empty if none
    pub unit: String,
}

/// Parse a `"Name (unit)"` header into its name and unit parts.
pub fn parse_column_label(header: &str) -> ColumnLabel {
    let trimmed = header.trim();
    if let Some(open) = trimmed.rfind('(') {
        if trimmed.ends_with(')') && open > 0 {
            let unit = trimmed[open + 1..trimmed.len() - 1].trim().to_string();
            let name = trimmed[..open].trim().to_string();
            if !unit.is_empty() {
                return ColumnLabel { header: header.to_string(), name, unit };
            }
        }
    }
    ColumnLabel { header: header.to_string(), name: trimmed.to_string(), unit: String::new() }
}
