//! The engine's line-oriented stderr protocol.
//!
//! This grammar is the sole contract with the external binary; changing it
//! is a breaking change on both sides.

/// One parsed stderr line.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineLine {
    /// `Progress: <float>`, fractional progress of the current dataset
    Progress(f64),
    /// `Max. area err: <float>, GeoDiv: <name>`, worst-region diagnostic
    AreaError { factor: f64, region: String },
    /// `WARNING: <text>`
    Warning(String),
    /// `ERROR: <text>`, remembered and raised once the process exits
    Error(String),
    /// Anything else, kept verbatim for diagnostics
    Other(String),
}

impl EngineLine {
    pub fn parse(line: &str) -> Self {
        if let Some(rest) = line.strip_prefix("Progress: ") {
            if let Ok(value) = rest.trim().parse::<f64>() {
                return EngineLine::Progress(value);
            }
        }
        if let Some(rest) = line.strip_prefix("Max. area err: ") {
            if let Some((factor, region)) = rest.split_once(", GeoDiv: ") {
                if let Ok(factor) = factor.trim().parse::<f64>() {
                    return EngineLine::AreaError {
                        factor,
                        region: region.trim().to_string(),
                    };
                }
            }
        }
        if let Some(rest) = line.strip_prefix("WARNING: ") {
            return EngineLine::Warning(rest.trim().to_string());
        }
        if let Some(rest) = line.strip_prefix("ERROR: ") {
            return EngineLine::Error(rest.trim().to_string());
        }
        EngineLine::Other(line.to_string())
    }
}
