use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{CartogenError, Result};

/// Configuration source for tracking where values come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Default value
    Default,
    /// Loaded from config file
    File,
    /// Loaded from environment variable
    Environment,
    /// Provided programmatically by the embedding application
    Override,
}

impl ConfigSource {
    /// Returns the precedence level (higher = higher priority)
    pub fn precedence(&self) -> u8 {
        match self {
            ConfigSource::Default => 0,
            ConfigSource::File => 1,
            ConfigSource::Environment => 2,
            ConfigSource::Override => 3,
        }
    }
}

/// A configuration value with its source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigValue<T> {
    pub value: T,
    pub source: ConfigSource,
}

impl<T> ConfigValue<T> {
    pub fn new(value: T, source: ConfigSource) -> Self {
        Self { value, source }
    }

    /// Update the value if the new source has higher precedence
    pub fn update(&mut self, value: T, source: ConfigSource) {
        if source.precedence() > self.source.precedence() {
            self.value = value;
            self.source = source;
        }
    }
}

/// Layered configuration for the generation pipeline
#[derive(Debug, Clone)]
pub struct LayeredConfig {
    /// Path to the external cartogram engine binary
    pub engine_path: ConfigValue<PathBuf>,
    /// Wall-clock limit for one engine run, in seconds
    pub engine_timeout_secs: ConfigValue<u64>,
    /// TTL of a progress record after its last update, in seconds
    pub progress_ttl_secs: ConfigValue<u64>,
    /// Area-error factor above which a warning is synthesized (presentation
    /// policy, not an invariant)
    pub area_error_threshold: ConfigValue<f64>,
    /// Overall scale factor for noncontiguous cartograms
    pub noncontiguous_scale: ConfigValue<f64>,
    /// EPSG code of the intermediate equal-area projection
    pub equal_area_epsg: ConfigValue<u32>,
    /// Minimum number of color groups for region coloring
    pub min_colors: ConfigValue<usize>,
    /// Directories file operations are sandboxed to
    pub data_roots: ConfigValue<Vec<PathBuf>>,
}

impl LayeredConfig {
    /// Create a new configuration with default values
    pub fn with_defaults() -> Self {
        Self {
            engine_path: ConfigValue::new(PathBuf::from("cartogram"), ConfigSource::Default),
            engine_timeout_secs: ConfigValue::new(300, ConfigSource::Default),
            progress_ttl_secs: ConfigValue::new(300, ConfigSource::Default),
            area_error_threshold: ConfigValue::new(0.01, ConfigSource::Default),
            noncontiguous_scale: ConfigValue::new(0.9, ConfigSource::Default),
            equal_area_epsg: ConfigValue::new(6933, ConfigSource::Default),
            min_colors: ConfigValue::new(6, ConfigSource::Default),
            data_roots: ConfigValue::new(vec![PathBuf::from("tmp")], ConfigSource::Default),
        }
    }

    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self> {
        let content =
            fs::read_to_string(path.as_ref()).map_err(|e| CartogenError::ConfigInvalid {
                key: "file".to_string(),
                reason: format!("Failed to read config file: {}", e),
            })?;

        let file_config: FileConfig =
            toml::from_str(&content).map_err(|e| CartogenError::ConfigInvalid {
                key: "file".to_string(),
                reason: format!("Failed to parse TOML: {}", e),
            })?;

        if let Some(engine_path) = file_config.engine_path {
            self.engine_path.update(engine_path, ConfigSource::File);
        }
        if let Some(secs) = file_config.engine_timeout_secs {
            self.engine_timeout_secs.update(secs, ConfigSource::File);
        }
        if let Some(secs) = file_config.progress_ttl_secs {
            self.progress_ttl_secs.update(secs, ConfigSource::File);
        }
        if let Some(threshold) = file_config.area_error_threshold {
            self.area_error_threshold.update(threshold, ConfigSource::File);
        }
        if let Some(scale) = file_config.noncontiguous_scale {
            self.noncontiguous_scale.update(scale, ConfigSource::File);
        }
        if let Some(epsg) = file_config.equal_area_epsg {
            self.equal_area_epsg.update(epsg, ConfigSource::File);
        }
        if let Some(colors) = file_config.min_colors {
            self.min_colors.update(colors, ConfigSource::File);
        }
        if let Some(roots) = file_config.data_roots {
            self.data_roots.update(roots, ConfigSource::File);
        }

        Ok(self)
    }

    /// Load configuration from environment variables
    pub fn load_from_env(mut self) -> Self {
        if let Ok(path) = env::var("CARTOGEN_ENGINE_PATH") {
            self.engine_path.update(PathBuf::from(path), ConfigSource::Environment);
        }

        if let Ok(secs_str) = env::var("CARTOGEN_ENGINE_TIMEOUT_SECS") {
            match secs_str.parse::<u64>() {
                Ok(secs) => self.engine_timeout_secs.update(secs, ConfigSource::Environment),
                Err(_) => tracing::warn!(
                    "Invalid CARTOGEN_ENGINE_TIMEOUT_SECS value '{}': expected integer seconds",
                    secs_str
                ),
            }
        }

        if let Ok(secs_str) = env::var("CARTOGEN_PROGRESS_TTL_SECS") {
            match secs_str.parse::<u64>() {
                Ok(secs) => self.progress_ttl_secs.update(secs, ConfigSource::Environment),
                Err(_) => tracing::warn!(
                    "Invalid CARTOGEN_PROGRESS_TTL_SECS value '{}': expected integer seconds",
                    secs_str
                ),
            }
        }

        if let Ok(threshold_str) = env::var("CARTOGEN_AREA_ERROR_THRESHOLD") {
            match threshold_str.parse::<f64>() {
                Ok(threshold) => {
                    self.area_error_threshold.update(threshold, ConfigSource::Environment)
                }
                Err(_) => tracing::warn!(
                    "Invalid CARTOGEN_AREA_ERROR_THRESHOLD value '{}': expected a float",
                    threshold_str
                ),
            }
        }

        if let Ok(roots_str) = env::var("CARTOGEN_DATA_ROOTS") {
            let roots: Vec<PathBuf> =
                roots_str.split(':').filter(|s| !s.is_empty()).map(PathBuf::from).collect();
            if !roots.is_empty() {
                self.data_roots.update(roots, ConfigSource::Environment);
            }
        }

        self
    }

    /// Update configuration from programmatic overrides
    pub fn update_from_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(engine_path) = overrides.engine_path {
            self.engine_path.update(engine_path, ConfigSource::Override);
        }
        if let Some(secs) = overrides.engine_timeout_secs {
            self.engine_timeout_secs.update(secs, ConfigSource::Override);
        }
        if let Some(threshold) = overrides.area_error_threshold {
            self.area_error_threshold.update(threshold, ConfigSource::Override);
        }
        if let Some(roots) = overrides.data_roots {
            self.data_roots.update(roots, ConfigSource::Override);
        }
    }

    /// Get all configuration values as a map for inspection
    pub fn to_inspection_map(&self) -> HashMap<String, (String, ConfigSource)> {
        let mut map = HashMap::new();

        map.insert(
            "engine_path".to_string(),
            (self.engine_path.value.display().to_string(), self.engine_path.source),
        );
        map.insert(
            "engine_timeout_secs".to_string(),
            (self.engine_timeout_secs.value.to_string(), self.engine_timeout_secs.source),
        );
        map.insert(
            "progress_ttl_secs".to_string(),
            (self.progress_ttl_secs.value.to_string(), self.progress_ttl_secs.source),
        );
        map.insert(
            "area_error_threshold".to_string(),
            (self.area_error_threshold.value.to_string(), self.area_error_threshold.source),
        );
        map.insert(
            "equal_area_epsg".to_string(),
            (format!("EPSG:{}", self.equal_area_epsg.value), self.equal_area_epsg.source),
        );

        map
    }
}

/// Configuration loaded from TOML file
#[derive(Debug, Deserialize, Serialize)]
struct FileConfig {
    engine_path: Option<PathBuf>,
    engine_timeout_secs: Option<u64>,
    progress_ttl_secs: Option<u64>,
    area_error_threshold: Option<f64>,
    noncontiguous_scale: Option<f64>,
    equal_area_epsg: Option<u32>,
    min_colors: Option<usize>,
    data_roots: Option<Vec<PathBuf>>,
}

/// Programmatic configuration overrides
#[derive(Debug, Default)]
pub struct ConfigOverrides {
    pub engine_path: Option<PathBuf>,
    pub engine_timeout_secs: Option<u64>,
    pub area_error_threshold: Option<f64>,
    pub data_roots: Option<Vec<PathBuf>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = LayeredConfig::with_defaults();
        assert_eq!(config.engine_timeout_secs.value, 300);
        assert_eq!(config.engine_timeout_secs.source, ConfigSource::Default);
        assert_eq!(config.progress_ttl_secs.value, 300);
        assert_eq!(config.equal_area_epsg.value, 6933);
        assert_eq!(config.min_colors.value, 6);
        assert!((config.noncontiguous_scale.value - 0.9).abs() < f64::EPSILON);
    }

    #[test]
    fn test_config_precedence() {
        let mut value = ConfigValue::new(100u64, ConfigSource::Default);

        value.update(200, ConfigSource::File);
        assert_eq!(value.value, 200);
        assert_eq!(value.source, ConfigSource::File);

        value.update(300, ConfigSource::Environment);
        assert_eq!(value.value, 300);

        value.update(400, ConfigSource::Override);
        assert_eq!(value.value, 400);

        // Lower precedence should not override
        value.update(500, ConfigSource::File);
        assert_eq!(value.value, 400);
        assert_eq!(value.source, ConfigSource::Override);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
engine_path = "/opt/cartogram/cartogram"
engine_timeout_secs = 120
area_error_threshold = 0.05
data_roots = ["/srv/cartogen/tmp", "/srv/cartogen/userdata"]
"#
        )
        .unwrap();

        let config = LayeredConfig::with_defaults().load_from_file(file.path()).unwrap();

        assert_eq!(config.engine_path.value, PathBuf::from("/opt/cartogram/cartogram"));
        assert_eq!(config.engine_path.source, ConfigSource::File);
        assert_eq!(config.engine_timeout_secs.value, 120);
        assert!((config.area_error_threshold.value - 0.05).abs() < f64::EPSILON);
        assert_eq!(config.data_roots.value.len(), 2);
        // Untouched keys keep their defaults
        assert_eq!(config.progress_ttl_secs.source, ConfigSource::Default);
    }

    #[test]
    fn test_overrides() {
        let mut config = LayeredConfig::with_defaults();

        config.update_from_overrides(ConfigOverrides {
            engine_timeout_secs: Some(60),
            ..Default::default()
        });

        assert_eq!(config.engine_timeout_secs.value, 60);
        assert_eq!(config.engine_timeout_secs.source, ConfigSource::Override);
        assert_eq!(config.engine_path.source, ConfigSource::Default);
    }

    #[test]
    fn test_inspection_map() {
        let config = LayeredConfig::with_defaults();
        let map = config.to_inspection_map();

        assert!(map.contains_key("engine_path"));
        assert!(map.contains_key("engine_timeout_secs"));

        let (epsg_value, epsg_source) = &map["equal_area_epsg"];
        assert_eq!(epsg_value, "EPSG:6933");
        assert_eq!(*epsg_source, ConfigSource::Default);
    }
}
