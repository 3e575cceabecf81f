//! Boundary dataset container.
//!
//! A [`BoundaryFrame`] holds the regions of a boundary file together with the
//! non-feature top-level attributes of the source document, so metadata such
//! as the CRS descriptor and the world-extent flag survive every
//! transformation explicitly instead of riding along inside a tabular type.

use std::collections::HashMap;
use std::convert::TryFrom;
use std::fs;
use std::path::Path;

use geo::Geometry;
use serde_json::{json, Map, Value};

use cartogen_core::{CartogenError, Result};

use crate::validation;

/// Sentinel CRS name marking data already in the engine's projected space.
pub const CARTESIAN_CRS: &str = "EPSG:cartesian";

/// Top-level keys preserved across load/transform/save. Anything else is
/// discarded at load to avoid conflicts with other interchange formats.
const RESERVED_ATTRIBUTE_KEYS: &[&str] = &["crs", "extent", "properties"];

/// Property columns that survive [`BoundaryFrame::clean_properties`].
const BASE_COLUMNS: &[&str] = &["Region", "label", "cartogram_id"];

/// One boundary region: a polygonal geometry plus its property map.
#[derive(Debug, Clone)]
pub struct Region {
    pub geometry: Geometry<f64>,
    pub properties: Map<String, Value>,
}

/// Side-channel metadata attached at load time.
#[derive(Debug, Clone, Default)]
pub struct ExtraAttributes {
    attributes: Map<String, Value>,
}

impl ExtraAttributes {
    /// Filter arbitrary top-level keys down to the reserved set.
    pub fn from_document(document: &Map<String, Value>) -> Self {
        let attributes = document
            .iter()
            .filter(|(key, _)| RESERVED_ATTRIBUTE_KEYS.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        Self { attributes }
    }

    /// Whether the CRS descriptor names the engine's projected space.
    pub fn is_projected(&self) -> bool {
        self.attributes
            .get("crs")
            .and_then(|crs| crs.get("properties"))
            .and_then(|props| props.get("name"))
            .and_then(Value::as_str)
            == Some(CARTESIAN_CRS)
    }

    /// Whether the source document declared world extent.
    pub fn is_world(&self) -> bool {
        self.attributes.get("extent").and_then(Value::as_str) == Some("world")
    }

    /// Reprojection invalidates any stored CRS descriptor.
    pub fn remove_crs(&mut self) {
        self.attributes.remove("crs");
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.attributes.iter()
    }
}

/// Explicit `{rows, attributes}` pair for boundary data.
#[derive(Debug, Clone)]
pub struct BoundaryFrame {
    pub regions: Vec<Region>,
    pub extra: ExtraAttributes,
}

impl BoundaryFrame {
    /// Load a boundary GeoJSON file.
    ///
    /// Regions with null or non-polygonal geometry are dropped. Any
    /// self-intersecting geometry rejects the whole dataset, since the
    /// downstream engine cannot process it.
    pub fn read_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        let document: Value = serde_json::from_str(&raw)?;
        Self::from_document(document)
    }

    /// Build a frame from an in-memory GeoJSON document.
    pub fn from_document(document: Value) -> Result<Self> {
        let Value::Object(document) = document else {
            return Err(CartogenError::Serialization(
                "boundary document must be a JSON object".to_string(),
            ));
        };

        let is_topology = document.get("type").and_then(Value::as_str) == Some("Topology");
        let extra = ExtraAttributes::from_document(&document);

        let features = document
            .get("features")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let mut regions = Vec::with_capacity(features.len());
        for feature in features {
            let Some(region) = parse_region(&feature)? else {
                continue;
            };
            let check = validation::validate_region_geometry(&region.geometry);
            if !check.is_valid {
                if is_topology {
                    return Err(CartogenError::InvalidGeometry {
                        region: region_name(&region),
                        reason: "TopoJSON is not fully supported, convert the file to GeoJSON"
                            .to_string(),
                    });
                }
                for error in &check.errors {
                    tracing::warn!(
                        region = %region_name(&region),
                        location = %error.location,
                        reason = %error.reason,
                        "invalid geometry"
                    );
                }
                return Err(CartogenError::GeometryNotSimple);
            }
            regions.push(region);
        }

        Ok(Self { regions, extra })
    }

    /// Column names across all regions, in order of first appearance.
    pub fn columns(&self) -> Vec<String> {
        let mut columns = Vec::new();
        for region in &self.regions {
            for key in region.properties.keys() {
                if !columns.iter().any(|c| c == key) {
                    columns.push(key.clone());
                }
            }
        }
        columns
    }

    /// Columns whose values are distinct across every region, candidates for
    /// the caller's region-identifier picker. The label column never
    /// identifies a region.
    pub fn unique_columns(&self) -> Vec<String> {
        self.columns()
            .into_iter()
            .filter(|column| column != "label")
            .filter(|column| {
                let mut seen = Vec::with_capacity(self.regions.len());
                for region in &self.regions {
                    let value = region.properties.get(column).cloned().unwrap_or(Value::Null);
                    let key = value.to_string();
                    if seen.contains(&key) {
                        return false;
                    }
                    seen.push(key);
                }
                true
            })
            .collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.regions.iter().any(|r| r.properties.contains_key(name))
    }

    pub fn has_column_with_prefix(&self, prefix: &str) -> bool {
        self.regions
            .iter()
            .any(|r| r.properties.keys().any(|k| k.starts_with(prefix)))
    }

    /// Set one property on every region, positionally.
    pub fn set_column(&mut self, name: &str, values: Vec<Value>) {
        for (region, value) in self.regions.iter_mut().zip(values) {
            region.properties.insert(name.to_string(), value);
        }
    }

    /// Assign stable 1-based identifiers when the source carried none.
    pub fn ensure_cartogram_ids(&mut self) {
        if self.has_column("cartogram_id") {
            return;
        }
        for (index, region) in self.regions.iter_mut().enumerate() {
            region
                .properties
                .insert("cartogram_id".to_string(), json!(index as u64 + 1));
        }
    }

    /// Rename `region_col` to `Region`, apply the preferred-name remap, and
    /// retain only the base and geographic-area columns.
    ///
    /// When the remap is non-empty, regions whose name is absent from it are
    /// dropped entirely.
    pub fn clean_properties(&mut self, region_col: &str, remap: &HashMap<String, String>) {
        if region_col != "Region" {
            for region in &mut self.regions {
                region.properties.remove("Region");
                if let Some(value) = region.properties.remove(region_col) {
                    region.properties.insert("Region".to_string(), value);
                }
            }
        }

        if !remap.is_empty() {
            self.regions.retain(|region| {
                region
                    .properties
                    .get("Region")
                    .and_then(Value::as_str)
                    .is_some_and(|name| remap.contains_key(name))
            });
            for region in &mut self.regions {
                let renamed = region
                    .properties
                    .get("Region")
                    .and_then(Value::as_str)
                    .and_then(|name| remap.get(name))
                    .cloned();
                if let Some(name) = renamed {
                    region.properties.insert("Region".to_string(), Value::String(name));
                }
            }
        }

        for region in &mut self.regions {
            region.properties.retain(|key, _| {
                BASE_COLUMNS.contains(&key.as_str()) || key.starts_with("Geographic Area")
            });
            // Labels arrive as serialized JSON strings in some sources.
            if let Some(Value::String(raw)) = region.properties.get("label") {
                if let Ok(parsed) = serde_json::from_str::<Value>(raw) {
                    region.properties.insert("label".to_string(), parsed);
                }
            }
        }
    }

    /// Serialize back to a GeoJSON document, extra attributes first.
    pub fn to_feature_collection(&self) -> Result<Value> {
        let mut document = Map::new();
        document.insert("type".to_string(), json!("FeatureCollection"));
        for (key, value) in self.extra.iter() {
            document.insert(key.clone(), value.clone());
        }

        let mut features = Vec::with_capacity(self.regions.len());
        for region in &self.regions {
            let geometry = geojson::Geometry::new(geojson::Value::from(&region.geometry));
            features.push(json!({
                "type": "Feature",
                "properties": Value::Object(region.properties.clone()),
                "geometry": serde_json::to_value(geometry)?,
            }));
        }
        document.insert("features".to_string(), Value::Array(features));

        Ok(Value::Object(document))
    }

    /// Write the frame to disk and return the written document.
    pub fn save(&self, path: &Path) -> Result<Value> {
        let document = self.to_feature_collection()?;
        fs::write(path, serde_json::to_string(&document)?)?;
        Ok(document)
    }
}

fn parse_region(feature: &Value) -> Result<Option<Region>> {
    let geometry_value = match feature.get("geometry") {
        Some(value) if !value.is_null() => value.clone(),
        _ => return Ok(None),
    };
    let geojson_geometry: geojson::Geometry = serde_json::from_value(geometry_value)
        .map_err(|e| CartogenError::Serialization(format!("invalid feature geometry: {e}")))?;
    let geometry = Geometry::<f64>::try_from(geojson_geometry.value)
        .map_err(|e| CartogenError::Serialization(format!("unsupported geometry: {e}")))?;

    if !matches!(geometry, Geometry::Polygon(_) | Geometry::MultiPolygon(_)) {
        return Ok(None);
    }

    let properties = match feature.get("properties") {
        Some(Value::Object(map)) => map.clone(),
        _ => Map::new(),
    };

    Ok(Some(Region { geometry, properties }))
}

fn region_name(region: &Region) -> String {
    region
        .properties
        .get("Region")
        .and_then(Value::as_str)
        .unwrap_or("<unnamed>")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn square_feature(name: &str, offset: f64) -> Value {
        json!({
            "type": "Feature",
            "properties": {"Region": name, "Group": "A"},
            "geometry": {
                "type": "Polygon",
                "coordinates": [[
                    [offset, 0.0], [offset + 1.0, 0.0],
                    [offset + 1.0, 1.0], [offset, 1.0], [offset, 0.0],
                ]],
            },
        })
    }

    fn sample_document() -> Value {
        json!({
            "type": "FeatureCollection",
            "extent": "world",
            "ignored_key": 42,
            "features": [square_feature("alpha", 0.0), square_feature("beta", 2.0)],
        })
    }

    #[test]
    fn test_read_file_preserves_reserved_attributes() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", sample_document()).unwrap();

        let frame = BoundaryFrame::read_file(file.path()).unwrap();
        assert_eq!(frame.regions.len(), 2);
        assert!(frame.extra.is_world());
        assert!(!frame.extra.is_projected());

        let document = frame.to_feature_collection().unwrap();
        assert_eq!(document["extent"], "world");
        assert!(document.get("ignored_key").is_none());
    }

    #[test]
    fn test_projected_crs_detected() {
        let document = json!({
            "type": "FeatureCollection",
            "crs": {"type": "name", "properties": {"name": "EPSG:cartesian"}},
            "features": [square_feature("alpha", 0.0)],
        });
        let frame = BoundaryFrame::from_document(document).unwrap();
        assert!(frame.extra.is_projected());
    }

    #[test]
    fn test_non_polygonal_features_dropped() {
        let document = json!({
            "type": "FeatureCollection",
            "features": [
                square_feature("alpha", 0.0),
                {
                    "type": "Feature",
                    "properties": {"Region": "pt"},
                    "geometry": {"type": "Point", "coordinates": [0.0, 0.0]},
                },
                {"type": "Feature", "properties": {"Region": "empty"}, "geometry": null},
            ],
        });
        let frame = BoundaryFrame::from_document(document).unwrap();
        assert_eq!(frame.regions.len(), 1);
    }

    #[test]
    fn test_self_intersecting_geometry_rejected() {
        let document = json!({
            "type": "FeatureCollection",
            "features": [{
                "type": "Feature",
                "properties": {"Region": "bowtie"},
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[
                        [0.0, 0.0], [1.0, 1.0], [1.0, 0.0], [0.0, 1.0], [0.0, 0.0],
                    ]],
                },
            }],
        });
        let err = BoundaryFrame::from_document(document).unwrap_err();
        assert!(matches!(err, CartogenError::GeometryNotSimple));
    }

    #[test]
    fn test_degenerate_ring_rejected_at_load() {
        let document = json!({
            "type": "FeatureCollection",
            "features": [{
                "type": "Feature",
                "properties": {"Region": "sliver"},
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[
                        [0.0, 0.0], [1.0, 0.0], [0.0, 0.0],
                    ]],
                },
            }],
        });
        let err = BoundaryFrame::from_document(document).unwrap_err();
        assert!(matches!(err, CartogenError::GeometryNotSimple));
    }

    #[test]
    fn test_unique_columns() {
        let frame = BoundaryFrame::from_document(sample_document()).unwrap();
        let unique = frame.unique_columns();
        assert!(unique.contains(&"Region".to_string()));
        assert!(!unique.contains(&"Group".to_string()));
    }

    #[test]
    fn test_clean_properties_renames_and_filters() {
        let document = json!({
            "type": "FeatureCollection",
            "features": [
                {
                    "type": "Feature",
                    "properties": {"NAME": "alpha", "POP": 10, "Geographic Area (sq. km)": 5},
                    "geometry": square_feature("x", 0.0)["geometry"],
                },
                {
                    "type": "Feature",
                    "properties": {"NAME": "gamma", "POP": 30},
                    "geometry": square_feature("x", 2.0)["geometry"],
                },
            ],
        });
        let mut frame = BoundaryFrame::from_document(document).unwrap();

        let remap: HashMap<String, String> =
            [("alpha".to_string(), "Alpha Prime".to_string())].into();
        frame.clean_properties("NAME", &remap);

        // gamma is absent from the remap and gets dropped
        assert_eq!(frame.regions.len(), 1);
        let props = &frame.regions[0].properties;
        assert_eq!(props["Region"], "Alpha Prime");
        assert!(props.contains_key("Geographic Area (sq. km)"));
        assert!(!props.contains_key("POP"));
        assert!(!props.contains_key("NAME"));
    }

    #[test]
    fn test_ensure_cartogram_ids() {
        let mut frame = BoundaryFrame::from_document(sample_document()).unwrap();
        frame.ensure_cartogram_ids();
        assert_eq!(frame.regions[0].properties["cartogram_id"], 1);
        assert_eq!(frame.regions[1].properties["cartogram_id"], 2);

        // Does not overwrite existing identifiers
        frame.ensure_cartogram_ids();
        assert_eq!(frame.regions[1].properties["cartogram_id"], 2);
    }

    #[test]
    fn test_save_round_trip() {
        let frame = BoundaryFrame::from_document(sample_document()).unwrap();
        let file = NamedTempFile::new().unwrap();
        frame.save(file.path()).unwrap();

        let reloaded = BoundaryFrame::read_file(file.path()).unwrap();
        assert_eq!(reloaded.regions.len(), 2);
        assert!(reloaded.extra.is_world());
    }
}
