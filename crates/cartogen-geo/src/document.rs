//! Generated-output postprocessing.
//!
//! A [`CartoDocument`] wraps one GeoJSON FeatureCollection produced by the
//! engine (or saved from a [`BoundaryFrame`]) together with parsed geometries,
//! so the rescale/translate/label steps operate on real geometry while the
//! document keeps every property and side attribute untouched.

use std::convert::TryFrom;
use std::fs;
use std::path::Path;

use geo::{Coord, Geometry, InteriorPoint, Scale, Translate};
use serde_json::{json, Map, Value};

use cartogen_core::{CartogenError, Result};

use crate::frame::CARTESIAN_CRS;
use crate::geoms::{geoms_info, GeomsInfo};

/// A FeatureCollection in flight between generation and disk.
#[derive(Debug, Clone)]
pub struct CartoDocument {
    document: Map<String, Value>,
    geometries: Vec<Geometry<f64>>,
    info: GeomsInfo,
}

impl CartoDocument {
    pub fn from_value(value: Value) -> Result<Self> {
        let Value::Object(document) = value else {
            return Err(CartogenError::Serialization(
                "generated output must be a JSON object".to_string(),
            ));
        };

        let features = document
            .get("features")
            .and_then(Value::as_array)
            .ok_or_else(|| {
                CartogenError::Serialization("generated output has no features".to_string())
            })?;

        let mut geometries = Vec::with_capacity(features.len());
        for feature in features {
            geometries.push(parse_geometry(feature.get("geometry"))?);
        }

        let info = geoms_info(&geometries).ok_or_else(|| {
            CartogenError::Serialization("generated output has no geometries".to_string())
        })?;

        Ok(Self { document, geometries, info })
    }

    pub fn info(&self) -> &GeomsInfo {
        &self.info
    }

    /// Rescale/translate to the target frame, attach label anchors, and
    /// normalize the dividers shape. Targets omitted means no rescale.
    pub fn postprocess(&mut self, target: Option<(f64, Coord<f64>)>) -> Result<()> {
        if let Some((target_area, target_centroid)) = target {
            self.normalize_scale(target_area, target_centroid)?;
        }
        self.add_label_positions()?;
        self.fix_dividers_format();
        Ok(())
    }

    /// Scale every geometry about the current centroid so the total area
    /// matches `target_area`, then translate the centroid onto
    /// `target_centroid`. The bounding box gets the identical affine applied
    /// to its corner scalars rather than being re-derived, so it stays
    /// numerically consistent with the geometry transform.
    fn normalize_scale(&mut self, target_area: f64, target_centroid: Coord<f64>) -> Result<()> {
        let scale = (target_area / self.info.area).sqrt();
        let origin = self.info.centroid;
        let diff = Coord {
            x: target_centroid.x - origin.x,
            y: target_centroid.y - origin.y,
        };

        for (index, geometry) in self.geometries.iter_mut().enumerate() {
            *geometry = geometry
                .scale_around_point(scale, scale, origin)
                .translate(diff.x, diff.y);
            write_geometry(&mut self.document, index, geometry)?;
        }

        self.transform_dividers(scale, origin, diff)?;

        let affine = |v: f64, o: f64, d: f64| (o + (v - o) * scale) + d;
        self.info.bbox = [
            affine(self.info.bbox[0], origin.x, diff.x),
            affine(self.info.bbox[1], origin.y, diff.y),
            affine(self.info.bbox[2], origin.x, diff.x),
            affine(self.info.bbox[3], origin.y, diff.y),
        ];
        self.document.insert("bbox".to_string(), json!(self.info.bbox));

        self.info.area = target_area;
        self.info.centroid = target_centroid;
        Ok(())
    }

    fn transform_dividers(&mut self, scale: f64, origin: Coord<f64>, diff: Coord<f64>) -> Result<()> {
        let Some(dividers) = self.document.get("dividers").filter(|v| v.is_object()) else {
            return Ok(());
        };
        let geometry = parse_geometry(dividers.get("geometry"))?;
        let transformed = geometry
            .scale_around_point(scale, scale, origin)
            .translate(diff.x, diff.y);

        if let Some(Value::Object(dividers)) = self.document.get_mut("dividers") {
            dividers.insert(
                "geometry".to_string(),
                serde_json::to_value(geojson::Geometry::new(geojson::Value::from(&transformed)))?,
            );
        }
        Ok(())
    }

    /// Attach a point guaranteed to lie inside each polygon. A centroid does
    /// not work here, concave and multi-part shapes can put it outside.
    fn add_label_positions(&mut self) -> Result<()> {
        let anchors: Vec<Option<geo::Point<f64>>> =
            self.geometries.iter().map(|g| g.interior_point()).collect();

        let Some(features) = self.document.get_mut("features").and_then(Value::as_array_mut)
        else {
            return Ok(());
        };
        for (feature, anchor) in features.iter_mut().zip(anchors) {
            let Some(point) = anchor else { continue };
            let Some(feature) = feature.as_object_mut() else { continue };
            let properties = feature
                .entry("properties".to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if let Some(properties) = properties.as_object_mut() {
                properties.insert(
                    "label".to_string(),
                    json!({"x": point.x(), "y": point.y()}),
                );
            }
        }
        Ok(())
    }

    /// Downstream consumers expect a list of divider objects.
    fn fix_dividers_format(&mut self) {
        if let Some(dividers) = self.document.get_mut("dividers") {
            if !dividers.is_array() {
                let single = dividers.take();
                *dividers = Value::Array(vec![single]);
            }
        }
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.document.clone())
    }

    /// Stamp projection/extent attributes and write to disk.
    pub fn save(&mut self, path: &Path, is_projected: bool, is_world: bool) -> Result<()> {
        if is_projected {
            self.document.insert(
                "crs".to_string(),
                json!({"type": "name", "properties": {"name": CARTESIAN_CRS}}),
            );
            self.document.insert(
                "properties".to_string(),
                json!({"note": "Created with a custom density-equalizing projection, not in EPSG:4326."}),
            );
        }
        if is_world {
            self.document.insert("extent".to_string(), json!("world"));
        }
        fs::write(path, serde_json::to_string(&Value::Object(self.document.clone()))?)?;
        Ok(())
    }
}

fn parse_geometry(value: Option<&Value>) -> Result<Geometry<f64>> {
    let value = value
        .filter(|v| !v.is_null())
        .ok_or_else(|| CartogenError::Serialization("feature without geometry".to_string()))?;
    let geojson_geometry: geojson::Geometry = serde_json::from_value(value.clone())
        .map_err(|e| CartogenError::Serialization(format!("invalid geometry: {e}")))?;
    Geometry::<f64>::try_from(geojson_geometry.value)
        .map_err(|e| CartogenError::Serialization(format!("unsupported geometry: {e}")))
}

fn write_geometry(
    document: &mut Map<String, Value>,
    index: usize,
    geometry: &Geometry<f64>,
) -> Result<()> {
    let encoded = serde_json::to_value(geojson::Geometry::new(geojson::Value::from(geometry)))?;
    if let Some(feature) = document
        .get_mut("features")
        .and_then(Value::as_array_mut)
        .and_then(|features| features.get_mut(index))
        .and_then(Value::as_object_mut)
    {
        feature.insert("geometry".to_string(), encoded);
    }
    Ok(())
}
