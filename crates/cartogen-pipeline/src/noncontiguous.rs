//! Noncontiguous cartogram generation.
//!
//! No engine run here: each region is scaled about its own centroid by the
//! square root of its density relative to the densest region, so the
//! densest region keeps `scale_factor` of its size and everything else
//! shrinks proportionally.

use std::collections::HashMap;

use geo::{Area, Centroid, Scale};
use serde_json::Value;

use cartogen_core::{CartogenError, Result};
use cartogen_geo::{BoundaryFrame, CartoDocument};

use crate::boundary::GEOGRAPHIC_AREA_COLUMN;

/// Scale the equal-area frame's regions by the given data column values.
///
/// Regions without a value are imputed at the mean density, which leaves
/// them visually unchanged relative to their neighbors rather than
/// collapsing them. A region whose value is zero degenerates to a point at
/// its own centroid.
pub fn generate(
    equal_area: &BoundaryFrame,
    values_by_region: &HashMap<String, Option<f64>>,
    scale_factor: f64,
) -> Result<CartoDocument> {
    let areas: Vec<f64> = equal_area
        .regions
        .iter()
        .map(|region| {
            region
                .properties
                .get(GEOGRAPHIC_AREA_COLUMN)
                .and_then(Value::as_f64)
                // Documents straight from the generation path may lack the
                // area column; fall back to the raw coordinate area without
                // rounding so small regions do not collapse to zero.
                .unwrap_or_else(|| region.geometry.unsigned_area() / 1e6)
        })
        .collect();

    let values: Vec<Option<f64>> = equal_area
        .regions
        .iter()
        .map(|region| {
            region
                .properties
                .get("Region")
                .and_then(Value::as_str)
                .and_then(|name| values_by_region.get(name).copied())
                .flatten()
        })
        .collect();

    // Mean density over the observed regions fills the gaps.
    let mut observed_area = 0.0;
    let mut observed_value = 0.0;
    for (&area, value) in areas.iter().zip(&values) {
        if let Some(value) = value {
            if area > 0.0 {
                observed_area += area;
                observed_value += value;
            }
        }
    }
    if observed_area == 0.0 {
        return Err(CartogenError::InvalidTable {
            reason: "no region with both a data value and a nonzero area".to_string(),
        });
    }
    let mean_density = observed_value / observed_area;

    let densities: Vec<f64> = areas
        .iter()
        .zip(&values)
        .map(|(&area, value)| {
            if area > 0.0 {
                value.unwrap_or(area * mean_density) / area
            } else {
                0.0
            }
        })
        .collect();
    let max_density = densities.iter().fold(f64::MIN, |a, &b| a.max(b));
    if max_density <= 0.0 {
        return Err(CartogenError::InvalidTable {
            reason: "all region densities are zero".to_string(),
        });
    }

    let mut scaled = equal_area.clone();
    for (region, density) in scaled.regions.iter_mut().zip(&densities) {
        let factor = (density / max_density).sqrt() * scale_factor;
        let Some(origin) = region.geometry.centroid() else {
            continue;
        };
        region.geometry = region.geometry.scale_around_point(factor, factor, origin);
    }

    CartoDocument::from_value(scaled.to_feature_collection()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn equal_area_frame() -> BoundaryFrame {
        // Three unit squares, all the same geographic area
        let features: Vec<Value> = ["Alpha", "Beta", "Gamma"]
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let x = i as f64 * 3.0;
                json!({
                    "type": "Feature",
                    "properties": {"Region": name, "Geographic Area (sq. km)": 1.0},
                    "geometry": {
                        "type": "Polygon",
                        "coordinates": [[
                            [x, 0.0], [x + 1.0, 0.0], [x + 1.0, 1.0], [x, 1.0], [x, 0.0],
                        ]],
                    },
                })
            })
            .collect();
        BoundaryFrame::from_document(json!({
            "type": "FeatureCollection",
            "features": features,
        }))
        .unwrap()
    }

    fn values(entries: &[(&str, Option<f64>)]) -> HashMap<String, Option<f64>> {
        entries.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    fn region_width(document: &Value, index: usize) -> f64 {
        let ring = document["features"][index]["geometry"]["coordinates"][0]
            .as_array()
            .unwrap();
        let xs: Vec<f64> = ring.iter().map(|c| c[0].as_f64().unwrap()).collect();
        xs.iter().cloned().fold(f64::MIN, f64::max) - xs.iter().cloned().fold(f64::MAX, f64::min)
    }

    #[test]
    fn test_max_value_region_scales_by_exactly_scale_factor() {
        let frame = equal_area_frame();
        let document = generate(
            &frame,
            &values(&[("Alpha", Some(10.0)), ("Beta", Some(40.0)), ("Gamma", Some(10.0))]),
            0.9,
        )
        .unwrap()
        .to_value();

        // Equal areas, so value ratios are density ratios
        assert!((region_width(&document, 1) - 0.9).abs() < 1e-9);
        assert!((region_width(&document, 0) - 0.9 * (10.0f64 / 40.0).sqrt()).abs() < 1e-9);
    }

    #[test]
    fn test_zero_value_degenerates_to_centroid_point() {
        let frame = equal_area_frame();
        let document = generate(
            &frame,
            &values(&[("Alpha", Some(0.0)), ("Beta", Some(40.0)), ("Gamma", Some(10.0))]),
            0.9,
        )
        .unwrap()
        .to_value();

        assert!(region_width(&document, 0).abs() < 1e-12);
        let ring = document["features"][0]["geometry"]["coordinates"][0]
            .as_array()
            .unwrap();
        // Collapsed onto the unit square's centroid at (0.5, 0.5)
        assert!((ring[0][0].as_f64().unwrap() - 0.5).abs() < 1e-12);
        assert!((ring[0][1].as_f64().unwrap() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_missing_value_imputed_at_mean_density() {
        let frame = equal_area_frame();
        let document = generate(
            &frame,
            &values(&[("Alpha", Some(10.0)), ("Beta", None), ("Gamma", Some(30.0))]),
            0.9,
        )
        .unwrap()
        .to_value();

        // Mean density is 20 per unit area; Gamma is densest at 30
        let expected = 0.9 * (20.0f64 / 30.0).sqrt();
        assert!((region_width(&document, 1) - expected).abs() < 1e-9);
    }

    #[test]
    fn test_coordinate_area_fallback_when_column_absent() {
        // Same squares but without the area column; their coordinate area
        // of one square unit is far below a rounded square kilometer.
        let features: Vec<Value> = ["Alpha", "Beta", "Gamma"]
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let x = i as f64 * 3.0;
                json!({
                    "type": "Feature",
                    "properties": {"Region": name},
                    "geometry": {
                        "type": "Polygon",
                        "coordinates": [[
                            [x, 0.0], [x + 1.0, 0.0], [x + 1.0, 1.0], [x, 1.0], [x, 0.0],
                        ]],
                    },
                })
            })
            .collect();
        let frame = BoundaryFrame::from_document(json!({
            "type": "FeatureCollection",
            "features": features,
        }))
        .unwrap();

        let document = generate(
            &frame,
            &values(&[("Alpha", Some(10.0)), ("Beta", Some(40.0)), ("Gamma", Some(10.0))]),
            0.9,
        )
        .unwrap()
        .to_value();

        assert!((region_width(&document, 1) - 0.9).abs() < 1e-9);
        assert!((region_width(&document, 0) - 0.9 * (10.0f64 / 40.0).sqrt()).abs() < 1e-9);
    }

    #[test]
    fn test_no_observed_values_rejected() {
        let frame = equal_area_frame();
        let err = generate(&frame, &HashMap::new(), 0.9).unwrap_err();
        assert!(matches!(err, CartogenError::InvalidTable { .. }));
    }
}
