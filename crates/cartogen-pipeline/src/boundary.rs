//! Boundary preprocessing and the equal-area projection step.
//!
//! An uploaded boundary file is standardized, enriched with derived columns
//! (geographic area, color groups, stable ids), and turned into the
//! equal-area map every later generation step reads from.

use std::path::Path;

use geo::Area;
use serde_json::{json, Value};

use cartogen_core::models::GenerationRequest;
use cartogen_core::Result;
use cartogen_engine::EngineRunner;
use cartogen_geo::color::{assign_color_groups, Balance};
use cartogen_geo::spatial::spans_world_extent;
use cartogen_geo::transform::{reproject, EPSG_WGS84};
use cartogen_geo::{BoundaryFrame, CartoDocument};

/// The derived area column, in square kilometers.
pub const GEOGRAPHIC_AREA_COLUMN: &str = "Geographic Area (sq. km)";

/// Result of preprocessing one uploaded boundary file.
#[derive(Debug)]
pub struct PreprocessOutcome {
    /// The postprocessed equal-area GeoJSON document
    pub document: Value,
    /// Property columns that uniquely identify regions, for the caller's
    /// region-identifier picker
    pub unique_columns: Vec<String>,
}

/// Standardize a boundary file and produce its equal-area map.
///
/// Unprojected input is temporarily reprojected to the equal-area CRS so
/// true geographic areas can be computed, then restored to WGS84 before the
/// engine runs.
pub async fn preprocess(
    runner: &EngineRunner,
    equal_area_epsg: u32,
    min_colors: usize,
    input_path: &Path,
    work_path: &Path,
) -> Result<PreprocessOutcome> {
    let mut frame = BoundaryFrame::read_file(input_path)?;
    frame.save(work_path)?;

    let unique_columns = frame.unique_columns();
    let is_projected = frame.extra.is_projected();

    // Centroid balancing needs meaningful distances, which projected input
    // in the engine's own space does not offer.
    let balance = if is_projected { Balance::Count } else { Balance::Centroid };
    if !is_projected {
        reproject(&mut frame, EPSG_WGS84, equal_area_epsg)?;
    }

    if !frame.has_column_with_prefix("Geographic Area") {
        let areas: Vec<Value> = frame
            .regions
            .iter()
            .map(|region| json!((region.geometry.unsigned_area() / 1e6).round() as i64))
            .collect();
        frame.set_column(GEOGRAPHIC_AREA_COLUMN, areas);
    }

    if !frame.has_column("ColorGroup") {
        let geometries: Vec<_> = frame.regions.iter().map(|r| r.geometry.clone()).collect();
        let groups = assign_color_groups(&geometries, min_colors, balance);
        let values = groups
            .into_iter()
            .map(|group| json!(group.unwrap_or(0)))
            .collect();
        frame.set_column("ColorGroup", values);
    }

    frame.ensure_cartogram_ids();

    if !is_projected {
        reproject(&mut frame, equal_area_epsg, EPSG_WGS84)?;
    }

    let equal_area = generate_equal_area(runner, &frame, work_path, None, &[]).await?;
    Ok(PreprocessOutcome { document: equal_area.to_value(), unique_columns })
}

/// Produce the equal-area projection of a boundary frame.
///
/// Flag selection depends on the projection state and on whether tabular
/// data accompanies the boundary:
/// already projected without data needs no engine run at all; unprojected
/// input asks for the equal-area map; data adds inset handling keyed on the
/// geographic-area column. The engine coming back empty falls back to the
/// saved input document.
pub async fn generate_equal_area(
    runner: &EngineRunner,
    frame: &BoundaryFrame,
    input_path: &Path,
    data_path: Option<&Path>,
    extra_flags: &[String],
) -> Result<CartoDocument> {
    let saved = frame.save(input_path)?;
    let is_projected = frame.extra.is_projected();
    let is_world =
        frame.extra.is_world() || (!is_projected && spans_world_extent(frame));

    let mut flags: Vec<String> = extra_flags.to_vec();
    if is_world {
        flags.push("--world".to_string());
    }
    match (data_path.is_some(), is_projected) {
        // Already in the target space with nothing to shift: no engine run
        (false, true) => {}
        (false, false) => flags.push("--output_equal_area_map".to_string()),
        (true, true) => flags.extend([
            "--output_shifted_insets".to_string(),
            "--skip_projection".to_string(),
            "--area".to_string(),
            GEOGRAPHIC_AREA_COLUMN.to_string(),
        ]),
        (true, false) => flags.extend([
            "--output_equal_area_map".to_string(),
            "--area".to_string(),
            GEOGRAPHIC_AREA_COLUMN.to_string(),
        ]),
    }

    let mut document = None;
    if !is_projected || data_path.is_some() {
        let mut request = GenerationRequest::new(input_path)
            .with_flags(flags)
            .with_data_name("Geographic Area");
        if let Some(data_path) = data_path {
            request = request.with_area_data(data_path);
        }
        document = runner.run_detached(&request).await?.map(|output| output.original);
        if document.is_none() {
            tracing::warn!("engine produced no equal-area output, using the input as-is");
        }
    }

    let mut equal_area = CartoDocument::from_value(document.unwrap_or(saved))?;
    equal_area.postprocess(None)?;
    Ok(equal_area)
}

/// Whether a frame covers the whole world, either declared via the extent
/// attribute or inferred from its longitude span.
pub fn is_world_map(frame: &BoundaryFrame) -> bool {
    frame.extra.is_world() || (!frame.extra.is_projected() && spans_world_extent(frame))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn frame(projected: bool) -> BoundaryFrame {
        let mut document = json!({
            "type": "FeatureCollection",
            "features": [{
                "type": "Feature",
                "properties": {"Region": "alpha"},
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[
                        [0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0], [0.0, 0.0],
                    ]],
                },
            }],
        });
        if projected {
            document["crs"] = json!({"type": "name", "properties": {"name": "EPSG:cartesian"}});
        }
        BoundaryFrame::from_document(document).unwrap()
    }

    #[tokio::test]
    async fn test_projected_frame_without_data_skips_engine() {
        // A runner pointing at a nonexistent binary: reaching it would fail
        let runner = EngineRunner::new("/nonexistent/cartogram");
        let dir = tempfile::TempDir::new().unwrap();
        let input = dir.path().join("Input.json");

        let document = generate_equal_area(&runner, &frame(true), &input, None, &[])
            .await
            .unwrap();
        let value = document.to_value();
        assert_eq!(value["features"].as_array().unwrap().len(), 1);
        // Postprocessing attached label anchors
        assert!(value["features"][0]["properties"]["label"]["x"].is_number());
    }

    #[test]
    fn test_world_detection_prefers_declared_extent() {
        let mut world_frame = frame(false);
        assert!(!is_world_map(&world_frame));

        let mut document = world_frame.to_feature_collection().unwrap();
        document["extent"] = json!("world");
        world_frame = BoundaryFrame::from_document(document).unwrap();
        assert!(is_world_map(&world_frame));
    }
}
