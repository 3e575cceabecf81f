//! Contiguous cartogram generation for one data column.

use std::path::{Path, PathBuf};

use geo::Coord;

use cartogen_core::models::{EngineOutput, GenerationRequest};
use cartogen_core::{CartogenError, Result};
use cartogen_engine::{EngineRunner, ProgressTracker};
use cartogen_geo::{union_bounding_boxes, CartoDocument};
use cartogen_store::ProgressStore;

/// Run the engine for `data_col`, postprocess the result onto the
/// equal-area frame, and write the original plus its simplified variant.
///
/// Returns the final bounding box grown to cover this output.
#[allow(clippy::too_many_arguments)]
pub async fn generate<S: ProgressStore>(
    runner: &EngineRunner,
    project_path: &Path,
    equal_area_path: &Path,
    target_area: f64,
    target_centroid: Coord<f64>,
    area_data_path: &Path,
    data_col: &str,
    data_name: &str,
    final_bbox: [f64; 4],
    flags: &[String],
    tracker: &mut ProgressTracker<'_, S>,
) -> Result<[f64; 4]> {
    let mut run_flags: Vec<String> = flags.to_vec();
    run_flags.extend([
        "--skip_projection".to_string(),
        "--area".to_string(),
        data_col.to_string(),
    ]);
    let is_world = flags.iter().any(|f| f == "--world");

    let request = GenerationRequest::new(equal_area_path)
        .with_area_data(area_data_path)
        .with_flags(run_flags)
        .with_data_name(data_col);

    let output = runner
        .run(&request, Some(tracker))
        .await
        .map_err(|e| match e {
            CartogenError::Engine { message } => CartogenError::Engine {
                message: format!("Cannot generate cartogram for {data_col}. {message}"),
            },
            other => other,
        })?
        .ok_or_else(|| CartogenError::Engine {
            message: format!("Cannot generate cartogram for {data_col}."),
        })?;

    for warning in &output.warnings {
        tracing::warn!(column = data_col, warning = %warning, "engine warning");
    }

    let has_simplified = output.has_simplified();
    let EngineOutput {
        original,
        simplified,
        ..
    } = output;

    let mut cartogram = CartoDocument::from_value(original)?;
    cartogram.postprocess(Some((target_area, target_centroid)))?;
    cartogram.save(&output_path(project_path, data_name), true, is_world)?;

    let final_bbox = union_bounding_boxes(final_bbox, cartogram.info().bbox);

    if has_simplified {
        let mut simplified = CartoDocument::from_value(simplified)?;
        simplified.save(
            &project_path.join(format!("{data_name}_simplified.json")),
            true,
            is_world,
        )?;
    }

    Ok(final_bbox)
}

pub fn output_path(project_path: &Path, data_name: &str) -> PathBuf {
    project_path.join(format!("{data_name}.json"))
}
