//! The request orchestrator.
//!
//! Sequences one generation request end to end: normalize the table, clean
//! and filter the boundary, produce the equal-area map, assign colors where
//! missing, generate one output per visualized column, and finally stretch
//! every written output onto one shared bounding box.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde_json::{json, Value};

use cartogen_core::config::LayeredConfig;
use cartogen_core::models::{ProgressReport, VisType};
use cartogen_core::paths::resolve_safe;
use cartogen_core::Result;
use cartogen_engine::{poll_progress, EngineRunner, ProgressTracker};
use cartogen_geo::{assign_color_groups, Balance, BoundaryFrame};
use cartogen_store::ProgressStore;

use crate::boundary;
use crate::contiguous;
use crate::noncontiguous;
use crate::table::process_table;

/// Immutable pipeline configuration, built once at startup.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub engine_path: PathBuf,
    pub engine_timeout: Duration,
    pub progress_ttl: Duration,
    pub area_error_threshold: f64,
    pub noncontiguous_scale: f64,
    pub equal_area_epsg: u32,
    pub min_colors: usize,
    /// Roots every boundary, data, and output path must stay under.
    /// Empty disables the confinement.
    pub data_roots: Vec<PathBuf>,
}

impl PipelineConfig {
    pub fn from_layered(config: &LayeredConfig) -> Self {
        Self {
            engine_path: config.engine_path.value.clone(),
            engine_timeout: Duration::from_secs(config.engine_timeout_secs.value),
            progress_ttl: Duration::from_secs(config.progress_ttl_secs.value),
            area_error_threshold: config.area_error_threshold.value,
            noncontiguous_scale: config.noncontiguous_scale.value,
            equal_area_epsg: config.equal_area_epsg.value,
            min_colors: config.min_colors.value,
            data_roots: config.data_roots.value.clone(),
        }
    }

    pub fn runner(&self) -> EngineRunner {
        EngineRunner::new(&self.engine_path)
            .with_timeout(self.engine_timeout)
            .with_area_error_threshold(self.area_error_threshold)
            .with_data_roots(self.data_roots.clone())
    }
}

/// One generation request.
#[derive(Debug, Clone)]
pub struct PipelineRequest {
    /// Raw CSV text of the data table
    pub csv_text: String,
    /// Requested visualization per data column header
    pub vis_types: HashMap<String, VisType>,
    /// Boundary file; gets rewritten with the cleaned frame
    pub boundary_path: PathBuf,
    /// Directory receiving every output artifact
    pub project_path: PathBuf,
    /// Progress session key for polling callers
    pub session_key: String,
    /// Boundary property column holding the region identifier, when it is
    /// not already named `Region`
    pub clean_by: Option<String>,
    /// Extra engine flags, validated against the allow-list at spawn time
    pub flags: Vec<String>,
}

/// What one completed request produced.
#[derive(Debug, Clone)]
pub struct GenerationSummary {
    /// Every written output file, equal-area map first
    pub outputs: Vec<PathBuf>,
    /// The shared bounding box written into each output
    pub final_bbox: [f64; 4],
}

/// The cartogram generation pipeline.
pub struct Pipeline<'a, S: ProgressStore> {
    config: PipelineConfig,
    store: &'a S,
}

impl<'a, S: ProgressStore> Pipeline<'a, S> {
    pub fn new(config: PipelineConfig, store: &'a S) -> Self {
        Self { config, store }
    }

    /// Current progress of a generation session.
    pub async fn poll(&self, session_key: &str) -> Result<ProgressReport> {
        poll_progress(self.store, session_key).await
    }

    /// Run one request to completion.
    pub async fn generate(&self, request: &PipelineRequest) -> Result<GenerationSummary> {
        // Reject escaping paths before anything is read or written. The
        // runner re-checks whatever it hands to the subprocess.
        if !self.config.data_roots.is_empty() {
            resolve_safe(&self.config.data_roots, &request.project_path)?;
            resolve_safe(&self.config.data_roots, &request.boundary_path)?;
        }

        let runner = self.config.runner();

        let table = process_table(&request.csv_text, &request.vis_types)?;
        let area_data_path = request.project_path.join("data.csv");
        table.save(&area_data_path)?;

        let mut frame = BoundaryFrame::read_file(&request.boundary_path)?;
        if request.clean_by.is_some() || !table.region_map.is_empty() {
            let region_col = request.clean_by.as_deref().unwrap_or("Region");
            frame.clean_properties(region_col, &table.region_map);
        }

        // Colors from the table win; otherwise the boundary either carries
        // its own groups or gets freshly assigned ones.
        let user_colored = table
            .column_values("ColorGroup")
            .is_some_and(|values| values.iter().any(|v| !v.is_empty()));
        if !user_colored && !frame.has_column("ColorGroup") {
            let geometries: Vec<_> = frame.regions.iter().map(|r| r.geometry.clone()).collect();
            let balance =
                if frame.extra.is_projected() { Balance::Count } else { Balance::Centroid };
            let groups = assign_color_groups(&geometries, self.config.min_colors, balance);
            let values = groups.into_iter().map(|g| json!(g.unwrap_or(0))).collect();
            frame.set_column("ColorGroup", values);
        }

        let is_world = boundary::is_world_map(&frame);
        let mut flags = request.flags.clone();
        if is_world && !flags.iter().any(|f| f == "--world") {
            flags.push("--world".to_string());
        }

        let mut equal_area = boundary::generate_equal_area(
            &runner,
            &frame,
            &request.boundary_path,
            Some(&area_data_path),
            &request.flags,
        )
        .await?;
        let equal_area_path = request.project_path.join("Geographic Area.json");
        equal_area.save(&equal_area_path, false, is_world)?;

        let target_area = equal_area.info().area;
        let target_centroid = equal_area.info().centroid;
        let mut final_bbox = equal_area.info().bbox;
        let mut outputs = vec![equal_area_path];

        // The equal-area document doubles as the noncontiguous input frame
        let equal_area_frame = BoundaryFrame::from_document(equal_area.to_value())?;

        let cartogram_columns: Vec<&String> = table
            .data_columns
            .iter()
            .filter(|c| request.vis_types.get(*c) == Some(&VisType::Cartogram))
            .collect();
        let mut tracker = ProgressTracker::new(
            self.store,
            &request.session_key,
            cartogram_columns.len(),
            self.config.progress_ttl,
        );

        let mut cartogram_index = 0;
        for column in &table.data_columns {
            let Some(vis_type) = request.vis_types.get(column) else {
                continue;
            };
            let data_name = table
                .data_names
                .get(column)
                .map(|label| label.name.clone())
                .unwrap_or_else(|| column.clone());

            match vis_type {
                VisType::Cartogram => {
                    tracker.begin_dataset(cartogram_index, &data_name).await?;
                    final_bbox = contiguous::generate(
                        &runner,
                        &request.project_path,
                        &outputs[0],
                        target_area,
                        target_centroid,
                        &area_data_path,
                        column,
                        &data_name,
                        final_bbox,
                        &flags,
                        &mut tracker,
                    )
                    .await?;
                    outputs.push(contiguous::output_path(&request.project_path, &data_name));
                    cartogram_index += 1;
                }
                VisType::Noncontiguous => {
                    let values = table.values_by_region(column);
                    let mut document = noncontiguous::generate(
                        &equal_area_frame,
                        &values,
                        self.config.noncontiguous_scale,
                    )?;
                    document.postprocess(None)?;
                    let path = contiguous::output_path(&request.project_path, &data_name);
                    document.save(&path, true, is_world)?;
                    final_bbox =
                        cartogen_geo::union_bounding_boxes(final_bbox, document.info().bbox);
                    outputs.push(path);
                }
                // The value only matters at render time
                VisType::Choropleth => {}
            }
        }

        for path in &outputs {
            rewrite_bbox(path, final_bbox)?;
        }

        Ok(GenerationSummary { outputs, final_bbox })
    }
}

/// Overwrite the `bbox` member of an already-written GeoJSON file.
fn rewrite_bbox(path: &Path, bbox: [f64; 4]) -> Result<()> {
    let mut document: Value = serde_json::from_str(&fs::read_to_string(path)?)?;
    document["bbox"] = json!(bbox);
    fs::write(path, serde_json::to_string(&document)?)?;
    Ok(())
}
