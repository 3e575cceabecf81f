//! Tabular data normalization.
//!
//! Raw CSV input becomes a canonical table: region identifiers cleaned and
//! required, the optional `RegionMap` column turned into a rename map,
//! columns reordered into `{identity, geographic area, data}`, and every
//! data column coerced to numeric and validated.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use cartogen_core::models::{parse_column_label, ColumnLabel, VisType};
use cartogen_core::paths::validate_filename;
use cartogen_core::{CartogenError, Result};

/// Columns that identify or style a region rather than carry data. The
/// order here is also the output column order.
const PRIORITY_COLUMNS: &[&str] = &["Region", "RegionLabel", "Color", "ColorGroup", "Inset"];

/// The canonical form of one tabular input.
#[derive(Debug, Clone)]
pub struct ProcessedTable {
    /// Column headers in canonical order
    pub headers: Vec<String>,
    /// Row cells aligned with `headers`; an empty string is a missing value
    pub rows: Vec<Vec<String>>,
    /// `{name in the boundary file -> preferred name}`, from the RegionMap
    /// column; empty when no renaming applies
    pub region_map: HashMap<String, String>,
    /// Data column headers, in output order
    pub data_columns: Vec<String>,
    /// Parsed `{display name, unit}` per data column header
    pub data_names: HashMap<String, ColumnLabel>,
}

impl ProcessedTable {
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Raw cell values of one column, row order preserved.
    pub fn column_values(&self, name: &str) -> Option<Vec<&str>> {
        let index = self.column_index(name)?;
        Some(self.rows.iter().map(|row| row[index].as_str()).collect())
    }

    /// Numeric view of one column; empty cells become `None`.
    pub fn numeric_column(&self, name: &str) -> Option<Vec<Option<f64>>> {
        let index = self.column_index(name)?;
        Some(
            self.rows
                .iter()
                .map(|row| row[index].parse::<f64>().ok())
                .collect(),
        )
    }

    /// Value of a data column for each region name.
    pub fn values_by_region(&self, column: &str) -> HashMap<String, Option<f64>> {
        let Some(regions) = self.column_values("Region") else {
            return HashMap::new();
        };
        let Some(values) = self.numeric_column(column) else {
            return HashMap::new();
        };
        regions
            .into_iter()
            .map(str::to_string)
            .zip(values)
            .collect()
    }

    /// Write the canonical table back out as CSV.
    pub fn save(&self, path: &Path) -> Result<()> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer
            .write_record(&self.headers)
            .map_err(|e| CartogenError::InvalidTable { reason: e.to_string() })?;
        for row in &self.rows {
            writer
                .write_record(row)
                .map_err(|e| CartogenError::InvalidTable { reason: e.to_string() })?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| CartogenError::InvalidTable { reason: e.to_string() })?;
        fs::write(path, bytes)?;
        Ok(())
    }
}

/// Normalize and validate one CSV input.
///
/// `vis_types` maps data column headers to their requested visualization;
/// the zero-sum check applies to cartogram-typed columns only, since those
/// are the ones whose values become target areas.
pub fn process_table(
    csv_text: &str,
    vis_types: &HashMap<String, VisType>,
) -> Result<ProcessedTable> {
    let (mut headers, mut rows) = read_rows(csv_text)?;

    let region_map = format_regions(&headers, &mut rows)?;
    if let Some(index) = headers.iter().position(|h| h == "RegionMap") {
        remove_column_in_place(&mut headers, &mut rows, index);
    }

    drop_empty_style_columns(&mut headers, &mut rows);
    ensure_color_group(&mut headers, &mut rows);
    let data_columns = reorder_columns(&mut headers, &mut rows);

    let mut data_names = HashMap::new();
    for column in &data_columns {
        let label = format_data_column(&mut headers, &mut rows, column, vis_types)?;
        data_names.insert(column.clone(), label);
    }

    Ok(ProcessedTable { headers, rows, region_map, data_columns, data_names })
}

fn read_rows(csv_text: &str) -> Result<(Vec<String>, Vec<Vec<String>>)> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(csv_text.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| CartogenError::InvalidTable { reason: e.to_string() })?
        .iter()
        .map(str::to_string)
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| CartogenError::InvalidTable { reason: e.to_string() })?;
        let mut row: Vec<String> =
            record.iter().map(|cell| cell.trim().to_string()).collect();
        row.resize(headers.len(), String::new());
        rows.push(row);
    }

    Ok((headers, rows))
}

/// Clean region names and build the rename map.
///
/// Backslashes and double quotes in region names would be unsafe in the
/// filenames derived from them, so they become underscores. Rows without a
/// region identifier are dropped. The rename map is only produced when the
/// RegionMap column actually differs from Region, or when rows were dropped
/// (in which case downstream must also filter the boundary regions).
fn format_regions(
    headers: &[String],
    rows: &mut Vec<Vec<String>>,
) -> Result<HashMap<String, String>> {
    let region_index = headers
        .iter()
        .position(|h| h == "Region")
        .ok_or_else(|| CartogenError::InvalidTable {
            reason: "missing required column: Region".to_string(),
        })?;

    for row in rows.iter_mut() {
        row[region_index] = row[region_index].replace(['\\', '"'], "_");
    }

    let initial_rows = rows.len();
    rows.retain(|row| !row[region_index].is_empty());

    let mut region_map = HashMap::new();
    if let Some(map_index) = headers.iter().position(|h| h == "RegionMap") {
        let differs = rows.iter().any(|row| row[map_index] != row[region_index]);
        if differs || rows.len() != initial_rows {
            for row in rows.iter() {
                region_map.insert(row[map_index].clone(), row[region_index].clone());
            }
        }
    }

    Ok(region_map)
}

/// Color and Inset are optional styling columns; fully empty ones are noise.
fn drop_empty_style_columns(headers: &mut Vec<String>, rows: &mut [Vec<String>]) {
    for name in ["Color", "Inset"] {
        if let Some(index) = headers.iter().position(|h| h == name) {
            if rows.iter().all(|row| row[index].is_empty()) {
                remove_column_in_place(headers, rows, index);
            }
        }
    }
}

/// Color assignment itself happens during boundary processing; the table
/// just guarantees the column exists.
fn ensure_color_group(headers: &mut Vec<String>, rows: &mut [Vec<String>]) {
    if !headers.iter().any(|h| h == "ColorGroup") {
        headers.push("ColorGroup".to_string());
        for row in rows.iter_mut() {
            row.push(String::new());
        }
    }
}

/// Reorder into `{priority, Geographic Area*, remaining}` and return the
/// remaining (data) column names.
fn reorder_columns(headers: &mut Vec<String>, rows: &mut [Vec<String>]) -> Vec<String> {
    let mut order: Vec<usize> = Vec::with_capacity(headers.len());
    for name in PRIORITY_COLUMNS {
        if let Some(index) = headers.iter().position(|h| h == name) {
            order.push(index);
        }
    }
    for (index, header) in headers.iter().enumerate() {
        if header.starts_with("Geographic Area") && !order.contains(&index) {
            order.push(index);
        }
    }
    let mut data_columns = Vec::new();
    for (index, header) in headers.iter().enumerate() {
        if !order.contains(&index) {
            order.push(index);
            data_columns.push(header.clone());
        }
    }

    *headers = order.iter().map(|&i| headers[i].clone()).collect();
    for row in rows.iter_mut() {
        *row = order.iter().map(|&i| row[i].clone()).collect();
    }

    data_columns
}

fn format_data_column(
    headers: &mut [String],
    rows: &mut [Vec<String>],
    column: &str,
    vis_types: &HashMap<String, VisType>,
) -> Result<ColumnLabel> {
    validate_filename(column)?;

    let label = parse_column_label(column);
    if label.name.is_empty() {
        return Err(CartogenError::MissingDataName { column: column.to_string() });
    }

    let index = headers
        .iter()
        .position(|h| h == column)
        .ok_or_else(|| CartogenError::InvalidTable {
            reason: format!("column vanished during processing: {column}"),
        })?;

    let mut sum = 0.0;
    let mut any_value = false;
    for row in rows.iter_mut() {
        match row[index].parse::<f64>() {
            Ok(value) => {
                sum += value;
                any_value = true;
            }
            Err(_) => row[index].clear(),
        }
    }

    if !any_value {
        return Err(CartogenError::DataColumnEmpty { column: column.to_string() });
    }
    if vis_types.get(column) == Some(&VisType::Cartogram) && sum == 0.0 {
        return Err(CartogenError::DataColumnZeroSum { column: column.to_string() });
    }

    Ok(label)
}

fn remove_column_in_place(headers: &mut Vec<String>, rows: &mut [Vec<String>], index: usize) {
    headers.remove(index);
    for row in rows.iter_mut() {
        row.remove(index);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cartogram_vis(columns: &[&str]) -> HashMap<String, VisType> {
        columns.iter().map(|c| (c.to_string(), VisType::Cartogram)).collect()
    }

    #[test]
    fn test_basic_processing_and_order() {
        let csv = "Population (people),Region,Inset,Color\n10,Alpha,C,#aabbcc\n20,Beta,C,#ddeeff\n";
        let table = process_table(csv, &cartogram_vis(&["Population (people)"])).unwrap();

        assert_eq!(
            table.headers,
            vec!["Region", "Color", "ColorGroup", "Inset", "Population (people)"]
        );
        assert_eq!(table.data_columns, vec!["Population (people)"]);
        assert_eq!(table.data_names["Population (people)"].name, "Population");
        assert_eq!(table.data_names["Population (people)"].unit, "people");
    }

    #[test]
    fn test_region_cleaning_and_empty_rows() {
        let csv = "Region,Population (people)\nAl\"pha,10\n   ,20\nBeta\\,30\n";
        let table = process_table(csv, &HashMap::new()).unwrap();

        let regions = table.column_values("Region").unwrap();
        assert_eq!(regions, vec!["Al_pha", "Beta_"]);
        assert_eq!(table.rows.len(), 2);
    }

    #[test]
    fn test_region_map_extracted_and_column_dropped() {
        let csv = "Region,RegionMap,Population (people)\nAlpha Prime,alpha,10\nBeta,Beta,20\n";
        let table = process_table(csv, &HashMap::new()).unwrap();

        assert!(!table.headers.contains(&"RegionMap".to_string()));
        assert_eq!(table.region_map["alpha"], "Alpha Prime");
        assert_eq!(table.region_map["Beta"], "Beta");
    }

    #[test]
    fn test_identical_region_map_produces_no_remap() {
        let csv = "Region,RegionMap,Population (people)\nAlpha,Alpha,10\nBeta,Beta,20\n";
        let table = process_table(csv, &HashMap::new()).unwrap();

        assert!(table.region_map.is_empty());
        assert!(!table.headers.contains(&"RegionMap".to_string()));
    }

    #[test]
    fn test_empty_color_and_inset_dropped() {
        let csv = "Region,Color,Inset,Population (people)\nAlpha,,,10\nBeta,,,20\n";
        let table = process_table(csv, &HashMap::new()).unwrap();
        assert!(!table.headers.contains(&"Color".to_string()));
        assert!(!table.headers.contains(&"Inset".to_string()));
    }

    #[test]
    fn test_color_group_guaranteed() {
        let csv = "Region,Population (people)\nAlpha,10\n";
        let table = process_table(csv, &HashMap::new()).unwrap();
        assert!(table.headers.contains(&"ColorGroup".to_string()));
        assert_eq!(table.column_values("ColorGroup").unwrap(), vec![""]);
    }

    #[test]
    fn test_non_numeric_values_become_missing() {
        let csv = "Region,Population (people)\nAlpha,10\nBeta,unknown\n";
        let table = process_table(csv, &HashMap::new()).unwrap();
        assert_eq!(
            table.numeric_column("Population (people)").unwrap(),
            vec![Some(10.0), None]
        );
    }

    #[test]
    fn test_all_empty_column_rejected() {
        let csv = "Region,Population (people)\nAlpha,n/a\nBeta,\n";
        let err = process_table(csv, &HashMap::new()).unwrap_err();
        assert!(matches!(err, CartogenError::DataColumnEmpty { .. }));
    }

    #[test]
    fn test_cartogram_zero_sum_rejected() {
        let csv = "Region,Population (people)\nAlpha,5\nBeta,-5\n";
        let err = process_table(csv, &cartogram_vis(&["Population (people)"])).unwrap_err();
        assert!(matches!(err, CartogenError::DataColumnZeroSum { .. }));

        // The same column is fine when not cartogram-typed
        process_table(csv, &HashMap::new()).unwrap();
    }

    #[test]
    fn test_unnamed_data_column_rejected() {
        let csv = "Region,\nAlpha,10\n";
        let err = process_table(csv, &HashMap::new()).unwrap_err();
        assert!(matches!(err, CartogenError::MissingDataName { .. }));
    }

    #[test]
    fn test_unsafe_column_name_rejected() {
        let csv = "Region,Pop/ulation\nAlpha,10\n";
        let err = process_table(csv, &HashMap::new()).unwrap_err();
        assert!(matches!(err, CartogenError::InvalidColumnName { .. }));
    }

    #[test]
    fn test_missing_region_column_rejected() {
        let csv = "Name,Population (people)\nAlpha,10\n";
        let err = process_table(csv, &HashMap::new()).unwrap_err();
        assert!(matches!(err, CartogenError::InvalidTable { .. }));
    }

    #[test]
    fn test_save_round_trip() {
        let csv = "Region,Population (people)\nAlpha,10\nBeta,20\n";
        let table = process_table(csv, &HashMap::new()).unwrap();

        let file = tempfile::NamedTempFile::new().unwrap();
        table.save(file.path()).unwrap();

        let written = std::fs::read_to_string(file.path()).unwrap();
        assert!(written.starts_with("Region,ColorGroup,Population (people)"));
        assert!(written.contains("Alpha,,10"));
    }
}
