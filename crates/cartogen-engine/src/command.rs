//! Engine argv construction.
//!
//! The engine binary is the only subprocess this system ever spawns, and its
//! arguments partially originate from user input, so everything is checked
//! against a fixed allow-list before a process exists.

use std::path::{Path, PathBuf};

use cartogen_core::models::GenerationRequest;
use cartogen_core::paths::{resolve_safe, sanitize_filename};
use cartogen_core::{CartogenError, Result};

/// Flags the engine binary accepts from this system.
const ALLOWED_OPTIONS: &[&str] = &[
    "--output_equal_area_map",
    "--world",
    "--output_shifted_insets",
    "--skip_projection",
    "--area",
    "--do_not_fail_on_intersections",
    "--timeout",
];

/// A fully validated engine invocation, ready to spawn.
#[derive(Debug, Clone)]
pub struct EngineCommand {
    binary: PathBuf,
    args: Vec<String>,
}

impl EngineCommand {
    /// Validate a request and build the argv
    /// `[boundary, --redirect_exports_to_stdout, flags.., area_data?]`.
    ///
    /// Every path handed to the engine must live under one of `data_roots`;
    /// an empty root list disables the confinement. Any violation fails
    /// here, strictly before a subprocess is started.
    pub fn build(
        binary: &Path,
        request: &GenerationRequest,
        data_roots: &[PathBuf],
    ) -> Result<Self> {
        validate_options(&request.flags)?;

        if !data_roots.is_empty() {
            resolve_safe(data_roots, &request.boundary_path)?;
            if let Some(area_data) = &request.area_data_path {
                resolve_safe(data_roots, area_data)?;
            }
        }

        if !request.boundary_path.is_file() {
            return Err(CartogenError::InvalidBoundaryPath {
                path: request.boundary_path.clone(),
            });
        }

        let mut args = Vec::with_capacity(request.flags.len() + 3);
        args.push(request.boundary_path.to_string_lossy().into_owned());
        args.push("--redirect_exports_to_stdout".to_string());
        args.extend(request.flags.iter().cloned());

        // The data file is optional and always last; a missing file is
        // simply omitted rather than rejected.
        if let Some(area_data) = &request.area_data_path {
            if area_data.is_file() {
                args.push(area_data.to_string_lossy().into_owned());
            }
        }

        Ok(Self { binary: binary.to_path_buf(), args })
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }
}

/// Check a flag list against the allow-list.
///
/// `--area` takes one argument that must equal its filename-sanitized form,
/// `--timeout` takes one argument that must be numeric. Everything else is
/// a bare flag.
pub fn validate_options(options: &[String]) -> Result<()> {
    let mut i = 0;
    while i < options.len() {
        let option = &options[i];
        if !ALLOWED_OPTIONS.contains(&option.as_str()) {
            return Err(CartogenError::InvalidOption { option: option.clone() });
        }

        if option == "--area" && i + 1 < options.len() {
            let value = &options[i + 1];
            if *value != sanitize_filename(value) {
                return Err(CartogenError::InvalidOption { option: value.clone() });
            }
            i += 1;
        } else if option == "--timeout" && i + 1 < options.len() {
            let value = &options[i + 1];
            if value.parse::<f64>().is_err() {
                return Err(CartogenError::InvalidOption { option: value.clone() });
            }
            i += 1;
        }

        i += 1;
    }
    Ok(())
}
