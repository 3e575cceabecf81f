//! Coordinate reprojection.
//!
//! Boundary data arrives in WGS84 and is temporarily projected to an
//! equal-area CRS (EASE-Grid 2.0 Global) so region areas can be computed in
//! square meters, then projected back before the engine runs.

use geo::{Coord, MapCoords};
use proj::Proj;

use cartogen_core::{CartogenError, Result};

use crate::frame::BoundaryFrame;

/// WGS84 geographic coordinates.
pub const EPSG_WGS84: u32 = 4326;

/// Reproject every region geometry in place.
///
/// Any stored CRS descriptor in the extra attributes is removed, since it no
/// longer describes the coordinates.
pub fn reproject(frame: &mut BoundaryFrame, from_epsg: u32, to_epsg: u32) -> Result<()> {
    let transform = Proj::new_known_crs(
        &format!("EPSG:{from_epsg}"),
        &format!("EPSG:{to_epsg}"),
        None,
    )
    .map_err(|e| CartogenError::Projection {
        reason: format!("EPSG:{from_epsg} -> EPSG:{to_epsg}: {e}"),
    })?;

    for region in &mut frame.regions {
        let projected = region
            .geometry
            .try_map_coords(|Coord { x, y }| {
                let (px, py) = transform.convert((x, y))?;
                Ok::<_, proj::ProjError>(Coord { x: px, y: py })
            })
            .map_err(|e| CartogenError::Projection { reason: e.to_string() })?;
        region.geometry = projected;
    }

    frame.extra.remove_crs();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{polygon, Geometry};
    use serde_json::Map;

    use crate::frame::{ExtraAttributes, Region};

    fn degree_square() -> BoundaryFrame {
        let geometry = Geometry::Polygon(polygon![
            (x: 0.0, y: 0.0),
            (x: 1.0, y: 0.0),
            (x: 1.0, y: 1.0),
            (x: 0.0, y: 1.0),
            (x: 0.0, y: 0.0),
        ]);
        BoundaryFrame {
            regions: vec![Region { geometry, properties: Map::new() }],
            extra: ExtraAttributes::default(),
        }
    }

    #[test]
    fn test_reproject_to_equal_area_changes_units() {
        let mut frame = degree_square();
        reproject(&mut frame, EPSG_WGS84, 6933).unwrap();

        // One degree near the equator is roughly 111 km in EASE-Grid meters.
        let Geometry::Polygon(poly) = &frame.regions[0].geometry else {
            panic!("geometry type changed");
        };
        let x_span = poly.exterior().0.iter().map(|c| c.x).fold(f64::MIN, f64::max)
            - poly.exterior().0.iter().map(|c| c.x).fold(f64::MAX, f64::min);
        assert!(x_span > 90_000.0 && x_span < 130_000.0, "span {x_span}");
    }

    #[test]
    fn test_round_trip_is_close_to_identity() {
        let mut frame = degree_square();
        reproject(&mut frame, EPSG_WGS84, 6933).unwrap();
        reproject(&mut frame, 6933, EPSG_WGS84).unwrap();

        let Geometry::Polygon(poly) = &frame.regions[0].geometry else {
            panic!("geometry type changed");
        };
        let first = poly.exterior().0[0];
        assert!(first.x.abs() < 1e-6 && first.y.abs() < 1e-6);
    }
}
