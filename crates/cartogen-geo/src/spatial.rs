//! Extent heuristics on geographic coordinates.

use geo::BoundingRect;

use crate::frame::BoundaryFrame;

/// Whether a frame in geographic coordinates appears to span the globe.
///
/// Western-hemisphere longitudes are shifted by +360 degrees and the span of
/// the shifted values is compared against a half-turn. This is a heuristic:
/// a regional map covering a very wide longitude range can be misclassified.
pub fn spans_world_extent(frame: &BoundaryFrame) -> bool {
    let mut min_lon = f64::MAX;
    let mut max_lon = f64::MIN;

    for region in &frame.regions {
        let Some(rect) = region.geometry.bounding_rect() else {
            continue;
        };
        for lon in [rect.min().x, rect.max().x] {
            let shifted = if lon < 0.0 { lon + 360.0 } else { lon };
            min_lon = min_lon.min(shifted);
            max_lon = max_lon.max(shifted);
        }
    }

    min_lon <= max_lon && max_lon - min_lon >= 180.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{polygon, Geometry};
    use serde_json::Map;

    use crate::frame::{ExtraAttributes, Region};

    fn frame_with_lon_spans(spans: &[(f64, f64)]) -> BoundaryFrame {
        let regions = spans
            .iter()
            .map(|&(west, east)| Region {
                geometry: Geometry::Polygon(polygon![
                    (x: west, y: 0.0),
                    (x: east, y: 0.0),
                    (x: east, y: 10.0),
                    (x: west, y: 10.0),
                    (x: west, y: 0.0),
                ]),
                properties: Map::new(),
            })
            .collect();
        BoundaryFrame { regions, extra: ExtraAttributes::default() }
    }

    #[test]
    fn test_regional_map_is_not_world() {
        assert!(!spans_world_extent(&frame_with_lon_spans(&[(5.0, 15.0), (20.0, 30.0)])));
    }

    #[test]
    fn test_global_map_is_world() {
        assert!(spans_world_extent(&frame_with_lon_spans(&[(-170.0, -150.0), (10.0, 20.0)])));
    }

    #[test]
    fn test_dateline_straddle_alone_is_not_world() {
        // -170 shifts to 190, 170 stays, span is 20 degrees
        assert!(!spans_world_extent(&frame_with_lon_spans(&[(170.0, 179.0), (-179.0, -170.0)])));
    }

    #[test]
    fn test_empty_frame_is_not_world() {
        assert!(!spans_world_extent(&frame_with_lon_spans(&[])));
    }
}
