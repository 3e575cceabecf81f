//! Bounding-box, centroid, and area reductions over geometry sets

use geo::{Area, BoundingRect, Coord, Geometry};

/// Derived summary of a geometry set.
#[derive(Debug, Clone, PartialEq)]
pub struct GeomsInfo {
    /// Bounding box as `[min_x, min_y, max_x, max_y]`
    pub bbox: [f64; 4],
    /// Midpoint of the bounding box. Not the area centroid: the frontend
    /// recenters visualizations on the viewport middle, so the box middle is
    /// the anchor that downstream scaling works against.
    pub centroid: Coord<f64>,
    /// Summed unsigned area
    pub area: f64,
}

/// Reduce a geometry set to its bounding box, centroid, and total area.
///
/// Returns `None` for an empty set or when no geometry has an extent.
pub fn geoms_info(geometries: &[Geometry<f64>]) -> Option<GeomsInfo> {
    let mut bbox: Option<[f64; 4]> = None;
    let mut area = 0.0;

    for geometry in geometries {
        area += geometry.unsigned_area();
        let Some(rect) = geometry.bounding_rect() else {
            continue;
        };
        bbox = Some(match bbox {
            None => [rect.min().x, rect.min().y, rect.max().x, rect.max().y],
            Some(b) => [
                b[0].min(rect.min().x),
                b[1].min(rect.min().y),
                b[2].max(rect.max().x),
                b[3].max(rect.max().y),
            ],
        });
    }

    let bbox = bbox?;
    let centroid = Coord { x: (bbox[0] + bbox[2]) / 2.0, y: (bbox[1] + bbox[3]) / 2.0 };
    Some(GeomsInfo { bbox, centroid, area })
}

/// Component-wise min/max merge of two bounding boxes.
pub fn union_bounding_boxes(bbox1: [f64; 4], bbox2: [f64; 4]) -> [f64; 4] {
    [
        bbox1[0].min(bbox2[0]),
        bbox1[1].min(bbox2[1]),
        bbox1[2].max(bbox2[2]),
        bbox1[3].max(bbox2[3]),
    ]
}

/// Whether `inner` lies entirely within `outer`.
pub fn bbox_contains(outer: [f64; 4], inner: [f64; 4]) -> bool {
    outer[0] <= inner[0] && outer[1] <= inner[1] && outer[2] >= inner[2] && outer[3] >= inner[3]
}
