//! Geometry validity and simplicity checks.
//!
//! The external engine cannot cope with self-intersecting rings, so boundary
//! datasets carrying them are rejected at load time, and regions that fail
//! validation are skipped by the color assigner.

use geo::{Coord, Geometry, Intersects, Line, LineString, MultiPolygon, Polygon};

/// Validation result with details
#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<ValidationError>,
}

/// Validation error with location details
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub location: String,
    pub reason: String,
}

impl ValidationResult {
    /// Create a valid result
    pub fn valid() -> Self {
        Self { is_valid: true, errors: Vec::new() }
    }

    /// Add an error to the result
    pub fn add_error(&mut self, location: String, reason: String) {
        self.is_valid = false;
        self.errors.push(ValidationError { location, reason });
    }
}

/// Validate a region geometry: only polygonal types are accepted, rings must
/// carry at least 4 coordinates, coordinates must be finite, and rings simple.
pub fn validate_region_geometry(geometry: &Geometry<f64>) -> ValidationResult {
    match geometry {
        Geometry::Polygon(poly) => validate_polygon(poly, "Polygon"),
        Geometry::MultiPolygon(mp) => validate_multipolygon(mp),
        _ => {
            let mut result = ValidationResult::valid();
            result.add_error(
                "geometry".to_string(),
                "Region geometry must be a Polygon or MultiPolygon".to_string(),
            );
            result
        }
    }
}

/// Whether every ring of a polygonal geometry is free of self-intersections.
pub fn is_simple(geometry: &Geometry<f64>) -> bool {
    match geometry {
        Geometry::Polygon(poly) => polygon_is_simple(poly),
        Geometry::MultiPolygon(mp) => mp.0.iter().all(polygon_is_simple),
        _ => true,
    }
}

fn polygon_is_simple(polygon: &Polygon<f64>) -> bool {
    ring_is_simple(polygon.exterior())
        && polygon.interiors().iter().all(ring_is_simple)
}

/// A closed ring is simple when no two non-adjacent segments intersect and
/// adjacent segments meet only at their shared endpoint.
fn ring_is_simple(ring: &LineString<f64>) -> bool {
    let coords = &ring.0;
    if coords.len() < 4 {
        return false;
    }
    let segments: Vec<Line<f64>> = ring.lines().collect();
    let n = segments.len();

    for i in 0..n {
        for j in (i + 1)..n {
            let adjacent = j == i + 1 || (i == 0 && j == n - 1);
            if adjacent {
                // Adjacent segments legitimately share one endpoint; any
                // further overlap means a spike or a fold-back.
                if segments_overlap(&segments[i], &segments[j]) {
                    return false;
                }
                continue;
            }
            if segments[i].intersects(&segments[j]) {
                return false;
            }
        }
    }
    true
}

/// Whether two segments that share an endpoint also share any other point
/// (collinear overlap).
fn segments_overlap(a: &Line<f64>, b: &Line<f64>) -> bool {
    let cross = |o: Coord<f64>, p: Coord<f64>, q: Coord<f64>| {
        (p.x - o.x) * (q.y - o.y) - (p.y - o.y) * (q.x - o.x)
    };
    // Collinear and pointing back along each other
    if cross(a.start, a.end, b.end).abs() > 1e-12 {
        return false;
    }
    let on_segment = |p: Coord<f64>, l: &Line<f64>| {
        p.x >= l.start.x.min(l.end.x)
            && p.x <= l.start.x.max(l.end.x)
            && p.y >= l.start.y.min(l.end.y)
            && p.y <= l.start.y.max(l.end.y)
    };
    // The far endpoint of one lying on the other means they double back
    let far_b = if b.start == a.end || b.start == a.start { b.end } else { b.start };
    let far_a = if a.start == b.end || a.start == b.start { a.end } else { a.start };
    (far_b != a.start && far_b != a.end && on_segment(far_b, a))
        || (far_a != b.start && far_a != b.end && on_segment(far_a, b))
}

fn validate_polygon(polygon: &Polygon<f64>, location: &str) -> ValidationResult {
    let mut result = ValidationResult::valid();

    validate_ring(polygon.exterior(), &format!("{} exterior", location), &mut result);
    for (i, interior) in polygon.interiors().iter().enumerate() {
        validate_ring(interior, &format!("{} interior[{}]", location, i), &mut result);
    }

    result
}

fn validate_ring(ring: &LineString<f64>, location: &str, result: &mut ValidationResult) {
    // Polygon construction closes rings, so closure itself needs no check,
    // but a degenerate input still ends up with fewer than 4 coordinates.
    if ring.0.len() < 4 {
        result.add_error(
            location.to_string(),
            format!("Ring must have at least 4 points, found {}", ring.0.len()),
        );
        return;
    }

    for (i, coord) in ring.0.iter().enumerate() {
        if !coord.x.is_finite() || !coord.y.is_finite() {
            result.add_error(format!("{}[{}]", location, i), "Coordinates must be finite".to_string());
        }
    }

    if !ring_is_simple(ring) {
        result.add_error(location.to_string(), "Ring is self-intersecting".to_string());
    }
}

fn validate_multipolygon(multipolygon: &MultiPolygon<f64>) -> ValidationResult {
    let mut result = ValidationResult::valid();

    for (i, polygon) in multipolygon.0.iter().enumerate() {
        let poly_result = validate_polygon(polygon, &format!("MultiPolygon[{}]", i));
        for error in poly_result.errors {
            result.add_error(error.location, error.reason);
        }
    }

    result
}
