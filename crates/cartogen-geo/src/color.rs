//! Categorical region coloring.
//!
//! Builds a planar-adjacency graph from shared borders and greedily assigns
//! color groups so no two touching regions share one. Bounding boxes go into
//! an R-tree first so the exact intersection test only runs on candidate
//! pairs.

use geo::{BoundingRect, Centroid, Geometry, Intersects};
use rstar::{primitives::GeomWithData, RTree, RTreeObject, AABB};

use crate::validation;

/// How ties between feasible colors are broken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Balance {
    /// Prefer the least-used feasible color, keeping class sizes even.
    Count,
    /// Prefer the feasible color whose members are geometrically farthest
    /// away, spreading each color across the map.
    Centroid,
}

type IndexedBox = GeomWithData<rstar::primitives::Rectangle<[f64; 2]>, usize>;

/// Assign a color group to every region geometry.
///
/// Returns one entry per input, `None` for geometries that are invalid or
/// self-intersecting (those are excluded from the adjacency graph entirely).
/// At least `min_colors` distinct groups are considered even when fewer
/// would suffice, so palettes stay stable across related maps.
pub fn assign_color_groups(
    geometries: &[Geometry<f64>],
    min_colors: usize,
    balance: Balance,
) -> Vec<Option<usize>> {
    let valid: Vec<usize> = (0..geometries.len())
        .filter(|&i| validation::is_simple(&geometries[i]))
        .collect();

    let adjacency = build_adjacency(geometries, &valid);
    let centroids: Vec<Option<geo::Point<f64>>> =
        geometries.iter().map(|g| g.centroid()).collect();

    let mut colors: Vec<Option<usize>> = vec![None; geometries.len()];
    let mut class_sizes: Vec<usize> = vec![0; min_colors];

    for &index in &valid {
        let forbidden: Vec<usize> = adjacency[index]
            .iter()
            .filter_map(|&neighbor| colors[neighbor])
            .collect();

        let mut allowed: Vec<usize> = (0..class_sizes.len())
            .filter(|c| !forbidden.contains(c))
            .collect();
        if allowed.is_empty() {
            // The map needs more colors than the requested minimum.
            class_sizes.push(0);
            allowed.push(class_sizes.len() - 1);
        }

        let chosen = match balance {
            Balance::Count => allowed
                .iter()
                .copied()
                .min_by_key(|&c| class_sizes[c])
                .unwrap_or(0),
            Balance::Centroid => pick_farthest_color(&allowed, index, &colors, &centroids),
        };

        colors[index] = Some(chosen);
        class_sizes[chosen] += 1;
    }

    colors
}

fn build_adjacency(geometries: &[Geometry<f64>], valid: &[usize]) -> Vec<Vec<usize>> {
    let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); geometries.len()];

    let boxes: Vec<IndexedBox> = valid
        .iter()
        .filter_map(|&i| {
            geometries[i].bounding_rect().map(|rect| {
                GeomWithData::new(
                    AABB::from_corners(
                        [rect.min().x, rect.min().y],
                        [rect.max().x, rect.max().y],
                    )
                    .into(),
                    i,
                )
            })
        })
        .collect();
    let tree = RTree::bulk_load(boxes);

    for item in tree.iter() {
        let i = item.data;
        for candidate in tree.locate_in_envelope_intersecting(&item.geom().envelope()) {
            let j = candidate.data;
            if j <= i {
                continue;
            }
            if geometries[i].intersects(&geometries[j]) {
                adjacency[i].push(j);
                adjacency[j].push(i);
            }
        }
    }

    adjacency
}

/// The feasible color whose nearest same-colored region is farthest from
/// this one. Unused colors count as infinitely far and win outright.
fn pick_farthest_color(
    allowed: &[usize],
    index: usize,
    colors: &[Option<usize>],
    centroids: &[Option<geo::Point<f64>>],
) -> usize {
    let Some(own) = centroids[index] else {
        return allowed[0];
    };

    let mut best = allowed[0];
    let mut best_distance = f64::MIN;
    for &color in allowed {
        let nearest = colors
            .iter()
            .enumerate()
            .filter(|(_, c)| **c == Some(color))
            .filter_map(|(other, _)| centroids[other])
            .map(|p| {
                let dx = p.x() - own.x();
                let dy = p.y() - own.y();
                (dx * dx + dy * dy).sqrt()
            })
            .fold(f64::INFINITY, f64::min);
        if nearest > best_distance {
            best_distance = nearest;
            best = color;
        }
    }
    best
}
