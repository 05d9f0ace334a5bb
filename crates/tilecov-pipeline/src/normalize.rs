//! Cleanup of intersection results.
//!
//! Repeated polygon intersection can leave stray points, dangling lines,
//! collapsed rings and near-zero-area slivers where footprints share
//! edges. A [`NormalizationKind`] decides how much of that debris is
//! removed after every aggregation step.

use geo::{Area, Geometry, LineString, MultiPolygon, Polygon};
use serde::{Deserialize, Serialize};

/// Selects how the running intersection is cleaned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NormalizationKind {
    /// Keep polygonal components only. Points, lines, collapsed rings and
    /// zero-area polygons are dropped; nested collections are flattened.
    #[default]
    Flatten,

    /// [`Flatten`](Self::Flatten), then also drop polygons and holes
    /// smaller than one pixel (`resolution²`).
    RemoveSmallParts,
}

impl NormalizationKind {
    /// Clean `geometry` using a pixel size of `resolution` world units.
    #[must_use = "returns the normalized geometry"]
    pub fn normalize(self, geometry: &Geometry<f64>, resolution: f64) -> MultiPolygon<f64> {
        match self {
            Self::Flatten => collect_polygons(geometry),
            Self::RemoveSmallParts => remove_small_parts(geometry, resolution * resolution),
        }
    }
}

/// Flatten `geometry` to its non-degenerate polygonal components.
#[must_use]
pub fn collect_polygons(geometry: &Geometry<f64>) -> MultiPolygon<f64> {
    let mut polygons = Vec::new();
    push_polygons(geometry, &mut polygons);
    MultiPolygon::new(polygons)
}

/// Flatten `geometry`, dropping polygons and interior rings with an area
/// below `area_threshold`.
#[must_use]
pub fn remove_small_parts(geometry: &Geometry<f64>, area_threshold: f64) -> MultiPolygon<f64> {
    let polygons = collect_polygons(geometry)
        .into_iter()
        .filter(|polygon| polygon.unsigned_area() >= area_threshold)
        .map(|polygon| {
            let (exterior, interiors) = polygon.into_inner();
            let kept = interiors
                .into_iter()
                .filter(|ring| ring_area(ring) >= area_threshold)
                .collect();
            Polygon::new(exterior, kept)
        })
        .collect();
    MultiPolygon::new(polygons)
}

fn push_polygons(geometry: &Geometry<f64>, out: &mut Vec<Polygon<f64>>) {
    match geometry {
        Geometry::Polygon(polygon) => out.extend(clean_polygon(polygon)),
        Geometry::MultiPolygon(multi) => out.extend(multi.iter().filter_map(clean_polygon)),
        Geometry::Rect(rect) => out.extend(clean_polygon(&rect.to_polygon())),
        Geometry::Triangle(triangle) => out.extend(clean_polygon(&triangle.to_polygon())),
        Geometry::GeometryCollection(collection) => {
            for child in collection.iter() {
                push_polygons(child, out);
            }
        }
        Geometry::Point(_)
        | Geometry::Line(_)
        | Geometry::LineString(_)
        | Geometry::MultiPoint(_)
        | Geometry::MultiLineString(_) => {}
    }
}

/// Drop collapsed interior rings; `None` if the shell itself is degenerate.
fn clean_polygon(polygon: &Polygon<f64>) -> Option<Polygon<f64>> {
    if is_degenerate(polygon.exterior()) {
        return None;
    }
    let interiors = polygon
        .interiors()
        .iter()
        .filter(|ring| !is_degenerate(ring))
        .cloned()
        .collect();
    Some(Polygon::new(polygon.exterior().clone(), interiors))
}

fn is_degenerate(ring: &LineString<f64>) -> bool {
    ring.0.len() < 4 || ring_area(ring) == 0.0
}

fn ring_area(ring: &LineString<f64>) -> f64 {
    Polygon::new(ring.clone(), Vec::new()).unsigned_area()
}
