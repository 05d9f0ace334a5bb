//! Ring simplification using the Ramer-Douglas-Peucker algorithm.
//!
//! Operates on the closed rings of polygonal coverage. A tolerance of 0.0
//! is not a no-op: exactly collinear vertices (left behind where pixel
//! rectangles were unioned) are removed while the shape stays identical.
//!
//! Rings that collapse below four coordinates are dropped, and a polygon
//! whose shell collapses is dropped with its holes.

use geo::{Coord, LineString, MultiPolygon, Polygon};

use crate::union::cascaded_union;

/// Simplify every ring of a multipolygon.
///
/// With a positive tolerance, simplified parts may overlap each other.
/// Each part is then unioned with the others so overlaps merge into one
/// polygon. Boolean operations fill each operand even-odd, so a single
/// part whose own rings cross is resolved that way. A zero tolerance only
/// removes collinear vertices, which cannot change topology, so no repair
/// is needed.
#[must_use = "returns the simplified geometry"]
pub fn simplify_multi_polygon(geometry: &MultiPolygon<f64>, tolerance: f64) -> MultiPolygon<f64> {
    let parts: Vec<Polygon<f64>> = geometry
        .iter()
        .filter_map(|polygon| simplify_polygon(polygon, tolerance))
        .collect();
    if tolerance > 0.0 && parts.len() > 1 {
        let parts: Vec<MultiPolygon<f64>> = parts
            .into_iter()
            .map(|part| MultiPolygon::new(vec![part]))
            .collect();
        cascaded_union(&parts)
    } else {
        MultiPolygon::new(parts)
    }
}

/// Simplify the shell and holes of a polygon.
///
/// Returns `None` if the shell collapses.
#[must_use = "returns the simplified polygon"]
pub fn simplify_polygon(polygon: &Polygon<f64>, tolerance: f64) -> Option<Polygon<f64>> {
    let exterior = simplify_ring(polygon.exterior(), tolerance)?;
    let interiors = polygon
        .interiors()
        .iter()
        .filter_map(|ring| simplify_ring(ring, tolerance))
        .collect();
    Some(Polygon::new(exterior, interiors))
}

/// Simplify a closed ring.
///
/// The ring's start vertex is an RDP anchor, so after the main pass it
/// gets its own check: if it lies within `tolerance` of the line joining
/// its neighbours it is removed and the ring re-closed.
///
/// Returns `None` if fewer than four coordinates remain.
#[must_use = "returns the simplified ring"]
pub fn simplify_ring(ring: &LineString<f64>, tolerance: f64) -> Option<LineString<f64>> {
    let points = &ring.0;
    if points.len() < 4 {
        return None;
    }

    let mut kept = vec![false; points.len()];
    kept[0] = true;
    kept[points.len() - 1] = true;
    rdp_recurse(points, 0, points.len() - 1, tolerance, &mut kept);

    let mut simplified: Vec<Coord<f64>> = points
        .iter()
        .zip(&kept)
        .filter(|&(_, k)| *k)
        .map(|(&p, _)| p)
        .collect();

    // Distinct vertices are simplified[..n - 1]; the last repeats the first.
    let n = simplified.len();
    if n >= 5 {
        let start = simplified[0];
        let prev = simplified[n - 2];
        let next = simplified[1];
        if perpendicular_distance(start, prev, next) <= tolerance {
            simplified.remove(0);
            simplified.pop();
            simplified.push(simplified[0]);
        }
    }

    (simplified.len() >= 4).then(|| LineString::new(simplified))
}

/// Recursive step of the Ramer-Douglas-Peucker algorithm.
///
/// Finds the point between `start` and `end` that is farthest from the
/// segment between them. If that distance exceeds `tolerance`, the point
/// is kept and both halves are processed recursively.
fn rdp_recurse(points: &[Coord<f64>], start: usize, end: usize, tolerance: f64, kept: &mut [bool]) {
    if end <= start + 1 {
        return;
    }

    let mut max_dist = 0.0;
    let mut max_idx = start;

    for i in (start + 1)..end {
        let d = perpendicular_distance(points[i], points[start], points[end]);
        if d > max_dist {
            max_dist = d;
            max_idx = i;
        }
    }

    if max_dist > tolerance {
        kept[max_idx] = true;
        rdp_recurse(points, start, max_idx, tolerance, kept);
        rdp_recurse(points, max_idx, end, tolerance, kept);
    }
}

/// Perpendicular distance from `p` to the line through `a` and `b`.
///
/// When `a` and `b` coincide (a closed ring's endpoints), returns the
/// distance from `p` to `a`.
fn perpendicular_distance(p: Coord<f64>, a: Coord<f64>, b: Coord<f64>) -> f64 {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let length_sq = dx.mul_add(dx, dy * dy);

    if length_sq == 0.0 {
        return (p.x - a.x).hypot(p.y - a.y);
    }

    let cross = dx.mul_add(a.y - p.y, -(dy * (a.x - p.x)));
    cross.abs() / length_sq.sqrt()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use geo::{Area, coord, line_string, polygon};

    use super::*;

    #[test]
    fn short_ring_collapses() {
        let ring = line_string![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 0.0, y: 0.0)];
        assert!(simplify_ring(&ring, 0.0).is_none());
    }

    #[test]
    fn zero_tolerance_removes_collinear_vertices() {
        // Square with extra vertices along two edges.
        let ring = line_string![
            (x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 2.0, y: 0.0), (x: 2.0, y: 1.0),
            (x: 2.0, y: 2.0), (x: 0.0, y: 2.0), (x: 0.0, y: 0.0)
        ];
        let simplified = simplify_ring(&ring, 0.0).unwrap();
        assert_eq!(simplified.0.len(), 5);
        assert!(!simplified.0.contains(&coord! { x: 1.0, y: 0.0 }));
        assert!(!simplified.0.contains(&coord! { x: 2.0, y: 1.0 }));
    }

    #[test]
    fn zero_tolerance_keeps_real_corners() {
        let ring = line_string![
            (x: 0.0, y: 0.0), (x: 2.0, y: 0.0), (x: 2.0, y: 1.0), (x: 1.0, y: 1.0),
            (x: 1.0, y: 2.0), (x: 0.0, y: 2.0), (x: 0.0, y: 0.0)
        ];
        let simplified = simplify_ring(&ring, 0.0).unwrap();
        assert_eq!(simplified, ring);
    }

    #[test]
    fn collinear_start_vertex_is_removed() {
        let ring = line_string![
            (x: 1.0, y: 0.0), (x: 2.0, y: 0.0), (x: 2.0, y: 2.0),
            (x: 0.0, y: 2.0), (x: 0.0, y: 0.0), (x: 1.0, y: 0.0)
        ];
        let simplified = simplify_ring(&ring, 0.0).unwrap();
        assert_eq!(simplified.0.len(), 5);
        assert_eq!(simplified.0.first(), simplified.0.last());
        assert!(!simplified.0.contains(&coord! { x: 1.0, y: 0.0 }));
        let area = Polygon::new(simplified, vec![]).unsigned_area();
        assert!((area - 4.0).abs() < f64::EPSILON);
    }

    #[test]
    fn tolerance_flattens_small_notch() {
        // A 0.1-deep notch in the bottom edge of a 10x10 square.
        let ring = line_string![
            (x: 0.0, y: 0.0), (x: 4.0, y: 0.0), (x: 4.0, y: 0.1), (x: 6.0, y: 0.1),
            (x: 6.0, y: 0.0), (x: 10.0, y: 0.0), (x: 10.0, y: 10.0), (x: 0.0, y: 10.0),
            (x: 0.0, y: 0.0)
        ];
        assert_eq!(simplify_ring(&ring, 0.5).unwrap().0.len(), 5);
        assert_eq!(simplify_ring(&ring, 0.05).unwrap().0.len(), 9);
    }

    #[test]
    fn collapsed_shell_drops_polygon() {
        let thin = polygon![
            (x: 0.0, y: 0.0), (x: 10.0, y: 0.0), (x: 10.0, y: 0.1), (x: 0.0, y: 0.1)
        ];
        assert!(simplify_polygon(&thin, 1.0).is_none());
    }

    #[test]
    fn small_hole_collapses_but_shell_survives() {
        let poly = Polygon::new(
            line_string![
                (x: 0.0, y: 0.0), (x: 10.0, y: 0.0), (x: 10.0, y: 10.0), (x: 0.0, y: 10.0),
                (x: 0.0, y: 0.0)
            ],
            vec![line_string![
                (x: 5.0, y: 5.0), (x: 5.2, y: 5.0), (x: 5.2, y: 5.2), (x: 5.0, y: 5.2),
                (x: 5.0, y: 5.0)
            ]],
        );
        let simplified = simplify_polygon(&poly, 1.0).unwrap();
        assert!(simplified.interiors().is_empty());
        assert!((simplified.unsigned_area() - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn multi_polygon_zero_tolerance_preserves_area() {
        let staircase = polygon![
            (x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 3.0, y: 0.0), (x: 3.0, y: 1.0),
            (x: 2.0, y: 1.0), (x: 2.0, y: 2.0), (x: 1.0, y: 2.0), (x: 0.0, y: 2.0)
        ];
        let multi = MultiPolygon::new(vec![staircase]);
        let simplified = simplify_multi_polygon(&multi, 0.0);
        assert!((simplified.unsigned_area() - multi.unsigned_area()).abs() < f64::EPSILON);
        assert_eq!(simplified.0[0].exterior().0.len(), 7);
    }

    #[test]
    fn overlapping_parts_are_merged() {
        let left = polygon![(x: 0.0, y: 0.0), (x: 2.0, y: 0.0), (x: 2.0, y: 2.0), (x: 0.0, y: 2.0)];
        let right =
            polygon![(x: 1.0, y: 0.0), (x: 3.0, y: 0.0), (x: 3.0, y: 2.0), (x: 1.0, y: 2.0)];
        let simplified = simplify_multi_polygon(&MultiPolygon::new(vec![left, right]), 0.001);
        assert_eq!(simplified.0.len(), 1);
        assert!(simplified.0[0].interiors().is_empty());
        assert!((simplified.unsigned_area() - 6.0).abs() < 1e-9);
    }

    #[test]
    fn disjoint_parts_survive_repair() {
        let a = polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0), (x: 0.0, y: 1.0)];
        let b = polygon![(x: 5.0, y: 5.0), (x: 6.0, y: 5.0), (x: 6.0, y: 6.0), (x: 5.0, y: 6.0)];
        let simplified = simplify_multi_polygon(&MultiPolygon::new(vec![a, b]), 0.1);
        assert_eq!(simplified.0.len(), 2);
        assert!((simplified.unsigned_area() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn perpendicular_distance_on_axis() {
        let d = perpendicular_distance(
            coord! { x: 1.0, y: 3.0 },
            coord! { x: 0.0, y: 0.0 },
            coord! { x: 2.0, y: 0.0 },
        );
        assert!((d - 3.0).abs() < 1e-10);
    }

    #[test]
    fn perpendicular_distance_coincident_endpoints() {
        let d = perpendicular_distance(
            coord! { x: 3.0, y: 4.0 },
            coord! { x: 0.0, y: 0.0 },
            coord! { x: 0.0, y: 0.0 },
        );
        assert!((d - 5.0).abs() < 1e-10);
    }
}
