//! Final reduction of an aggregated coverage.
//!
//! The aggregated footprint is exact to the pixel, which makes it heavy:
//! every nodata notch is a staircase of pixel corners. Reduction trades
//! that precision for size in three steps, each scaled by the coarsest
//! resolution the aggregator saw.
//!
//! 1. Drop collinear vertices left over from rectangle unions.
//! 2. Pull the footprint away from nodata by a negative buffer. Only the
//!    nodata side moves: the buffer is applied to the tile's complement,
//!    so edges lying on the tile envelope stay put.
//! 3. Douglas-Peucker simplification.

use geo::algorithm::buffer::{BufferStyle, LineCap, LineJoin};
use geo::{BooleanOps, Buffer, CoordsIter, MultiPolygon, Rect};

use crate::aggregate::CoverageState;
use crate::simplify::simplify_multi_polygon;
use crate::types::{Coverage, ReductionConfig};

/// Mitre joins are bevelled once the mitre is longer than this many
/// buffer distances.
const MITRE_RATIO_LIMIT: f64 = 10.0;

/// Sharpest corner angle, in radians, that still gets a mitre.
///
/// `LineJoin::Miter` takes an angle rather than a length ratio. A corner
/// of angle `a` has a mitre of `distance / sin(a / 2)`, so the ratio limit
/// maps to `2 * asin(1 / ratio)`, about 0.2 rad. Right-angle pixel
/// corners are well above it and stay square.
fn mitre_min_angle() -> f64 {
    2.0 * MITRE_RATIO_LIMIT.recip().asin()
}

/// Applies a [`ReductionConfig`] to aggregated coverage.
#[derive(Debug, Clone, Default)]
pub struct CoverageReducer {
    config: ReductionConfig,
}

impl CoverageReducer {
    /// Reducer using `config`.
    #[must_use]
    pub const fn new(config: ReductionConfig) -> Self {
        Self { config }
    }

    /// Reduction parameters in use.
    #[must_use]
    pub const fn config(&self) -> &ReductionConfig {
        &self.config
    }

    /// Reduce `geometry` and tag it with the CRS recorded in `state`.
    ///
    /// An empty geometry yields [`Coverage::empty`], without a CRS. When
    /// `state` has no resolution or envelope (nothing was aggregated into
    /// it) the buffer and simplification steps are skipped.
    pub fn reduce(&self, geometry: &MultiPolygon<f64>, state: &CoverageState) -> Coverage {
        if geometry.0.is_empty() {
            tracing::debug!("empty aggregate, nothing to reduce");
            return Coverage::empty();
        }

        let resolution = state.lowest_resolution().unwrap_or(0.0);
        let mut reduced = simplify_multi_polygon(geometry, 0.0);

        let buffer_distance = resolution * self.config.negative_buffer_pixels;
        if let Some(tile) = state.tile_envelope()
            && buffer_distance > 0.0
        {
            reduced = shrink_from_nodata(&reduced, tile, buffer_distance);
            tracing::debug!(
                distance = buffer_distance,
                vertices = reduced.coords_count(),
                "applied negative buffer"
            );
        }

        let tolerance = resolution * self.config.distance_tolerance_pixels;
        if tolerance > 0.0 {
            reduced = simplify_multi_polygon(&reduced, tolerance);
            tracing::debug!(
                tolerance,
                vertices = reduced.coords_count(),
                "simplified coverage"
            );
        }

        tracing::info!(
            parts = reduced.0.len(),
            vertices = reduced.coords_count(),
            crs = ?state.crs_code(),
            "reduced coverage"
        );
        Coverage {
            geometry: reduced,
            crs_code: state.crs_code(),
        }
    }
}

/// Move every edge that borders nodata inward by `distance`.
///
/// The nodata region is the part of `tile` not covered by `coverage`. It
/// is grown with square caps and mitred joins, so pixel corners stay
/// sharp, then subtracted.
fn shrink_from_nodata(
    coverage: &MultiPolygon<f64>,
    tile: Rect<f64>,
    distance: f64,
) -> MultiPolygon<f64> {
    let tile = MultiPolygon::new(vec![tile.to_polygon()]);
    let nodata = tile.difference(coverage);
    if nodata.0.is_empty() {
        return coverage.clone();
    }

    let style = BufferStyle::new(distance)
        .line_cap(LineCap::Square)
        .line_join(LineJoin::Miter(mitre_min_angle()));
    let grown = simplify_multi_polygon(&nodata.buffer_with_style(style), 0.0);
    coverage.difference(&grown)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use geo::{Area, BoundingRect, Coord, LineString, coord};

    use super::*;
    use crate::aggregate::CoverageAggregator;
    use crate::simplify::simplify_ring;
    use crate::raster::{PixelMask, RasterPlane};
    use crate::types::AffineTransform;

    /// Aggregate a single `size`x`size` plane at 10 world units per pixel
    /// whose top-left corner is at `(0, 100)`.
    fn aggregate(
        size: u32,
        valid: impl Fn(u32, u32) -> bool,
    ) -> (MultiPolygon<f64>, CoverageState) {
        let plane = RasterPlane::from_fn(size, size, |x, y| if valid(x, y) { 1.0 } else { 0.0 });
        let mask = PixelMask::new(&plane, Some(0.0));
        let extent = 10.0 * f64::from(size);
        let transform = AffineTransform::new(10.0, -10.0, 0.0, 100.0);
        let envelope = Rect::new(
            coord! { x: 0.0, y: 100.0 - extent },
            coord! { x: extent, y: 100.0 },
        );

        let mut aggregator = CoverageAggregator::default();
        aggregator.add_image(&mask, &transform, 10.0, envelope, Some(32633));
        (aggregator.aggregate(), aggregator.finish())
    }

    fn reducer(buffer: f64, tolerance: f64) -> CoverageReducer {
        CoverageReducer::new(ReductionConfig {
            reference_image_index: 0,
            negative_buffer_pixels: buffer,
            distance_tolerance_pixels: tolerance,
        })
    }

    fn bbox(coverage: &Coverage) -> (Coord<f64>, Coord<f64>) {
        let rect = coverage.geometry.bounding_rect().unwrap();
        (rect.min(), rect.max())
    }

    fn segment_distance(p: Coord<f64>, a: Coord<f64>, b: Coord<f64>) -> f64 {
        let (dx, dy) = (b.x - a.x, b.y - a.y);
        let length_sq = dx * dx + dy * dy;
        let t = if length_sq == 0.0 {
            0.0
        } else {
            (((p.x - a.x) * dx + (p.y - a.y) * dy) / length_sq).clamp(0.0, 1.0)
        };
        (p.x - (a.x + t * dx)).hypot(p.y - (a.y + t * dy))
    }

    fn boundary_distance(p: Coord<f64>, geometry: &MultiPolygon<f64>) -> f64 {
        geometry
            .iter()
            .flat_map(|polygon| std::iter::once(polygon.exterior()).chain(polygon.interiors()))
            .flat_map(LineString::lines)
            .map(|line| segment_distance(p, line.start, line.end))
            .fold(f64::INFINITY, f64::min)
    }

    #[test]
    fn mitre_angle_matches_ratio_limit() {
        let angle = mitre_min_angle();
        assert!((1.0 / (angle / 2.0).sin() - MITRE_RATIO_LIMIT).abs() < 1e-9);
        assert!(angle < std::f64::consts::FRAC_PI_2);
    }

    #[test]
    fn empty_aggregate_has_no_crs() {
        let (geometry, state) = aggregate(4, |_, _| false);
        assert!(geometry.0.is_empty());
        assert_eq!(state.crs_code(), Some(32633));
        let coverage = CoverageReducer::default().reduce(&geometry, &state);
        assert_eq!(coverage, Coverage::empty());
    }

    #[test]
    fn top_half_scene_is_unchanged_without_tolerances() {
        // 4x4 plane, 10 units per pixel, top edge at y = 100: envelope [0,40]x[60,100].
        let (geometry, state) = aggregate(4, |_, y| y < 2);
        assert_eq!(
            state.tile_envelope(),
            Some(Rect::new(coord! { x: 0.0, y: 60.0 }, coord! { x: 40.0, y: 100.0 }))
        );
        let coverage = reducer(0.0, 0.0).reduce(&geometry, &state);

        assert_eq!(coverage.crs_code, Some(32633));
        assert_eq!(coverage.geometry.0.len(), 1);
        assert_eq!(coverage.vertex_count(), 5);
        assert!((coverage.area() - 800.0).abs() < 1e-9);
        assert_eq!(
            bbox(&coverage),
            (coord! { x: 0.0, y: 80.0 }, coord! { x: 40.0, y: 100.0 })
        );
    }

    #[test]
    fn zero_tolerance_strips_staircase_collinear_vertices() {
        // Rows of different widths can leave row-seam vertices on the left edge.
        let (geometry, state) = aggregate(6, |x, y| x < 6 - y / 2);
        let coverage = reducer(0.0, 0.0).reduce(&geometry, &state);
        assert!((coverage.area() - geometry.unsigned_area()).abs() < 1e-6);
        assert!(coverage.vertex_count() <= geometry.coords_count());
        // Eight corners plus the closing coordinate.
        assert_eq!(coverage.vertex_count(), 9);
    }

    #[test]
    fn negative_buffer_widens_interior_hole() {
        let (geometry, state) = aggregate(10, |x, y| !((4..6).contains(&x) && (4..6).contains(&y)));
        let coverage = reducer(1.0, 0.0).reduce(&geometry, &state);

        // Hole [40,60]² grows by one pixel to [30,70]², corners mitred.
        assert!((coverage.area() - (10_000.0 - 1_600.0)).abs() < 1e-3);
        assert_eq!(coverage.geometry.0.len(), 1);
        let hole = &coverage.geometry.0[0].interiors()[..];
        assert_eq!(hole.len(), 1);
        let hole_bbox = hole[0].bounding_rect().unwrap();
        assert!((hole_bbox.min().x - 30.0).abs() < 1e-6 && (hole_bbox.max().y - 70.0).abs() < 1e-6);
        // Four corners plus the closing coordinate, no bevels.
        assert_eq!(simplify_ring(&hole[0], 1e-6).unwrap().0.len(), 5);
        let (min, max) = bbox(&coverage);
        assert!(min.x.abs() < 1e-9 && min.y.abs() < 1e-9);
        assert!((max.x - 100.0).abs() < 1e-9 && (max.y - 100.0).abs() < 1e-9);
    }

    #[test]
    fn negative_buffer_keeps_tile_edges() {
        // Only the leftmost column is nodata.
        let (geometry, state) = aggregate(10, |x, _| x >= 1);
        let coverage = reducer(1.0, 0.0).reduce(&geometry, &state);

        assert!((coverage.area() - 8_000.0).abs() < 1e-3);
        let (min, max) = bbox(&coverage);
        assert!((min.x - 20.0).abs() < 1e-6);
        assert!((max.x - 100.0).abs() < 1e-9);
        assert!(min.y.abs() < 1e-9);
        assert!((max.y - 100.0).abs() < 1e-9);
    }

    #[test]
    fn negative_buffer_is_noop_on_full_tile() {
        let (geometry, state) = aggregate(5, |_, _| true);
        let coverage = reducer(3.0, 0.0).reduce(&geometry, &state);
        assert!((coverage.area() - 2_500.0).abs() < 1e-9);
        assert_eq!(coverage.vertex_count(), 5);
    }

    #[test]
    fn simplified_vertices_stay_near_boundary() {
        // Diagonal staircase; one pixel of tolerance flattens the steps.
        let (geometry, state) = aggregate(12, |x, y| x + y < 12);
        let exact = simplify_multi_polygon(&geometry, 0.0);
        let coverage = reducer(0.0, 1.0).reduce(&geometry, &state);

        assert!(!coverage.is_empty());
        assert!(coverage.vertex_count() < exact.coords_count());
        let tolerance = state.lowest_resolution().unwrap();
        for p in coverage.geometry.coords_iter() {
            let d = boundary_distance(p, &exact);
            assert!(d <= tolerance + 1e-6, "vertex {p:?} is {d} from the boundary");
        }
    }

    #[test]
    fn stateless_reduce_skips_resolution_steps() {
        let (geometry, _) = aggregate(4, |x, _| x < 2);
        let coverage = CoverageReducer::default().reduce(&geometry, &CoverageState::default());
        assert_eq!(coverage.crs_code, None);
        assert!((coverage.area() - 800.0).abs() < 1e-9);
    }
}
