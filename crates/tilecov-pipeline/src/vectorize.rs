//! Pixel-boundary vectorization: turn a valid-pixel mask into polygons.
//!
//! # Algorithm
//!
//! 1. Scan each row left to right, collecting runs of consecutive valid
//!    pixels. Every run becomes one axis-aligned rectangle in world
//!    coordinates.
//! 2. Union each row's rectangles into a row geometry.
//! 3. Union the row geometries into the final footprint.
//!
//! Both unions go through [`cascaded_union`]. Rectangle edges are computed
//! from integer pixel indices, so vertically adjacent runs share edges
//! exactly and merge without slivers.

use std::sync::Arc;

use geo::MultiPolygon;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::raster::PixelMask;
use crate::types::{AffineTransform, CoverageError};
use crate::union::cascaded_union;

/// A half-open run `[start, end)` of valid pixels within one row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRun {
    /// First valid column.
    pub start: u32,
    /// One past the last valid column.
    pub end: u32,
}

/// Find the runs of valid pixels in a row.
///
/// A run closes at the first invalid pixel after it, or at the row end.
#[must_use]
pub fn scan_runs(validity: impl IntoIterator<Item = bool>) -> Vec<PixelRun> {
    let mut runs = Vec::new();
    let mut run_start: Option<u32> = None;
    let mut width = 0;

    for (x, valid) in (0..).zip(validity) {
        match (valid, run_start) {
            (true, None) => run_start = Some(x),
            (false, Some(start)) => {
                runs.push(PixelRun { start, end: x });
                run_start = None;
            }
            _ => {}
        }
        width = x + 1;
    }

    if let Some(start) = run_start {
        runs.push(PixelRun { start, end: width });
    }
    runs
}

/// Converts pixel masks into world-space polygonal footprints.
///
/// Unions run on a private bounded pool when built with
/// [`with_threads`](Self::with_threads), otherwise on the global rayon
/// pool. Cloning shares the pool.
#[derive(Debug, Clone, Default)]
pub struct PixelBoundaryVectorizer {
    pool: Option<Arc<ThreadPool>>,
}

impl PixelBoundaryVectorizer {
    /// Vectorizer running on the global rayon pool.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Vectorizer with its own pool of `threads` workers.
    ///
    /// # Errors
    ///
    /// Returns [`CoverageError::ThreadPool`] if the pool cannot be created.
    pub fn with_threads(threads: usize) -> Result<Self, CoverageError> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("tilecov-union-{i}"))
            .build()?;
        Ok(Self {
            pool: Some(Arc::new(pool)),
        })
    }

    /// Number of worker threads unions may use.
    #[must_use]
    pub fn worker_threads(&self) -> usize {
        self.pool
            .as_ref()
            .map_or_else(rayon::current_num_threads, |pool| pool.current_num_threads())
    }

    /// Polygonal footprint of every valid pixel in `mask`.
    ///
    /// An all-invalid mask yields an empty geometry.
    #[must_use = "returns the traced footprint"]
    pub fn vectorize(
        &self,
        mask: &PixelMask<'_>,
        transform: &AffineTransform,
    ) -> MultiPolygon<f64> {
        match &self.pool {
            Some(pool) => pool.install(|| vectorize_mask(mask, transform)),
            None => vectorize_mask(mask, transform),
        }
    }
}

fn vectorize_mask(mask: &PixelMask<'_>, transform: &AffineTransform) -> MultiPolygon<f64> {
    let dimensions = mask.dimensions();
    let mut rows = Vec::new();
    let mut run_count = 0_usize;

    for y in 0..dimensions.height {
        let runs = scan_runs(mask.row_validity(y));
        if runs.is_empty() {
            continue;
        }
        run_count += runs.len();

        let rects: Vec<MultiPolygon<f64>> = runs
            .iter()
            .map(|run| {
                MultiPolygon::new(vec![transform.run_rect(run.start, run.end, y).to_polygon()])
            })
            .collect();
        rows.push(cascaded_union(&rects));
    }

    tracing::debug!(
        width = dimensions.width,
        height = dimensions.height,
        rows = rows.len(),
        runs = run_count,
        "vectorizing valid pixel runs"
    );

    cascaded_union(&rows)
}
