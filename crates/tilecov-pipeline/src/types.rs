//! Shared types for the tilecov coverage pipeline.

use geo::{Area, CoordsIter, MultiPolygon, Rect, coord};
use serde::{Deserialize, Serialize};

use crate::normalize::NormalizationKind;

/// Raster dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Create new dimensions.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Number of pixels covered by these dimensions.
    #[must_use]
    pub const fn pixel_count(self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// Maps pixel column/row indices to world coordinates.
///
/// `world_x = translate_x + col * scale_x` and
/// `world_y = translate_y + row * scale_y`. For north-up rasters
/// `scale_y` is negative: rows grow downward while world Y decreases.
///
/// Indices are pixel *edges*, not centres: column `x` spans
/// `[world_x(x), world_x(x + 1)]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AffineTransform {
    /// World units per pixel column.
    pub scale_x: f64,
    /// World units per pixel row (negative for north-up rasters).
    pub scale_y: f64,
    /// World X of the left edge of column 0.
    pub translate_x: f64,
    /// World Y of the top edge of row 0.
    pub translate_y: f64,
}

impl AffineTransform {
    /// Create a new transform.
    #[must_use]
    pub const fn new(scale_x: f64, scale_y: f64, translate_x: f64, translate_y: f64) -> Self {
        Self {
            scale_x,
            scale_y,
            translate_x,
            translate_y,
        }
    }

    /// Transform for a raster of `dimensions` pixels stretched over `envelope`.
    ///
    /// The envelope's top-left corner is the origin; rows run downward.
    #[must_use]
    pub fn fit_envelope(envelope: Rect<f64>, dimensions: Dimensions) -> Self {
        Self::new(
            envelope.width() / f64::from(dimensions.width),
            -envelope.height() / f64::from(dimensions.height),
            envelope.min().x,
            envelope.max().y,
        )
    }

    /// World X of pixel column edge `col`.
    #[must_use]
    pub fn world_x(&self, col: u32) -> f64 {
        f64::from(col).mul_add(self.scale_x, self.translate_x)
    }

    /// World Y of pixel row edge `row`.
    #[must_use]
    pub fn world_y(&self, row: u32) -> f64 {
        f64::from(row).mul_add(self.scale_y, self.translate_y)
    }

    /// World-space rectangle covering columns `[col_start, col_end)` of `row`.
    #[must_use]
    pub fn run_rect(&self, col_start: u32, col_end: u32, row: u32) -> Rect<f64> {
        Rect::new(
            coord! { x: self.world_x(col_start), y: self.world_y(row) },
            coord! { x: self.world_x(col_end), y: self.world_y(row + 1) },
        )
    }
}

/// Parameters for reducing the aggregated coverage before it is stored.
///
/// Tolerances are expressed in pixels and converted to world units using
/// the coarsest resolution seen by the aggregator. Defaults match the
/// ingestion tool's command-line defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReductionConfig {
    /// Which image level to trace: 0 is the main image, higher indices
    /// are progressively coarser overviews. Clamped to the last level
    /// when a raster has fewer levels.
    pub reference_image_index: usize,

    /// Inward buffer applied to nodata cutouts, in pixels. 0 disables it.
    pub negative_buffer_pixels: f64,

    /// Douglas-Peucker tolerance for the final geometry, in pixels.
    /// 0 disables lossy simplification.
    pub distance_tolerance_pixels: f64,
}

impl Default for ReductionConfig {
    fn default() -> Self {
        Self {
            reference_image_index: 0,
            negative_buffer_pixels: 10.0,
            distance_tolerance_pixels: 10.0,
        }
    }
}

impl ReductionConfig {
    /// Check that both pixel tolerances are finite and non-negative.
    ///
    /// # Errors
    ///
    /// Returns [`CoverageError::InvalidConfig`] naming the offending field.
    pub fn validate(&self) -> Result<(), CoverageError> {
        check_pixels("negative_buffer_pixels", self.negative_buffer_pixels)?;
        check_pixels("distance_tolerance_pixels", self.distance_tolerance_pixels)
    }
}

fn check_pixels(name: &str, value: f64) -> Result<(), CoverageError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(CoverageError::InvalidConfig(format!(
            "{name} must be a finite value >= 0, got {value}"
        )))
    }
}

/// Full configuration for one tile's coverage computation.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CoverageConfig {
    /// Final reduction parameters.
    pub reduction: ReductionConfig,

    /// How the running intersection is cleaned after every added image.
    pub normalization: NormalizationKind,

    /// Size of the vectorizer's worker pool. `None` runs on the global
    /// rayon pool.
    pub worker_threads: Option<usize>,
}

impl CoverageConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`CoverageError::InvalidConfig`] for negative or non-finite
    /// tolerances, or a worker pool of size zero.
    pub fn validate(&self) -> Result<(), CoverageError> {
        self.reduction.validate()?;
        if self.worker_threads == Some(0) {
            return Err(CoverageError::InvalidConfig(
                "worker_threads must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// The reduced coverage of one tile, ready to be serialized.
#[derive(Debug, Clone, PartialEq)]
pub struct Coverage {
    /// Polygonal footprint in world coordinates.
    pub geometry: MultiPolygon<f64>,
    /// EPSG code of the geometry's coordinate reference system, if known.
    pub crs_code: Option<u32>,
}

impl Coverage {
    /// A coverage with no footprint and no coordinate reference system.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            geometry: MultiPolygon::new(Vec::new()),
            crs_code: None,
        }
    }

    /// Returns `true` if the footprint has no polygons.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.geometry.0.is_empty()
    }

    /// Footprint area in squared world units.
    #[must_use]
    pub fn area(&self) -> f64 {
        self.geometry.unsigned_area()
    }

    /// Total number of ring coordinates, including closing coordinates.
    ///
    /// Callers use this to enforce their own complexity limits.
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.geometry.coords_count()
    }
}

/// Errors that can occur while tracing coverage.
#[derive(Debug, thiserror::Error)]
pub enum CoverageError {
    /// Configuration is invalid.
    #[error("invalid coverage configuration: {0}")]
    InvalidConfig(String),

    /// A sample buffer does not match its declared dimensions.
    #[error("expected {width}x{height} samples, got {len}")]
    SampleCountMismatch {
        /// Declared width.
        width: u32,
        /// Declared height.
        height: u32,
        /// Actual number of samples.
        len: usize,
    },

    /// A required georeferencing tag is absent.
    #[error("missing TIFF tag {0}")]
    MissingTag(u16),

    /// A georeferencing tag is present but unusable.
    #[error("invalid TIFF tag {tag}: {reason}")]
    InvalidTag {
        /// Tag number.
        tag: u16,
        /// What is wrong with it.
        reason: String,
    },

    /// A raster has no image levels.
    #[error("raster has no image levels")]
    NoLevels,

    /// A decoded level does not have its declared dimensions.
    #[error("image level is {actual:?} but {expected:?} was declared")]
    LevelDimensionsMismatch {
        /// Dimensions declared for the level.
        expected: Dimensions,
        /// Dimensions of the decoded plane.
        actual: Dimensions,
    },

    /// The raster collaborator failed to provide samples.
    #[error("failed to read raster: {0}")]
    RasterRead(String),

    /// The bounded vectorizer pool could not be created.
    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}
