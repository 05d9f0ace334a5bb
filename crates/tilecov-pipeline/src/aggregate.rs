//! Coverage aggregation across the images of one tile.
//!
//! Every band or overview added to a [`CoverageAggregator`] is vectorized
//! and intersected with the footprint accumulated so far, so the result
//! covers only pixels that are valid in *all* images. Images are added
//! one at a time; each step depends on the previous intersection.

use geo::{BooleanOps, Geometry, MultiPolygon, Rect};

use crate::georef::GeoRaster;
use crate::normalize::NormalizationKind;
use crate::raster::PixelMask;
use crate::types::{AffineTransform, CoverageError};
use crate::vectorize::PixelBoundaryVectorizer;

/// Accumulated state of one tile's coverage computation.
///
/// Owned by a single [`CoverageAggregator`] and handed to the reducer by
/// value once all images are added.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CoverageState {
    intersection: Option<MultiPolygon<f64>>,
    tile_envelope: Option<Rect<f64>>,
    crs_code: Option<u32>,
    lowest_resolution: Option<f64>,
}

impl CoverageState {
    /// Running intersection of all footprints, `None` before the first image.
    #[must_use]
    pub const fn intersection(&self) -> Option<&MultiPolygon<f64>> {
        self.intersection.as_ref()
    }

    /// World-space extent of the first image added.
    #[must_use]
    pub const fn tile_envelope(&self) -> Option<Rect<f64>> {
        self.tile_envelope
    }

    /// EPSG code of the first image added.
    #[must_use]
    pub const fn crs_code(&self) -> Option<u32> {
        self.crs_code
    }

    /// Coarsest ground resolution seen so far.
    #[must_use]
    pub const fn lowest_resolution(&self) -> Option<f64> {
        self.lowest_resolution
    }

    /// Whether at least one image has been added.
    #[must_use]
    pub const fn is_started(&self) -> bool {
        self.intersection.is_some()
    }
}

/// Folds per-image footprints into a running intersection.
#[derive(Debug, Clone, Default)]
pub struct CoverageAggregator {
    vectorizer: PixelBoundaryVectorizer,
    normalization: NormalizationKind,
    state: CoverageState,
    images: usize,
}

impl CoverageAggregator {
    /// Aggregator using `normalization` on the global rayon pool.
    #[must_use]
    pub fn new(normalization: NormalizationKind) -> Self {
        Self::with_vectorizer(PixelBoundaryVectorizer::new(), normalization)
    }

    /// Aggregator tracing footprints with `vectorizer`.
    #[must_use]
    pub fn with_vectorizer(
        vectorizer: PixelBoundaryVectorizer,
        normalization: NormalizationKind,
    ) -> Self {
        Self {
            vectorizer,
            normalization,
            state: CoverageState::default(),
            images: 0,
        }
    }

    /// Add one image's footprint.
    ///
    /// The first image seeds the intersection and fixes the tile envelope
    /// and CRS. Later images are intersected with it; their envelope and
    /// CRS are not checked, so mismatched grids shrink the footprint
    /// toward empty instead of failing. `resolution` must already be
    /// scaled for overview levels.
    pub fn add_image(
        &mut self,
        mask: &PixelMask<'_>,
        transform: &AffineTransform,
        resolution: f64,
        envelope: Rect<f64>,
        crs_code: Option<u32>,
    ) {
        let footprint = self.vectorizer.vectorize(mask, transform);

        let lowest = self
            .state
            .lowest_resolution
            .map_or(resolution, |current| current.max(resolution));
        self.state.lowest_resolution = Some(lowest);

        let combined = match self.state.intersection.take() {
            None => {
                self.state.tile_envelope = Some(envelope);
                self.state.crs_code = crs_code;
                footprint
            }
            Some(current) => current.intersection(&footprint),
        };

        let normalized = self
            .normalization
            .normalize(&Geometry::MultiPolygon(combined), lowest);
        tracing::debug!(
            image = self.images,
            parts = normalized.0.len(),
            lowest_resolution = lowest,
            "folded image footprint into coverage"
        );
        self.state.intersection = Some(normalized);
        self.images += 1;
    }

    /// Trace one level of `raster` and add it.
    ///
    /// `reference_image_index` is clamped to the raster's last level. The
    /// level's transform and resolution come from its declared dimensions
    /// before any samples are decoded: the level is stretched over the
    /// main image envelope, and its resolution is scaled by
    /// `main_height / level_height`.
    ///
    /// # Errors
    ///
    /// Returns [`CoverageError::NoLevels`] for a raster without levels,
    /// [`CoverageError::RasterRead`] if the chosen level declares no
    /// dimensions, [`CoverageError::LevelDimensionsMismatch`] if the
    /// decoded plane disagrees with them, and propagates failures from
    /// [`GeoRaster::read_level`].
    pub fn add_raster<R>(
        &mut self,
        raster: &R,
        reference_image_index: usize,
    ) -> Result<(), CoverageError>
    where
        R: GeoRaster + ?Sized,
    {
        let level_count = raster.level_count();
        if level_count == 0 {
            return Err(CoverageError::NoLevels);
        }
        let level = reference_image_index.min(level_count - 1);
        let dimensions = raster.level_dimensions(level).ok_or_else(|| {
            CoverageError::RasterRead(format!("level {level} of {level_count} has no dimensions"))
        })?;

        let georeference = raster.georeference();
        let transform = georeference.transform_for(dimensions);
        let resolution = georeference.resolution_at(dimensions.height);
        tracing::info!(
            level,
            width = dimensions.width,
            height = dimensions.height,
            resolution,
            "tracing coverage"
        );

        let plane = raster.read_level(level)?;
        if plane.dimensions() != dimensions {
            return Err(CoverageError::LevelDimensionsMismatch {
                expected: dimensions,
                actual: plane.dimensions(),
            });
        }
        let mask = PixelMask::new(&plane, georeference.nodata);
        self.add_image(
            &mask,
            &transform,
            resolution,
            georeference.envelope(),
            georeference.crs_code,
        );
        Ok(())
    }

    /// Current running intersection, or an empty geometry before the
    /// first image.
    #[must_use]
    pub fn aggregate(&self) -> MultiPolygon<f64> {
        self.state
            .intersection
            .clone()
            .unwrap_or_else(|| MultiPolygon::new(Vec::new()))
    }

    /// Number of images added so far.
    #[must_use]
    pub const fn image_count(&self) -> usize {
        self.images
    }

    /// Read-only view of the accumulated state.
    #[must_use]
    pub const fn state(&self) -> &CoverageState {
        &self.state
    }

    /// Consume the aggregator, returning its state.
    #[must_use]
    pub fn finish(self) -> CoverageState {
        self.state
    }
}
