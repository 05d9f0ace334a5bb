//! tilecov-pipeline: Coverage tracing for georeferenced raster tiles (sans-IO).
//!
//! Computes the polygonal footprint of valid data in a tile through:
//! valid-pixel mask -> run rectangles -> cascaded union -> intersection
//! across images -> normalization -> collinear cleanup -> negative
//! buffer -> simplification -> CRS tagging.
//!
//! This crate has **no I/O dependencies**. Raster decoding lives behind
//! the [`GeoRaster`] trait; serialization of the resulting [`Coverage`]
//! lives in `tilecov-export`.

pub mod aggregate;
pub mod georef;
pub mod normalize;
pub mod raster;
pub mod reduce;
pub mod simplify;
pub mod types;
pub mod union;
pub mod vectorize;

pub use aggregate::{CoverageAggregator, CoverageState};
pub use georef::{GeoRaster, GeoReference, GeoTags, InMemoryRaster, PixelScale, TiePoint};
pub use normalize::NormalizationKind;
pub use raster::{PixelMask, RasterPlane};
pub use reduce::CoverageReducer;
pub use types::{
    AffineTransform, Coverage, CoverageConfig, CoverageError, Dimensions, ReductionConfig,
};
pub use vectorize::PixelBoundaryVectorizer;

/// Compute the reduced coverage of one tile.
///
/// Every raster in `rasters` is one band or image of the tile; each is
/// traced at `config.reduction.reference_image_index` and intersected
/// into the running footprint, in order.
///
/// # Pipeline steps
///
/// 1. Validate the configuration
/// 2. Build the vectorizer, on a bounded pool if `worker_threads` is set
/// 3. For each raster: read the level, mask nodata, vectorize, intersect,
///    normalize
/// 4. Reduce the aggregate: collinear cleanup, negative buffer,
///    simplification, CRS tag
///
/// No rasters yields an empty coverage.
///
/// # Errors
///
/// Returns [`CoverageError::InvalidConfig`] for an invalid configuration,
/// [`CoverageError::ThreadPool`] if the worker pool cannot be built, and
/// propagates read failures from the rasters.
pub fn trace_coverage<'a, I, R>(
    rasters: I,
    config: &CoverageConfig,
) -> Result<Coverage, CoverageError>
where
    I: IntoIterator<Item = &'a R>,
    R: GeoRaster + ?Sized + 'a,
{
    // 1. Validate.
    config.validate()?;

    // 2. Vectorizer.
    let vectorizer = match config.worker_threads {
        Some(threads) => PixelBoundaryVectorizer::with_threads(threads)?,
        None => PixelBoundaryVectorizer::new(),
    };

    // 3. Aggregate.
    let mut aggregator = CoverageAggregator::with_vectorizer(vectorizer, config.normalization);
    for raster in rasters {
        aggregator.add_raster(raster, config.reduction.reference_image_index)?;
    }
    tracing::info!(images = aggregator.image_count(), "aggregated tile coverage");

    // 4. Reduce.
    let geometry = aggregator.aggregate();
    let state = aggregator.finish();
    Ok(CoverageReducer::new(config.reduction.clone()).reduce(&geometry, &state))
}
