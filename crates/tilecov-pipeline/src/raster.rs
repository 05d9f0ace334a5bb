//! Decoded raster planes and their valid-pixel masks.
//!
//! The pipeline never decodes image formats itself. Callers hand over a
//! [`RasterPlane`] of already-decoded samples, either built directly or
//! converted from an in-memory `image::ImageBuffer`.

use image::{ImageBuffer, Luma, Primitive};

use crate::types::{CoverageError, Dimensions};

/// A single band of decoded samples in row-major order.
///
/// Samples are widened to `f64` so integer and floating-point rasters
/// share one code path.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterPlane {
    dimensions: Dimensions,
    samples: Vec<f64>,
}

impl RasterPlane {
    /// Wrap a row-major sample buffer.
    ///
    /// # Errors
    ///
    /// Returns [`CoverageError::SampleCountMismatch`] if `samples` does not
    /// hold exactly `width * height` values.
    pub fn new(width: u32, height: u32, samples: Vec<f64>) -> Result<Self, CoverageError> {
        let dimensions = Dimensions::new(width, height);
        if samples.len() != dimensions.pixel_count() {
            return Err(CoverageError::SampleCountMismatch {
                width,
                height,
                len: samples.len(),
            });
        }
        Ok(Self {
            dimensions,
            samples,
        })
    }

    /// Build a plane by evaluating `f(x, y)` for every pixel.
    #[must_use]
    pub fn from_fn(width: u32, height: u32, mut f: impl FnMut(u32, u32) -> f64) -> Self {
        let samples = (0..height)
            .flat_map(|y| (0..width).map(move |x| (x, y)))
            .map(|(x, y)| f(x, y))
            .collect();
        Self {
            dimensions: Dimensions::new(width, height),
            samples,
        }
    }

    /// Copy the samples of a single-channel image buffer.
    #[must_use]
    pub fn from_luma<T>(image: &ImageBuffer<Luma<T>, Vec<T>>) -> Self
    where
        T: Primitive + Into<f64>,
    {
        Self {
            dimensions: Dimensions::new(image.width(), image.height()),
            samples: image.as_raw().iter().map(|&s| s.into()).collect(),
        }
    }

    /// Plane dimensions.
    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    /// Width in pixels.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.dimensions.width
    }

    /// Height in pixels.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.dimensions.height
    }

    /// Sample at column `x`, row `y`.
    ///
    /// Callers must stay within the plane's dimensions.
    #[must_use]
    pub fn sample(&self, x: u32, y: u32) -> f64 {
        self.samples[y as usize * self.dimensions.width as usize + x as usize]
    }

    /// Samples of row `y`.
    #[must_use]
    pub fn row(&self, y: u32) -> &[f64] {
        let width = self.dimensions.width as usize;
        let start = y as usize * width;
        &self.samples[start..start + width]
    }
}

/// Valid/invalid view over a [`RasterPlane`].
///
/// A pixel is valid when its sample differs from the nodata value. With no
/// nodata value every pixel is valid. A NaN nodata value marks NaN samples
/// invalid.
#[derive(Debug, Clone, Copy)]
pub struct PixelMask<'a> {
    plane: &'a RasterPlane,
    nodata: Option<f64>,
}

impl<'a> PixelMask<'a> {
    /// Create a mask over `plane`.
    #[must_use]
    pub const fn new(plane: &'a RasterPlane, nodata: Option<f64>) -> Self {
        Self { plane, nodata }
    }

    /// Mask dimensions.
    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        self.plane.dimensions()
    }

    /// The nodata value, if any.
    #[must_use]
    pub const fn nodata(&self) -> Option<f64> {
        self.nodata
    }

    /// Whether the pixel at column `x`, row `y` holds data.
    #[must_use]
    pub fn is_valid(&self, x: u32, y: u32) -> bool {
        self.is_valid_sample(self.plane.sample(x, y))
    }

    /// Validity of every pixel in row `y`, left to right.
    pub fn row_validity(&self, y: u32) -> impl Iterator<Item = bool> + '_ {
        self.plane.row(y).iter().map(|&s| self.is_valid_sample(s))
    }

    fn is_valid_sample(&self, sample: f64) -> bool {
        match self.nodata {
            None => true,
            Some(nodata) if nodata.is_nan() => !sample.is_nan(),
            #[allow(clippy::float_cmp)]
            Some(nodata) => sample != nodata,
        }
    }
}
