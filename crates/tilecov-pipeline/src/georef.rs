//! Georeferencing metadata and the raster input seam.
//!
//! [`GeoReference`] interprets the GeoTIFF tags the pipeline relies on
//! (model tie point, model pixel scale, GDAL nodata, GeoASCII params).
//! [`GeoRaster`] is the trait an external decoder implements to feed the
//! aggregator; [`InMemoryRaster`] is a ready-made implementation over
//! already-decoded planes.

use geo::{Rect, coord};

use crate::raster::RasterPlane;
use crate::types::{AffineTransform, CoverageError, Dimensions};

/// `ModelPixelScaleTag`: `(scale_x, scale_y, scale_z)`.
pub const TAG_MODEL_PIXEL_SCALE: u16 = 33550;
/// `ModelTiepointTag`: `(i, j, k, x, y, z)` raster-to-model tie point.
pub const TAG_MODEL_TIE_POINT: u16 = 33922;
/// `GeoAsciiParamsTag`: `|`-separated CRS citation strings.
pub const TAG_GEO_ASCII_PARAMS: u16 = 34737;
/// `GDAL_NODATA`: nodata value as ASCII text.
pub const TAG_GDAL_NO_DATA: u16 = 42113;

/// World coordinates of the top-left corner of the main image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TiePoint {
    /// World X of the left edge.
    pub x: f64,
    /// World Y of the top edge.
    pub y: f64,
}

impl TiePoint {
    /// Read the model-space point from a `ModelTiepointTag` value.
    ///
    /// # Errors
    ///
    /// Returns [`CoverageError::InvalidTag`] if fewer than 5 values are present.
    pub fn from_tag(values: &[f64]) -> Result<Self, CoverageError> {
        match values {
            [_, _, _, x, y, ..] => Ok(Self { x: *x, y: *y }),
            _ => Err(CoverageError::InvalidTag {
                tag: TAG_MODEL_TIE_POINT,
                reason: format!("expected at least 5 values, got {}", values.len()),
            }),
        }
    }
}

/// Ground size of one main-image pixel. Both components are positive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelScale {
    /// Pixel width in world units.
    pub x: f64,
    /// Pixel height in world units.
    pub y: f64,
}

impl PixelScale {
    /// Read the scale from a `ModelPixelScaleTag` value.
    ///
    /// # Errors
    ///
    /// Returns [`CoverageError::InvalidTag`] if fewer than 2 values are present.
    pub fn from_tag(values: &[f64]) -> Result<Self, CoverageError> {
        match values {
            [x, y, ..] => Ok(Self { x: *x, y: *y }),
            _ => Err(CoverageError::InvalidTag {
                tag: TAG_MODEL_PIXEL_SCALE,
                reason: format!("expected at least 2 values, got {}", values.len()),
            }),
        }
    }
}

/// Georeferencing of a raster's main image.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoReference {
    /// Main image size.
    pub dimensions: Dimensions,
    /// Top-left corner in world coordinates.
    pub tie_point: TiePoint,
    /// Main image pixel size.
    pub pixel_scale: PixelScale,
    /// Background sample value.
    pub nodata: Option<f64>,
    /// EPSG code of the coordinate reference system.
    pub crs_code: Option<u32>,
}

/// Raw GeoTIFF tag values as read from a TIFF directory.
#[derive(Debug, Clone, Copy, Default)]
pub struct GeoTags<'a> {
    /// `ModelTiepointTag` values.
    pub tie_point: Option<&'a [f64]>,
    /// `ModelPixelScaleTag` values.
    pub pixel_scale: Option<&'a [f64]>,
    /// `GeoAsciiParamsTag` text.
    pub geo_ascii_params: Option<&'a str>,
    /// `GDAL_NODATA` text.
    pub nodata: Option<&'a str>,
}

impl GeoReference {
    /// Interpret the GeoTIFF tags of a main image of `dimensions` pixels.
    ///
    /// An unrecognized CRS citation yields `crs_code: None` rather than an
    /// error; only the location tags are mandatory.
    ///
    /// # Errors
    ///
    /// Returns [`CoverageError::MissingTag`] if the tie point or pixel scale
    /// is absent, and [`CoverageError::InvalidTag`] if a tag is malformed.
    pub fn from_tags(dimensions: Dimensions, tags: &GeoTags<'_>) -> Result<Self, CoverageError> {
        let tie_point = tags
            .tie_point
            .ok_or(CoverageError::MissingTag(TAG_MODEL_TIE_POINT))
            .and_then(TiePoint::from_tag)?;
        let pixel_scale = tags
            .pixel_scale
            .ok_or(CoverageError::MissingTag(TAG_MODEL_PIXEL_SCALE))
            .and_then(PixelScale::from_tag)?;
        let nodata = tags.nodata.map(parse_nodata).transpose()?;
        let crs_code = tags.geo_ascii_params.and_then(crs_code_from_geo_ascii_params);

        Ok(Self {
            dimensions,
            tie_point,
            pixel_scale,
            nodata,
            crs_code,
        })
    }

    /// World-space bounding box of the main image.
    #[must_use]
    pub fn envelope(&self) -> Rect<f64> {
        let min_x = self.tie_point.x;
        let max_y = self.tie_point.y;
        let max_x = self
            .pixel_scale
            .x
            .mul_add(f64::from(self.dimensions.width), min_x);
        let min_y = (-self.pixel_scale.y).mul_add(f64::from(self.dimensions.height), max_y);
        Rect::new(coord! { x: min_x, y: min_y }, coord! { x: max_x, y: max_y })
    }

    /// Nominal ground resolution of the main image: the mean pixel size.
    #[must_use]
    pub fn resolution(&self) -> f64 {
        f64::midpoint(self.pixel_scale.x, self.pixel_scale.y)
    }

    /// Ground resolution of a level `level_height` pixels tall.
    ///
    /// Overviews cover the same envelope with fewer rows, so their pixel
    /// pitch grows by `main_height / level_height`.
    #[must_use]
    pub fn resolution_at(&self, level_height: u32) -> f64 {
        if level_height == self.dimensions.height {
            return self.resolution();
        }
        self.resolution() * f64::from(self.dimensions.height) / f64::from(level_height)
    }

    /// Pixel-to-world transform for a level of `dimensions` pixels.
    #[must_use]
    pub fn transform_for(&self, dimensions: Dimensions) -> AffineTransform {
        AffineTransform::fit_envelope(self.envelope(), dimensions)
    }
}

fn parse_nodata(text: &str) -> Result<f64, CoverageError> {
    let trimmed = text.trim_matches(|c: char| c == '\0' || c.is_whitespace());
    trimmed
        .parse::<f64>()
        .map_err(|e| CoverageError::InvalidTag {
            tag: TAG_GDAL_NO_DATA,
            reason: format!("cannot parse {trimmed:?} as a number: {e}"),
        })
}

/// Derive an EPSG code from a `GeoAsciiParamsTag` citation.
///
/// Recognizes WGS 84 (4326), WGS 84 / Pseudo-Mercator (3857) and the
/// WGS 84 / UTM zones (326NN north, 327NN south). The whole string must
/// match; anything else returns `None`.
#[must_use]
pub fn crs_code_from_geo_ascii_params(params: &str) -> Option<u32> {
    let projected = params.strip_suffix("WGS 84|")?;
    if projected.is_empty() {
        return Some(4326);
    }

    let name = projected.strip_prefix("WGS 84 / ")?.strip_suffix('|')?;
    if name == "Pseudo-Mercator" {
        return Some(3857);
    }

    let zone = name.strip_prefix("UTM zone ")?;
    if zone.len() != 3 || !zone.is_char_boundary(2) {
        return None;
    }
    let (digits, hemisphere) = zone.split_at(2);
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let number: u32 = digits.parse().ok()?;
    match hemisphere {
        "N" => Some(32600 + number),
        "S" => Some(32700 + number),
        _ => None,
    }
}

/// Source of georeferenced, decoded raster levels.
///
/// Level 0 is the main image; higher levels are overviews of decreasing
/// resolution covering the same envelope. Implementations must return
/// fully decoded planes; the pipeline does not stream.
pub trait GeoRaster {
    /// Georeferencing of the main image.
    fn georeference(&self) -> &GeoReference;

    /// Number of available levels (main image plus overviews).
    fn level_count(&self) -> usize;

    /// Size of `level`, or `None` if it does not exist.
    fn level_dimensions(&self, level: usize) -> Option<Dimensions>;

    /// Decode the samples of `level`.
    ///
    /// # Errors
    ///
    /// Implementations report decoding failures as
    /// [`CoverageError::RasterRead`].
    fn read_level(&self, level: usize) -> Result<RasterPlane, CoverageError>;
}

/// A [`GeoRaster`] whose levels are already decoded in memory.
#[derive(Debug, Clone)]
pub struct InMemoryRaster {
    georeference: GeoReference,
    levels: Vec<RasterPlane>,
}

impl InMemoryRaster {
    /// Bundle a georeference with its decoded levels.
    ///
    /// # Errors
    ///
    /// Returns [`CoverageError::NoLevels`] if `levels` is empty and
    /// [`CoverageError::LevelDimensionsMismatch`] if level 0 does not have
    /// the georeferenced dimensions.
    pub fn new(
        georeference: GeoReference,
        levels: Vec<RasterPlane>,
    ) -> Result<Self, CoverageError> {
        let main = levels.first().ok_or(CoverageError::NoLevels)?;
        if main.dimensions() != georeference.dimensions {
            return Err(CoverageError::LevelDimensionsMismatch {
                expected: georeference.dimensions,
                actual: main.dimensions(),
            });
        }
        Ok(Self {
            georeference,
            levels,
        })
    }
}

impl GeoRaster for InMemoryRaster {
    fn georeference(&self) -> &GeoReference {
        &self.georeference
    }

    fn level_count(&self) -> usize {
        self.levels.len()
    }

    fn level_dimensions(&self, level: usize) -> Option<Dimensions> {
        self.levels.get(level).map(RasterPlane::dimensions)
    }

    fn read_level(&self, level: usize) -> Result<RasterPlane, CoverageError> {
        self.levels.get(level).cloned().ok_or_else(|| {
            CoverageError::RasterRead(format!(
                "level {level} requested but only {} available",
                self.levels.len()
            ))
        })
    }
}
