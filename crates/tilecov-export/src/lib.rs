//! tilecov-export: Pure coverage serializers (sans-IO)
//!
//! Converts a traced [`Coverage`](tilecov_pipeline::Coverage) into the
//! GeoJSON cover geometry catalogues store, and parses it back.

pub mod cover;

pub use cover::{NamedCrs, from_geojson_str, to_cover_geometry, to_geojson_string};

/// Errors that can occur while exporting or importing coverage.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// JSON could not be produced or parsed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The GeoJSON geometry could not be converted.
    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),

    /// The GeoJSON geometry is not polygonal.
    #[error("unsupported geometry type: {0}")]
    UnsupportedGeometry(String),

    /// The `crs` member does not name an EPSG code.
    #[error("unrecognized CRS name: {0}")]
    UnknownCrs(String),
}
