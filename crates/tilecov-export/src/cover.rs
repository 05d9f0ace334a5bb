//! GeoJSON cover-geometry serializer.
//!
//! A coverage is written as a bare GeoJSON geometry: a `Polygon` when it
//! has exactly one part, a `MultiPolygon` otherwise. The EPSG code, when
//! known, is carried in a legacy named `crs` foreign member so catalogues
//! that store projected footprints can read it back.
//!
//! ```json
//! {"coordinates":[[[0.0,80.0],[40.0,80.0],...]],
//!  "crs":{"properties":{"name":"urn:ogc:def:crs:EPSG::32633"},"type":"name"},
//!  "type":"Polygon"}
//! ```

use geo::{MultiPolygon, Polygon};
use geojson::{Geometry, JsonObject, Value};
use serde::{Deserialize, Serialize};

use tilecov_pipeline::Coverage;

use crate::ExportError;

/// Prefix of the OGC URN naming an EPSG coordinate reference system.
pub const EPSG_URN_PREFIX: &str = "urn:ogc:def:crs:EPSG::";

/// Prefix of the OGC URI spelling, accepted on import.
pub const EPSG_URI_PREFIX: &str = "http://www.opengis.net/def/crs/EPSG/0/";

/// Name of the foreign member holding the CRS.
const CRS_MEMBER: &str = "crs";

/// Named CRS member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedCrs {
    /// Always `"name"`.
    #[serde(rename = "type")]
    pub kind: String,
    /// CRS name.
    pub properties: CrsProperties,
}

/// Properties of a [`NamedCrs`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrsProperties {
    /// CRS URN, e.g. `urn:ogc:def:crs:EPSG::4326`.
    pub name: String,
}

impl NamedCrs {
    /// Named CRS for an EPSG code.
    #[must_use]
    pub fn epsg(code: u32) -> Self {
        Self {
            kind: "name".to_string(),
            properties: CrsProperties {
                name: format!("{EPSG_URN_PREFIX}{code}"),
            },
        }
    }

    /// EPSG code named by this member.
    ///
    /// Accepts the OGC URN as well as the OGC URI and `EPSG:<code>`
    /// spellings.
    #[must_use]
    pub fn epsg_code(&self) -> Option<u32> {
        let name = self.properties.name.as_str();
        name.strip_prefix(EPSG_URN_PREFIX)
            .or_else(|| name.strip_prefix(EPSG_URI_PREFIX))
            .or_else(|| name.strip_prefix("EPSG:"))
            .and_then(|code| code.parse().ok())
    }
}

/// Convert a coverage into its GeoJSON geometry.
///
/// An empty coverage becomes a `Polygon` with no rings.
///
/// # Errors
///
/// Returns [`ExportError::Json`] if the `crs` member cannot be encoded.
pub fn to_cover_geometry(coverage: &Coverage) -> Result<Geometry, ExportError> {
    let value = match coverage.geometry.0.as_slice() {
        [] => Value::Polygon(Vec::new()),
        [polygon] => Value::from(polygon),
        _ => Value::from(&coverage.geometry),
    };

    let foreign_members = match coverage.crs_code {
        Some(code) => {
            let mut members = JsonObject::new();
            members.insert(
                CRS_MEMBER.to_string(),
                serde_json::to_value(NamedCrs::epsg(code))?,
            );
            Some(members)
        }
        None => None,
    };

    Ok(Geometry {
        bbox: None,
        value,
        foreign_members,
    })
}

/// Serialize a coverage as a compact GeoJSON string.
///
/// # Errors
///
/// Returns [`ExportError::Json`] if serialization fails.
pub fn to_geojson_string(coverage: &Coverage) -> Result<String, ExportError> {
    Ok(serde_json::to_string(&to_cover_geometry(coverage)?)?)
}

/// Parse a GeoJSON `Polygon` or `MultiPolygon` back into a coverage.
///
/// # Errors
///
/// Returns [`ExportError::Json`] for malformed JSON or an invalid `crs`
/// member, [`ExportError::GeoJson`] for an invalid geometry,
/// [`ExportError::UnsupportedGeometry`] for any other geometry type and
/// [`ExportError::UnknownCrs`] for a `crs` member that does not name an
/// EPSG code.
pub fn from_geojson_str(json: &str) -> Result<Coverage, ExportError> {
    let geometry: Geometry = serde_json::from_str(json)?;

    let crs_code = match geometry
        .foreign_members
        .as_ref()
        .and_then(|members| members.get(CRS_MEMBER))
    {
        Some(member) => {
            let crs: NamedCrs = serde_json::from_value(member.clone())?;
            Some(
                crs.epsg_code()
                    .ok_or_else(|| ExportError::UnknownCrs(crs.properties.name.clone()))?,
            )
        }
        None => None,
    };

    let polygons = match geometry.value {
        Value::Polygon(rings) if rings.is_empty() => Vec::new(),
        value @ Value::Polygon(_) => vec![Polygon::try_from(value)?],
        value @ Value::MultiPolygon(_) => MultiPolygon::try_from(value)?.0,
        other => return Err(ExportError::UnsupportedGeometry(type_name(&other).to_string())),
    };
    Ok(Coverage {
        geometry: MultiPolygon::new(polygons),
        crs_code,
    })
}

const fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Point(_) => "Point",
        Value::MultiPoint(_) => "MultiPoint",
        Value::LineString(_) => "LineString",
        Value::MultiLineString(_) => "MultiLineString",
        Value::Polygon(_) => "Polygon",
        Value::MultiPolygon(_) => "MultiPolygon",
        Value::GeometryCollection(_) => "GeometryCollection",
    }
}
