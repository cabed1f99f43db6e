//! Coordinate reference systems, identified by EPSG code and
//! resolved to proj4rs definitions.

use crate::TrackError;
use geo::geometry::Coord;
use proj4rs::{errors::Error as ProjError, transform::transform, Proj};
use serde::{Deserialize, Serialize};
use std::{borrow::Cow, fmt, str::FromStr};

/// UTM zones on WGS84, north (326zz) and south (327zz).
const UTM_NORTH: std::ops::RangeInclusive<u16> = 32601..=32660;
const UTM_SOUTH: std::ops::RangeInclusive<u16> = 32701..=32760;

/// proj4 definition of an EPSG code, if it is one we can resolve.
fn definition(code: u16) -> Option<Cow<'static, str>> {
    let def = match code {
        4326 => Cow::Borrowed("+proj=longlat +datum=WGS84 +no_defs"),
        3857 => Cow::Borrowed(concat!(
            "+proj=merc +a=6378137 +b=6378137 +lat_ts=0 +lon_0=0 +x_0=0 +y_0=0 +k=1 ",
            "+units=m +nadgrids=@null +no_defs"
        )),
        27700 => Cow::Borrowed(concat!(
            "+proj=tmerc +lat_0=49 +lon_0=-2 +k=0.9996012717 +x_0=400000 +y_0=-100000 ",
            "+ellps=airy +towgs84=446.448,-125.157,542.06,0.15,0.247,0.842,-20.489 ",
            "+units=m +no_defs"
        )),
        _ if UTM_NORTH.contains(&code) => Cow::Owned(format!(
            "+proj=utm +zone={} +datum=WGS84 +units=m +no_defs",
            code - 32600
        )),
        _ if UTM_SOUTH.contains(&code) => Cow::Owned(format!(
            "+proj=utm +zone={} +south +datum=WGS84 +units=m +no_defs",
            code - 32700
        )),
        _ => return None,
    };
    Some(def)
}

/// A coordinate reference system known by its EPSG code.
///
/// Only codes with a proj4 definition can be constructed, so every
/// `Crs` can be handed to [`Reprojection::new`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Crs(u16);

impl Crs {
    /// EPSG:4326, longitude/latitude in degrees.
    pub const WGS84: Self = Self(4326);

    /// EPSG:3857, spherical web mercator in meters.
    pub const WEB_MERCATOR: Self = Self(3857);

    /// EPSG:27700, Ordnance Survey National Grid in meters.
    pub const BRITISH_NATIONAL_GRID: Self = Self(27700);

    pub fn from_epsg(code: u16) -> Result<Self, TrackError> {
        definition(code)
            .map(|_| Self(code))
            .ok_or_else(|| TrackError::UnsupportedCrs(format!("EPSG:{code}")))
    }

    pub fn epsg(self) -> u16 {
        self.0
    }

    /// True when coordinates are angular degrees.
    pub fn is_geographic(self) -> bool {
        definition(self.0).is_some_and(|def| def.starts_with("+proj=longlat"))
    }

    fn proj(self) -> Result<Proj, TrackError> {
        let def = definition(self.0).ok_or_else(|| TrackError::UnsupportedCrs(self.to_string()))?;
        Proj::from_proj_string(&def).map_err(|e| TrackError::UnsupportedCrs(format!("{self}: {e}")))
    }
}

impl Default for Crs {
    fn default() -> Self {
        Self::WGS84
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.0)
    }
}

impl FromStr for Crs {
    type Err = TrackError;

    /// Accepts `EPSG:<code>` and the OGC URNs found in legacy GeoJSON
    /// `crs` members.
    fn from_str(s: &str) -> Result<Self, TrackError> {
        let upper = s.trim().to_ascii_uppercase();
        if upper == "URN:OGC:DEF:CRS:OGC:1.3:CRS84" || upper == "CRS84" {
            return Ok(Self::WGS84);
        }
        upper
            .strip_prefix("EPSG:")
            .or_else(|| upper.strip_prefix("URN:OGC:DEF:CRS:EPSG::"))
            .or_else(|| upper.strip_prefix("URN:OGC:DEF:CRS:EPSG:6.6:"))
            .and_then(|code| code.parse::<u32>().ok())
            // 900913 is Google's unofficial code for web mercator.
            .and_then(|code| match code {
                900_913 => Some(3857),
                _ => u16::try_from(code).ok(),
            })
            .ok_or_else(|| TrackError::UnsupportedCrs(s.to_owned()))
            .and_then(Self::from_epsg)
            .map_err(|_| TrackError::UnsupportedCrs(s.to_owned()))
    }
}

impl TryFrom<String> for Crs {
    type Error = TrackError;

    fn try_from(s: String) -> Result<Self, TrackError> {
        s.parse()
    }
}

impl From<Crs> for String {
    fn from(crs: Crs) -> String {
        crs.to_string()
    }
}

/// A resolved pair of coordinate systems.
///
/// Parsing the proj4 definitions is done once here; [`transform`]
/// is then cheap enough to call per vertex or per raster cell.
///
/// [`transform`]: Self::transform
#[derive(Clone)]
pub struct Reprojection {
    source: Crs,
    target: Crs,
    from: Proj,
    to: Proj,
}

impl Reprojection {
    pub fn new(source: Crs, target: Crs) -> Result<Self, TrackError> {
        Ok(Self {
            source,
            target,
            from: source.proj()?,
            to: target.proj()?,
        })
    }

    pub fn source(&self) -> Crs {
        self.source
    }

    pub fn target(&self) -> Crs {
        self.target
    }

    /// Maps `coord` from source into target, or `None` when it has no
    /// finite image there (e.g. a pole in web mercator).
    pub fn transform(&self, coord: Coord<f64>) -> Option<Coord<f64>> {
        self.apply(coord).ok()
    }

    /// Like [`transform`](Self::transform), reporting failure as a
    /// [`TrackError::ReprojectionError`] against `layer`.
    pub fn transform_layer(
        &self,
        layer: &'static str,
        coord: Coord<f64>,
    ) -> Result<Coord<f64>, TrackError> {
        self.apply(coord)
            .map_err(|e| TrackError::ReprojectionError {
                layer,
                reason: format!("{coord:?} into {}: {e}", self.target),
            })
    }

    fn apply(&self, coord: Coord<f64>) -> Result<Coord<f64>, ProjError> {
        if self.source == self.target {
            return Ok(coord);
        }
        // proj4rs works in radians for geographic systems.
        let mut point = if self.from.is_latlong() {
            (coord.x.to_radians(), coord.y.to_radians(), 0.0)
        } else {
            (coord.x, coord.y, 0.0)
        };
        transform(&self.from, &self.to, &mut point)?;
        let (x, y) = if self.to.is_latlong() {
            (point.0.to_degrees(), point.1.to_degrees())
        } else {
            (point.0, point.1)
        };
        if x.is_finite() && y.is_finite() {
            Ok(Coord { x, y })
        } else {
            Err(ProjError::CoordinateOutOfRange)
        }
    }
}

impl fmt::Debug for Reprojection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reprojection")
            .field("source", &self.source)
            .field("target", &self.target)
            .finish()
    }
}

impl PartialEq for Reprojection {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source && self.target == other.target
    }
}
