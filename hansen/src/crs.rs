//! Coordinate reference systems identified by EPSG code.

use crate::HansenError;
use std::{fmt, str::FromStr};

/// An EPSG coordinate reference system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Crs(u32);

/// WGS 84, the CRS of the published Hansen granules.
pub const WGS84: Crs = Crs(4326);

/// Known definitions, biased towards the systems Bogotá cadastral data
/// ships in.
const DEFINITIONS: &[(u32, &str)] = &[
    (4326, "+proj=longlat +datum=WGS84 +no_defs"),
    (
        4686,
        "+proj=longlat +ellps=GRS80 +towgs84=0,0,0,0,0,0,0 +no_defs",
    ),
    (
        3116,
        "+proj=tmerc +lat_0=4.596200416666666 +lon_0=-74.07750791666666 +k_0=1 +x_0=1000000 +y_0=1000000 +ellps=GRS80 +towgs84=0,0,0,0,0,0,0 +units=m +no_defs",
    ),
    (
        9377,
        "+proj=tmerc +lat_0=4 +lon_0=-73 +k_0=0.9992 +x_0=5000000 +y_0=2000000 +ellps=GRS80 +towgs84=0,0,0,0,0,0,0 +units=m +no_defs",
    ),
    (
        21897,
        "+proj=tmerc +lat_0=4.599047222222222 +lon_0=-74.08091666666667 +k_0=1 +x_0=1000000 +y_0=1000000 +ellps=intl +towgs84=307,304,-318,0,0,0,0 +units=m +no_defs",
    ),
    (32618, "+proj=utm +zone=18 +datum=WGS84 +units=m +no_defs"),
    (
        3857,
        "+proj=merc +a=6378137 +b=6378137 +lat_ts=0 +lon_0=0 +x_0=0 +y_0=0 +k_0=1 +units=m +no_defs",
    ),
];

impl Crs {
    pub const fn from_epsg(code: u32) -> Self {
        Self(code)
    }

    pub fn epsg(self) -> u32 {
        self.0
    }

    /// Returns the PROJ.4 definition string, if this code is known.
    pub fn proj_string(self) -> Option<&'static str> {
        DEFINITIONS
            .iter()
            .find(|(code, _)| *code == self.0)
            .map(|(_, def)| *def)
    }

    /// Returns true when coordinates are longitude/latitude degrees.
    pub fn is_geographic(self) -> bool {
        self.proj_string()
            .map_or(false, |def| def.starts_with("+proj=longlat"))
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.0)
    }
}

impl FromStr for Crs {
    type Err = HansenError;

    /// Accepts `4326`, `EPSG:4326`, `epsg:4326` and the OGC URN forms
    /// `urn:ogc:def:crs:EPSG::4326` / `urn:ogc:def:crs:EPSG:6.6:4326`.
    /// `urn:ogc:def:crs:OGC:1.3:CRS84` maps to WGS 84.
    fn from_str(s: &str) -> Result<Self, HansenError> {
        let s = s.trim();
        if s.ends_with("CRS84") {
            return Ok(WGS84);
        }
        let upper = s.to_ascii_uppercase();
        let code = if upper.contains("EPSG") {
            upper.rsplit(':').next().unwrap_or_default()
        } else {
            upper.as_str()
        };
        code.parse::<u32>()
            .map(Self)
            .map_err(|_| HansenError::Crs(s.to_string()))
    }
}
