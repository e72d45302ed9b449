use hansen::{Crs, HansenError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LossError {
    #[error("missing required parameter '{0}'")]
    Builder(&'static str),

    #[error("invalid CRS: {0}")]
    InvalidCrs(String),

    #[error("empty geometry: {0}")]
    EmptyGeometry(String),

    #[error("invalid year range {year_min}..={year_max}")]
    InvalidRange { year_min: i32, year_max: i32 },

    #[error("unsupported raster layout: {0} bands, expected 1 or 3")]
    UnsupportedRasterLayout(usize),

    #[error("cannot reproject from {from} to {to}: {reason}")]
    Projection { from: Crs, to: Crs, reason: String },

    #[error("no parcel matches {0}")]
    ParcelNotFound(String),

    #[error("geometry is not a polygon or multipolygon")]
    NotPolygonal,

    #[error("{0}")]
    GeoJson(#[from] geojson::Error),

    #[error("malformed GeoJSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Raster(#[from] HansenError),
}
