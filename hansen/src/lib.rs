//! Hansen Global Forest Change rasters.
//!
//! The published product is a set of 10°×10° GeoTIFF granules per
//! layer (`treecover2000`, `loss`, `lossyear`, ...), 1 arc-second
//! (~30 m) pixels, 8 bit samples. Users commonly clip and stack the
//! three layers of interest into a single 3 band GeoTIFF, or use the
//! `lossyear` layer alone.
//!
//! # References
//!
//! 1. [Hansen et al. 2013](https://doi.org/10.1126/science.1244693)
//! 1. [GFC user notes](https://storage.googleapis.com/earthenginepartners-hansen/GFC-2024-v1.12/download.html)

pub mod crs;
mod error;
mod geotiff;
mod raster;
mod transform;

pub use crate::{
    crs::Crs,
    error::HansenError,
    geotiff::GeoTiff,
    raster::{Band, Raster, RasterMeta, RasterSource},
    transform::{GeoTransform, Window},
};
pub use geo;

/// Base floating point type used for all coordinates and calculations.
pub type C = f64;
