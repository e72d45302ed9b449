use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HansenError {
    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Tiff(#[from] tiff::TiffError),

    #[error("no georeferencing tags in {0}")]
    MissingGeoreference(PathBuf),

    #[error("not an EPSG code: {0}")]
    Crs(String),

    #[error("rotated or sheared rasters are not supported")]
    Rotated,

    #[error("unsupported sample format {0}")]
    UnsupportedSampleFormat(String),

    #[error("band {band} has {len} samples, expected {expected}")]
    BandLength {
        band: usize,
        len: usize,
        expected: usize,
    },

    #[error("window {0:?} exceeds raster dimensions {1:?}")]
    WindowOutOfBounds(crate::Window, (usize, usize)),
}
