use crate::{Crs, GeoTransform, HansenError, Window};

/// Band samples in row-major order, northernmost row first.
pub type Band = Box<[u16]>;

/// Everything known about a raster without reading its samples.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterMeta {
    /// Number of (columns, rows).
    pub dimensions: (usize, usize),

    /// Number of bands.
    pub band_count: usize,

    /// Pixel to map transform.
    pub transform: GeoTransform,

    /// Coordinate reference system, if the source declares one.
    pub crs: Option<Crs>,
}

/// Something that can hand out georeferenced blocks of samples.
pub trait RasterSource {
    fn meta(&self) -> &RasterMeta;

    /// Returns the samples of every band inside `window`.
    fn read_window(&mut self, window: Window) -> Result<Raster, HansenError>;
}

/// An in-memory, georeferenced, multi-band raster.
#[derive(Debug, Clone, PartialEq)]
pub struct Raster {
    meta: RasterMeta,
    bands: Vec<Band>,
}

impl Raster {
    /// Returns a raster of `dimensions` built from `bands`, each of
    /// which must hold exactly `cols * rows` samples.
    pub fn new(
        transform: GeoTransform,
        crs: Option<Crs>,
        dimensions: (usize, usize),
        bands: Vec<Vec<u16>>,
    ) -> Result<Self, HansenError> {
        if bands.is_empty() {
            return Err(HansenError::UnsupportedSampleFormat(
                "raster without bands".to_string(),
            ));
        }
        let expected = dimensions.0 * dimensions.1;
        for (band, samples) in bands.iter().enumerate() {
            if samples.len() != expected {
                return Err(HansenError::BandLength {
                    band,
                    len: samples.len(),
                    expected,
                });
            }
        }
        Ok(Self {
            meta: RasterMeta {
                dimensions,
                band_count: bands.len(),
                transform,
                crs,
            },
            bands: bands.into_iter().map(Vec::into_boxed_slice).collect(),
        })
    }

    pub fn meta(&self) -> &RasterMeta {
        &self.meta
    }

    /// Returns number of (columns, rows).
    pub fn dimensions(&self) -> (usize, usize) {
        self.meta.dimensions
    }

    pub fn band_count(&self) -> usize {
        self.bands.len()
    }

    pub fn transform(&self) -> &GeoTransform {
        &self.meta.transform
    }

    pub fn crs(&self) -> Option<Crs> {
        self.meta.crs
    }

    /// Returns the samples of band `index` (zero based).
    pub fn band(&self, index: usize) -> Option<&[u16]> {
        self.bands.get(index).map(AsRef::as_ref)
    }

    /// Returns a copy of the samples inside `window`.
    pub fn window(&self, window: &Window) -> Result<Self, HansenError> {
        if !window.fits(self.meta.dimensions) {
            return Err(HansenError::WindowOutOfBounds(
                *window,
                self.meta.dimensions,
            ));
        }
        let cols = self.meta.dimensions.0;
        let bands = self
            .bands
            .iter()
            .map(|band| {
                let mut out = Vec::with_capacity(window.len());
                for row in window.row_off..window.row_off + window.height {
                    let start = row * cols + window.col_off;
                    out.extend_from_slice(&band[start..start + window.width]);
                }
                out
            })
            .collect();
        Self::new(
            self.meta.transform.for_window(window),
            self.meta.crs,
            (window.width, window.height),
            bands,
        )
    }
}

impl RasterSource for Raster {
    fn meta(&self) -> &RasterMeta {
        &self.meta
    }

    fn read_window(&mut self, window: Window) -> Result<Raster, HansenError> {
        self.window(&window)
    }
}

#[cfg(test)]
mod tests {
    use super::{GeoTransform, HansenError, Raster, Window};
    use crate::Crs;
    use geo::geometry::Coord;

    fn raster() -> Raster {
        Raster::new(
            GeoTransform::new(Coord { x: 0.0, y: 90.0 }, 30.0, 30.0),
            Some(Crs::from_epsg(3116)),
            (3, 2),
            vec![vec![0, 15, 15, 0, 0, 16]],
        )
        .unwrap()
    }

    #[test]
    fn test_band_length_checked() {
        let err = Raster::new(
            GeoTransform::new(Coord { x: 0.0, y: 0.0 }, 1.0, 1.0),
            None,
            (2, 2),
            vec![vec![1, 2, 3, 4], vec![1, 2, 3]],
        )
        .unwrap_err();
        assert!(matches!(
            err,
            HansenError::BandLength {
                band: 1,
                len: 3,
                expected: 4
            }
        ));
    }

    #[test]
    fn test_band() {
        let r = raster();
        assert_eq!(r.band(0), Some(&[0, 15, 15, 0, 0, 16][..]));
        assert_eq!(r.band(1), None);
    }

    #[test]
    fn test_window() {
        let r = raster();
        let w = r.window(&Window::new(1, 0, 2, 2)).unwrap();
        assert_eq!(w.dimensions(), (2, 2));
        assert_eq!(w.band(0).unwrap(), &[15, 15, 0, 16]);
        assert_eq!(w.transform().origin, Coord { x: 30.0, y: 90.0 });
        assert_eq!(w.crs(), r.crs());
        assert!(r.window(&Window::new(2, 0, 2, 1)).is_err());
    }
}
