use crate::{AreaOfInterest, LossError};
use geo::{
    geometry::{Point, Rect},
    Contains, Intersects,
};
use hansen::{Raster, RasterSource, Window};
use log::debug;

/// The raster subset over the smallest window covering an area of
/// interest.
#[derive(Debug, Clone, PartialEq)]
pub struct ClipResult {
    /// Samples of every band inside `window`.
    pub raster: Raster,

    /// Location of `raster` within the source raster.
    pub window: Window,

    /// Row-major, one entry per pixel of `raster`; `true` when the
    /// pixel center lies inside the area of interest.
    pub inside: Vec<bool>,

    /// The area of interest expressed in the raster's CRS.
    pub aoi: AreaOfInterest,
}

impl ClipResult {
    /// Number of pixels inside the area of interest.
    pub fn inside_count(&self) -> usize {
        self.inside.iter().filter(|inside| **inside).count()
    }
}

/// Clips `source` to `aoi`, reprojecting `aoi` to the raster's CRS
/// first when they differ.
pub fn clip<S: RasterSource + ?Sized>(
    source: &mut S,
    aoi: &AreaOfInterest,
) -> Result<ClipResult, LossError> {
    let meta = source.meta().clone();
    let raster_crs = meta
        .crs
        .ok_or_else(|| LossError::InvalidCrs("raster has no CRS".to_string()))?;
    if aoi.crs().is_none() {
        return Err(LossError::InvalidCrs(
            "area of interest has no CRS".to_string(),
        ));
    }
    let aoi = aoi.to_crs(raster_crs)?;

    let area = aoi.area();
    if !(area.is_finite() && area > 0.0) {
        return Err(LossError::EmptyGeometry(format!(
            "area of interest has zero area in {raster_crs}"
        )));
    }
    let bounds = aoi.bounding_rect().ok_or_else(|| {
        LossError::EmptyGeometry("area of interest has no vertices".to_string())
    })?;
    let window = meta
        .transform
        .covering_window(bounds, meta.dimensions)
        .ok_or_else(|| {
            LossError::EmptyGeometry(format!(
                "area of interest {bounds:?} is outside the raster extent"
            ))
        })?;
    debug!("clip window {window:?} of {:?}", meta.dimensions);

    let raster = source.read_window(window)?;

    let (inside, runtime) = {
        let now = std::time::Instant::now();
        let inside = inside_mask(&raster, &aoi, bounds);
        (inside, now.elapsed())
    };
    debug!(
        "inside mask: {} px of {}, runtime: {runtime:?}",
        inside.iter().filter(|inside| **inside).count(),
        window.len(),
    );

    Ok(ClipResult {
        raster,
        window,
        inside,
        aoi,
    })
}

/// Tests every pixel center against the geometry. Pixels on the
/// boundary are outside.
fn inside_mask(raster: &Raster, aoi: &AreaOfInterest, bounds: Rect<f64>) -> Vec<bool> {
    let (cols, rows) = raster.dimensions();
    let transform = raster.transform();
    let geometry = aoi.geometry();
    let mut inside = Vec::with_capacity(cols * rows);
    for row in 0..rows {
        for col in 0..cols {
            let center = Point::from(transform.pixel_center(col, row));
            inside.push(bounds.intersects(&center.0) && geometry.contains(&center));
        }
    }
    inside
}

#[cfg(test)]
mod tests {
    use super::clip;
    use crate::{AreaOfInterest, LossError};
    use geo::{
        geometry::{Coord, MultiPolygon, Polygon},
        polygon, Rect,
    };
    use hansen::{crs::WGS84, Crs, GeoTransform, Raster, Window};

    const BOGOTA_ZONE: Crs = Crs::from_epsg(3116);

    /// A 4x3 raster of 30 m pixels with its upper left corner at
    /// (1000000, 1000090).
    fn raster(crs: Option<Crs>) -> Raster {
        Raster::new(
            GeoTransform::new(
                Coord {
                    x: 1_000_000.0,
                    y: 1_000_090.0,
                },
                30.0,
                30.0,
            ),
            crs,
            (4, 3),
            vec![(1..=12).collect()],
        )
        .unwrap()
    }

    fn rect_aoi(x0: f64, y0: f64, x1: f64, y1: f64, crs: Option<Crs>) -> AreaOfInterest {
        let polygon: Polygon<f64> =
            Rect::new(Coord { x: x0, y: y0 }, Coord { x: x1, y: y1 }).to_polygon();
        AreaOfInterest::new(polygon, crs)
    }

    #[test]
    fn test_full_extent() {
        let mut r = raster(Some(BOGOTA_ZONE));
        let aoi = rect_aoi(
            1_000_000.0,
            1_000_000.0,
            1_000_120.0,
            1_000_090.0,
            Some(BOGOTA_ZONE),
        );
        let clipped = clip(&mut r, &aoi).unwrap();
        assert_eq!(clipped.window, Window::new(0, 0, 4, 3));
        assert_eq!(clipped.inside_count(), 12);
        assert_eq!(clipped.raster, r);
    }

    #[test]
    fn test_minimal_window() {
        let mut r = raster(Some(BOGOTA_ZONE));
        // Covers columns 1..=2 of rows 1..=2.
        let aoi = rect_aoi(
            1_000_031.0,
            1_000_001.0,
            1_000_089.0,
            1_000_059.0,
            Some(BOGOTA_ZONE),
        );
        let clipped = clip(&mut r, &aoi).unwrap();
        assert_eq!(clipped.window, Window::new(1, 1, 2, 2));
        assert_eq!(clipped.raster.band(0).unwrap(), &[6, 7, 10, 11]);
        assert_eq!(clipped.inside, vec![true; 4]);
    }

    #[test]
    fn test_center_rule() {
        let mut r = raster(Some(BOGOTA_ZONE));
        // A triangle over the top row holding the centers of pixels 0
        // and 1. It crosses pixels 2 and 3 without reaching their centers.
        let triangle: Polygon<f64> = polygon![
            (x: 1_000_000.0, y: 1_000_090.0),
            (x: 1_000_110.0, y: 1_000_090.0),
            (x: 1_000_000.0, y: 1_000_060.0),
        ];
        let aoi = AreaOfInterest::new(triangle, Some(BOGOTA_ZONE));
        let clipped = clip(&mut r, &aoi).unwrap();
        assert_eq!(clipped.window, Window::new(0, 0, 4, 1));
        assert_eq!(clipped.inside, vec![true, true, false, false]);
    }

    #[test]
    fn test_clamped_to_extent() {
        let mut r = raster(Some(BOGOTA_ZONE));
        let aoi = rect_aoi(
            999_000.0,
            1_000_030.0,
            1_000_050.0,
            1_005_000.0,
            Some(BOGOTA_ZONE),
        );
        let clipped = clip(&mut r, &aoi).unwrap();
        assert_eq!(clipped.window, Window::new(0, 0, 2, 2));
        assert_eq!(clipped.inside, vec![true, true, true, true]);
    }

    #[test]
    fn test_missing_crs() {
        let aoi = rect_aoi(0.0, 0.0, 1.0, 1.0, None);
        assert!(matches!(
            clip(&mut raster(Some(BOGOTA_ZONE)), &aoi),
            Err(LossError::InvalidCrs(_))
        ));
        let aoi = rect_aoi(0.0, 0.0, 1.0, 1.0, Some(BOGOTA_ZONE));
        assert!(matches!(
            clip(&mut raster(None), &aoi),
            Err(LossError::InvalidCrs(_))
        ));
    }

    #[test]
    fn test_empty_geometry() {
        let mut r = raster(Some(BOGOTA_ZONE));
        let outside = rect_aoi(0.0, 0.0, 10.0, 10.0, Some(BOGOTA_ZONE));
        assert!(matches!(
            clip(&mut r, &outside),
            Err(LossError::EmptyGeometry(_))
        ));
        let degenerate = rect_aoi(
            1_000_000.0,
            1_000_010.0,
            1_000_100.0,
            1_000_010.0,
            Some(BOGOTA_ZONE),
        );
        assert!(matches!(
            clip(&mut r, &degenerate),
            Err(LossError::EmptyGeometry(_))
        ));
        let nothing = AreaOfInterest::new(MultiPolygon::<f64>::new(vec![]), Some(BOGOTA_ZONE));
        assert!(matches!(
            clip(&mut r, &nothing),
            Err(LossError::EmptyGeometry(_))
        ));
    }

    #[test]
    fn test_reprojected_aoi() {
        use crate::reproject::Reprojector;

        let mut r = raster(Some(BOGOTA_ZONE));
        let native = rect_aoi(
            1_000_031.0,
            1_000_001.0,
            1_000_089.0,
            1_000_059.0,
            Some(BOGOTA_ZONE),
        );
        let geographic = Reprojector::new(BOGOTA_ZONE, WGS84)
            .unwrap()
            .multi_polygon(native.geometry())
            .unwrap();
        let aoi = AreaOfInterest::new(geographic, Some(WGS84));

        let expected = clip(&mut r, &native).unwrap();
        let clipped = clip(&mut r, &aoi).unwrap();
        assert_eq!(clipped.window, expected.window);
        assert_eq!(clipped.inside, expected.inside);
        assert_eq!(clipped.aoi.crs(), Some(BOGOTA_ZONE));
    }
}
