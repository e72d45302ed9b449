use crate::{clip, AreaOfInterest, Classification, LossCodes, LossError, YearlyLossTable};
use hansen::{GeoTiff, RasterSource};
use log::{debug, info};
use std::path::Path;

/// Nominal area of a 30 m Hansen pixel.
pub const DEFAULT_PIXEL_AREA_M2: f64 = 900.0;

/// Yearly forest loss over one area of interest.
#[derive(Debug, Clone, PartialEq)]
pub struct LossAccount {
    pub table: YearlyLossTable,
    pub classification: Classification,
    /// The area of interest in the raster's CRS.
    pub aoi: AreaOfInterest,
}

impl LossAccount {
    pub fn builder() -> LossAccountBuilder {
        LossAccountBuilder {
            years: None,
            pixel_area_m2: DEFAULT_PIXEL_AREA_M2,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct LossAccountBuilder {
    /// Inclusive calendar years.
    years: Option<(i32, i32)>,

    /// Ground area of one pixel.
    pixel_area_m2: f64,
}

impl LossAccountBuilder {
    pub fn years(mut self, year_min: i32, year_max: i32) -> Self {
        self.years = Some((year_min, year_max));
        self
    }

    pub fn pixel_area_m2(mut self, pixel_area_m2: f64) -> Self {
        self.pixel_area_m2 = pixel_area_m2;
        self
    }

    /// Clips `source` to `aoi`, then classifies and aggregates the
    /// pixels inside it.
    pub fn build<S: RasterSource + ?Sized>(
        &self,
        source: &mut S,
        aoi: &AreaOfInterest,
    ) -> Result<LossAccount, LossError> {
        let codes = self.codes()?;

        let (clipped, clip_runtime) = {
            let now = std::time::Instant::now();
            let clipped = clip(source, aoi)?;
            (clipped, now.elapsed())
        };

        let (classification, classify_runtime) = {
            let now = std::time::Instant::now();
            let classification = Classification::new(&clipped, codes)?;
            (classification, now.elapsed())
        };

        let table = YearlyLossTable::from_classification(&classification, self.pixel_area_m2);

        debug!(
            "account {}: {} px inside, clip_runtime: {clip_runtime:?}, classify_runtime: {classify_runtime:?}",
            aoi.label().unwrap_or("<unnamed>"),
            clipped.inside_count(),
        );
        if table.is_empty() {
            info!(
                "no forest loss between codes {} and {} inside {}",
                codes.start(),
                codes.end(),
                aoi.label().unwrap_or("the area of interest"),
            );
        }

        Ok(LossAccount {
            table,
            classification,
            aoi: clipped.aoi,
        })
    }

    /// Opens the GeoTIFF at `path` for the duration of one
    /// [`build`](Self::build).
    pub fn build_from_path<P: AsRef<Path>>(
        &self,
        path: P,
        aoi: &AreaOfInterest,
    ) -> Result<LossAccount, LossError> {
        // Reject bad ranges before touching the file.
        self.codes()?;
        let mut tif = GeoTiff::open(path)?;
        self.build(&mut tif, aoi)
    }

    fn codes(&self) -> Result<LossCodes, LossError> {
        let (year_min, year_max) = self.years.ok_or(LossError::Builder("years"))?;
        if !(self.pixel_area_m2.is_finite() && self.pixel_area_m2 > 0.0) {
            return Err(LossError::Builder("pixel_area_m2"));
        }
        LossCodes::from_years(year_min, year_max)
    }
}

/// Returns the yearly loss table for `aoi` over the GeoTIFF at `path`.
pub fn account_path<P: AsRef<Path>>(
    path: P,
    aoi: &AreaOfInterest,
    year_min: i32,
    year_max: i32,
) -> Result<YearlyLossTable, LossError> {
    LossAccount::builder()
        .years(year_min, year_max)
        .build_from_path(path, aoi)
        .map(|account| account.table)
}

#[cfg(test)]
mod tests {
    use super::{account_path, LossAccount};
    use crate::{AreaOfInterest, LossError, PixelClass};
    use approx::assert_relative_eq;
    use geo::geometry::{Coord, Rect};
    use hansen::{crs::WGS84, Crs, GeoTransform, Raster};
    use tempfile::tempdir;

    const BOGOTA_ZONE: Crs = Crs::from_epsg(3116);

    fn lossyear() -> Raster {
        Raster::new(
            GeoTransform::new(
                Coord {
                    x: 1_000_000.0,
                    y: 1_000_060.0,
                },
                30.0,
                30.0,
            ),
            Some(BOGOTA_ZONE),
            (3, 2),
            vec![vec![0, 15, 15, 0, 0, 16]],
        )
        .unwrap()
    }

    fn full_grid() -> AreaOfInterest {
        AreaOfInterest::new(
            Rect::new(
                Coord {
                    x: 1_000_000.0,
                    y: 1_000_000.0,
                },
                Coord {
                    x: 1_000_090.0,
                    y: 1_000_060.0,
                },
            )
            .to_polygon(),
            Some(BOGOTA_ZONE),
        )
        .with_label("AAA0001")
    }

    #[test]
    fn test_single_band() {
        let account = LossAccount::builder()
            .years(2010, 2024)
            .build(&mut lossyear(), &full_grid())
            .unwrap();
        let rows = account.table.rows();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].year, 2015);
        assert_relative_eq!(rows[0].deforestation_hectares, 0.18);
        assert_eq!(rows[1].year, 2016);
        assert_relative_eq!(rows[1].deforestation_hectares, 0.09);
        assert_eq!(
            account.classification.counts().loss,
            account.table.total_pixels()
        );

        let account = LossAccount::builder()
            .years(2000, 2010)
            .build(&mut lossyear(), &full_grid())
            .unwrap();
        assert!(account.table.is_empty());
    }

    #[test]
    fn test_stacked_without_baseline_forest() {
        let mut raster = Raster::new(
            *lossyear().transform(),
            Some(BOGOTA_ZONE),
            (3, 2),
            vec![vec![0; 6], vec![1; 6], vec![0, 15, 15, 0, 0, 16]],
        )
        .unwrap();
        for (min, max) in [(2000, 2024), (2015, 2016), (2001, 2001)] {
            let account = LossAccount::builder()
                .years(min, max)
                .build(&mut raster, &full_grid())
                .unwrap();
            assert!(account.table.is_empty());
        }
    }

    #[test]
    fn test_stacked() {
        let mut raster = Raster::new(
            *lossyear().transform(),
            Some(BOGOTA_ZONE),
            (3, 2),
            vec![
                vec![90, 90, 0, 50, 50, 50],
                vec![1, 1, 1, 0, 1, 1],
                vec![12, 15, 15, 0, 3, 16],
            ],
        )
        .unwrap();
        let account = LossAccount::builder()
            .years(2010, 2020)
            .pixel_area_m2(1_000.0)
            .build(&mut raster, &full_grid())
            .unwrap();
        let rows = account.table.rows();
        let years: Vec<i32> = rows.iter().map(|r| r.year).collect();
        assert_eq!(years, vec![2012, 2015, 2016]);
        assert_relative_eq!(account.table.total_hectares(), 0.3);
        assert_eq!(account.classification.get(1, 1), Some(PixelClass::Unclassified));
        assert_eq!(account.classification.get(0, 1), Some(PixelClass::Preserved));
    }

    #[test]
    fn test_sum_over_years() {
        let mut raster = lossyear();
        let whole = LossAccount::builder()
            .years(2010, 2024)
            .build(&mut raster, &full_grid())
            .unwrap();
        let parts: f64 = (2010..=2024)
            .map(|year| {
                LossAccount::builder()
                    .years(year, year)
                    .build(&mut raster, &full_grid())
                    .unwrap()
                    .table
                    .total_hectares()
            })
            .sum();
        assert_relative_eq!(whole.table.total_hectares(), parts, epsilon = 1e-12);
    }

    #[test]
    fn test_idempotent() {
        let builder = LossAccount::builder().years(2010, 2024);
        let a = builder.build(&mut lossyear(), &full_grid()).unwrap();
        let b = builder.build(&mut lossyear(), &full_grid()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_builder_errors() {
        assert!(matches!(
            LossAccount::builder().build(&mut lossyear(), &full_grid()),
            Err(LossError::Builder("years"))
        ));
        assert!(matches!(
            LossAccount::builder()
                .years(2024, 2010)
                .build(&mut lossyear(), &full_grid()),
            Err(LossError::InvalidRange { .. })
        ));
        assert!(matches!(
            LossAccount::builder()
                .years(2010, 2024)
                .pixel_area_m2(0.0)
                .build(&mut lossyear(), &full_grid()),
            Err(LossError::Builder("pixel_area_m2"))
        ));
        let mut two_bands = Raster::new(
            *lossyear().transform(),
            Some(BOGOTA_ZONE),
            (3, 2),
            vec![vec![0; 6], vec![0; 6]],
        )
        .unwrap();
        assert!(matches!(
            LossAccount::builder()
                .years(2010, 2024)
                .build(&mut two_bands, &full_grid()),
            Err(LossError::UnsupportedRasterLayout(2))
        ));
    }

    #[test]
    fn test_invalid_range_before_io() {
        // The path does not exist; the range is checked first.
        assert!(matches!(
            account_path("/nonexistent/loss.tif", &full_grid(), 2030, 2020),
            Err(LossError::InvalidRange { .. })
        ));
        assert!(matches!(
            account_path("/nonexistent/loss.tif", &full_grid(), 2010, 2020),
            Err(LossError::Raster(_))
        ));
    }

    #[test]
    fn test_account_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("lossyear.tif");
        lossyear().save(&path).unwrap();

        // The same grid described in geographic coordinates.
        let aoi = full_grid().to_crs(WGS84).unwrap();
        let table = account_path(&path, &aoi, 2010, 2024).unwrap();
        assert_eq!(table.total_pixels(), 3);
        assert_eq!(table.pixels_in(2015), 2);
    }
}
