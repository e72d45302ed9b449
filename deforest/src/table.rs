use crate::{Classification, LossCodes, PixelClass, BASE_YEAR};
use serde::Serialize;
use std::collections::BTreeMap;

/// Square meters per hectare.
const M2_PER_HA: f64 = 10_000.0;

/// Forest lost in one calendar year.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct YearlyLoss {
    pub year: i32,
    pub deforestation_hectares: f64,
}

/// Loss per year, ascending by year. Only years with loss appear.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct YearlyLossTable {
    /// Loss pixel count per `lossyear` code.
    pixels: BTreeMap<u16, usize>,
    pixel_area_m2: f64,
}

impl YearlyLossTable {
    /// Aggregates the loss labels of `classification`.
    pub fn from_classification(classification: &Classification, pixel_area_m2: f64) -> Self {
        let mut pixels = BTreeMap::new();
        for label in classification.labels() {
            if let PixelClass::Loss(code) = label {
                *pixels.entry(*code).or_insert(0) += 1;
            }
        }
        Self {
            pixels,
            pixel_area_m2,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    /// Number of years with loss.
    pub fn len(&self) -> usize {
        self.pixels.len()
    }

    pub fn pixel_area_m2(&self) -> f64 {
        self.pixel_area_m2
    }

    #[allow(clippy::cast_precision_loss)]
    pub fn iter(&self) -> impl Iterator<Item = YearlyLoss> + '_ {
        self.pixels.iter().map(|(&code, &count)| YearlyLoss {
            year: LossCodes::year(code),
            deforestation_hectares: count as f64 * self.pixel_area_m2 / M2_PER_HA,
        })
    }

    pub fn rows(&self) -> Vec<YearlyLoss> {
        self.iter().collect()
    }

    /// Loss pixel count for `year`, zero when absent.
    pub fn pixels_in(&self, year: i32) -> usize {
        u16::try_from(year - BASE_YEAR)
            .ok()
            .and_then(|code| self.pixels.get(&code).copied())
            .unwrap_or(0)
    }

    pub fn total_pixels(&self) -> usize {
        self.pixels.values().sum()
    }

    #[allow(clippy::cast_precision_loss)]
    pub fn total_hectares(&self) -> f64 {
        self.total_pixels() as f64 * self.pixel_area_m2 / M2_PER_HA
    }
}

impl Serialize for YearlyLossTable {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::{YearlyLoss, YearlyLossTable};
    use crate::{clip, AreaOfInterest, Classification, LossCodes};
    use approx::assert_relative_eq;
    use geo::geometry::{Coord, Rect};
    use hansen::{Crs, GeoTransform, Raster};

    fn table(lossyear: Vec<u16>, year_min: i32, year_max: i32) -> YearlyLossTable {
        let crs = Some(Crs::from_epsg(3116));
        let mut raster = Raster::new(
            GeoTransform::new(Coord { x: 0.0, y: 60.0 }, 30.0, 30.0),
            crs,
            (3, 2),
            vec![lossyear],
        )
        .unwrap();
        let aoi = AreaOfInterest::new(
            Rect::new(Coord { x: 0.0, y: 0.0 }, Coord { x: 90.0, y: 60.0 }).to_polygon(),
            crs,
        );
        let clipped = clip(&mut raster, &aoi).unwrap();
        let codes = LossCodes::from_years(year_min, year_max).unwrap();
        YearlyLossTable::from_classification(
            &Classification::new(&clipped, codes).unwrap(),
            900.0,
        )
    }

    #[test]
    fn test_aggregation() {
        let t = table(vec![0, 15, 15, 0, 0, 16], 2010, 2024);
        let rows = t.rows();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].year, 2015);
        assert_relative_eq!(rows[0].deforestation_hectares, 0.18);
        assert_eq!(rows[1].year, 2016);
        assert_relative_eq!(rows[1].deforestation_hectares, 0.09);
        assert_eq!(t.total_pixels(), 3);
        assert_relative_eq!(t.total_hectares(), 0.27);
        assert_eq!(t.pixels_in(2015), 2);
        assert_eq!(t.pixels_in(1999), 0);
    }

    #[test]
    fn test_ascending() {
        let t = table(vec![24, 3, 11, 3, 1, 24], 2000, 2024);
        let years: Vec<i32> = t.iter().map(|row| row.year).collect();
        assert_eq!(years, vec![2001, 2003, 2011, 2024]);
    }

    #[test]
    fn test_out_of_range_is_empty() {
        let t = table(vec![0, 15, 15, 0, 0, 16], 2000, 2010);
        assert!(t.is_empty());
        assert_eq!(t.total_hectares(), 0.0);
    }

    #[test]
    fn test_serialize() {
        let t = table(vec![0, 15, 15, 0, 0, 16], 2015, 2015);
        assert_eq!(
            serde_json::to_string(&t).unwrap(),
            r#"[{"year":2015,"deforestation_hectares":0.18}]"#
        );
        assert_eq!(
            t.rows(),
            vec![YearlyLoss {
                year: 2015,
                deforestation_hectares: 0.18
            }]
        );
    }
}
