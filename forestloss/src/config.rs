use crate::options::Cli;
use anyhow::{anyhow, Context, Result};
use deforest::{ParcelSelector, DEFAULT_PIXEL_AREA_M2};
use hansen::{crs::WGS84, Crs};
use serde::Deserialize;
use std::{fs::File, io::BufReader, path::PathBuf};

/// Default first year of a report.
const YEAR_MIN: i32 = 2000;

/// Default last year of a report, the latest published loss year.
const YEAR_MAX: i32 = 2024;

/// Report parameters read from a JSON file.
///
/// ```json
/// {
///   "raster": "data/hansen_bogota.tif",
///   "parcels": "data/predios.geojson",
///   "lot_codigo": "AAA0149ZXCN",
///   "year_min": 2018,
///   "year_max": 2024
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReportConfig {
    pub raster: Option<PathBuf>,
    pub parcels: Option<PathBuf>,
    pub object_id: Option<String>,
    pub lot_codigo: Option<String>,
    pub aoi_epsg: Option<u32>,
    pub year_min: Option<i32>,
    pub year_max: Option<i32>,
    pub pixel_area_m2: Option<f64>,
}

impl ReportConfig {
    pub fn open(path: &std::path::Path) -> Result<Self> {
        let rdr = BufReader::new(
            File::open(path).with_context(|| format!("opening {}", path.display()))?,
        );
        serde_json::from_reader(rdr).with_context(|| format!("parsing {}", path.display()))
    }

    /// Overrides file values with those given on the command line.
    #[must_use]
    pub fn merge(self, cli: &Cli) -> Self {
        Self {
            raster: cli.raster.clone().or(self.raster),
            parcels: cli.parcels.clone().or(self.parcels),
            object_id: cli.object_id.clone().or(self.object_id),
            lot_codigo: cli.lot_codigo.clone().or(self.lot_codigo),
            aoi_epsg: cli.aoi_epsg.or(self.aoi_epsg),
            year_min: cli.year_min.or(self.year_min),
            year_max: cli.year_max.or(self.year_max),
            pixel_area_m2: cli.pixel_area.or(self.pixel_area_m2),
        }
    }

    /// Fills in defaults and checks required values.
    pub fn resolve(self) -> Result<Settings> {
        Ok(Settings {
            raster: self
                .raster
                .ok_or_else(|| anyhow!("no raster given, use --raster or the config file"))?,
            parcels: self
                .parcels
                .ok_or_else(|| anyhow!("no parcels given, use --parcels or the config file"))?,
            selector: ParcelSelector::new(self.object_id, self.lot_codigo),
            aoi_crs: self.aoi_epsg.map_or(WGS84, Crs::from_epsg),
            year_min: self.year_min.unwrap_or(YEAR_MIN),
            year_max: self.year_max.unwrap_or(YEAR_MAX),
            pixel_area_m2: self.pixel_area_m2.unwrap_or(DEFAULT_PIXEL_AREA_M2),
        })
    }
}

/// Everything a report needs.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub raster: PathBuf,
    pub parcels: PathBuf,
    pub selector: ParcelSelector,
    /// CRS of parcels which do not declare one. GeoJSON defaults to
    /// WGS 84.
    pub aoi_crs: Crs,
    pub year_min: i32,
    pub year_max: i32,
    pub pixel_area_m2: f64,
}

#[cfg(test)]
mod tests {
    use super::ReportConfig;
    use crate::options::Cli;
    use clap::Parser;
    use hansen::{crs::WGS84, Crs};
    use std::{io::Write, path::PathBuf};
    use tempfile::NamedTempFile;

    #[test]
    fn test_merge_and_resolve() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"raster": "a.tif", "parcels": "p.geojson", "lot_codigo": "AAA1", "year_min": 2018, "aoi_epsg": 3116}}"#
        )
        .unwrap();
        let config = ReportConfig::open(file.path()).unwrap();
        assert_eq!(config.year_min, Some(2018));

        let cli = Cli::try_parse_from(["forestloss", "--raster", "b.tif", "--year-min", "2020", "plot"])
            .unwrap();
        let settings = config.merge(&cli).resolve().unwrap();
        assert_eq!(settings.raster, PathBuf::from("b.tif"));
        assert_eq!(settings.parcels, PathBuf::from("p.geojson"));
        assert_eq!(settings.selector.lot_code.as_deref(), Some("AAA1"));
        assert_eq!(settings.aoi_crs, Crs::from_epsg(3116));
        assert_eq!((settings.year_min, settings.year_max), (2020, 2024));
        assert_eq!(settings.pixel_area_m2, 900.0);
    }

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from([
            "forestloss",
            "--raster",
            "b.tif",
            "--parcels",
            "p.geojson",
            "plot",
        ])
        .unwrap();
        let settings = ReportConfig::default().merge(&cli).resolve().unwrap();
        assert_eq!(settings.aoi_crs, WGS84);
        assert_eq!((settings.year_min, settings.year_max), (2000, 2024));

        let cli = Cli::try_parse_from(["forestloss", "plot"]).unwrap();
        assert!(ReportConfig::default().merge(&cli).resolve().is_err());
    }

    #[test]
    fn test_unknown_field() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"rastr": "a.tif"}}"#).unwrap();
        assert!(ReportConfig::open(file.path()).is_err());
    }
}
