use crate::{
    config::Settings,
    options::{BatchArgs, ParcelKey},
    progress,
    render::MapRender,
};
use anyhow::{bail, Result};
use deforest::{LossAccount, YearlyLossTable};
use log::{info, warn};
use rayon::prelude::*;
use serde::Serialize;
use std::{
    fs::{self, File},
    io::BufWriter,
    path::Path,
};

/// Per parcel JSON written to `<out_dir>/<stem>.json`.
#[derive(Serialize)]
struct ParcelReport<'a> {
    object_id: Option<&'a str>,
    lot_codigo: Option<&'a str>,
    label: Option<&'a str>,
    year_min: i32,
    year_max: i32,
    pixel_area_m2: f64,
    total_hectares: f64,
    years: &'a YearlyLossTable,
}

/// One line of the summary printed to stdout.
#[derive(Debug, Serialize, PartialEq)]
pub struct BatchEntry {
    pub parcel: String,
    pub total_hectares: Option<f64>,
    pub error: Option<String>,
}

/// Accounts every parcel of `args` in parallel. Each worker opens its
/// own raster handle. A failing parcel is reported in the summary
/// without stopping the others.
pub fn run(settings: &Settings, args: &BatchArgs) -> Result<()> {
    let entries = accounts(settings, args)?;
    let failed = entries.iter().filter(|e| e.error.is_some()).count();
    serde_json::to_writer_pretty(std::io::stdout().lock(), &entries)?;
    println!();
    if failed == entries.len() {
        bail!("all {failed} parcels failed");
    }
    Ok(())
}

pub fn accounts(settings: &Settings, args: &BatchArgs) -> Result<Vec<BatchEntry>> {
    fs::create_dir_all(&args.out_dir)?;
    let pb = progress::bar("Accounting parcels".to_string(), args.parcels.len() as u64);
    let entries: Vec<BatchEntry> = args
        .parcels
        .par_iter()
        .map(|key| {
            let result = account_one(settings, args, key);
            pb.inc(1);
            match result {
                Ok(total_hectares) => BatchEntry {
                    parcel: key.stem(),
                    total_hectares: Some(total_hectares),
                    error: None,
                },
                Err(e) => {
                    warn!("{}: {e:#}", key.stem());
                    BatchEntry {
                        parcel: key.stem(),
                        total_hectares: None,
                        error: Some(format!("{e:#}")),
                    }
                }
            }
        })
        .collect();
    pb.finish_and_clear();
    Ok(entries)
}

fn account_one(settings: &Settings, args: &BatchArgs, key: &ParcelKey) -> Result<f64> {
    let account = crate::account(settings, &key.selector())?;
    let stem = key.stem();
    write_report(
        &args.out_dir.join(format!("{stem}.json")),
        settings,
        key,
        &account,
    )?;
    if !args.no_maps {
        let path = args.out_dir.join(format!("{stem}.png"));
        MapRender {
            classification: &account.classification,
            aoi: &account.aoi,
            year_min: settings.year_min,
            year_max: settings.year_max,
            size: (1200, 1000),
        }
        .save(&path)?;
        info!("wrote {}", path.display());
    }
    Ok(account.table.total_hectares())
}

fn write_report(
    path: &Path,
    settings: &Settings,
    key: &ParcelKey,
    account: &LossAccount,
) -> Result<()> {
    let report = ParcelReport {
        object_id: key.object_id.as_deref(),
        lot_codigo: key.lot_codigo.as_deref(),
        label: account.aoi.label(),
        year_min: settings.year_min,
        year_max: settings.year_max,
        pixel_area_m2: account.table.pixel_area_m2(),
        total_hectares: account.table.total_hectares(),
        years: &account.table,
    };
    serde_json::to_writer_pretty(BufWriter::new(File::create(path)?), &report)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::accounts;
    use crate::{config::Settings, options::BatchArgs};
    use approx::assert_relative_eq;
    use deforest::ParcelSelector;
    use geo::geometry::Coord;
    use hansen::{crs::WGS84, Crs, GeoTransform, Raster};
    use std::fs;
    use tempfile::tempdir;

    /// Two 60x60 m parcels side by side over a 4x2 raster of 30 m
    /// pixels in the Bogotá zone.
    const PARCELS: &str = r#"{
      "type": "FeatureCollection",
      "crs": {"type": "name", "properties": {"name": "EPSG:3116"}},
      "features": [
        {"type": "Feature",
         "properties": {"OBJECTID": 1, "LOT_CODIGO": "AAA0001"},
         "geometry": {"type": "Polygon", "coordinates": [[
           [1000000, 1000000], [1000060, 1000000], [1000060, 1000060],
           [1000000, 1000060], [1000000, 1000000]]]}},
        {"type": "Feature",
         "properties": {"OBJECTID": 2, "LOT_CODIGO": "AAA0002"},
         "geometry": {"type": "Polygon", "coordinates": [[
           [1000060, 1000000], [1000120, 1000000], [1000120, 1000060],
           [1000060, 1000060], [1000060, 1000000]]]}}
      ]
    }"#;

    #[test]
    fn test_batch() {
        let dir = tempdir().unwrap();
        let raster = dir.path().join("lossyear.tif");
        let parcels = dir.path().join("parcels.geojson");
        Raster::new(
            GeoTransform::new(
                Coord {
                    x: 1_000_000.0,
                    y: 1_000_060.0,
                },
                30.0,
                30.0,
            ),
            Some(Crs::from_epsg(3116)),
            (4, 2),
            vec![vec![15, 0, 18, 18, 15, 16, 0, 0]],
        )
        .unwrap()
        .save(&raster)
        .unwrap();
        fs::write(&parcels, PARCELS).unwrap();

        let settings = Settings {
            raster,
            parcels,
            selector: ParcelSelector::default(),
            aoi_crs: WGS84,
            year_min: 2010,
            year_max: 2024,
            pixel_area_m2: 900.0,
        };
        let args = BatchArgs {
            out_dir: dir.path().join("out"),
            no_maps: true,
            parcels: vec![
                "1:AAA0001".parse().unwrap(),
                ":AAA0002".parse().unwrap(),
                "9:".parse().unwrap(),
            ],
        };
        let entries = accounts(&settings, &args).unwrap();
        assert_eq!(entries.len(), 3);

        assert_eq!(entries[0].parcel, "1_AAA0001");
        assert_relative_eq!(entries[0].total_hectares.unwrap(), 0.27);
        assert_relative_eq!(entries[1].total_hectares.unwrap(), 0.18);
        assert!(entries[2].error.as_ref().unwrap().contains("no parcel matches"));

        let json = fs::read_to_string(args.out_dir.join("1_AAA0001.json")).unwrap();
        let report: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(report["label"], "AAA0001");
        assert_eq!(report["pixel_area_m2"], 900.0);
        assert_eq!(report["years"][0]["year"], 2015);
        assert_eq!(report["years"][1]["year"], 2016);
        assert!(!args.out_dir.join("1_AAA0001.png").exists());
    }
}
