mod batch;
mod config;
mod format;
mod options;
mod progress;
mod render;

use anyhow::{Context, Result};
use clap::Parser;
use config::{ReportConfig, Settings};
use deforest::{AreaOfInterest, LossAccount, ParcelSelector, YearlyLossTable};
use log::info;
use options::{Cli, Command as CliCmd, MapArgs};
use render::MapRender;
use textplots::{Chart, Plot, Shape};
#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => ReportConfig::open(path)?,
        None => ReportConfig::default(),
    };
    let settings = config.merge(&cli).resolve()?;

    match cli.cmd {
        CliCmd::Table {
            format: table_format,
            decimal_comma,
        } => {
            let account = account(&settings, &settings.selector)?;
            let mut stdout = std::io::stdout().lock();
            format::write_table(&mut stdout, &account.table, table_format, decimal_comma)
        }
        CliCmd::Plot => {
            let account = account(&settings, &settings.selector)?;
            plot_ascii(&account.table, settings.year_min, settings.year_max);
            Ok(())
        }
        CliCmd::Map(args) => map(&settings, &args),
        CliCmd::Batch(args) => batch::run(&settings, &args),
    }
}

/// Loads the parcel matching `selector` and accounts its loss.
pub fn account(settings: &Settings, selector: &ParcelSelector) -> Result<LossAccount> {
    let aoi = AreaOfInterest::from_geojson_path(&settings.parcels, selector)
        .with_context(|| format!("reading {}", settings.parcels.display()))?
        .or_crs(Some(settings.aoi_crs));
    let account = LossAccount::builder()
        .years(settings.year_min, settings.year_max)
        .pixel_area_m2(settings.pixel_area_m2)
        .build_from_path(&settings.raster, &aoi)
        .with_context(|| format!("accounting {selector}"))?;
    Ok(account)
}

fn map(settings: &Settings, args: &MapArgs) -> Result<()> {
    let account = account(settings, &settings.selector)?;
    MapRender {
        classification: &account.classification,
        aoi: &account.aoi,
        year_min: settings.year_min,
        year_max: settings.year_max,
        size: (args.width, args.height),
    }
    .save(&args.out)?;
    info!("wrote {}", args.out.display());
    if let Some(path) = &args.classification {
        account.classification.to_raster()?.save(path)?;
        info!("wrote {}", path.display());
    }
    Ok(())
}

/// Bar chart of hectares per year, zero for years without loss.
fn plot_ascii(table: &YearlyLossTable, year_min: i32, year_max: i32) {
    if table.is_empty() {
        println!("no forest loss in {year_min}-{year_max}");
        return;
    }
    let rows = table.rows();
    let first = year_min.max(deforest::BASE_YEAR + 1);
    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    let plot_data: Vec<(f32, f32)> = (first..=year_max)
        .map(|year| {
            let hectares = rows
                .iter()
                .find(|row| row.year == year)
                .map_or(0.0, |row| row.deforestation_hectares);
            (year as f32, hectares as f32)
        })
        .collect();
    #[allow(clippy::cast_precision_loss)]
    Chart::new(180, 60, first as f32 - 0.5, year_max as f32 + 0.5)
        .lineplot(&Shape::Bars(&plot_data))
        .display();
    println!("total: {:.2} ha", table.total_hectares());
}
