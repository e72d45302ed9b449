use anyhow::{anyhow, Error as AnyError};
use clap::{Args, Parser, Subcommand, ValueEnum};
use deforest::ParcelSelector;
use std::{path::PathBuf, str::FromStr};

/// Yearly forest loss over cadastral parcels from a Hansen Global
/// Forest Change raster.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// JSON report configuration. Flags override its values.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Hansen GeoTIFF, either `lossyear` alone or the stacked
    /// `treecover2000,loss,lossyear` bands.
    #[arg(short, long)]
    pub raster: Option<PathBuf>,

    /// GeoJSON parcel boundaries.
    #[arg(short, long)]
    pub parcels: Option<PathBuf>,

    /// Parcel `OBJECTID`.
    #[arg(long)]
    pub object_id: Option<String>,

    /// Parcel `LOT_CODIGO`.
    #[arg(long)]
    pub lot_codigo: Option<String>,

    /// EPSG code of the parcels when the GeoJSON does not declare one.
    #[arg(long)]
    pub aoi_epsg: Option<u32>,

    /// First year of the period.
    #[arg(long)]
    pub year_min: Option<i32>,

    /// Last year of the period, inclusive.
    #[arg(long)]
    pub year_max: Option<i32>,

    /// Ground area of one pixel in m².
    #[arg(long)]
    pub pixel_area: Option<f64>,

    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Print the yearly loss table.
    Table {
        #[arg(short, long, value_enum, default_value_t = TableFormat::Display)]
        format: TableFormat,

        /// Write hectares as `1.234,56`.
        #[arg(long, default_value_t = false)]
        decimal_comma: bool,
    },

    /// Plot yearly loss to the terminal.
    Plot,

    /// Render the classification to a PNG map.
    Map(MapArgs),

    /// Account many parcels in parallel.
    Batch(BatchArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TableFormat {
    Display,
    Csv,
    Json,
}

#[derive(Debug, Clone, Args)]
pub struct MapArgs {
    /// PNG file path.
    #[arg(short, long)]
    pub out: PathBuf,

    /// Also write the classification as a GeoTIFF (0 unclassified,
    /// 1 preserved, 2 loss).
    #[arg(long)]
    pub classification: Option<PathBuf>,

    /// Image width in pixels.
    #[arg(long, default_value_t = 1200)]
    pub width: u32,

    /// Image height in pixels.
    #[arg(long, default_value_t = 1000)]
    pub height: u32,
}

#[derive(Debug, Clone, Args)]
pub struct BatchArgs {
    /// Output directory, one JSON table and PNG map per parcel.
    #[arg(short, long)]
    pub out_dir: PathBuf,

    /// Skip the PNG maps.
    #[arg(long, default_value_t = false)]
    pub no_maps: bool,

    /// Parcels as "OBJECTID:LOT_CODIGO"; either side may be empty.
    #[arg(required = true)]
    pub parcels: Vec<ParcelKey>,
}

/// A parcel selected by "OBJECTID:LOT_CODIGO".
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParcelKey {
    pub object_id: Option<String>,
    pub lot_codigo: Option<String>,
}

impl ParcelKey {
    pub fn selector(&self) -> ParcelSelector {
        ParcelSelector::new(self.object_id.clone(), self.lot_codigo.clone())
    }

    /// A file name stem for outputs of this parcel.
    pub fn stem(&self) -> String {
        let part = |s: &Option<String>| {
            s.as_deref()
                .unwrap_or("any")
                .chars()
                .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
                .collect::<String>()
        };
        format!("{}_{}", part(&self.object_id), part(&self.lot_codigo))
    }
}

impl FromStr for ParcelKey {
    type Err = AnyError;
    fn from_str(s: &str) -> Result<Self, AnyError> {
        let (object_id, lot_codigo) = s
            .split_once(':')
            .ok_or_else(|| anyhow!("not a valid OBJECTID:LOT_CODIGO pair"))?;
        let non_empty = |s: &str| {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        };
        let key = Self {
            object_id: non_empty(object_id),
            lot_codigo: non_empty(lot_codigo),
        };
        if key.object_id.is_none() && key.lot_codigo.is_none() {
            return Err(anyhow!("empty parcel key"));
        }
        Ok(key)
    }
}
