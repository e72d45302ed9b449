//! Annual forest-loss accounting over parcels.
//!
//! A parcel boundary is clipped against a Hansen raster, each pixel
//! inside it is labelled preserved, lost in a given year or
//! unclassified, and the lost pixels are summed per year into
//! hectares.
//!
//! ```no_run
//! use deforest::{AreaOfInterest, LossAccount, ParcelSelector};
//!
//! let selector = ParcelSelector::new(Some("1201".into()), None);
//! let aoi = AreaOfInterest::from_geojson_path("parcels.geojson", &selector)?;
//! let account = LossAccount::builder()
//!     .years(2010, 2024)
//!     .build_from_path("hansen.tif", &aoi)?;
//! for row in account.table.iter() {
//!     println!("{}: {:.2} ha", row.year, row.deforestation_hectares);
//! }
//! # Ok::<(), deforest::LossError>(())
//! ```

mod account;
mod aoi;
mod classify;
mod clip;
mod error;
mod reproject;
mod table;
mod years;

pub use crate::{
    account::{account_path, LossAccount, LossAccountBuilder, DEFAULT_PIXEL_AREA_M2},
    aoi::{AreaOfInterest, ParcelSelector},
    classify::{BandLayout, ClassCounts, Classification, PixelClass},
    clip::{clip, ClipResult},
    error::LossError,
    reproject::Reprojector,
    table::{YearlyLoss, YearlyLossTable},
    years::{LossCodes, BASE_YEAR},
};
pub use hansen;
