//! PNG maps of a loss classification.

use anyhow::Result;
use deforest::{AreaOfInterest, Classification, PixelClass};
use geo::{
    geometry::{Coord, Rect},
    Centroid,
};
use plotters::{
    prelude::*,
    style::text_anchor::{HPos, Pos, VPos},
};
use std::path::Path;

/// Preserved forest.
const FOREST: RGBColor = RGBColor(89, 153, 115);
const FOREST_ALPHA: f64 = 0.45;

/// Forest lost in the period.
const LOSS: RGBColor = RGBColor(217, 41, 41);
const LOSS_ALPHA: f64 = 0.75;

/// Scale bar candidate lengths in meters.
const NICE_LENGTHS_M: [f64; 10] = [
    100.0, 200.0, 500.0, 1_000.0, 2_000.0, 5_000.0, 10_000.0, 20_000.0, 50_000.0, 100_000.0,
];

/// Largest share of the map width the scale bar may take.
const SCALE_BAR_MAX_FRAC: f64 = 0.28;
const SCALE_BAR_SEGMENTS: i32 = 4;

/// Meters per degree of longitude at the equator.
const M_PER_DEG_LON: f64 = 111_320.0;

const MARGIN: i32 = 20;
const FONT: &str = "sans-serif";
const ATTRIBUTION: &str = "Source: Hansen Global Forest Change 2024";

pub struct MapRender<'a> {
    pub classification: &'a Classification,
    /// Parcel in the classification's CRS.
    pub aoi: &'a AreaOfInterest,
    pub year_min: i32,
    pub year_max: i32,
    pub size: (u32, u32),
}

impl MapRender<'_> {
    pub fn title(&self) -> String {
        match self.aoi.label() {
            Some(label) => format!(
                "Forest loss {}-{} in {label}",
                self.year_min, self.year_max
            ),
            None => format!("Forest loss {}-{}", self.year_min, self.year_max),
        }
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let root = BitMapBackend::new(path.as_ref(), self.size).into_drawing_area();
        root.fill(&WHITE)?;
        let area = root.titled(&self.title(), (FONT, 26))?;

        let (w, h) = area.dim_in_pixel();
        let plot_px = (
            (w as i32 - 2 * MARGIN).max(1),
            (h as i32 - 2 * MARGIN).max(1),
        );
        let bounds = self
            .aoi
            .bounding_rect()
            .unwrap_or_else(|| self.classification.extent());
        let view = padded_view(bounds, f64::from(plot_px.0) / f64::from(plot_px.1));

        let mut chart = ChartBuilder::on(&area)
            .margin(MARGIN as u32)
            .build_cartesian_2d(view.min().x..view.max().x, view.min().y..view.max().y)?;

        let counts = self.classification.counts();
        if counts.is_empty() {
            let (pw, ph) = chart.plotting_area().dim_in_pixel();
            chart.plotting_area().strip_coord_spec().draw(&Text::new(
                "No forest in 2000 and/or no loss in the period",
                (pw as i32 / 2, ph as i32 / 2),
                (FONT, 18)
                    .into_font()
                    .color(&RGBColor(105, 105, 105))
                    .pos(Pos::new(HPos::Center, VPos::Center)),
            ))?;
        } else {
            chart.draw_series(self.pixels(FOREST, FOREST_ALPHA, |c| c == PixelClass::Preserved))?;
            chart.draw_series(self.pixels(LOSS, LOSS_ALPHA, |c| matches!(c, PixelClass::Loss(_))))?;
        }

        for polygon in self.aoi.geometry() {
            let rings = std::iter::once(polygon.exterior()).chain(polygon.interiors());
            chart.draw_series(rings.map(|ring| {
                PathElement::new(
                    ring.coords().map(|c| (c.x, c.y)).collect::<Vec<_>>(),
                    BLACK.stroke_width(2),
                )
            }))?;
        }
        if let (Some(label), Some(centroid)) = (self.aoi.label(), self.aoi.geometry().centroid()) {
            chart.draw_series(std::iter::once(Text::new(
                label.to_string(),
                (centroid.x(), centroid.y()),
                (FONT, 14)
                    .into_font()
                    .color(&BLACK)
                    .pos(Pos::new(HPos::Center, VPos::Center)),
            )))?;
        }

        let overlay = chart.plotting_area().strip_coord_spec();
        let (pw, ph) = overlay.dim_in_pixel();
        let (pw, ph) = (pw as i32, ph as i32);

        self.draw_legend(&overlay, pw)?;
        draw_north_arrow(&overlay)?;

        let view_width_m = (view.max().x - view.min().x)
            * meters_per_unit(self.classification.crs().map_or(false, |c| c.is_geographic()), view.center().y);
        let length_m = scale_bar_length(view_width_m);
        #[allow(clippy::cast_possible_truncation)]
        let bar_px = ((length_m / view_width_m) * f64::from(pw)).round() as i32;
        draw_scale_bar(&overlay, (MARGIN, ph - MARGIN - 10), bar_px, length_m)?;

        overlay.draw(&Text::new(
            ATTRIBUTION,
            (pw - 6, ph - 6),
            (FONT, 12)
                .into_font()
                .color(&RGBColor(105, 105, 105))
                .pos(Pos::new(HPos::Right, VPos::Bottom)),
        ))?;

        root.present()?;
        Ok(())
    }

    /// A filled map-space rectangle per pixel matching `pred`.
    fn pixels<'b>(
        &'b self,
        color: RGBColor,
        alpha: f64,
        pred: impl Fn(PixelClass) -> bool + 'b,
    ) -> impl Iterator<Item = Rectangle<(f64, f64)>> + 'b {
        let c = self.classification;
        let (cols, _) = c.dimensions();
        let transform = *c.transform();
        let style = color.mix(alpha).filled();
        c.labels()
            .iter()
            .enumerate()
            .filter(move |(_, label)| pred(**label))
            .map(move |(i, _)| {
                #[allow(clippy::cast_precision_loss)]
                let (col, row) = ((i % cols) as f64, (i / cols) as f64);
                let ul: Coord<f64> = transform.pixel_to_coord(col, row);
                let lr: Coord<f64> = transform.pixel_to_coord(col + 1.0, row + 1.0);
                Rectangle::new([(ul.x, ul.y), (lr.x, lr.y)], style)
            })
    }

    fn draw_legend<DB: DrawingBackend>(
        &self,
        area: &DrawingArea<DB, plotters::coord::Shift>,
        width: i32,
    ) -> Result<(), DrawingAreaErrorKind<DB::ErrorType>> {
        let entries = [
            (FOREST.mix(FOREST_ALPHA), format!("Forest in {}", self.year_max)),
            (
                LOSS.mix(LOSS_ALPHA),
                format!("Loss {}–{}", self.year_min, self.year_max),
            ),
        ];
        let (x0, y0) = (width - 200, 10);
        area.draw(&Rectangle::new(
            [(x0 - 8, y0 - 8), (width - 6, y0 + 52)],
            WHITE.filled(),
        ))?;
        area.draw(&Rectangle::new(
            [(x0 - 8, y0 - 8), (width - 6, y0 + 52)],
            BLACK.stroke_width(1),
        ))?;
        for (i, (color, text)) in entries.into_iter().enumerate() {
            let y = y0 + 26 * i as i32;
            area.draw(&Rectangle::new([(x0, y), (x0 + 18, y + 18)], color.filled()))?;
            area.draw(&Text::new(
                text,
                (x0 + 26, y + 9),
                (FONT, 15)
                    .into_font()
                    .color(&BLACK)
                    .pos(Pos::new(HPos::Left, VPos::Center)),
            ))?;
        }
        Ok(())
    }
}

fn draw_north_arrow<DB: DrawingBackend>(
    area: &DrawingArea<DB, plotters::coord::Shift>,
) -> Result<(), DrawingAreaErrorKind<DB::ErrorType>> {
    let (x, tip, base) = (MARGIN + 14, MARGIN + 22, MARGIN + 70);
    area.draw(&PathElement::new(vec![(x, base), (x, tip + 8)], BLACK.stroke_width(2)))?;
    area.draw(&Polygon::new(
        vec![(x, tip), (x - 7, tip + 14), (x + 7, tip + 14)],
        BLACK.filled(),
    ))?;
    area.draw(&Text::new(
        "N",
        (x, tip - 2),
        (FONT, 18)
            .into_font()
            .color(&BLACK)
            .pos(Pos::new(HPos::Center, VPos::Bottom)),
    ))
}

/// Alternating black and white segments with the total length below.
fn draw_scale_bar<DB: DrawingBackend>(
    area: &DrawingArea<DB, plotters::coord::Shift>,
    (x, y): (i32, i32),
    length_px: i32,
    length_m: f64,
) -> Result<(), DrawingAreaErrorKind<DB::ErrorType>> {
    let segment = (length_px / SCALE_BAR_SEGMENTS).max(1);
    for i in 0..SCALE_BAR_SEGMENTS {
        let corners = [(x + i * segment, y), (x + (i + 1) * segment, y + 8)];
        let fill = if i % 2 == 0 { BLACK } else { WHITE };
        area.draw(&Rectangle::new(corners, fill.filled()))?;
        area.draw(&Rectangle::new(corners, BLACK.stroke_width(1)))?;
    }
    area.draw(&Text::new(
        scale_label(length_m),
        (x + segment * SCALE_BAR_SEGMENTS / 2, y - 4),
        (FONT, 13)
            .into_font()
            .color(&BLACK)
            .pos(Pos::new(HPos::Center, VPos::Bottom)),
    ))
}

/// Returns `bounds` grown by 10% on each side, then widened along one
/// axis so that width / height equals `aspect`.
pub fn padded_view(bounds: Rect<f64>, aspect: f64) -> Rect<f64> {
    let (w, h) = (bounds.width(), bounds.height());
    // Degenerate bounds still get a visible window.
    let (w, h) = match (w > 0.0, h > 0.0) {
        (true, true) => (w, h),
        (true, false) => (w, w),
        (false, true) => (h, h),
        (false, false) => (1.0, 1.0),
    };
    let (mut w, mut h) = (w * 1.2, h * 1.2);
    if w / h < aspect {
        w = h * aspect;
    } else {
        h = w / aspect;
    }
    let c = bounds.center();
    Rect::new(
        Coord {
            x: c.x - w / 2.0,
            y: c.y - h / 2.0,
        },
        Coord {
            x: c.x + w / 2.0,
            y: c.y + h / 2.0,
        },
    )
}

/// Ground meters per CRS unit along x at latitude `lat`.
pub fn meters_per_unit(geographic: bool, lat: f64) -> f64 {
    if geographic {
        M_PER_DEG_LON * lat.to_radians().cos()
    } else {
        1.0
    }
}

/// The longest nice length no longer than the allowed share of
/// `width_m`, or the shortest one when none fits.
pub fn scale_bar_length(width_m: f64) -> f64 {
    let target = width_m.max(1e-6) * SCALE_BAR_MAX_FRAC;
    NICE_LENGTHS_M
        .iter()
        .rev()
        .copied()
        .find(|len| *len <= target)
        .unwrap_or(NICE_LENGTHS_M[0])
}

pub fn scale_label(length_m: f64) -> String {
    if length_m >= 1_000.0 {
        format!("{} km", length_m / 1_000.0)
    } else {
        format!("{length_m} m")
    }
}
