use crate::C;
use geo::geometry::{Coord, Rect};

/// Values this close to a whole pixel are treated as on the pixel
/// edge when computing windows.
const SNAP_PX: C = 1e-6;

/// North-up affine transform from pixel space to map space.
///
/// Pixel `(col, row)` has its upper left corner at
/// `(origin.x + col * pixel_width, origin.y - row * pixel_height)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoTransform {
    /// Map coordinate of the upper left corner of pixel `(0, 0)`.
    pub origin: Coord<C>,

    /// Pixel size along x, in CRS units.
    pub pixel_width: C,

    /// Pixel size along y, in CRS units. Always positive; rows grow
    /// southwards.
    pub pixel_height: C,
}

impl GeoTransform {
    pub fn new(origin: Coord<C>, pixel_width: C, pixel_height: C) -> Self {
        Self {
            origin,
            pixel_width,
            pixel_height,
        }
    }

    /// Returns the map coordinate at fractional pixel position
    /// `(col, row)`.
    pub fn pixel_to_coord(&self, col: C, row: C) -> Coord<C> {
        Coord {
            x: self.origin.x + col * self.pixel_width,
            y: self.origin.y - row * self.pixel_height,
        }
    }

    /// Returns the map coordinate of the center of pixel `(col, row)`.
    #[allow(clippy::cast_precision_loss)]
    pub fn pixel_center(&self, col: usize, row: usize) -> Coord<C> {
        self.pixel_to_coord(col as C + 0.5, row as C + 0.5)
    }

    /// Returns the fractional `(col, row)` position of `coord`.
    pub fn coord_to_pixel(&self, coord: Coord<C>) -> (C, C) {
        (
            (coord.x - self.origin.x) / self.pixel_width,
            (self.origin.y - coord.y) / self.pixel_height,
        )
    }

    /// Returns the transform whose origin is the upper left corner of
    /// `window`.
    #[allow(clippy::cast_precision_loss)]
    pub fn for_window(&self, window: &Window) -> Self {
        Self {
            origin: self.pixel_to_coord(window.col_off as C, window.row_off as C),
            ..*self
        }
    }

    /// Returns the map extent covered by `window`.
    #[allow(clippy::cast_precision_loss)]
    pub fn window_bounds(&self, window: &Window) -> Rect<C> {
        let ul = self.pixel_to_coord(window.col_off as C, window.row_off as C);
        let lr = self.pixel_to_coord(
            (window.col_off + window.width) as C,
            (window.row_off + window.height) as C,
        );
        Rect::new(ul, lr)
    }

    /// Returns the smallest window of a `(cols, rows)` raster
    /// covering `rect`, or `None` when they do not overlap.
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn covering_window(&self, rect: Rect<C>, (cols, rows): (usize, usize)) -> Option<Window> {
        let (c0, r0) = self.coord_to_pixel(Coord {
            x: rect.min().x,
            y: rect.max().y,
        });
        let (c1, r1) = self.coord_to_pixel(Coord {
            x: rect.max().x,
            y: rect.min().y,
        });
        let col_start = snap(c0).floor().max(0.0);
        let row_start = snap(r0).floor().max(0.0);
        let col_end = snap(c1).ceil().min(cols as C);
        let row_end = snap(r1).ceil().min(rows as C);
        if col_start >= col_end || row_start >= row_end {
            return None;
        }
        Some(Window {
            col_off: col_start as usize,
            row_off: row_start as usize,
            width: (col_end - col_start) as usize,
            height: (row_end - row_start) as usize,
        })
    }
}

fn snap(v: C) -> C {
    let rounded = v.round();
    if (v - rounded).abs() < SNAP_PX {
        rounded
    } else {
        v
    }
}

/// A rectangular region of a raster in pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Window {
    pub col_off: usize,
    pub row_off: usize,
    pub width: usize,
    pub height: usize,
}

impl Window {
    pub fn new(col_off: usize, row_off: usize, width: usize, height: usize) -> Self {
        Self {
            col_off,
            row_off,
            width,
            height,
        }
    }

    /// Returns the window spanning a whole `(cols, rows)` raster.
    pub fn full((cols, rows): (usize, usize)) -> Self {
        Self::new(0, 0, cols, rows)
    }

    /// Returns the number of pixels in this window.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.width * self.height
    }

    /// Returns true if this window lies inside a `(cols, rows)` raster.
    pub fn fits(&self, (cols, rows): (usize, usize)) -> bool {
        self.col_off + self.width <= cols && self.row_off + self.height <= rows
    }
}
