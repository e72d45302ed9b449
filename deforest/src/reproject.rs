//! Coordinate reprojection between known EPSG systems.

use crate::LossError;
use geo::{geometry::Coord, MapCoords, MultiPolygon};
use hansen::Crs;
use proj4rs::{proj::Proj, transform::transform};

/// A reusable transformation from one CRS to another.
pub struct Reprojector {
    from: Crs,
    to: Crs,
    source: Proj,
    target: Proj,
}

impl Reprojector {
    pub fn new(from: Crs, to: Crs) -> Result<Self, LossError> {
        let source = Self::proj(from, from, to)?;
        let target = Self::proj(to, from, to)?;
        Ok(Self {
            from,
            to,
            source,
            target,
        })
    }

    /// Transforms a single coordinate.
    pub fn coord(&self, Coord { x, y }: Coord<f64>) -> Result<Coord<f64>, LossError> {
        let mut point = if self.from.is_geographic() {
            (x.to_radians(), y.to_radians(), 0.0)
        } else {
            (x, y, 0.0)
        };
        transform(&self.source, &self.target, &mut point).map_err(|e| self.error(format!("{e:?}")))?;
        let (x, y, _) = point;
        let out = if self.to.is_geographic() {
            Coord {
                x: x.to_degrees(),
                y: y.to_degrees(),
            }
        } else {
            Coord { x, y }
        };
        if out.x.is_finite() && out.y.is_finite() {
            Ok(out)
        } else {
            Err(self.error(format!("non finite result for ({x}, {y})")))
        }
    }

    /// Transforms every vertex of `geometry`.
    pub fn multi_polygon(
        &self,
        geometry: &MultiPolygon<f64>,
    ) -> Result<MultiPolygon<f64>, LossError> {
        geometry.try_map_coords(|c| self.coord(c))
    }
}

/// Private API
impl Reprojector {
    fn proj(crs: Crs, from: Crs, to: Crs) -> Result<Proj, LossError> {
        let def = crs.proj_string().ok_or_else(|| LossError::Projection {
            from,
            to,
            reason: format!("{crs} has no known definition"),
        })?;
        Proj::from_proj_string(def).map_err(|e| LossError::Projection {
            from,
            to,
            reason: format!("{e:?}"),
        })
    }

    fn error(&self, reason: String) -> LossError {
        LossError::Projection {
            from: self.from,
            to: self.to,
            reason,
        }
    }
}
