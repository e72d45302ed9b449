//! Parcel boundaries.

use crate::{reproject::Reprojector, LossError};
use geo::{
    geometry::{Geometry, MultiPolygon, Polygon, Rect},
    Area, BooleanOps, BoundingRect,
};
use geojson::{Feature, GeoJson, JsonObject, JsonValue};
use hansen::Crs;
use log::{debug, warn};
use std::{fmt, fs::File, io::Read, path::Path};

/// Property names the parcel object id is published under.
const OBJECT_ID_KEYS: &[&str] = &["OBJECTID", "ObjectId", "objectid", "OBJECTID_1"];

/// Property names the cadastral lot code is published under.
const LOT_CODE_KEYS: &[&str] = &["LOT_CODIGO", "lotCodigo", "lot_codigo", "LOTCODIGO"];

/// A parcel, or union of parcels, to account loss over.
#[derive(Debug, Clone, PartialEq)]
pub struct AreaOfInterest {
    geometry: MultiPolygon<f64>,
    crs: Option<Crs>,
    label: Option<String>,
}

impl AreaOfInterest {
    pub fn new<G: Into<MultiPolygon<f64>>>(geometry: G, crs: Option<Crs>) -> Self {
        Self {
            geometry: geometry.into(),
            crs,
            label: None,
        }
    }

    /// Attaches a human readable name, e.g. the lot code.
    #[must_use]
    pub fn with_label<S: Into<String>>(mut self, label: S) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Sets the CRS if none was declared.
    #[must_use]
    pub fn or_crs(mut self, crs: Option<Crs>) -> Self {
        self.crs = self.crs.or(crs);
        self
    }

    pub fn geometry(&self) -> &MultiPolygon<f64> {
        &self.geometry
    }

    pub fn crs(&self) -> Option<Crs> {
        self.crs
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Returns the area in squared CRS units.
    pub fn area(&self) -> f64 {
        self.geometry.unsigned_area()
    }

    pub fn bounding_rect(&self) -> Option<Rect<f64>> {
        self.geometry.bounding_rect()
    }

    /// Returns this AOI expressed in `crs`.
    pub fn to_crs(&self, crs: Crs) -> Result<Self, LossError> {
        let from = self
            .crs
            .ok_or_else(|| LossError::InvalidCrs("area of interest has no CRS".to_string()))?;
        if from == crs {
            return Ok(self.clone());
        }
        debug!("reprojecting area of interest from {from} to {crs}");
        let geometry = Reprojector::new(from, crs)?.multi_polygon(&self.geometry)?;
        Ok(Self {
            geometry,
            crs: Some(crs),
            label: self.label.clone(),
        })
    }

    /// Reads the parcels in `path` matching `selector`.
    pub fn from_geojson_path<P: AsRef<Path>>(
        path: P,
        selector: &ParcelSelector,
    ) -> Result<Self, LossError> {
        Self::from_geojson(File::open(path)?, selector)
    }

    /// Reads the parcels matching `selector` from a GeoJSON document.
    ///
    /// Several matches are dissolved into their union, so edges shared
    /// between parcels lie inside the result. The CRS comes from the
    /// legacy `crs` member, when present.
    pub fn from_geojson<R: Read>(rdr: R, selector: &ParcelSelector) -> Result<Self, LossError> {
        let (features, crs) = match GeoJson::from_reader(rdr)? {
            GeoJson::FeatureCollection(fc) => {
                let crs = declared_crs(fc.foreign_members.as_ref());
                (fc.features, crs)
            }
            GeoJson::Feature(feature) => {
                let crs = declared_crs(feature.foreign_members.as_ref());
                (vec![feature], crs)
            }
            GeoJson::Geometry(geometry) => {
                let crs = declared_crs(geometry.foreign_members.as_ref());
                let feature = Feature {
                    bbox: None,
                    geometry: Some(geometry),
                    id: None,
                    properties: None,
                    foreign_members: None,
                };
                (vec![feature], crs)
            }
        };

        let matched: Vec<Feature> = features
            .into_iter()
            .filter(|f| selector.matches(f.properties.as_ref()))
            .collect();
        if matched.is_empty() {
            return Err(LossError::ParcelNotFound(selector.to_string()));
        }
        if matched.len() > 1 {
            warn!("dissolving {} parcels matching {selector}", matched.len());
        }

        let label = matched
            .iter()
            .find_map(|f| pick_property(f.properties.as_ref(), LOT_CODE_KEYS))
            .map(display_value);

        let mut polygons = Vec::new();
        for feature in matched {
            let geometry = feature.geometry.ok_or(LossError::NotPolygonal)?;
            collect_polygons(Geometry::<f64>::try_from(geometry)?, &mut polygons)?;
        }

        Ok(Self {
            geometry: dissolve(polygons),
            crs,
            label,
        })
    }
}

fn dissolve(polygons: Vec<Polygon<f64>>) -> MultiPolygon<f64> {
    let mut polygons = polygons.into_iter();
    let Some(first) = polygons.next() else {
        return MultiPolygon::new(Vec::new());
    };
    polygons.fold(MultiPolygon::new(vec![first]), |acc, polygon| {
        acc.union(&MultiPolygon::new(vec![polygon]))
    })
}

/// Chooses parcels by `(OBJECTID, LOT_CODIGO)`.
///
/// An unset key matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParcelSelector {
    pub object_id: Option<String>,
    pub lot_code: Option<String>,
}

impl ParcelSelector {
    pub fn new(object_id: Option<String>, lot_code: Option<String>) -> Self {
        Self {
            object_id,
            lot_code,
        }
    }

    pub fn matches(&self, properties: Option<&JsonObject>) -> bool {
        let check = |wanted: &Option<String>, keys: &[&str]| match wanted {
            None => true,
            Some(wanted) => pick_property(properties, keys).map_or(false, |v| value_eq(v, wanted)),
        };
        check(&self.object_id, OBJECT_ID_KEYS) && check(&self.lot_code, LOT_CODE_KEYS)
    }
}

impl fmt::Display for ParcelSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let show = |v: &Option<String>| v.clone().unwrap_or_else(|| "*".to_string());
        write!(
            f,
            "OBJECTID={}, LOT_CODIGO={}",
            show(&self.object_id),
            show(&self.lot_code)
        )
    }
}

/// Returns the first of `keys` present in `properties`, falling back
/// to a case insensitive match.
fn pick_property<'a>(properties: Option<&'a JsonObject>, keys: &[&str]) -> Option<&'a JsonValue> {
    let properties = properties?;
    keys.iter().find_map(|k| properties.get(*k)).or_else(|| {
        properties
            .iter()
            .find(|(name, _)| keys.iter().any(|k| k.eq_ignore_ascii_case(name)))
            .map(|(_, v)| v)
    })
}

/// Compares a property against a user supplied key, numerically when
/// both sides are numbers so that `138` matches `138.0`.
fn value_eq(value: &JsonValue, wanted: &str) -> bool {
    let wanted = wanted.trim();
    match value {
        JsonValue::String(s) => s.trim() == wanted,
        JsonValue::Number(n) => match (n.as_f64(), wanted.parse::<f64>()) {
            (Some(have), Ok(want)) => have == want,
            _ => n.to_string() == wanted,
        },
        _ => false,
    }
}

fn display_value(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.trim().to_string(),
        other => other.to_string(),
    }
}

/// Parses `{"crs": {"type": "name", "properties": {"name": "EPSG:3116"}}}`.
fn declared_crs(members: Option<&JsonObject>) -> Option<Crs> {
    let name = members?
        .get("crs")?
        .get("properties")?
        .get("name")?
        .as_str()?;
    match name.parse() {
        Ok(crs) => Some(crs),
        Err(e) => {
            warn!("ignoring GeoJSON crs member: {e}");
            None
        }
    }
}

fn collect_polygons(geometry: Geometry<f64>, out: &mut Vec<Polygon<f64>>) -> Result<(), LossError> {
    match geometry {
        Geometry::Polygon(p) => out.push(p),
        Geometry::MultiPolygon(mp) => out.extend(mp),
        Geometry::Rect(r) => out.push(r.to_polygon()),
        Geometry::Triangle(t) => out.push(t.to_polygon()),
        Geometry::GeometryCollection(gc) => {
            for g in gc {
                collect_polygons(g, out)?;
            }
        }
        _ => return Err(LossError::NotPolygonal),
    }
    Ok(())
}
