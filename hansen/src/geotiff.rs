//! GeoTIFF reading and writing.
//!
//! Only what Hansen Global Forest Change products need is supported:
//! north-up, chunky (pixel interleaved) 8 or 16 bit unsigned samples,
//! strips or tiles, georeferenced with `ModelPixelScale` +
//! `ModelTiepoint` or a non-rotated `ModelTransformation`.
//!
//! # References
//!
//! 1. [Hansen GFC data](https://storage.googleapis.com/earthenginepartners-hansen/GFC-2024-v1.12/download.html)
//! 1. [GeoTIFF 1.1](https://docs.ogc.org/is/19-008r4/19-008r4.html)

use crate::{Crs, GeoTransform, HansenError, Raster, RasterMeta, RasterSource, Window};
use geo::geometry::Coord;
use log::debug;
use std::{
    fs::File,
    io::{BufReader, BufWriter, Seek, Write},
    path::Path,
};
use tiff::{
    decoder::{Decoder, DecodingResult},
    encoder::{colortype, TiffEncoder, TiffValue},
    tags::Tag,
    ColorType,
};

const GT_MODEL_TYPE_KEY: u16 = 1024;
const GT_RASTER_TYPE_KEY: u16 = 1025;
const GEOGRAPHIC_TYPE_KEY: u16 = 2048;
const PROJECTED_CS_TYPE_KEY: u16 = 3072;
const MODEL_TYPE_PROJECTED: u16 = 1;
const MODEL_TYPE_GEOGRAPHIC: u16 = 2;
const RASTER_PIXEL_IS_AREA: u16 = 1;
const USER_DEFINED: u32 = 32767;
const PLANAR_SEPARATE: u32 = 2;
const PHOTOMETRIC_RGB: u32 = 2;

/// Target strip size when writing, matching GDAL's default.
const STRIP_BYTES: usize = 8192;

/// An open GeoTIFF file.
///
/// The file handle lives as long as this value; drop it to close the
/// file.
pub struct GeoTiff {
    decoder: Decoder<BufReader<File>>,
    meta: RasterMeta,
}

impl GeoTiff {
    /// Opens the GeoTIFF at `path` and reads its metadata.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, HansenError> {
        let path = path.as_ref();
        let mut decoder = Decoder::new(BufReader::new(File::open(path)?))?;

        let (cols, rows) = decoder.dimensions()?;

        // `colortype()` fails on grayscale images with several samples.
        let samples = decoder
            .find_tag(Tag::SamplesPerPixel)?
            .map(|v| v.into_u32())
            .transpose()?
            .unwrap_or(1);
        let photometric = decoder
            .find_tag(Tag::PhotometricInterpretation)?
            .map(|v| v.into_u32())
            .transpose()?;
        if samples > 1 && photometric != Some(PHOTOMETRIC_RGB) {
            return Err(HansenError::UnsupportedSampleFormat(format!(
                "{samples} samples per pixel with photometric interpretation {photometric:?}, \
                 write band stacks as RGB"
            )));
        }

        let band_count = match decoder.colortype()? {
            ColorType::Gray(8 | 16) => 1,
            ColorType::RGB(8 | 16) => 3,
            other => return Err(HansenError::UnsupportedSampleFormat(format!("{other:?}"))),
        };

        if let Some(planar) = decoder.find_tag(Tag::PlanarConfiguration)? {
            if planar.into_u32()? == PLANAR_SEPARATE {
                return Err(HansenError::UnsupportedSampleFormat(
                    "planar configuration".to_string(),
                ));
            }
        }

        let transform = read_transform(&mut decoder, path)?;
        let crs = read_crs(&mut decoder)?;

        debug!(
            "opened {path:?}; dims: {cols}x{rows}, bands: {band_count}, crs: {crs:?}, transform: {transform:?}"
        );

        Ok(Self {
            decoder,
            meta: RasterMeta {
                dimensions: (cols as usize, rows as usize),
                band_count,
                transform,
                crs,
            },
        })
    }
}

impl RasterSource for GeoTiff {
    fn meta(&self) -> &RasterMeta {
        &self.meta
    }

    /// Decodes only the strips or tiles which overlap `window`.
    #[allow(clippy::cast_possible_truncation)]
    fn read_window(&mut self, window: Window) -> Result<Raster, HansenError> {
        let RasterMeta {
            dimensions,
            band_count,
            transform,
            crs,
        } = self.meta.clone();

        if !window.fits(dimensions) {
            return Err(HansenError::WindowOutOfBounds(window, dimensions));
        }

        let mut bands = vec![vec![0_u16; window.len()]; band_count];

        if window.len() > 0 {
            let (chunk_w, chunk_h) = {
                let (w, h) = self.decoder.chunk_dimensions();
                (w as usize, h as usize)
            };
            let chunks_across = dimensions.0.div_ceil(chunk_w);
            let row_end = window.row_off + window.height;
            let col_end = window.col_off + window.width;

            for chunk_row in window.row_off / chunk_h..=(row_end - 1) / chunk_h {
                for chunk_col in window.col_off / chunk_w..=(col_end - 1) / chunk_w {
                    let index = (chunk_row * chunks_across + chunk_col) as u32;
                    let (data_w, data_h) = {
                        let (w, h) = self.decoder.chunk_data_dimensions(index);
                        (w as usize, h as usize)
                    };
                    let data = widen(self.decoder.read_chunk(index)?)?;

                    let (x0, y0) = (chunk_col * chunk_w, chunk_row * chunk_h);
                    for row in window.row_off.max(y0)..row_end.min(y0 + data_h) {
                        for col in window.col_off.max(x0)..col_end.min(x0 + data_w) {
                            let src = ((row - y0) * data_w + (col - x0)) * band_count;
                            let dst = (row - window.row_off) * window.width + (col - window.col_off);
                            for (band, samples) in bands.iter_mut().enumerate() {
                                samples[dst] = data[src + band];
                            }
                        }
                    }
                }
            }
        }

        Raster::new(
            transform.for_window(&window),
            crs,
            (window.width, window.height),
            bands,
        )
    }
}

impl Raster {
    /// Reads the whole GeoTIFF at `path` into memory.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, HansenError> {
        let mut tif = GeoTiff::open(path)?;
        let window = Window::full(tif.meta().dimensions);
        tif.read_window(window)
    }

    /// Writes this raster as a GeoTIFF.
    ///
    /// Samples are stored as 8 bit when they all fit, 16 bit otherwise.
    /// Only one or three band rasters can be written.
    #[allow(clippy::cast_possible_truncation)]
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), HansenError> {
        if !matches!(self.band_count(), 1 | 3) {
            return Err(HansenError::UnsupportedSampleFormat(format!(
                "cannot write {} band GeoTIFF",
                self.band_count()
            )));
        }
        let fits_u8 = (0..self.band_count())
            .filter_map(|b| self.band(b))
            .all(|band| band.iter().all(|v| *v <= u16::from(u8::MAX)));
        let interleaved = self.interleave();
        let mut encoder = TiffEncoder::new(BufWriter::new(File::create(path.as_ref())?))?;

        match (self.band_count(), fits_u8) {
            (1, true) => {
                let data: Vec<u8> = interleaved.iter().map(|v| *v as u8).collect();
                self.write_image::<_, colortype::Gray8>(&mut encoder, &data)
            }
            (1, false) => self.write_image::<_, colortype::Gray16>(&mut encoder, &interleaved),
            (3, true) => {
                let data: Vec<u8> = interleaved.iter().map(|v| *v as u8).collect();
                self.write_image::<_, colortype::RGB8>(&mut encoder, &data)
            }
            _ => self.write_image::<_, colortype::RGB16>(&mut encoder, &interleaved),
        }?;
        debug!("wrote {:?}", path.as_ref());
        Ok(())
    }
}

/// Private API
impl Raster {
    fn interleave(&self) -> Vec<u16> {
        let n = self.band_count();
        let (cols, rows) = self.dimensions();
        let mut out = Vec::with_capacity(cols * rows * n);
        for index in 0..cols * rows {
            for band in 0..n {
                out.push(self.band(band).map_or(0, |b| b[index]));
            }
        }
        out
    }

    #[allow(clippy::cast_possible_truncation)]
    fn write_image<W, T>(
        &self,
        encoder: &mut TiffEncoder<W>,
        data: &[T::Inner],
    ) -> Result<(), HansenError>
    where
        W: Write + Seek,
        T: colortype::ColorType,
        [T::Inner]: TiffValue,
    {
        let (cols, rows) = self.dimensions();
        let mut image = encoder.new_image::<T>(cols as u32, rows as u32)?;

        let row_bytes = (cols * self.band_count() * std::mem::size_of::<T::Inner>()).max(1);
        image.rows_per_strip((STRIP_BYTES / row_bytes).max(1) as u32)?;

        let GeoTransform {
            origin,
            pixel_width,
            pixel_height,
        } = *self.transform();
        image
            .encoder()
            .write_tag(Tag::ModelPixelScaleTag, &[pixel_width, pixel_height, 0.0][..])?;
        image.encoder().write_tag(
            Tag::ModelTiepointTag,
            &[0.0, 0.0, 0.0, origin.x, origin.y, 0.0][..],
        )?;
        image
            .encoder()
            .write_tag(Tag::GeoKeyDirectoryTag, &geo_keys(self.crs())[..])?;
        image.write_data(data)?;
        Ok(())
    }
}

fn geo_keys(crs: Option<Crs>) -> Vec<u16> {
    let mut keys = vec![
        1,
        1,
        0,
        1,
        GT_RASTER_TYPE_KEY,
        0,
        1,
        RASTER_PIXEL_IS_AREA,
    ];
    if let Some((crs, code)) = crs.and_then(|crs| Some((crs, u16::try_from(crs.epsg()).ok()?))) {
        let (model, key) = if crs.is_geographic() {
            (MODEL_TYPE_GEOGRAPHIC, GEOGRAPHIC_TYPE_KEY)
        } else {
            (MODEL_TYPE_PROJECTED, PROJECTED_CS_TYPE_KEY)
        };
        keys.extend_from_slice(&[GT_MODEL_TYPE_KEY, 0, 1, model, key, 0, 1, code]);
        keys[3] = 3;
        // Keys must be sorted by id.
        let mut entries: Vec<[u16; 4]> = keys[4..]
            .chunks_exact(4)
            .map(|e| [e[0], e[1], e[2], e[3]])
            .collect();
        entries.sort_unstable_by_key(|e| e[0]);
        keys.truncate(4);
        keys.extend(entries.into_iter().flatten());
    }
    keys
}

fn widen(result: DecodingResult) -> Result<Vec<u16>, HansenError> {
    match result {
        DecodingResult::U8(samples) => Ok(samples.into_iter().map(u16::from).collect()),
        DecodingResult::U16(samples) => Ok(samples),
        _ => Err(HansenError::UnsupportedSampleFormat(
            "non 8/16 bit unsigned samples".to_string(),
        )),
    }
}

fn read_transform<R: std::io::Read + Seek>(
    decoder: &mut Decoder<R>,
    path: &Path,
) -> Result<GeoTransform, HansenError> {
    let scale = decoder
        .find_tag(Tag::ModelPixelScaleTag)?
        .map(tiff::decoder::ifd::Value::into_f64_vec)
        .transpose()?;
    let tiepoint = decoder
        .find_tag(Tag::ModelTiepointTag)?
        .map(tiff::decoder::ifd::Value::into_f64_vec)
        .transpose()?;

    if let (Some(scale), Some(tie)) = (scale, tiepoint) {
        if scale.len() >= 2 && tie.len() >= 6 {
            let (sx, sy) = (scale[0], scale[1]);
            let (i, j, x, y) = (tie[0], tie[1], tie[3], tie[4]);
            return Ok(GeoTransform::new(
                Coord {
                    x: x - i * sx,
                    y: y + j * sy,
                },
                sx,
                sy,
            ));
        }
    }

    if let Some(m) = decoder
        .find_tag(Tag::ModelTransformationTag)?
        .map(tiff::decoder::ifd::Value::into_f64_vec)
        .transpose()?
    {
        if m.len() >= 8 {
            let (a, b, d, e, f, h) = (m[0], m[1], m[3], m[4], m[5], m[7]);
            if b != 0.0 || e != 0.0 || f >= 0.0 {
                return Err(HansenError::Rotated);
            }
            return Ok(GeoTransform::new(Coord { x: d, y: h }, a, -f));
        }
    }

    Err(HansenError::MissingGeoreference(path.to_owned()))
}

/// Returns the EPSG code declared in the GeoKey directory, if any.
fn read_crs<R: std::io::Read + Seek>(decoder: &mut Decoder<R>) -> Result<Option<Crs>, HansenError> {
    let Some(directory) = decoder.find_tag(Tag::GeoKeyDirectoryTag)? else {
        return Ok(None);
    };
    let directory = directory.into_u32_vec()?;
    let mut geographic = None;
    let mut projected = None;
    for entry in directory.get(4..).unwrap_or_default().chunks_exact(4) {
        let (key, location, value) = (entry[0], entry[1], entry[3]);
        if location != 0 || value == USER_DEFINED {
            continue;
        }
        match u16::try_from(key) {
            Ok(GEOGRAPHIC_TYPE_KEY) => geographic = Some(Crs::from_epsg(value)),
            Ok(PROJECTED_CS_TYPE_KEY) => projected = Some(Crs::from_epsg(value)),
            _ => {}
        }
    }
    Ok(projected.or(geographic))
}
