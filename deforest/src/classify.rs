use crate::{ClipResult, LossCodes, LossError};
use geo::geometry::Rect;
use hansen::{Crs, GeoTransform, HansenError, Raster, Window};
use log::debug;

/// How the loss layers are arranged in a raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BandLayout {
    /// `lossyear` only.
    LossYear,

    /// `treecover2000`, `loss`, `lossyear`, in that order.
    Stacked,
}

impl BandLayout {
    pub fn from_band_count(band_count: usize) -> Result<Self, LossError> {
        match band_count {
            1 => Ok(Self::LossYear),
            3 => Ok(Self::Stacked),
            n => Err(LossError::UnsupportedRasterLayout(n)),
        }
    }
}

/// The decoded samples of one pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Sample {
    /// Baseline canopy cover; `None` for [`BandLayout::LossYear`].
    treecover: Option<u16>,
    /// Loss flag; `None` for [`BandLayout::LossYear`].
    loss: Option<u16>,
    lossyear: u16,
}

impl Sample {
    fn had_forest(&self) -> bool {
        self.treecover.map_or(true, |tc| tc > 0)
    }

    fn lost(&self) -> bool {
        self.loss.map_or(self.lossyear != 0, |loss| loss == 1)
    }

    fn classify(&self, codes: &LossCodes) -> PixelClass {
        if !self.had_forest() {
            return PixelClass::Unclassified;
        }
        if self.lost() && self.lossyear != 0 && codes.contains(self.lossyear) {
            return PixelClass::Loss(self.lossyear);
        }
        let standing = match self.loss {
            Some(loss) => loss == 0,
            None => self.lossyear == 0,
        };
        if standing || self.lossyear > codes.end() {
            PixelClass::Preserved
        } else {
            PixelClass::Unclassified
        }
    }
}

/// The label of a single pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelClass {
    /// Forest standing at the end of the period.
    Preserved,

    /// Forest lost in the year encoded by the code.
    Loss(u16),

    /// Outside the area of interest, never forested, or lost before
    /// the period.
    Unclassified,
}

impl PixelClass {
    /// Sample value used when writing a classification raster.
    pub fn value(self) -> u16 {
        match self {
            Self::Unclassified => 0,
            Self::Preserved => 1,
            Self::Loss(_) => 2,
        }
    }
}

/// Per-pixel counts of a [`Classification`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClassCounts {
    pub preserved: usize,
    pub loss: usize,
    pub unclassified: usize,
}

impl ClassCounts {
    /// True when no pixel is preserved or lost.
    pub fn is_empty(&self) -> bool {
        self.preserved == 0 && self.loss == 0
    }
}

/// Labels for every pixel of a clip window.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    labels: Vec<PixelClass>,
    dimensions: (usize, usize),
    transform: GeoTransform,
    crs: Option<Crs>,
}

impl Classification {
    /// Labels every pixel of `clip` for the loss years in `codes`.
    pub fn new(clip: &ClipResult, codes: LossCodes) -> Result<Self, LossError> {
        let raster = &clip.raster;
        let layout = BandLayout::from_band_count(raster.band_count())?;
        let now = std::time::Instant::now();

        let band = |i: usize| {
            raster
                .band(i)
                .ok_or(LossError::UnsupportedRasterLayout(raster.band_count()))
        };
        let labels: Vec<PixelClass> = match layout {
            BandLayout::LossYear => {
                let lossyear = band(0)?;
                clip.inside
                    .iter()
                    .zip(lossyear)
                    .map(|(&inside, &lossyear)| {
                        label(
                            inside,
                            Sample {
                                treecover: None,
                                loss: None,
                                lossyear,
                            },
                            &codes,
                        )
                    })
                    .collect()
            }
            BandLayout::Stacked => {
                let (treecover, loss, lossyear) = (band(0)?, band(1)?, band(2)?);
                clip.inside
                    .iter()
                    .enumerate()
                    .map(|(i, &inside)| {
                        label(
                            inside,
                            Sample {
                                treecover: Some(treecover[i]),
                                loss: Some(loss[i]),
                                lossyear: lossyear[i],
                            },
                            &codes,
                        )
                    })
                    .collect()
            }
        };

        let classification = Self {
            labels,
            dimensions: raster.dimensions(),
            transform: *raster.transform(),
            crs: raster.crs(),
        };
        debug!(
            "{layout:?} classification of {:?}: {:?}, runtime: {:?}",
            clip.window,
            classification.counts(),
            now.elapsed()
        );
        Ok(classification)
    }

    /// Row-major labels, northernmost row first.
    pub fn labels(&self) -> &[PixelClass] {
        &self.labels
    }

    pub fn get(&self, col: usize, row: usize) -> Option<PixelClass> {
        let (cols, rows) = self.dimensions;
        (col < cols && row < rows).then(|| self.labels[row * cols + col])
    }

    pub fn dimensions(&self) -> (usize, usize) {
        self.dimensions
    }

    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    pub fn crs(&self) -> Option<Crs> {
        self.crs
    }

    /// Map extent of the labelled pixels.
    pub fn extent(&self) -> Rect<f64> {
        let (cols, rows) = self.dimensions;
        self.transform.window_bounds(&Window::full((cols, rows)))
    }

    pub fn counts(&self) -> ClassCounts {
        self.labels
            .iter()
            .fold(ClassCounts::default(), |mut counts, label| {
                match label {
                    PixelClass::Preserved => counts.preserved += 1,
                    PixelClass::Loss(_) => counts.loss += 1,
                    PixelClass::Unclassified => counts.unclassified += 1,
                }
                counts
            })
    }

    /// Returns a single band raster of [`PixelClass::value`]s, ready to
    /// be saved as a GeoTIFF.
    pub fn to_raster(&self) -> Result<Raster, HansenError> {
        Raster::new(
            self.transform,
            self.crs,
            self.dimensions,
            vec![self.labels.iter().map(|label| label.value()).collect()],
        )
    }
}

fn label(inside: bool, sample: Sample, codes: &LossCodes) -> PixelClass {
    if inside {
        sample.classify(codes)
    } else {
        PixelClass::Unclassified
    }
}
