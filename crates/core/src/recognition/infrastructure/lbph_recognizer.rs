//! Local binary pattern histogram face recognizer.
//!
//! Each crop is reduced to an 8-neighbour, radius-1 LBP code image, split into
//! a grid of cells, and described by the concatenation of the per-cell code
//! histograms. Prediction is nearest neighbour under the chi-square distance,
//! which puts an exact match at 0 and typical same-person matches in the tens.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::recognition::domain::face_recognizer::{FaceRecognizer, Prediction};
use crate::recognition::domain::identity_store::IdentityKey;
use crate::shared::atomic_file::write_atomically;
use crate::shared::frame::GrayFrame;

const BINS: usize = 256;
pub const DEFAULT_GRID: usize = 8;

#[derive(Error, Debug)]
pub enum RecognizerError {
    #[error("recognizer has no training data")]
    NotTrained,
    #[error("no training samples supplied")]
    EmptyTrainingSet,
    #[error("face crop {width}x{height} is too small for a {grid}x{grid} LBP grid")]
    CropTooSmall { width: u32, height: u32, grid: usize },
    #[error("failed to read recognizer model {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write recognizer model {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("corrupt recognizer model {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
struct LabelledHistogram {
    label: IdentityKey,
    histogram: Vec<f32>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
struct LbphModel {
    grid_x: usize,
    grid_y: usize,
    samples: Vec<LabelledHistogram>,
}

#[derive(Clone)]
pub struct LbphFaceRecognizer {
    model: LbphModel,
}

impl LbphFaceRecognizer {
    pub fn new() -> Self {
        Self::with_grid(DEFAULT_GRID, DEFAULT_GRID)
    }

    pub fn with_grid(grid_x: usize, grid_y: usize) -> Self {
        Self {
            model: LbphModel {
                grid_x: grid_x.max(1),
                grid_y: grid_y.max(1),
                samples: Vec::new(),
            },
        }
    }

    /// Open a persisted model, or start empty when `path` does not exist.
    pub fn open(path: &Path) -> Result<Self, RecognizerError> {
        let mut recognizer = Self::new();
        if path.exists() {
            recognizer.model = read_model(path)?;
            log::info!(
                "Loaded recognizer model with {} samples from {}",
                recognizer.model.samples.len(),
                path.display()
            );
        }
        Ok(recognizer)
    }

    pub fn sample_count(&self) -> usize {
        self.model.samples.len()
    }

    fn describe_all(&self, samples: &[GrayFrame], key: IdentityKey) -> Result<Vec<LabelledHistogram>, RecognizerError> {
        if samples.is_empty() {
            return Err(RecognizerError::EmptyTrainingSet);
        }
        samples
            .iter()
            .map(|s| {
                Ok(LabelledHistogram {
                    label: key,
                    histogram: spatial_histogram(&lbp_codes(s), self.model.grid_x, self.model.grid_y)?,
                })
            })
            .collect()
    }
}

impl Default for LbphFaceRecognizer {
    fn default() -> Self {
        Self::new()
    }
}

impl FaceRecognizer for LbphFaceRecognizer {
    fn train(&mut self, samples: &[GrayFrame], key: IdentityKey) -> Result<(), Box<dyn std::error::Error>> {
        self.model.samples = self.describe_all(samples, key)?;
        Ok(())
    }

    fn update(&mut self, samples: &[GrayFrame], key: IdentityKey) -> Result<(), Box<dyn std::error::Error>> {
        let described = self.describe_all(samples, key)?;
        self.model.samples.extend(described);
        Ok(())
    }

    fn predict(&self, face: &GrayFrame) -> Result<Prediction, Box<dyn std::error::Error>> {
        let query = spatial_histogram(&lbp_codes(face), self.model.grid_x, self.model.grid_y)?;
        self.model
            .samples
            .iter()
            .map(|s| Prediction {
                key: s.label,
                distance: chi_square(&s.histogram, &query),
            })
            .min_by(|a, b| a.distance.total_cmp(&b.distance))
            .ok_or_else(|| RecognizerError::NotTrained.into())
    }

    fn save(&self, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        let bytes = serde_json::to_vec(&self.model)?;
        write_atomically(path, &bytes).map_err(|source| RecognizerError::Write {
            path: path.to_path_buf(),
            source,
        })?;
        log::debug!("Saved recognizer model to {}", path.display());
        Ok(())
    }

    fn load(&mut self, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        self.model = read_model(path)?;
        Ok(())
    }

    fn is_trained(&self) -> bool {
        !self.model.samples.is_empty()
    }

    fn snapshot(&self) -> Box<dyn FaceRecognizer> {
        Box::new(self.clone())
    }
}

fn read_model(path: &Path) -> Result<LbphModel, RecognizerError> {
    let bytes = fs::read(path).map_err(|source| RecognizerError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let corrupt = |reason: String| RecognizerError::Corrupt {
        path: path.to_path_buf(),
        reason,
    };
    let model: LbphModel = serde_json::from_slice(&bytes).map_err(|e| corrupt(e.to_string()))?;
    if model.grid_x == 0 || model.grid_y == 0 {
        return Err(corrupt("zero-sized grid".into()));
    }
    let expected = model.grid_x * model.grid_y * BINS;
    if let Some(bad) = model.samples.iter().find(|s| s.histogram.len() != expected) {
        return Err(corrupt(format!(
            "histogram for {} has {} bins, expected {expected}",
            bad.label,
            bad.histogram.len()
        )));
    }
    Ok(model)
}

/// Radius-1, 8-neighbour LBP codes for every interior pixel. The result is
/// two pixels narrower and shorter than the input.
pub fn lbp_codes(image: &GrayFrame) -> GrayFrame {
    let (w, h) = (image.width(), image.height());
    if w < 3 || h < 3 {
        return GrayFrame::zeros(0, 0);
    }
    // Clockwise from the top-left neighbour.
    const NEIGHBOURS: [(i32, i32); 8] = [(-1, -1), (0, -1), (1, -1), (1, 0), (1, 1), (0, 1), (-1, 1), (-1, 0)];
    let mut out = GrayFrame::zeros(w - 2, h - 2);
    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let center = image.get(x, y);
            let mut code = 0u8;
            for (bit, (dx, dy)) in NEIGHBOURS.iter().enumerate() {
                let n = image.get((x as i32 + dx) as u32, (y as i32 + dy) as u32);
                if n >= center {
                    code |= 1 << (7 - bit);
                }
            }
            out.set(x - 1, y - 1, code);
        }
    }
    out
}

/// Concatenated per-cell code histograms, each normalised by its cell's
/// pixel count. Pixels past the last whole cell are ignored.
pub fn spatial_histogram(codes: &GrayFrame, grid_x: usize, grid_y: usize) -> Result<Vec<f32>, RecognizerError> {
    let cell_w = codes.width() as usize / grid_x;
    let cell_h = codes.height() as usize / grid_y;
    if cell_w == 0 || cell_h == 0 {
        return Err(RecognizerError::CropTooSmall {
            width: codes.width() + 2,
            height: codes.height() + 2,
            grid: grid_x.max(grid_y),
        });
    }
    let norm = 1.0 / (cell_w * cell_h) as f32;
    let mut hist = vec![0.0f32; grid_x * grid_y * BINS];
    for gy in 0..grid_y {
        for gx in 0..grid_x {
            let base = (gy * grid_x + gx) * BINS;
            for y in gy * cell_h..(gy + 1) * cell_h {
                for x in gx * cell_w..(gx + 1) * cell_w {
                    hist[base + codes.get(x as u32, y as u32) as usize] += norm;
                }
            }
        }
    }
    Ok(hist)
}

/// Symmetric chi-square distance, `2 * sum((a - b)^2 / (a + b))`.
pub fn chi_square(a: &[f32], b: &[f32]) -> f64 {
    2.0 * a
        .iter()
        .zip(b)
        .filter(|&(&x, &y)| x + y > f32::EPSILON)
        .map(|(&x, &y)| {
            let (x, y) = (x as f64, y as f64);
            (x - y).powi(2) / (x + y)
        })
        .sum::<f64>()
}
