//! Multi-scale hand detector: an ONNX window classifier slid over an image
//! pyramid, with raw hits grouped the way a Haar cascade groups them.

use std::path::Path;

use ndarray::{s, Array4, Axis};

use crate::detection::domain::hand_detector::{CascadeParams, HandDetector};
use crate::shared::frame::GrayFrame;
use crate::shared::rect::Rect;

use super::execution_provider::{declared_input_size, load_session};
use super::math::{group_rectangles, GROUP_EPS};

/// Window side used when the model input is dynamic.
const DEFAULT_WINDOW: u32 = 32;

/// Windows scored per inference call.
const BATCH_SIZE: usize = 256;

/// Default probability a window needs to count as a raw hit.
pub const DEFAULT_SCORE_THRESHOLD: f32 = 0.5;

pub struct OnnxHandDetector {
    session: ort::session::Session,
    window: u32,
    channels: usize,
    stride: u32,
    score_threshold: f32,
}

impl OnnxHandDetector {
    pub fn new(model_path: &Path, score_threshold: f32) -> Result<Self, Box<dyn std::error::Error>> {
        let session = load_session(model_path)?;
        let window = declared_input_size(&session).unwrap_or(DEFAULT_WINDOW);
        let channels = declared_channels(&session).unwrap_or(1);
        Ok(Self {
            session,
            window,
            channels,
            stride: (window / 8).max(2),
            score_threshold,
        })
    }

    fn score_batch(&mut self, patches: &Array4<f32>) -> Result<Vec<f32>, Box<dyn std::error::Error>> {
        let n = patches.len_of(Axis(0));
        let (h, w) = (patches.len_of(Axis(2)), patches.len_of(Axis(3)));
        let input = if self.channels == 1 {
            patches.clone()
        } else {
            patches
                .broadcast((n, self.channels, h, w))
                .ok_or("Cannot broadcast hand patches to model channels")?
                .to_owned()
        };
        let input_value = ort::value::Tensor::from_array(input)?;
        let outputs = self.session.run(ort::inputs![input_value])?;
        if outputs.len() == 0 {
            return Err("Hand model produced no outputs".into());
        }
        let tensor = outputs[0].try_extract_array::<f32>()?;
        let data = tensor.as_slice().ok_or("Cannot get tensor slice")?;
        window_scores(data, n)
    }
}

impl HandDetector for OnnxHandDetector {
    fn detect_multi_scale(
        &mut self,
        luma: &GrayFrame,
        params: &CascadeParams,
    ) -> Result<Vec<Rect>, Box<dyn std::error::Error>> {
        let (window, stride, threshold) = (self.window, self.stride, self.score_threshold);
        let hits = scan_pyramid(luma, params.scale_factor, window, stride, |batch| {
            Ok(self
                .score_batch(batch)?
                .into_iter()
                .map(|p| p >= threshold)
                .collect())
        })?;
        let grouped = group_rectangles(&hits, params.min_neighbors, GROUP_EPS);
        log::trace!("Hand detector grouped {} raw hits into {}", hits.len(), grouped.len());
        Ok(grouped)
    }
}

fn declared_channels(session: &ort::session::Session) -> Option<usize> {
    session.inputs().first().and_then(|input| {
        if let ort::value::ValueType::Tensor { ref shape, .. } = input.dtype() {
            (shape.len() >= 4 && shape[1] > 0).then(|| shape[1] as usize)
        } else {
            None
        }
    })
}

/// Per-window hand probability from a `[n]`, `[n, 1]` or `[n, 2]` output.
/// Two-column outputs are `[background, hand]`.
fn window_scores(data: &[f32], n: usize) -> Result<Vec<f32>, Box<dyn std::error::Error>> {
    if n == 0 {
        return Ok(Vec::new());
    }
    if data.len() % n != 0 || data.is_empty() {
        return Err(format!("Hand model returned {} values for {n} windows", data.len()).into());
    }
    let cols = data.len() / n;
    let col = if cols >= 2 { 1 } else { 0 };
    Ok((0..n).map(|i| data[i * cols + col]).collect())
}

/// Downscale factors for each pyramid level, starting at 1 and growing by
/// `scale_factor` while the level still fits one window.
pub fn pyramid_scales(width: u32, height: u32, window: u32, scale_factor: f64) -> Vec<f64> {
    let mut scales = Vec::new();
    if scale_factor <= 1.0 || window == 0 {
        return scales;
    }
    let mut scale = 1.0;
    while (width as f64 / scale) >= window as f64 && (height as f64 / scale) >= window as f64 {
        scales.push(scale);
        scale *= scale_factor;
    }
    scales
}

/// Top-left corners of every window position on a `width` x `height` level.
pub fn window_origins(width: u32, height: u32, window: u32, stride: u32) -> Vec<(u32, u32)> {
    if width < window || height < window || stride == 0 {
        return Vec::new();
    }
    let mut origins = Vec::new();
    for y in (0..=height - window).step_by(stride as usize) {
        for x in (0..=width - window).step_by(stride as usize) {
            origins.push((x, y));
        }
    }
    origins
}

/// Slide a `window` x `window` classifier over every pyramid level and return
/// accepted windows in source-frame coordinates, ungrouped.
///
/// `classify` receives `[n, 1, window, window]` batches scaled to `0..=1` and
/// returns one verdict per window.
pub fn scan_pyramid<F>(
    luma: &GrayFrame,
    scale_factor: f64,
    window: u32,
    stride: u32,
    mut classify: F,
) -> Result<Vec<Rect>, Box<dyn std::error::Error>>
where
    F: FnMut(&Array4<f32>) -> Result<Vec<bool>, Box<dyn std::error::Error>>,
{
    if scale_factor <= 1.0 {
        return Err(format!("Pyramid scale factor must exceed 1, got {scale_factor}").into());
    }
    let mut hits = Vec::new();
    let side = window as usize;

    for scale in pyramid_scales(luma.width(), luma.height(), window, scale_factor) {
        let level_w = (luma.width() as f64 / scale) as u32;
        let level_h = (luma.height() as f64 / scale) as u32;
        let level = if scale == 1.0 {
            luma.clone()
        } else {
            luma.resize(level_w, level_h)
        };
        let pixels = level.as_ndarray().mapv(|v| v as f32 / 255.0);
        let origins = window_origins(level_w, level_h, window, stride);

        for chunk in origins.chunks(BATCH_SIZE) {
            let mut batch = Array4::<f32>::zeros((chunk.len(), 1, side, side));
            for (i, &(x, y)) in chunk.iter().enumerate() {
                let (x, y) = (x as usize, y as usize);
                batch
                    .slice_mut(s![i, 0, .., ..])
                    .assign(&pixels.slice(s![y..y + side, x..x + side]));
            }
            let verdicts = classify(&batch)?;
            if verdicts.len() != chunk.len() {
                return Err("Hand classifier returned the wrong number of verdicts".into());
            }
            for (&(x, y), hit) in chunk.iter().zip(verdicts) {
                if hit {
                    hits.push(Rect::new(
                        (x as f64 * scale).round() as i32,
                        (y as f64 * scale).round() as i32,
                        (window as f64 * scale).round() as i32,
                        (window as f64 * scale).round() as i32,
                    ));
                }
            }
        }
    }
    Ok(hits)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mostly_bright(batch: &Array4<f32>) -> Result<Vec<bool>, Box<dyn std::error::Error>> {
        Ok(batch
            .outer_iter()
            .map(|patch| {
                let bright = patch.iter().filter(|&&v| v > 0.5).count();
                bright as f64 >= 0.9 * patch.len() as f64
            })
            .collect())
    }

    #[test]
    fn test_pyramid_scales_stop_when_window_no_longer_fits() {
        let scales = pyramid_scales(100, 100, 24, 1.3);
        // 100 / 1.3^5 ≈ 26.9 still fits, 1.3^6 ≈ 20.7 does not.
        assert_eq!(scales.len(), 6);
        assert!((scales[1] - 1.3).abs() < 1e-9);
        assert!(pyramid_scales(100, 100, 24, 1.0).is_empty());
        assert!(pyramid_scales(10, 100, 24, 1.3).is_empty());
    }

    #[test]
    fn test_window_origins_cover_level() {
        let origins = window_origins(10, 6, 4, 3);
        assert_eq!(origins, vec![(0, 0), (3, 0), (6, 0)]);
        assert!(window_origins(3, 10, 4, 1).is_empty());
    }

    #[test]
    fn test_window_scores_layouts() {
        assert_eq!(window_scores(&[0.1, 0.9], 2).unwrap(), vec![0.1, 0.9]);
        assert_eq!(window_scores(&[0.8, 0.2, 0.3, 0.7], 2).unwrap(), vec![0.2, 0.7]);
        assert!(window_scores(&[0.1, 0.2, 0.3], 2).is_err());
    }

    #[test]
    fn test_scan_finds_bright_square_and_grouping_merges_hits() {
        let mut luma = GrayFrame::zeros(160, 120);
        luma.fill_rect(&Rect::new(60, 40, 48, 48), 255);
        let hits = scan_pyramid(&luma, 1.3, 24, 4, mostly_bright).unwrap();
        assert!(hits.len() >= 5);
        let square = Rect::new(56, 36, 56, 56);
        for hit in &hits {
            assert!(hit.iou(&square) > 0.0, "stray hit {hit:?}");
        }

        let grouped = group_rectangles(&hits, 5, GROUP_EPS);
        assert!(!grouped.is_empty());
        assert!(grouped.len() < hits.len());
    }

    #[test]
    fn test_scan_blank_frame_has_no_hits() {
        let luma = GrayFrame::zeros(64, 64);
        assert!(scan_pyramid(&luma, 1.3, 16, 4, mostly_bright).unwrap().is_empty());
    }

    #[test]
    fn test_scan_rejects_non_growing_pyramid() {
        let luma = GrayFrame::zeros(64, 64);
        assert!(scan_pyramid(&luma, 1.0, 16, 4, mostly_bright).is_err());
    }
}
