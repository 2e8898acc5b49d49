use ndarray::Array2;

use crate::imaging::gaussian::gaussian_blur;
use crate::imaging::histogram::equalize_hist;
use crate::shared::constants::{BACKGROUND_ALPHA, BACKGROUND_CALIBRATION_FRAMES};
use crate::shared::frame::GrayFrame;

const BLUR_KERNEL: usize = 9;

/// Running-average model of a static scene.
///
/// Frames with nobody in them are folded into an exponentially weighted
/// average until the calibration window is full. From then on the model is
/// frozen: the camera is assumed not to move, and a moved camera keeps the
/// stale background until the process restarts.
pub struct BackgroundModel {
    accumulator: Option<Array2<f32>>,
    frames: usize,
    calibrated: bool,
    window: usize,
    alpha: f32,
}

impl BackgroundModel {
    pub fn new() -> Self {
        Self::with_window(BACKGROUND_CALIBRATION_FRAMES, BACKGROUND_ALPHA)
    }

    pub fn with_window(window: usize, alpha: f32) -> Self {
        Self {
            accumulator: None,
            frames: 0,
            calibrated: false,
            window: window.max(1),
            alpha,
        }
    }

    /// Folds one background frame into the average.
    ///
    /// Returns `false` when the sample was ignored: the model is already
    /// calibrated, or the frame does not match the accumulator's size.
    pub fn accumulate(&mut self, luma: &GrayFrame) -> bool {
        if self.calibrated {
            return false;
        }
        let prepared = gaussian_blur(&equalize_hist(luma), BLUR_KERNEL);
        let shape = (prepared.height() as usize, prepared.width() as usize);
        let sample = prepared.as_ndarray().mapv(f32::from);

        let acc = self
            .accumulator
            .get_or_insert_with(|| sample.clone());
        if acc.dim() != shape {
            log::warn!(
                "Background sample {}x{} does not match model {}x{}; ignoring",
                shape.1,
                shape.0,
                acc.dim().1,
                acc.dim().0
            );
            return false;
        }
        let alpha = self.alpha;
        acc.zip_mut_with(&sample, |bg, &px| *bg = (1.0 - alpha) * *bg + alpha * px);

        self.frames += 1;
        if self.frames >= self.window {
            self.calibrated = true;
            log::info!("Background calibrated after {} frames", self.frames);
        }
        true
    }

    pub fn is_calibrated(&self) -> bool {
        self.calibrated
    }

    pub fn frames_accumulated(&self) -> usize {
        self.frames
    }

    /// The averaged scene, truncated to 8 bits. `None` until calibrated.
    pub fn background(&self) -> Option<GrayFrame> {
        if !self.calibrated {
            return None;
        }
        let acc = self.accumulator.as_ref()?;
        let (h, w) = acc.dim();
        let data = acc.iter().map(|&v| v.clamp(0.0, 255.0) as u8).collect();
        Some(GrayFrame::new(data, w as u32, h as u32))
    }
}

impl Default for BackgroundModel {
    fn default() -> Self {
        Self::new()
    }
}
