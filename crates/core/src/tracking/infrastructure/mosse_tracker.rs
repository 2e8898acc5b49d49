//! MOSSE correlation-filter tracker (Bolme et al., 2010).
//!
//! The tracked region is resampled to a fixed square patch and correlated in
//! the frequency domain with an adaptively learned filter. The peak of the
//! response gives the displacement, and the peak-to-sidelobe ratio (PSR)
//! is reported as tracking quality.

use std::sync::Arc;

use rustfft::num_complex::Complex32;
use rustfft::{Fft, FftPlanner};

use crate::shared::frame::GrayFrame;
use crate::shared::rect::Rect;
use crate::tracking::domain::visual_tracker::{TrackerUpdate, VisualTracker};

/// Side of the square working patch. A power of two keeps the FFT cheap.
const PATCH: usize = 64;
const TARGET_SIGMA: f32 = 2.0;
const LEARNING_RATE: f32 = 0.125;
const REGULARIZATION: f32 = 1e-2;
/// Half-width of the window around the peak excluded from the sidelobe.
const SIDELOBE_EXCLUSION: isize = 5;

pub struct MosseTracker {
    forward: Arc<dyn Fft<f32>>,
    inverse: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    target: Vec<Complex32>,
    numerator: Vec<Complex32>,
    denominator: Vec<Complex32>,
    center: (f64, f64),
    size: (f64, f64),
    started: bool,
}

impl MosseTracker {
    pub fn new() -> Self {
        let mut planner = FftPlanner::<f32>::new();
        let forward = planner.plan_fft_forward(PATCH);
        let inverse = planner.plan_fft_inverse(PATCH);

        let mut target: Vec<Complex32> = gaussian_peak(PATCH, TARGET_SIGMA)
            .into_iter()
            .map(|v| Complex32::new(v, 0.0))
            .collect();
        fft2(&mut target, PATCH, forward.as_ref());

        Self {
            forward,
            inverse,
            window: hanning(PATCH),
            target,
            numerator: vec![Complex32::new(0.0, 0.0); PATCH * PATCH],
            denominator: vec![Complex32::new(0.0, 0.0); PATCH * PATCH],
            center: (0.0, 0.0),
            size: (0.0, 0.0),
            started: false,
        }
    }

    fn position(&self) -> Rect {
        Rect::new(
            (self.center.0 - self.size.0 / 2.0).round() as i32,
            (self.center.1 - self.size.1 / 2.0).round() as i32,
            self.size.0.round() as i32,
            self.size.1.round() as i32,
        )
    }

    /// Resampled, log-normalised, windowed patch around the current centre,
    /// already in the frequency domain.
    fn spectrum(&self, frame: &GrayFrame) -> Vec<Complex32> {
        let raw = sample_patch(frame, self.center, self.size, PATCH);
        let mut data: Vec<Complex32> = preprocess(&raw, &self.window)
            .into_iter()
            .map(|v| Complex32::new(v, 0.0))
            .collect();
        fft2(&mut data, PATCH, self.forward.as_ref());
        data
    }

    fn learn(&mut self, spectrum: &[Complex32], rate: f32) {
        for i in 0..spectrum.len() {
            let f = spectrum[i];
            let a = self.target[i] * f.conj();
            let b = f * f.conj();
            self.numerator[i] = self.numerator[i] * (1.0 - rate) + a * rate;
            self.denominator[i] = self.denominator[i] * (1.0 - rate) + b * rate;
        }
    }
}

impl Default for MosseTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl VisualTracker for MosseTracker {
    fn start(&mut self, frame: &GrayFrame, rect: Rect) -> Result<(), Box<dyn std::error::Error>> {
        let clamped = rect
            .clamp_to(frame.width(), frame.height())
            .ok_or_else(|| format!("Tracking region {rect:?} lies outside the frame"))?;
        self.center = (
            clamped.x as f64 + clamped.width as f64 / 2.0,
            clamped.y as f64 + clamped.height as f64 / 2.0,
        );
        self.size = (clamped.width as f64, clamped.height as f64);

        let spectrum = self.spectrum(frame);
        self.numerator.iter_mut().for_each(|v| *v = Complex32::new(0.0, 0.0));
        self.denominator.iter_mut().for_each(|v| *v = Complex32::new(0.0, 0.0));
        self.learn(&spectrum, 1.0);
        self.started = true;
        log::debug!("MOSSE tracker started on {clamped:?}");
        Ok(())
    }

    fn update(&mut self, frame: &GrayFrame) -> Result<TrackerUpdate, Box<dyn std::error::Error>> {
        if !self.started {
            return Err("MOSSE tracker updated before start".into());
        }
        let spectrum = self.spectrum(frame);
        let mut response: Vec<Complex32> = spectrum
            .iter()
            .zip(self.numerator.iter().zip(&self.denominator))
            .map(|(&f, (&a, &b))| f * a / (b + REGULARIZATION))
            .collect();
        ifft2(&mut response, PATCH, self.inverse.as_ref());
        let real: Vec<f32> = response.iter().map(|c| c.re).collect();

        let (peak_idx, _) = real
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .ok_or("Empty MOSSE response")?;
        let (px, py) = ((peak_idx % PATCH) as isize, (peak_idx / PATCH) as isize);
        let half = (PATCH / 2) as isize;
        let (dx, dy) = ((px - half) as f64, (py - half) as f64);

        self.center.0 += dx * self.size.0 / PATCH as f64;
        self.center.1 += dy * self.size.1 / PATCH as f64;
        self.center.0 = self.center.0.clamp(0.0, frame.width() as f64);
        self.center.1 = self.center.1.clamp(0.0, frame.height() as f64);

        let quality = peak_to_sidelobe(&real, PATCH, px, py);
        let relearn = self.spectrum(frame);
        self.learn(&relearn, LEARNING_RATE);

        Ok(TrackerUpdate {
            quality,
            position: self.position(),
        })
    }
}

fn hanning(n: usize) -> Vec<f32> {
    let line: Vec<f32> = (0..n)
        .map(|i| 0.5 - 0.5 * (2.0 * std::f32::consts::PI * i as f32 / (n as f32 - 1.0)).cos())
        .collect();
    let mut out = Vec::with_capacity(n * n);
    for &wy in &line {
        out.extend(line.iter().map(|&wx| wx * wy));
    }
    out
}

fn gaussian_peak(n: usize, sigma: f32) -> Vec<f32> {
    let c = (n / 2) as f32;
    let denom = 2.0 * sigma * sigma;
    let mut out = Vec::with_capacity(n * n);
    for y in 0..n {
        for x in 0..n {
            let (dx, dy) = (x as f32 - c, y as f32 - c);
            out.push((-(dx * dx + dy * dy) / denom).exp());
        }
    }
    out
}

/// Bilinear resample of the `size` region centred at `center` to `n` x `n`,
/// replicating edge pixels outside the frame.
fn sample_patch(frame: &GrayFrame, center: (f64, f64), size: (f64, f64), n: usize) -> Vec<f32> {
    let (w, h) = (frame.width() as i64, frame.height() as i64);
    let px = |x: i64, y: i64| frame.get(x.clamp(0, w - 1) as u32, y.clamp(0, h - 1) as u32) as f32;
    let (sx, sy) = (size.0 / n as f64, size.1 / n as f64);
    let (x0, y0) = (center.0 - size.0 / 2.0, center.1 - size.1 / 2.0);

    let mut out = Vec::with_capacity(n * n);
    for v in 0..n {
        let fy = y0 + (v as f64 + 0.5) * sy - 0.5;
        let iy = fy.floor() as i64;
        let ty = (fy - iy as f64) as f32;
        for u in 0..n {
            let fx = x0 + (u as f64 + 0.5) * sx - 0.5;
            let ix = fx.floor() as i64;
            let tx = (fx - ix as f64) as f32;
            let top = px(ix, iy) * (1.0 - tx) + px(ix + 1, iy) * tx;
            let bottom = px(ix, iy + 1) * (1.0 - tx) + px(ix + 1, iy + 1) * tx;
            out.push(top * (1.0 - ty) + bottom * ty);
        }
    }
    out
}

/// `log(1 + x)`, then zero mean and unit variance, then the cosine window.
fn preprocess(patch: &[f32], window: &[f32]) -> Vec<f32> {
    let logged: Vec<f32> = patch.iter().map(|&v| (v + 1.0).ln()).collect();
    let n = logged.len() as f32;
    let mean = logged.iter().sum::<f32>() / n;
    let var = logged.iter().map(|v| (v - mean).powi(2)).sum::<f32>() / n;
    let std = var.sqrt() + 1e-5;
    logged
        .iter()
        .zip(window)
        .map(|(&v, &w)| (v - mean) / std * w)
        .collect()
}

/// In-place 2D FFT of a row-major `n` x `n` buffer: rows, then columns.
fn fft2(data: &mut [Complex32], n: usize, fft: &dyn Fft<f32>) {
    for row in data.chunks_exact_mut(n) {
        fft.process(row);
    }
    let mut column = vec![Complex32::new(0.0, 0.0); n];
    for x in 0..n {
        for y in 0..n {
            column[y] = data[y * n + x];
        }
        fft.process(&mut column);
        for y in 0..n {
            data[y * n + x] = column[y];
        }
    }
}

/// Inverse of [`fft2`], including the `1 / n^2` normalisation rustfft omits.
fn ifft2(data: &mut [Complex32], n: usize, inverse: &dyn Fft<f32>) {
    fft2(data, n, inverse);
    let scale = 1.0 / (n * n) as f32;
    data.iter_mut().for_each(|v| *v *= scale);
}

fn peak_to_sidelobe(response: &[f32], n: usize, px: isize, py: isize) -> f64 {
    let peak = response[py as usize * n + px as usize] as f64;
    let mut sum = 0.0f64;
    let mut sum_sq = 0.0f64;
    let mut count = 0usize;
    for y in 0..n as isize {
        for x in 0..n as isize {
            if (x - px).abs() <= SIDELOBE_EXCLUSION && (y - py).abs() <= SIDELOBE_EXCLUSION {
                continue;
            }
            let v = response[y as usize * n + x as usize] as f64;
            sum += v;
            sum_sq += v * v;
            count += 1;
        }
    }
    if count == 0 {
        return 0.0;
    }
    let mean = sum / count as f64;
    let std = (sum_sq / count as f64 - mean * mean).max(0.0).sqrt();
    if std < 1e-12 {
        return 0.0;
    }
    (peak - mean) / std
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Deterministic blotchy texture, so correlation has something to lock on.
    fn texture(w: u32, h: u32) -> GrayFrame {
        let mut state: u32 = 0x1234_5678;
        let mut coarse = vec![0u8; ((w / 4 + 1) * (h / 4 + 1)) as usize];
        for v in coarse.iter_mut() {
            state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            *v = (state >> 24) as u8;
        }
        let cw = w / 4 + 1;
        let data = (0..w * h)
            .map(|i| coarse[((i / w / 4) * cw + (i % w) / 4) as usize])
            .collect();
        GrayFrame::new(data, w, h)
    }

    fn view(src: &GrayFrame, x0: u32, y0: u32, w: u32, h: u32) -> GrayFrame {
        src.crop(&Rect::new(x0 as i32, y0 as i32, w as i32, h as i32)).unwrap()
    }

    #[test]
    fn test_fft_round_trip() {
        let mut planner = FftPlanner::<f32>::new();
        let (fwd, inv) = (planner.plan_fft_forward(8), planner.plan_fft_inverse(8));
        let original: Vec<Complex32> = (0..64).map(|i| Complex32::new((i * 7 % 13) as f32, 0.0)).collect();
        let mut data = original.clone();
        fft2(&mut data, 8, fwd.as_ref());
        ifft2(&mut data, 8, inv.as_ref());
        for (a, b) in data.iter().zip(&original) {
            assert!((a.re - b.re).abs() < 1e-3 && a.im.abs() < 1e-3);
        }
    }

    #[test]
    fn test_stationary_target_stays_put() {
        let frame = view(&texture(240, 200), 20, 20, 160, 120);
        let mut tracker = MosseTracker::new();
        let rect = Rect::new(40, 30, 64, 64);
        tracker.start(&frame, rect).unwrap();
        let update = tracker.update(&frame).unwrap();
        assert_eq!(update.position, rect);
        assert!(update.quality > 10.0, "psr {}", update.quality);
    }

    #[test]
    fn test_follows_translation() {
        let tex = texture(240, 200);
        let first = view(&tex, 20, 20, 160, 120);
        // Content moves 5 right and 3 down.
        let second = view(&tex, 15, 17, 160, 120);
        let mut tracker = MosseTracker::new();
        tracker.start(&first, Rect::new(40, 30, 64, 64)).unwrap();
        let update = tracker.update(&second).unwrap();
        assert!((update.position.x - 45).abs() <= 1, "{:?}", update.position);
        assert!((update.position.y - 33).abs() <= 1, "{:?}", update.position);
        assert_eq!((update.position.width, update.position.height), (64, 64));
    }

    #[test]
    fn test_update_before_start_fails() {
        let mut tracker = MosseTracker::new();
        assert!(tracker.update(&GrayFrame::zeros(32, 32)).is_err());
    }

    #[test]
    fn test_start_outside_frame_fails() {
        let mut tracker = MosseTracker::new();
        assert!(tracker.start(&GrayFrame::zeros(32, 32), Rect::new(100, 100, 10, 10)).is_err());
    }
}
