use ndarray::{ArrayView2, ArrayView3, ArrayViewMut3};
use thiserror::Error;

use super::rect::Rect;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum FrameError {
    #[error("unsupported channel count {0} (expected 1, 3 or 4)")]
    UnsupportedChannels(u8),
    #[error("buffer of {actual} bytes does not match {width}x{height}x{channels}")]
    BufferSize {
        width: u32,
        height: u32,
        channels: u8,
        actual: usize,
    },
}

/// A single camera frame: contiguous RGB bytes in row-major order.
///
/// This is the display representation. Everything pixel-level (detection
/// inputs, background differencing, silhouettes) works on [`GrayFrame`],
/// obtained through the checked [`Frame::to_gray`] conversion.
#[derive(Clone, Debug)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    channels: u8,
    index: usize,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, channels: u8, index: usize) -> Self {
        debug_assert_eq!(
            data.len(),
            (width as usize) * (height as usize) * (channels as usize),
            "data length must equal width * height * channels"
        );
        Self {
            data,
            width,
            height,
            channels,
            index,
        }
    }

    /// Checked constructor for buffers coming from outside the crate.
    pub fn try_new(
        data: Vec<u8>,
        width: u32,
        height: u32,
        channels: u8,
        index: usize,
    ) -> Result<Self, FrameError> {
        if !matches!(channels, 1 | 3 | 4) {
            return Err(FrameError::UnsupportedChannels(channels));
        }
        let expected = (width as usize) * (height as usize) * (channels as usize);
        if data.len() != expected {
            return Err(FrameError::BufferSize {
                width,
                height,
                channels,
                actual: data.len(),
            });
        }
        Ok(Self::new(data, width, height, channels, index))
    }

    pub fn filled(width: u32, height: u32, rgb: [u8; 3], index: usize) -> Self {
        let data = rgb
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 3)
            .collect();
        Self::new(data, width, height, 3, index)
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn as_ndarray(&self) -> ArrayView3<'_, u8> {
        ArrayView3::from_shape(self.shape(), &self.data)
            .expect("Frame data length must match dimensions")
    }

    pub fn as_ndarray_mut(&mut self) -> ArrayViewMut3<'_, u8> {
        ArrayViewMut3::from_shape(self.shape(), &mut self.data)
            .expect("Frame data length must match dimensions")
    }

    /// Mirrors the frame around its vertical axis (selfie view).
    pub fn mirror_horizontal(&mut self) {
        let row_len = self.width as usize * self.channels as usize;
        let ch = self.channels as usize;
        if row_len == 0 {
            return;
        }
        for row in self.data.chunks_exact_mut(row_len) {
            let w = row.len() / ch;
            for x in 0..w / 2 {
                let (a, b) = (x * ch, (w - 1 - x) * ch);
                for c in 0..ch {
                    row.swap(a + c, b + c);
                }
            }
        }
    }

    /// BT.601 luminance. Fails for channel layouts this crate does not know.
    pub fn to_gray(&self) -> Result<GrayFrame, FrameError> {
        let ch = self.channels as usize;
        let data = match self.channels {
            1 => self.data.clone(),
            3 | 4 => self
                .data
                .chunks_exact(ch)
                .map(|px| {
                    let (r, g, b) = (px[0] as u32, px[1] as u32, px[2] as u32);
                    ((299 * r + 587 * g + 114 * b + 500) / 1000) as u8
                })
                .collect(),
            other => return Err(FrameError::UnsupportedChannels(other)),
        };
        Ok(GrayFrame::new(data, self.width, self.height))
    }

    /// Copies `patch` (RGB) into this frame with its top-left at `(x, y)`,
    /// clipping whatever falls outside.
    pub fn paste(&mut self, patch: &Frame, x: i32, y: i32) {
        if self.channels != 3 || patch.channels != 3 {
            return;
        }
        let fw = self.width as i32;
        let fh = self.height as i32;
        for py in 0..patch.height as i32 {
            let ty = y + py;
            if ty < 0 || ty >= fh {
                continue;
            }
            for px in 0..patch.width as i32 {
                let tx = x + px;
                if tx < 0 || tx >= fw {
                    continue;
                }
                let src = ((py * patch.width as i32 + px) * 3) as usize;
                let dst = ((ty * fw + tx) * 3) as usize;
                self.data[dst..dst + 3].copy_from_slice(&patch.data[src..src + 3]);
            }
        }
    }

    fn shape(&self) -> (usize, usize, usize) {
        (
            self.height as usize,
            self.width as usize,
            self.channels as usize,
        )
    }
}

/// Single-channel 8-bit image: luminance frames, face crops, silhouettes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GrayFrame {
    data: Vec<u8>,
    width: u32,
    height: u32,
}

impl GrayFrame {
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Self {
        debug_assert_eq!(
            data.len(),
            (width as usize) * (height as usize),
            "data length must equal width * height"
        );
        Self {
            data,
            width,
            height,
        }
    }

    pub fn zeros(width: u32, height: u32) -> Self {
        Self::new(vec![0; width as usize * height as usize], width, height)
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn get(&self, x: u32, y: u32) -> u8 {
        self.data[(y * self.width + x) as usize]
    }

    pub fn set(&mut self, x: u32, y: u32, value: u8) {
        let w = self.width;
        self.data[(y * w + x) as usize] = value;
    }

    pub fn as_ndarray(&self) -> ArrayView2<'_, u8> {
        ArrayView2::from_shape((self.height as usize, self.width as usize), &self.data)
            .expect("GrayFrame data length must match dimensions")
    }

    /// Gray → RGB by channel replication. Always succeeds.
    pub fn to_rgb(&self) -> Frame {
        let data = self.data.iter().flat_map(|&v| [v, v, v]).collect();
        Frame::new(data, self.width, self.height, 3, 0)
    }

    /// Copies the part of `rect` that lies inside the image.
    /// Returns `None` when nothing overlaps.
    pub fn crop(&self, rect: &Rect) -> Option<GrayFrame> {
        let r = rect.clamp_to(self.width, self.height)?;
        let (x0, y0, w, h) = (r.x as usize, r.y as usize, r.width as usize, r.height as usize);
        let stride = self.width as usize;
        let mut out = Vec::with_capacity(w * h);
        for row in y0..y0 + h {
            out.extend_from_slice(&self.data[row * stride + x0..row * stride + x0 + w]);
        }
        Some(GrayFrame::new(out, w as u32, h as u32))
    }

    /// Sets every pixel of `rect` (clipped) to `value`.
    pub fn fill_rect(&mut self, rect: &Rect, value: u8) {
        let Some(r) = rect.clamp_to(self.width, self.height) else {
            return;
        };
        let stride = self.width as usize;
        for row in r.y as usize..(r.y + r.height) as usize {
            let start = row * stride + r.x as usize;
            self.data[start..start + r.width as usize].fill(value);
        }
    }

    /// Bilinear resize with pixel-center alignment.
    pub fn resize(&self, width: u32, height: u32) -> GrayFrame {
        if width == self.width && height == self.height {
            return self.clone();
        }
        let mut out = vec![0u8; width as usize * height as usize];
        if self.is_empty() {
            return GrayFrame::new(out, width, height);
        }
        let sx = self.width as f32 / width as f32;
        let sy = self.height as f32 / height as f32;
        let max_x = self.width as f32 - 1.0;
        let max_y = self.height as f32 - 1.0;
        for y in 0..height as usize {
            let fy = ((y as f32 + 0.5) * sy - 0.5).clamp(0.0, max_y);
            let y0 = fy.floor() as u32;
            let y1 = (y0 + 1).min(self.height - 1);
            let wy = fy - y0 as f32;
            for x in 0..width as usize {
                let fx = ((x as f32 + 0.5) * sx - 0.5).clamp(0.0, max_x);
                let x0 = fx.floor() as u32;
                let x1 = (x0 + 1).min(self.width - 1);
                let wx = fx - x0 as f32;
                let top = self.get(x0, y0) as f32 * (1.0 - wx) + self.get(x1, y0) as f32 * wx;
                let bottom = self.get(x0, y1) as f32 * (1.0 - wx) + self.get(x1, y1) as f32 * wx;
                out[y * width as usize + x] = (top * (1.0 - wy) + bottom * wy).round() as u8;
            }
        }
        GrayFrame::new(out, width, height)
    }
}
