//! 3x3 square-kernel erosion and dilation.
//!
//! Pixels outside the image never win the min/max, so a foreground blob
//! touching the border is not eaten from that side.

use crate::shared::frame::GrayFrame;

fn apply_3x3(image: &GrayFrame, pick: fn(u8, u8) -> u8, identity: u8) -> GrayFrame {
    let w = image.width() as usize;
    let h = image.height() as usize;
    let src = image.data();
    let mut out = vec![0u8; w * h];
    for y in 0..h {
        let y0 = y.saturating_sub(1);
        let y1 = (y + 1).min(h - 1);
        for x in 0..w {
            let x0 = x.saturating_sub(1);
            let x1 = (x + 1).min(w - 1);
            let mut acc = identity;
            for yy in y0..=y1 {
                for xx in x0..=x1 {
                    acc = pick(acc, src[yy * w + xx]);
                }
            }
            out[y * w + x] = acc;
        }
    }
    GrayFrame::new(out, image.width(), image.height())
}

pub fn erode(image: &GrayFrame, iterations: usize) -> GrayFrame {
    let mut current = image.clone();
    if current.is_empty() {
        return current;
    }
    for _ in 0..iterations {
        current = apply_3x3(&current, u8::min, u8::MAX);
    }
    current
}

pub fn dilate(image: &GrayFrame, iterations: usize) -> GrayFrame {
    let mut current = image.clone();
    if current.is_empty() {
        return current;
    }
    for _ in 0..iterations {
        current = apply_3x3(&current, u8::max, u8::MIN);
    }
    current
}
