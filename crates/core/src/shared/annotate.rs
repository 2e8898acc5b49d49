//! Minimal RGB drawing primitives for on-frame feedback.
//!
//! Everything here is cosmetic: callers never depend on what gets drawn.

use super::frame::Frame;
use super::rect::Rect;

pub type Rgb = [u8; 3];

pub const KNOWN_FACE: Rgb = [65, 105, 225];
pub const UNKNOWN_FACE: Rgb = [255, 0, 0];
pub const HAND_CANDIDATE: Rgb = [255, 0, 0];
pub const TRACKED_HAND: Rgb = [0, 255, 0];
pub const FINGER_DEFECT: Rgb = [0, 255, 0];
pub const OTHER_DEFECT: Rgb = [255, 0, 0];
pub const HULL_LINE: Rgb = [0, 255, 0];
pub const PROGRESS: Rgb = [0, 255, 0];

fn put_pixel(frame: &mut Frame, x: i32, y: i32, color: Rgb) {
    if frame.channels() < 3 || x < 0 || y < 0 {
        return;
    }
    let (w, h) = (frame.width() as i32, frame.height() as i32);
    if x >= w || y >= h {
        return;
    }
    let ch = frame.channels() as usize;
    let offset = (y as usize * w as usize + x as usize) * ch;
    frame.data_mut()[offset..offset + 3].copy_from_slice(&color);
}

pub fn fill_rect(frame: &mut Frame, rect: &Rect, color: Rgb) {
    let Some(r) = rect.clamp_to(frame.width(), frame.height()) else {
        return;
    };
    for y in r.y..r.bottom() {
        for x in r.x..r.right() {
            put_pixel(frame, x, y, color);
        }
    }
}

/// Rectangle outline growing inward by `thickness` pixels.
pub fn draw_rect(frame: &mut Frame, rect: &Rect, color: Rgb, thickness: i32) {
    let t = thickness.max(1);
    let Rect {
        x,
        y,
        width,
        height,
    } = *rect;
    fill_rect(frame, &Rect::new(x, y, width, t), color);
    fill_rect(frame, &Rect::new(x, y + height - t, width, t), color);
    fill_rect(frame, &Rect::new(x, y, t, height), color);
    fill_rect(frame, &Rect::new(x + width - t, y, t, height), color);
}

pub fn fill_circle(frame: &mut Frame, cx: i32, cy: i32, radius: i32, color: Rgb) {
    let r2 = radius * radius;
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            if dx * dx + dy * dy <= r2 {
                put_pixel(frame, cx + dx, cy + dy, color);
            }
        }
    }
}

/// Bresenham line, thickened by stamping a small square at each step.
pub fn draw_line(frame: &mut Frame, from: (i32, i32), to: (i32, i32), color: Rgb, thickness: i32) {
    let (mut x0, mut y0) = from;
    let (x1, y1) = to;
    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;
    let half = (thickness.max(1) - 1) / 2;
    loop {
        for oy in -half..=half {
            for ox in -half..=half {
                put_pixel(frame, x0 + ox, y0 + oy, color);
            }
        }
        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}

/// Horizontal bar in the top-left corner filled to `fraction` (0..=1).
pub fn draw_progress(frame: &mut Frame, fraction: f64) {
    let bar = Rect::new(25, 15, (frame.width() as i32 / 3).max(20), 12);
    draw_rect(frame, &bar, PROGRESS, 2);
    let filled = (bar.width as f64 * fraction.clamp(0.0, 1.0)) as i32;
    fill_rect(frame, &Rect::new(bar.x, bar.y, filled, bar.height), PROGRESS);
}

/// One square pip per counted finger in the top-left corner.
pub fn draw_gesture_pips(frame: &mut Frame, count: u8) {
    for i in 0..count as i32 {
        fill_rect(frame, &Rect::new(25 + i * 18, 15, 12, 12), KNOWN_FACE);
    }
}

/// Solid tag above a face box, standing in for a name label.
pub fn draw_label_bar(frame: &mut Frame, face: &Rect, color: Rgb) {
    let y = if face.y - 10 > 10 { face.y - 10 } else { face.y + 10 };
    fill_rect(frame, &Rect::new(face.x, y - 4, face.width.min(60), 6), color);
}
