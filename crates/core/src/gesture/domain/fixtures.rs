//! Synthetic hand silhouettes shared by gesture and pipeline tests.

use super::contour::Point;
use crate::shared::frame::GrayFrame;

const CX: f64 = 150.0;
const CY: f64 = 150.0;

/// Fan of `tips` fingertips on a radius-100 arc above the palm centre,
/// with valleys at `valley_radius` between them and a flat wrist below.
pub fn hand_polygon(tips: usize, valley_radius: f64) -> Vec<Point> {
    let at = |radius: f64, deg: f64| {
        let rad = deg.to_radians();
        Point::new(
            (CX + radius * rad.cos()).round() as i32,
            (CY - radius * rad.sin()).round() as i32,
        )
    };
    let step = if tips > 1 { 140.0 / (tips - 1) as f64 } else { 0.0 };
    let mut poly = vec![Point::new(CX as i32 + 60, CY as i32 + 80)];
    for i in 0..tips {
        let theta = 20.0 + step * i as f64;
        if i > 0 {
            poly.push(at(valley_radius, theta - step / 2.0));
        }
        poly.push(at(100.0, theta));
    }
    poly.push(Point::new(CX as i32 - 60, CY as i32 + 80));
    poly
}

/// Even-odd fill, sampling pixel centres.
pub fn rasterize(poly: &[Point], w: u32, h: u32) -> GrayFrame {
    let mut img = GrayFrame::zeros(w, h);
    for y in 0..h {
        for x in 0..w {
            let (px, py) = (x as f64 + 0.5, y as f64 + 0.5);
            let mut inside = false;
            let n = poly.len();
            for i in 0..n {
                let a = poly[i];
                let b = poly[(i + n - 1) % n];
                let (ax, ay, bx, by) = (a.x as f64, a.y as f64, b.x as f64, b.y as f64);
                if (ay > py) != (by > py) && px < (bx - ax) * (py - ay) / (by - ay) + ax {
                    inside = !inside;
                }
            }
            if inside {
                img.set(x, y, 255);
            }
        }
    }
    img
}
