//! Outer-boundary extraction and polygon utilities for binary silhouettes.

use crate::shared::frame::GrayFrame;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Clockwise (in image coordinates, y down) neighbour offsets starting east.
const DIRS: [(i32, i32); 8] = [
    (1, 0),
    (1, 1),
    (0, 1),
    (-1, 1),
    (-1, 0),
    (-1, -1),
    (0, -1),
    (1, -1),
];

fn dir_index(dx: i32, dy: i32) -> usize {
    DIRS.iter()
        .position(|&d| d == (dx, dy))
        .expect("offset must be an 8-neighbour")
}

/// Outer boundary of every 8-connected foreground blob (non-zero pixels).
///
/// Each contour is a closed polygon with collinear runs collapsed, so a
/// filled rectangle yields its four corners. Holes are not traced.
pub fn find_external_contours(mask: &GrayFrame) -> Vec<Vec<Point>> {
    let w = mask.width() as i32;
    let h = mask.height() as i32;
    let fg = |x: i32, y: i32| x >= 0 && y >= 0 && x < w && y < h && mask.get(x as u32, y as u32) > 0;

    let mut labelled = vec![false; (w * h) as usize];
    let mut contours = Vec::new();

    for y in 0..h {
        for x in 0..w {
            if !fg(x, y) || labelled[(y * w + x) as usize] {
                continue;
            }
            flood_label(&fg, &mut labelled, w, Point::new(x, y));
            // Raster order guarantees the west neighbour is background.
            let boundary = trace_boundary(&fg, Point::new(x, y), w as usize * h as usize * 4);
            contours.push(compress_runs(&boundary));
        }
    }
    contours
}

fn flood_label(fg: &impl Fn(i32, i32) -> bool, labelled: &mut [bool], w: i32, seed: Point) {
    let mut stack = vec![seed];
    labelled[(seed.y * w + seed.x) as usize] = true;
    while let Some(p) = stack.pop() {
        for (dx, dy) in DIRS {
            let (nx, ny) = (p.x + dx, p.y + dy);
            if fg(nx, ny) && !labelled[(ny * w + nx) as usize] {
                labelled[(ny * w + nx) as usize] = true;
                stack.push(Point::new(nx, ny));
            }
        }
    }
}

/// Moore-neighbour tracing, stopping when the first move is about to repeat.
fn trace_boundary(fg: &impl Fn(i32, i32) -> bool, start: Point, max_steps: usize) -> Vec<Point> {
    let mut contour = vec![start];
    let mut cur = start;
    let mut back = Point::new(start.x - 1, start.y);

    for _ in 0..max_steps {
        let back_dir = dir_index(back.x - cur.x, back.y - cur.y);
        let mut found = None;
        for k in 1..=8 {
            let d = (back_dir + k) % 8;
            let n = Point::new(cur.x + DIRS[d].0, cur.y + DIRS[d].1);
            if fg(n.x, n.y) {
                found = Some((n, d));
                break;
            }
        }
        let Some((next, d)) = found else {
            break; // isolated pixel
        };
        let prev = DIRS[(d + 7) % 8];
        back = Point::new(cur.x + prev.0, cur.y + prev.1);

        if cur == start && contour.len() > 1 && next == contour[1] {
            contour.pop();
            break;
        }
        contour.push(next);
        cur = next;
    }
    contour
}

/// Drops points where the boundary continues in the same direction.
fn compress_runs(points: &[Point]) -> Vec<Point> {
    let n = points.len();
    if n < 3 {
        return points.to_vec();
    }
    let step = |a: Point, b: Point| ((b.x - a.x).signum(), (b.y - a.y).signum());
    (0..n)
        .filter(|&i| {
            let prev = points[(i + n - 1) % n];
            let next = points[(i + 1) % n];
            step(prev, points[i]) != step(points[i], next)
        })
        .map(|i| points[i])
        .collect()
}

/// Absolute polygon area (shoelace).
pub fn contour_area(points: &[Point]) -> f64 {
    let n = points.len();
    if n < 3 {
        return 0.0;
    }
    let twice: i64 = (0..n)
        .map(|i| {
            let a = points[i];
            let b = points[(i + 1) % n];
            a.x as i64 * b.y as i64 - b.x as i64 * a.y as i64
        })
        .sum();
    twice.abs() as f64 / 2.0
}

/// Perimeter of the closed polygon.
pub fn arc_length_closed(points: &[Point]) -> f64 {
    let n = points.len();
    if n < 2 {
        return 0.0;
    }
    (0..n).map(|i| distance(points[i], points[(i + 1) % n])).sum()
}

fn distance(a: Point, b: Point) -> f64 {
    (((a.x - b.x) as f64).powi(2) + ((a.y - b.y) as f64).powi(2)).sqrt()
}

/// Distance from `p` to the segment `a..b`.
fn segment_distance(p: Point, a: Point, b: Point) -> f64 {
    let (abx, aby) = ((b.x - a.x) as f64, (b.y - a.y) as f64);
    let len2 = abx * abx + aby * aby;
    if len2 == 0.0 {
        return distance(p, a);
    }
    let t = (((p.x - a.x) as f64 * abx + (p.y - a.y) as f64 * aby) / len2).clamp(0.0, 1.0);
    let (cx, cy) = (a.x as f64 + t * abx, a.y as f64 + t * aby);
    ((p.x as f64 - cx).powi(2) + (p.y as f64 - cy).powi(2)).sqrt()
}

/// Douglas–Peucker simplification of a closed polygon.
///
/// The ring is split at the vertex farthest from the first one and each
/// half is simplified as an open chain.
pub fn approx_poly_closed(points: &[Point], epsilon: f64) -> Vec<Point> {
    let n = points.len();
    if n < 4 {
        return points.to_vec();
    }
    let anchor = points[0];
    let far = (1..n)
        .max_by(|&a, &b| {
            distance(anchor, points[a])
                .partial_cmp(&distance(anchor, points[b]))
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .unwrap_or(n / 2);

    let first: Vec<Point> = points[..=far].to_vec();
    let mut second: Vec<Point> = points[far..].to_vec();
    second.push(anchor);

    let mut out = simplify_chain(&first, epsilon);
    let tail = simplify_chain(&second, epsilon);
    // Both chains share `far`; the second also ends on the anchor again.
    out.extend_from_slice(&tail[1..tail.len() - 1]);
    out
}

fn simplify_chain(chain: &[Point], epsilon: f64) -> Vec<Point> {
    let n = chain.len();
    if n < 3 {
        return chain.to_vec();
    }
    let mut keep = vec![false; n];
    keep[0] = true;
    keep[n - 1] = true;
    let mut stack = vec![(0usize, n - 1)];
    while let Some((lo, hi)) = stack.pop() {
        if hi <= lo + 1 {
            continue;
        }
        let (mut best, mut best_dist) = (lo, 0.0);
        for i in lo + 1..hi {
            let d = segment_distance(chain[i], chain[lo], chain[hi]);
            if d > best_dist {
                best = i;
                best_dist = d;
            }
        }
        if best_dist > epsilon {
            keep[best] = true;
            stack.push((lo, best));
            stack.push((best, hi));
        }
    }
    chain
        .iter()
        .zip(keep)
        .filter_map(|(&p, k)| k.then_some(p))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::rect::Rect;
    use approx::assert_relative_eq;

    fn mask_with(rects: &[Rect], w: u32, h: u32) -> GrayFrame {
        let mut img = GrayFrame::zeros(w, h);
        for r in rects {
            img.fill_rect(r, 255);
        }
        img
    }

    #[test]
    fn test_empty_mask_has_no_contours() {
        assert!(find_external_contours(&GrayFrame::zeros(8, 8)).is_empty());
    }

    #[test]
    fn test_rectangle_yields_four_corners() {
        let mask = mask_with(&[Rect::new(2, 3, 5, 4)], 12, 12);
        let contours = find_external_contours(&mask);
        assert_eq!(contours.len(), 1);
        let c = &contours[0];
        assert_eq!(c.len(), 4);
        for corner in [
            Point::new(2, 3),
            Point::new(6, 3),
            Point::new(6, 6),
            Point::new(2, 6),
        ] {
            assert!(c.contains(&corner), "missing {corner:?} in {c:?}");
        }
        assert_relative_eq!(contour_area(c), 12.0);
    }

    #[test]
    fn test_separate_blobs_are_separate_contours() {
        let mask = mask_with(&[Rect::new(1, 1, 3, 3), Rect::new(8, 8, 5, 5)], 16, 16);
        let contours = find_external_contours(&mask);
        assert_eq!(contours.len(), 2);
        let largest = contours
            .iter()
            .map(|c| contour_area(c))
            .fold(0.0, f64::max);
        assert_relative_eq!(largest, 16.0);
    }

    #[test]
    fn test_single_pixel_blob() {
        let mask = mask_with(&[Rect::new(4, 4, 1, 1)], 8, 8);
        let contours = find_external_contours(&mask);
        assert_eq!(contours, vec![vec![Point::new(4, 4)]]);
        assert_relative_eq!(contour_area(&contours[0]), 0.0);
    }

    #[test]
    fn test_blob_touching_border_is_traced() {
        let mask = mask_with(&[Rect::new(0, 0, 4, 4)], 4, 4);
        let contours = find_external_contours(&mask);
        assert_eq!(contours.len(), 1);
        assert_relative_eq!(contour_area(&contours[0]), 9.0);
    }

    #[test]
    fn test_arc_length_of_square() {
        let sq = [
            Point::new(0, 0),
            Point::new(10, 0),
            Point::new(10, 10),
            Point::new(0, 10),
        ];
        assert_relative_eq!(arc_length_closed(&sq), 40.0);
    }

    #[test]
    fn test_approx_poly_drops_shallow_bumps() {
        // Square with a 1px bump on the top edge.
        let ring = vec![
            Point::new(0, 0),
            Point::new(20, 0),
            Point::new(21, 1),
            Point::new(40, 0),
            Point::new(40, 40),
            Point::new(0, 40),
        ];
        let simplified = approx_poly_closed(&ring, 2.0);
        assert_eq!(simplified.len(), 4);
        assert!(!simplified.contains(&Point::new(21, 1)));
    }

    #[test]
    fn test_approx_poly_keeps_deep_notch() {
        let ring = vec![
            Point::new(0, 0),
            Point::new(18, 0),
            Point::new(20, 30),
            Point::new(22, 0),
            Point::new(40, 0),
            Point::new(40, 40),
            Point::new(0, 40),
        ];
        let simplified = approx_poly_closed(&ring, 2.0);
        assert!(simplified.contains(&Point::new(20, 30)));
    }
}
