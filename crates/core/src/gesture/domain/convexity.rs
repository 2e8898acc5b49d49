use super::contour::Point;

/// A place where the contour dips inward between two hull vertices.
///
/// All three fields index into the contour the defect was computed from.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ConvexityDefect {
    pub start: usize,
    pub end: usize,
    pub far: usize,
    pub depth: f64,
}

fn cross(o: Point, a: Point, b: Point) -> i64 {
    (a.x - o.x) as i64 * (b.y - o.y) as i64 - (a.y - o.y) as i64 * (b.x - o.x) as i64
}

/// Indices of the contour vertices on its convex hull, ascending.
///
/// Collinear points along a hull edge are not hull vertices. Sorting by
/// contour index (rather than by hull winding) is what lets
/// [`convexity_defects`] walk the contour between consecutive vertices.
pub fn convex_hull_indices(points: &[Point]) -> Vec<usize> {
    let n = points.len();
    if n < 3 {
        return (0..n).collect();
    }
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by_key(|&i| (points[i].x, points[i].y));
    order.dedup_by_key(|i| points[*i]);
    if order.len() < 3 {
        return order;
    }

    // Andrew's monotone chain.
    let mut hull: Vec<usize> = Vec::with_capacity(2 * order.len());
    for &i in &order {
        while hull.len() >= 2
            && cross(points[hull[hull.len() - 2]], points[hull[hull.len() - 1]], points[i]) <= 0
        {
            hull.pop();
        }
        hull.push(i);
    }
    let lower_len = hull.len() + 1;
    for &i in order.iter().rev().skip(1) {
        while hull.len() >= lower_len
            && cross(points[hull[hull.len() - 2]], points[hull[hull.len() - 1]], points[i]) <= 0
        {
            hull.pop();
        }
        hull.push(i);
    }
    hull.pop();
    hull.sort_unstable();
    hull
}

/// Convexity defects between consecutive hull vertices (including the
/// wrap from the last back to the first).
///
/// For each hull edge the contour point farthest from the edge becomes the
/// defect's `far` point; edges with no contour point strictly inside the
/// hull produce no defect.
pub fn convexity_defects(points: &[Point], hull: &[usize]) -> Vec<ConvexityDefect> {
    let n = points.len();
    if n < 4 || hull.len() < 3 {
        return Vec::new();
    }
    let mut defects = Vec::new();
    for (k, &start) in hull.iter().enumerate() {
        let end = hull[(k + 1) % hull.len()];
        let (a, b) = (points[start], points[end]);
        let (dx, dy) = ((b.x - a.x) as f64, (b.y - a.y) as f64);
        let len = (dx * dx + dy * dy).sqrt();
        if len == 0.0 {
            continue;
        }

        let span = (end + n - start) % n;
        let mut best: Option<(usize, f64)> = None;
        for step in 1..span {
            let i = (start + step) % n;
            let p = points[i];
            let depth = ((p.x - a.x) as f64 * dy - (p.y - a.y) as f64 * dx).abs() / len;
            if depth > best.map_or(0.0, |(_, d)| d) {
                best = Some((i, depth));
            }
        }
        if let Some((far, depth)) = best {
            defects.push(ConvexityDefect {
                start,
                end,
                far,
                depth,
            });
        }
    }
    defects
}

/// Angle at `far` between the rays towards `start` and `end`, in radians.
pub fn defect_angle(start: Point, end: Point, far: Point) -> f64 {
    let v1 = ((start.x - far.x) as f64, (start.y - far.y) as f64);
    let v2 = ((end.x - far.x) as f64, (end.y - far.y) as f64);
    let cross = v1.0 * v2.1 - v1.1 * v2.0;
    let dot = v1.0 * v2.0 + v1.1 * v2.1;
    cross.abs().atan2(dot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_2;

    fn pts(coords: &[(i32, i32)]) -> Vec<Point> {
        coords.iter().map(|&(x, y)| Point::new(x, y)).collect()
    }

    #[test]
    fn test_hull_of_square_is_all_corners() {
        let sq = pts(&[(0, 0), (10, 0), (10, 10), (0, 10)]);
        assert_eq!(convex_hull_indices(&sq), vec![0, 1, 2, 3]);
        assert!(convexity_defects(&sq, &[0, 1, 2, 3]).is_empty());
    }

    #[test]
    fn test_hull_skips_collinear_and_interior_points() {
        let shape = pts(&[(0, 0), (5, 0), (10, 0), (10, 10), (5, 4), (0, 10)]);
        assert_eq!(convex_hull_indices(&shape), vec![0, 2, 3, 5]);
    }

    #[test]
    fn test_single_notch_produces_one_defect() {
        // U shape: notch from the top edge down to (5, 6). The notch lips
        // are collinear with the top edge, so the defect spans the corners.
        let shape = pts(&[(0, 0), (4, 0), (5, 6), (6, 0), (10, 0), (10, 10), (0, 10)]);
        let hull = convex_hull_indices(&shape);
        assert_eq!(hull, vec![0, 4, 5, 6]);
        let defects = convexity_defects(&shape, &hull);
        assert_eq!(defects.len(), 1);
        let d = defects[0];
        assert_eq!((d.start, d.far, d.end), (0, 2, 4));
        assert_relative_eq!(d.depth, 6.0);
    }

    #[test]
    fn test_wrapping_edge_is_checked() {
        // Notch sits between the last and first hull vertex.
        let shape = pts(&[(10, 0), (10, 10), (0, 10), (0, 0), (4, 0), (5, 3)]);
        let hull = convex_hull_indices(&shape);
        let defects = convexity_defects(&shape, &hull);
        assert_eq!(defects.len(), 1);
        assert_eq!(shape[defects[0].far], Point::new(5, 3));
    }

    #[test]
    fn test_defect_angle_right_angle() {
        let angle = defect_angle(Point::new(0, -5), Point::new(5, 0), Point::new(0, 0));
        assert_relative_eq!(angle, FRAC_PI_2);
    }

    #[test]
    fn test_defect_angle_is_orientation_free() {
        let a = defect_angle(Point::new(-3, -10), Point::new(3, -10), Point::new(0, 0));
        let b = defect_angle(Point::new(3, -10), Point::new(-3, -10), Point::new(0, 0));
        assert_relative_eq!(a, b);
        assert!(a.to_degrees() < 80.0);
    }
}
