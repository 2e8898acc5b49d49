//! Shared math utilities for detection infrastructure.
//!
//! Provides union-find clustering, bounding-box IoU and cascade-style
//! rectangle grouping used by the detection backends.

use crate::shared::rect::Rect;

/// Relative tolerance under which two candidate boxes count as the same
/// object when grouping.
pub const GROUP_EPS: f64 = 0.2;

/// IoU between two bounding boxes represented as `[x1, y1, x2, y2]`.
pub fn bbox_iou(a: &[f64; 4], b: &[f64; 4]) -> f64 {
    let x1 = a[0].max(b[0]);
    let y1 = a[1].max(b[1]);
    let x2 = a[2].min(b[2]);
    let y2 = a[3].min(b[3]);

    let inter = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    if inter == 0.0 {
        return 0.0;
    }

    let area_a = (a[2] - a[0]) * (a[3] - a[1]);
    let area_b = (b[2] - b[0]) * (b[3] - b[1]);
    inter / (area_a + area_b - inter)
}

/// Find root of element `i` with path halving for amortized near-O(1).
pub fn find(parent: &mut [usize], mut i: usize) -> usize {
    while parent[i] != i {
        parent[i] = parent[parent[i]];
        i = parent[i];
    }
    i
}

/// Merge the sets containing `a` and `b`.
pub fn union(parent: &mut [usize], a: usize, b: usize) {
    let ra = find(parent, a);
    let rb = find(parent, b);
    if ra != rb {
        parent[ra] = rb;
    }
}

/// Collect union-find clusters as lists of member indices.
///
/// Members are ascending and clusters are ordered by their first member, so
/// output is deterministic.
pub fn collect_clusters(parent: &mut [usize]) -> Vec<Vec<usize>> {
    let mut by_root: std::collections::HashMap<usize, Vec<usize>> =
        std::collections::HashMap::new();
    for i in 0..parent.len() {
        let root = find(parent, i);
        by_root.entry(root).or_default().push(i);
    }
    let mut clusters: Vec<Vec<usize>> = by_root.into_values().collect();
    clusters.sort_by_key(|c| c[0]);
    clusters
}

/// Whether two boxes are close enough in every edge to be one object.
fn similar(a: &Rect, b: &Rect, eps: f64) -> bool {
    let delta = eps * (a.width.min(b.width) + a.height.min(b.height)) as f64 * 0.5;
    let close = |p: i32, q: i32| ((p - q).abs() as f64) <= delta;
    close(a.x, b.x) && close(a.y, b.y) && close(a.right(), b.right()) && close(a.bottom(), b.bottom())
}

/// Cluster raw multi-scale hits and reduce each cluster to its mean box.
///
/// Clusters with fewer than `min_neighbors` members are treated as noise.
/// A `min_neighbors` of 0 disables grouping and returns the input.
pub fn group_rectangles(candidates: &[Rect], min_neighbors: usize, eps: f64) -> Vec<Rect> {
    if min_neighbors == 0 {
        return candidates.to_vec();
    }
    let n = candidates.len();
    let mut parent: Vec<usize> = (0..n).collect();
    for i in 0..n {
        for j in (i + 1)..n {
            if similar(&candidates[i], &candidates[j], eps) {
                union(&mut parent, i, j);
            }
        }
    }

    collect_clusters(&mut parent)
        .into_iter()
        .filter(|members| members.len() >= min_neighbors)
        .map(|members| {
            let count = members.len() as f64;
            let mut sum = [0.0f64; 4];
            for &m in &members {
                let r = candidates[m];
                sum[0] += r.x as f64;
                sum[1] += r.y as f64;
                sum[2] += r.width as f64;
                sum[3] += r.height as f64;
            }
            Rect::new(
                (sum[0] / count).round() as i32,
                (sum[1] / count).round() as i32,
                (sum[2] / count).round() as i32,
                (sum[3] / count).round() as i32,
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bbox_iou_no_overlap() {
        let a = [0.0, 0.0, 10.0, 10.0];
        let b = [20.0, 20.0, 30.0, 30.0];
        assert_eq!(bbox_iou(&a, &b), 0.0);
    }

    #[test]
    fn test_bbox_iou_partial_overlap() {
        let a = [0.0, 0.0, 10.0, 10.0];
        let b = [5.0, 5.0, 15.0, 15.0];
        let expected = 25.0 / 175.0;
        assert!((bbox_iou(&a, &b) - expected).abs() < 1e-9);
    }

    #[test]
    fn test_union_find_transitive() {
        let mut parent = vec![0, 1, 2];
        union(&mut parent, 0, 1);
        union(&mut parent, 1, 2);
        assert_eq!(find(&mut parent, 0), find(&mut parent, 2));
    }

    #[test]
    fn test_collect_clusters_ordered_by_first_member() {
        let mut parent = vec![0, 1, 2, 3];
        union(&mut parent, 3, 1);
        union(&mut parent, 2, 0);
        assert_eq!(collect_clusters(&mut parent), vec![vec![0, 2], vec![1, 3]]);
    }

    #[test]
    fn test_group_rectangles_averages_cluster() {
        let hits: Vec<Rect> = (0..5).map(|i| Rect::new(100 + i, 50, 40, 40)).collect();
        let grouped = group_rectangles(&hits, 5, GROUP_EPS);
        assert_eq!(grouped, vec![Rect::new(102, 50, 40, 40)]);
    }

    #[test]
    fn test_group_rectangles_drops_sparse_clusters() {
        let mut hits: Vec<Rect> = (0..5).map(|i| Rect::new(100 + i, 50, 40, 40)).collect();
        hits.extend((0..4).map(|i| Rect::new(300, 300 + i, 30, 30)));
        let grouped = group_rectangles(&hits, 5, GROUP_EPS);
        assert_eq!(grouped.len(), 1);
        assert_eq!(grouped[0].x, 102);
    }

    #[test]
    fn test_group_rectangles_keeps_distant_objects_apart() {
        let mut hits: Vec<Rect> = (0..5).map(|i| Rect::new(i, 0, 20, 20)).collect();
        hits.extend((0..5).map(|i| Rect::new(200 + i, 0, 20, 20)));
        assert_eq!(group_rectangles(&hits, 5, GROUP_EPS).len(), 2);
    }

    #[test]
    fn test_group_rectangles_zero_neighbors_passthrough() {
        let hits = vec![Rect::new(0, 0, 5, 5)];
        assert_eq!(group_rectangles(&hits, 0, GROUP_EPS), hits);
    }
}
