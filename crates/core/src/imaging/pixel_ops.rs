use crate::shared::frame::GrayFrame;

/// Per-pixel `|a - b|`. Both images must share dimensions.
pub fn abs_diff(a: &GrayFrame, b: &GrayFrame) -> Option<GrayFrame> {
    if a.width() != b.width() || a.height() != b.height() {
        return None;
    }
    let data = a
        .data()
        .iter()
        .zip(b.data())
        .map(|(&x, &y)| x.abs_diff(y))
        .collect();
    Some(GrayFrame::new(data, a.width(), a.height()))
}

/// `max_value` where the pixel is strictly above `thresh`, 0 elsewhere.
pub fn threshold_binary(image: &GrayFrame, thresh: u8, max_value: u8) -> GrayFrame {
    let data = image
        .data()
        .iter()
        .map(|&v| if v > thresh { max_value } else { 0 })
        .collect();
    GrayFrame::new(data, image.width(), image.height())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_abs_diff_is_symmetric() {
        let a = GrayFrame::new(vec![10, 200, 50], 3, 1);
        let b = GrayFrame::new(vec![30, 100, 50], 3, 1);
        assert_eq!(abs_diff(&a, &b).unwrap().data(), &[20, 100, 0]);
        assert_eq!(abs_diff(&b, &a), abs_diff(&a, &b));
    }

    #[test]
    fn test_abs_diff_rejects_mismatched_sizes() {
        let a = GrayFrame::zeros(3, 1);
        let b = GrayFrame::zeros(1, 3);
        assert!(abs_diff(&a, &b).is_none());
    }

    #[test]
    fn test_threshold_is_strict() {
        let img = GrayFrame::new(vec![24, 25, 26, 255], 4, 1);
        assert_eq!(threshold_binary(&img, 25, 255).data(), &[0, 0, 255, 255]);
    }
}
