use crate::shared::frame::GrayFrame;

/// Histogram equalization, stretching the cumulative distribution so the
/// darkest populated bin maps to 0 and the brightest to 255.
pub fn equalize_hist(image: &GrayFrame) -> GrayFrame {
    let data = image.data();
    let total = data.len();
    if total == 0 {
        return image.clone();
    }

    let mut hist = [0usize; 256];
    for &v in data {
        hist[v as usize] += 1;
    }

    let first = hist.iter().position(|&c| c > 0).unwrap_or(0);
    let mut lut = [0u8; 256];
    if hist[first] == total {
        // Flat image: nothing to stretch.
        lut.fill(first as u8);
    } else {
        let scale = 255.0 / (total - hist[first]) as f64;
        let mut sum = 0usize;
        for (i, slot) in lut.iter_mut().enumerate().skip(first + 1) {
            sum += hist[i];
            *slot = (sum as f64 * scale).round().clamp(0.0, 255.0) as u8;
        }
    }

    let out = data.iter().map(|&v| lut[v as usize]).collect();
    GrayFrame::new(out, image.width(), image.height())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flat_image_unchanged() {
        let img = GrayFrame::new(vec![42; 16], 4, 4);
        assert_eq!(equalize_hist(&img), img);
    }

    #[test]
    fn test_two_levels_stretch_to_full_range() {
        let img = GrayFrame::new(vec![100, 100, 110, 110], 2, 2);
        let eq = equalize_hist(&img);
        assert_eq!(eq.data(), &[0, 0, 255, 255]);
    }

    #[test]
    fn test_output_is_monotonic_in_input() {
        let img = GrayFrame::new((0..64).map(|v| (v * 3) as u8).collect(), 8, 8);
        let eq = equalize_hist(&img);
        assert!(eq.data().windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(eq.data()[0], 0);
        assert_eq!(eq.data()[63], 255);
    }
}
