use thiserror::Error;

use super::contour::{approx_poly_closed, arc_length_closed, contour_area, find_external_contours, Point};
use super::convexity::{convex_hull_indices, convexity_defects, defect_angle, ConvexityDefect};
use super::gesture_code::MAX_FINGERS;
use crate::imaging::gaussian::gaussian_blur;
use crate::imaging::morphology::{dilate, erode};
use crate::shared::annotate::{draw_line, fill_circle, FINGER_DEFECT, HULL_LINE, OTHER_DEFECT};
use crate::shared::constants::DEFECT_ANGLE_CUTOFF_DEG;
use crate::shared::frame::{Frame, GrayFrame};

/// The wrist is assumed to produce one defect on each side of the arm, so
/// anything up to this many defects means a closed hand.
const WRIST_DEFECTS: usize = 2;
const APPROX_EPSILON_FRACTION: f64 = 0.01;
const MORPH_ITERATIONS: usize = 2;
const SEGMENT_BLUR: usize = 5;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SilhouetteError {
    #[error("no foreground contour in silhouette")]
    NoContourFound,
    #[error("hand contour has no convexity defects")]
    NoDefects,
}

/// Geometry of the dominant blob in a silhouette.
#[derive(Clone, Debug)]
pub struct HullAnalysis {
    pub polygon: Vec<Point>,
    pub hull: Vec<usize>,
    pub defects: Vec<ConvexityDefect>,
    /// Parallel to `defects`: whether the defect sits between two fingers.
    pub finger_gaps: Vec<bool>,
    pub fingers: u8,
}

/// Estimates extended fingers from a binary hand silhouette by counting the
/// sharp valleys between hull vertices.
#[derive(Clone, Debug)]
pub struct HandGestureRecognizer {
    angle_cutoff_rad: f64,
}

impl HandGestureRecognizer {
    pub fn new() -> Self {
        Self::with_angle_cutoff(DEFECT_ANGLE_CUTOFF_DEG)
    }

    pub fn with_angle_cutoff(degrees: f64) -> Self {
        Self {
            angle_cutoff_rad: degrees.to_radians(),
        }
    }

    /// Finger count and an annotated RGB rendering of the silhouette.
    ///
    /// Never fails: a silhouette without a usable contour counts as zero.
    pub fn recognize(&self, silhouette: &GrayFrame) -> (u8, Frame) {
        let segment = self.segment(silhouette);
        match self.analyze(&segment) {
            Ok(analysis) => (analysis.fingers, self.render(silhouette, &analysis)),
            Err(SilhouetteError::NoContourFound) => {
                log::debug!("No hand contour in {}x{} silhouette", silhouette.width(), silhouette.height());
                (0, segment.to_rgb())
            }
            Err(SilhouetteError::NoDefects) => (0, silhouette.to_rgb()),
        }
    }

    /// Like [`recognize`](Self::recognize) without the rendering, keeping
    /// the reason a silhouette produced no count.
    pub fn try_recognize(&self, silhouette: &GrayFrame) -> Result<u8, SilhouetteError> {
        self.analyze(&self.segment(silhouette)).map(|a| a.fingers)
    }

    /// Opening followed by a light blur to remove speckle around the hand.
    pub fn segment(&self, silhouette: &GrayFrame) -> GrayFrame {
        let opened = dilate(&erode(silhouette, MORPH_ITERATIONS), MORPH_ITERATIONS);
        gaussian_blur(&opened, SEGMENT_BLUR)
    }

    /// Largest contour of an already segmented mask, simplified and analysed.
    pub fn analyze(&self, segment: &GrayFrame) -> Result<HullAnalysis, SilhouetteError> {
        let largest = find_external_contours(segment)
            .into_iter()
            .max_by(|a, b| contour_area(a).total_cmp(&contour_area(b)))
            .ok_or(SilhouetteError::NoContourFound)?;
        let epsilon = APPROX_EPSILON_FRACTION * arc_length_closed(&largest);
        self.analyze_contour(approx_poly_closed(&largest, epsilon))
    }

    pub fn analyze_contour(&self, polygon: Vec<Point>) -> Result<HullAnalysis, SilhouetteError> {
        let hull = convex_hull_indices(&polygon);
        let defects = convexity_defects(&polygon, &hull);
        if defects.is_empty() {
            return Err(SilhouetteError::NoDefects);
        }
        let finger_gaps: Vec<bool> = defects
            .iter()
            .map(|d| self.is_finger_gap(&polygon, d))
            .collect();
        let fingers = count_fingers(&finger_gaps);
        Ok(HullAnalysis {
            polygon,
            hull,
            defects,
            finger_gaps,
            fingers,
        })
    }

    fn is_finger_gap(&self, polygon: &[Point], defect: &ConvexityDefect) -> bool {
        defect_angle(polygon[defect.start], polygon[defect.end], polygon[defect.far]) < self.angle_cutoff_rad
    }

    fn render(&self, silhouette: &GrayFrame, analysis: &HullAnalysis) -> Frame {
        let mut out = silhouette.to_rgb();
        if analysis.defects.len() <= WRIST_DEFECTS {
            return out;
        }
        for (defect, &gap) in analysis.defects.iter().zip(&analysis.finger_gaps) {
            let start = analysis.polygon[defect.start];
            let end = analysis.polygon[defect.end];
            let far = analysis.polygon[defect.far];
            draw_line(&mut out, (start.x, start.y), (end.x, end.y), HULL_LINE, 2);
            let color = if gap { FINGER_DEFECT } else { OTHER_DEFECT };
            fill_circle(&mut out, far.x, far.y, 5, color);
        }
        out
    }
}

impl Default for HandGestureRecognizer {
    fn default() -> Self {
        Self::new()
    }
}

/// One finger for the hand itself plus one per sharp valley, once the
/// wrist's two defects are accounted for.
pub fn count_fingers(finger_gaps: &[bool]) -> u8 {
    if finger_gaps.len() <= WRIST_DEFECTS {
        return 0;
    }
    let narrow = finger_gaps.iter().filter(|&&g| g).count();
    (1 + narrow).min(MAX_FINGERS as usize) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gesture::domain::fixtures::{hand_polygon, rasterize};
    use rstest::rstest;

    #[rstest]
    #[case::two_defects_is_a_fist(3, 0)]
    #[case::three_narrow_defects(4, 4)]
    #[case::four_narrow_defects(5, 5)]
    #[case::clamped_at_five(7, 5)]
    fn test_fingers_from_hand_polygon(#[case] tips: usize, #[case] expected: u8) {
        let recognizer = HandGestureRecognizer::new();
        let analysis = recognizer
            .analyze_contour(hand_polygon(tips, 40.0))
            .unwrap();
        assert_eq!(analysis.defects.len(), tips - 1);
        assert_eq!(analysis.fingers, expected);
    }

    #[test]
    fn test_wide_valleys_are_not_finger_gaps() {
        let recognizer = HandGestureRecognizer::new();
        let analysis = recognizer.analyze_contour(hand_polygon(4, 90.0)).unwrap();
        assert_eq!(analysis.defects.len(), 3);
        assert!(analysis.finger_gaps.iter().all(|&g| !g));
        assert_eq!(analysis.fingers, 1);
    }

    #[test]
    fn test_convex_polygon_has_no_defects() {
        let recognizer = HandGestureRecognizer::new();
        let square = vec![
            Point::new(0, 0),
            Point::new(10, 0),
            Point::new(10, 10),
            Point::new(0, 10),
        ];
        assert_eq!(
            recognizer.analyze_contour(square).unwrap_err(),
            SilhouetteError::NoDefects
        );
    }

    #[rstest]
    #[case(vec![], 0)]
    #[case(vec![true, true], 0)]
    #[case(vec![false, false, false], 1)]
    #[case(vec![true, false, true], 3)]
    #[case(vec![true; 8], 5)]
    fn test_count_fingers_rules(#[case] gaps: Vec<bool>, #[case] expected: u8) {
        assert_eq!(count_fingers(&gaps), expected);
    }

    #[test]
    fn test_empty_silhouette_is_no_contour() {
        let recognizer = HandGestureRecognizer::new();
        let blank = GrayFrame::zeros(64, 64);
        assert_eq!(
            recognizer.try_recognize(&blank),
            Err(SilhouetteError::NoContourFound)
        );
        let (count, rendered) = recognizer.recognize(&blank);
        assert_eq!(count, 0);
        assert_eq!((rendered.width(), rendered.height()), (64, 64));
        assert_eq!(rendered.channels(), 3);
    }

    #[test]
    fn test_speckle_is_removed_by_segmentation() {
        let recognizer = HandGestureRecognizer::new();
        let mut noise = GrayFrame::zeros(32, 32);
        for (x, y) in [(3, 3), (10, 20), (25, 7)] {
            noise.set(x, y, 255);
        }
        assert_eq!(
            recognizer.try_recognize(&noise),
            Err(SilhouetteError::NoContourFound)
        );
    }

    #[test]
    fn test_solid_block_counts_zero() {
        let recognizer = HandGestureRecognizer::new();
        let mut block = GrayFrame::zeros(80, 80);
        block.fill_rect(&crate::shared::rect::Rect::new(20, 20, 40, 40), 255);
        let (count, rendered) = recognizer.recognize(&block);
        assert_eq!(count, 0);
        assert_eq!((rendered.width(), rendered.height()), (80, 80));
    }

    #[test]
    fn test_open_hand_image_counts_five() {
        let recognizer = HandGestureRecognizer::new();
        let mask = rasterize(&hand_polygon(5, 40.0), 300, 300);
        let (count, rendered) = recognizer.recognize(&mask);
        assert_eq!(count, 5);
        assert_eq!((rendered.width(), rendered.height()), (300, 300));
    }
}
