use crate::shared::frame::Frame;
use crate::shared::rect::Rect;

/// One face box in frame pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FaceDetection {
    pub rect: Rect,
    pub confidence: f64,
}

/// Domain interface for face detection.
///
/// Implementations may keep per-session state, hence `&mut self`.
pub trait FaceDetector: Send {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<FaceDetection>, Box<dyn std::error::Error>>;
}

/// Detections scoring above `min_confidence` whose box lies fully inside a
/// `width` x `height` frame, in detector order.
pub fn accepted_faces(
    detections: &[FaceDetection],
    min_confidence: f64,
    width: u32,
    height: u32,
) -> Vec<Rect> {
    detections
        .iter()
        .filter(|d| d.confidence > min_confidence && d.rect.is_inside(width, height))
        .map(|d| d.rect)
        .collect()
}

/// The largest-area box, first one winning ties.
pub fn largest_face(faces: &[Rect]) -> Option<Rect> {
    faces
        .iter()
        .copied()
        .reduce(|best, r| if r.area() > best.area() { r } else { best })
}
