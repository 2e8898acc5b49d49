use crate::shared::constants::{HAND_MIN_NEIGHBORS, HAND_SCALE_FACTOR};
use crate::shared::frame::GrayFrame;
use crate::shared::rect::Rect;

/// Multi-scale search parameters, cascade style.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CascadeParams {
    /// Ratio between consecutive pyramid levels; must exceed 1.
    pub scale_factor: f64,
    /// Raw candidates a cluster needs before it is reported.
    pub min_neighbors: usize,
}

impl Default for CascadeParams {
    fn default() -> Self {
        Self {
            scale_factor: HAND_SCALE_FACTOR,
            min_neighbors: HAND_MIN_NEIGHBORS,
        }
    }
}

/// Domain interface for hand region detection on a luminance frame.
pub trait HandDetector: Send {
    fn detect_multi_scale(
        &mut self,
        luma: &GrayFrame,
        params: &CascadeParams,
    ) -> Result<Vec<Rect>, Box<dyn std::error::Error>>;
}
