use crate::shared::frame::GrayFrame;
use crate::shared::rect::Rect;

/// Result of advancing a tracker by one frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TrackerUpdate {
    /// Confidence in the new position; higher is better, scale is tracker
    /// specific.
    pub quality: f64,
    pub position: Rect,
}

/// Follows one rectangular region from frame to frame.
pub trait VisualTracker: Send {
    fn start(&mut self, frame: &GrayFrame, rect: Rect) -> Result<(), Box<dyn std::error::Error>>;

    fn update(&mut self, frame: &GrayFrame) -> Result<TrackerUpdate, Box<dyn std::error::Error>>;
}

/// Makes a fresh tracker for each tracked hand.
pub trait TrackerFactory: Send + Sync {
    fn create(&self) -> Box<dyn VisualTracker>;
}

impl<F> TrackerFactory for F
where
    F: Fn() -> Box<dyn VisualTracker> + Send + Sync,
{
    fn create(&self) -> Box<dyn VisualTracker> {
        self()
    }
}
