use std::time::{Duration, Instant};

use crate::shared::annotate::{draw_rect, TRACKED_HAND};
use crate::shared::constants::GESTURE_TIMEOUT;
use crate::shared::frame::{Frame, GrayFrame};
use crate::shared::rect::Rect;

use super::visual_tracker::VisualTracker;

/// A visual tracker with a deadline: the user gets a fixed window to form a
/// gesture after their hand is first found.
pub struct GestureTracker {
    tracker: Box<dyn VisualTracker>,
    rect: Rect,
    started_at: Instant,
    timeout: Duration,
    timed_out: bool,
}

impl GestureTracker {
    pub fn start(
        luma: &GrayFrame,
        rect: Rect,
        mut tracker: Box<dyn VisualTracker>,
        now: Instant,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        tracker.start(luma, rect)?;
        Ok(Self {
            tracker,
            rect,
            started_at: now,
            timeout: GESTURE_TIMEOUT,
            timed_out: false,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Advance one frame and outline the tracked region on `frame`.
    ///
    /// Returns `(timed_out, rect)`. Once the deadline has passed the flag
    /// stays set, and the rectangle is still drawn on that final call. A
    /// tracker failure keeps the previous rectangle.
    pub fn update(&mut self, frame: &mut Frame, luma: &GrayFrame, now: Instant) -> (bool, Rect) {
        match self.tracker.update(luma) {
            Ok(update) => {
                log::trace!("Tracker quality {:.2} at {:?}", update.quality, update.position);
                self.rect = update.position;
            }
            Err(e) => log::debug!("Tracker update failed, keeping last position: {e}"),
        }
        if now.saturating_duration_since(self.started_at) >= self.timeout {
            self.timed_out = true;
        }
        draw_rect(frame, &self.rect, TRACKED_HAND, 2);
        (self.timed_out, self.rect)
    }

    pub fn rect(&self) -> Rect {
        self.rect
    }

    pub fn is_timed_out(&self) -> bool {
        self.timed_out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking::domain::visual_tracker::TrackerUpdate;

    /// Drifts one pixel right per update; fails when `fail` is set.
    struct DriftTracker {
        rect: Rect,
        fail: bool,
    }

    impl VisualTracker for DriftTracker {
        fn start(&mut self, _frame: &GrayFrame, rect: Rect) -> Result<(), Box<dyn std::error::Error>> {
            self.rect = rect;
            Ok(())
        }

        fn update(&mut self, _frame: &GrayFrame) -> Result<TrackerUpdate, Box<dyn std::error::Error>> {
            if self.fail {
                return Err("lost".into());
            }
            self.rect = self.rect.translate(1, 0);
            Ok(TrackerUpdate {
                quality: 10.0,
                position: self.rect,
            })
        }
    }

    fn start(fail: bool, t0: Instant) -> GestureTracker {
        let tracker = Box::new(DriftTracker {
            rect: Rect::default(),
            fail,
        });
        GestureTracker::start(&GrayFrame::zeros(64, 48), Rect::new(10, 10, 20, 20), tracker, t0).unwrap()
    }

    #[test]
    fn test_times_out_at_four_seconds_and_latches() {
        let t0 = Instant::now();
        let mut tracker = start(false, t0);
        let mut frame = Frame::filled(64, 48, [0, 0, 0], 0);
        let luma = GrayFrame::zeros(64, 48);

        let (timed_out, rect) = tracker.update(&mut frame, &luma, t0 + Duration::from_millis(3999));
        assert!(!timed_out);
        assert_eq!(rect, Rect::new(11, 10, 20, 20));

        assert!(tracker.update(&mut frame, &luma, t0 + Duration::from_secs(4)).0);
        // Even if the clock were to go backwards the flag stays set.
        assert!(tracker.update(&mut frame, &luma, t0).0);
        assert!(tracker.is_timed_out());
    }

    #[test]
    fn test_draws_rect_on_timing_out_call() {
        let t0 = Instant::now();
        let mut tracker = start(false, t0);
        let mut frame = Frame::filled(64, 48, [0, 0, 0], 0);
        let (timed_out, rect) = tracker.update(&mut frame, &GrayFrame::zeros(64, 48), t0 + Duration::from_millis(4100));
        assert!(timed_out);
        let px = frame.as_ndarray();
        assert_eq!(
            [px[[rect.y as usize, rect.x as usize, 0]], px[[rect.y as usize, rect.x as usize, 1]]],
            [TRACKED_HAND[0], TRACKED_HAND[1]]
        );
    }

    #[test]
    fn test_failed_update_keeps_previous_rect() {
        let t0 = Instant::now();
        let mut tracker = start(true, t0);
        let mut frame = Frame::filled(64, 48, [0, 0, 0], 0);
        let (_, rect) = tracker.update(&mut frame, &GrayFrame::zeros(64, 48), t0);
        assert_eq!(rect, Rect::new(10, 10, 20, 20));
    }
}
