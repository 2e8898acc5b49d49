pub mod clock;
pub mod gesture_tracker;
pub mod visual_tracker;
