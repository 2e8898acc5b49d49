pub mod background_model;
pub mod contour;
pub mod convexity;
#[cfg(test)]
pub(crate) mod fixtures;
pub mod gesture_code;
pub mod hand_gesture_recognizer;
