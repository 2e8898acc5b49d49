//! Face-gated hand-gesture recognition.
//!
//! A [`pipeline::recognition_pipeline::RecognitionPipeline`] enrolls a
//! user's face, recognizes it in later frames, and once a known face is in
//! view follows a nearby hand long enough to count its extended fingers.

pub mod detection;
pub mod gesture;
pub mod imaging;
pub mod pipeline;
pub mod recognition;
pub mod shared;
pub mod tracking;
pub mod video;
