use std::path::Path;

use crate::shared::frame::GrayFrame;

use super::identity_store::IdentityKey;

/// Closest enrolled identity for a face crop. Lower distance is better.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Prediction {
    pub key: IdentityKey,
    pub distance: f64,
}

/// Domain interface for identifying fixed-size luma face crops.
pub trait FaceRecognizer: Send {
    /// Replace the whole model with `samples`, all labelled `key`.
    fn train(&mut self, samples: &[GrayFrame], key: IdentityKey) -> Result<(), Box<dyn std::error::Error>>;

    /// Add `samples` to the existing model.
    fn update(&mut self, samples: &[GrayFrame], key: IdentityKey) -> Result<(), Box<dyn std::error::Error>>;

    fn predict(&self, face: &GrayFrame) -> Result<Prediction, Box<dyn std::error::Error>>;

    fn save(&self, path: &Path) -> Result<(), Box<dyn std::error::Error>>;

    fn load(&mut self, path: &Path) -> Result<(), Box<dyn std::error::Error>>;

    fn is_trained(&self) -> bool;

    /// An independent copy of the current model.
    fn snapshot(&self) -> Box<dyn FaceRecognizer>;
}
