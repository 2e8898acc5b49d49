use std::time::Duration;

use crate::detection::domain::hand_detector::CascadeParams;
use crate::shared::constants::{
    BACKGROUND_ALPHA, BACKGROUND_CALIBRATION_FRAMES, DEFECT_ANGLE_CUTOFF_DEG,
    ENROLLMENT_SAMPLE_SIZE, FACE_CONFIDENCE_THRESHOLD, FACE_CROP_SIZE, FOREGROUND_THRESHOLD,
    GESTURE_TIMEOUT, RECOGNITION_DISTANCE_THRESHOLD,
};

/// Policy knobs for one recognition session.
#[derive(Clone, Debug, PartialEq)]
pub struct PipelineConfig {
    /// Face detections at or below this confidence are ignored.
    pub face_confidence: f64,
    /// Largest recognizer distance still accepted as a match (inclusive).
    pub max_match_distance: f64,
    pub enrollment_samples: usize,
    /// Side of the square luma crops fed to the recognizer.
    pub face_crop_size: u32,
    pub calibration_frames: usize,
    pub background_alpha: f32,
    /// Per-pixel difference from the background a pixel must exceed to be
    /// foreground.
    pub foreground_threshold: u8,
    pub defect_angle_deg: f64,
    pub gesture_timeout: Duration,
    pub cascade: CascadeParams,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            face_confidence: FACE_CONFIDENCE_THRESHOLD,
            max_match_distance: RECOGNITION_DISTANCE_THRESHOLD,
            enrollment_samples: ENROLLMENT_SAMPLE_SIZE,
            face_crop_size: FACE_CROP_SIZE,
            calibration_frames: BACKGROUND_CALIBRATION_FRAMES,
            background_alpha: BACKGROUND_ALPHA,
            foreground_threshold: FOREGROUND_THRESHOLD,
            defect_angle_deg: DEFECT_ANGLE_CUTOFF_DEG,
            gesture_timeout: GESTURE_TIMEOUT,
            cascade: CascadeParams::default(),
        }
    }
}

impl PipelineConfig {
    /// Rejects settings the state machine cannot run with.
    pub fn validate(&self) -> Result<(), String> {
        if self.enrollment_samples == 0 {
            return Err("enrollment sample count must be at least 1".into());
        }
        if self.calibration_frames == 0 {
            return Err("background calibration needs at least 1 frame".into());
        }
        if !(0.0..=1.0).contains(&self.background_alpha) || self.background_alpha == 0.0 {
            return Err(format!("background alpha must be in (0, 1], got {}", self.background_alpha));
        }
        if self.face_crop_size == 0 {
            return Err("face crop size must be positive".into());
        }
        if self.cascade.scale_factor <= 1.0 {
            return Err(format!(
                "hand scale factor must exceed 1, got {}",
                self.cascade.scale_factor
            ));
        }
        Ok(())
    }
}
