use std::time::Duration;

pub const FACE_MODEL_NAME: &str = "yolo11n-pose_widerface.onnx";
pub const FACE_MODEL_URL: &str =
    "https://github.com/neutrinographics/faceguard/releases/download/v0.1.0/yolo11n-pose_widerface.onnx";

/// Minimum face detector score for a box to count as a face.
pub const FACE_CONFIDENCE_THRESHOLD: f64 = 0.4;

/// LBPH chi-square distance at or below which a face is accepted.
pub const RECOGNITION_DISTANCE_THRESHOLD: f64 = 80.0;

/// Defects whose opening angle is below this lie between two extended fingers.
pub const DEFECT_ANGLE_CUTOFF_DEG: f64 = 80.0;

/// Time a user has to form a gesture after their hand is first spotted.
pub const GESTURE_TIMEOUT: Duration = Duration::from_secs(4);

/// Empty frames averaged before the background is considered calibrated.
pub const BACKGROUND_CALIBRATION_FRAMES: usize = 30;

/// Weight of the newest frame in the running background average.
pub const BACKGROUND_ALPHA: f32 = 0.5;

/// Face crops collected before an enrollment is trained.
pub const ENROLLMENT_SAMPLE_SIZE: usize = 100;

/// Side length of the square face crops fed to the recognizer.
pub const FACE_CROP_SIZE: u32 = 100;

/// Background difference above which a pixel belongs to the hand.
pub const FOREGROUND_THRESHOLD: u8 = 25;

/// Hand cascade pyramid step.
pub const HAND_SCALE_FACTOR: f64 = 1.3;

/// Raw hand candidates needed to confirm a detection.
pub const HAND_MIN_NEIGHBORS: usize = 5;

pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "mkv", "avi", "webm"];
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "tif", "webp"];

/// Default session resolution for camera-style input.
pub const DEFAULT_FRAME_WIDTH: u32 = 640;
pub const DEFAULT_FRAME_HEIGHT: u32 = 480;
