use std::path::PathBuf;

/// What a frame source delivers once opened.
///
/// `width`/`height` are the dimensions of the frames the reader yields,
/// which may differ from the source's native size when the reader rescales
/// to a session resolution.
#[derive(Clone, Debug, PartialEq)]
pub struct VideoMetadata {
    pub width: u32,
    pub height: u32,
    pub source_width: u32,
    pub source_height: u32,
    /// Zero for sources without a frame rate, such as still images.
    pub fps: f64,
    /// Zero when the container does not say.
    pub total_frames: usize,
    pub source_path: Option<PathBuf>,
}

impl VideoMetadata {
    pub fn is_rescaled(&self) -> bool {
        (self.width, self.height) != (self.source_width, self.source_height)
    }

    /// Wall-clock spacing between frames, if the source has a rate.
    pub fn frame_interval(&self) -> Option<std::time::Duration> {
        (self.fps > 0.0).then(|| std::time::Duration::from_secs_f64(1.0 / self.fps))
    }
}

/// Output dimensions for a source, given an optional forced resolution.
pub fn target_size(source: (u32, u32), forced: Option<(u32, u32)>) -> (u32, u32) {
    forced.unwrap_or(source)
}
