use std::path::Path;

use crate::shared::frame::Frame;
use crate::video::domain::image_writer::ImageWriter;

/// Writes annotated frames to image files using the `image` crate.
///
/// The format follows the path's extension.
pub struct ImageFileWriter;

impl ImageFileWriter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ImageFileWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageWriter for ImageFileWriter {
    fn write(&self, path: &Path, frame: &Frame) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let data = match frame.channels() {
            3 => frame.data().to_vec(),
            1 => frame.data().iter().flat_map(|&v| [v, v, v]).collect(),
            c => return Err(format!("Cannot write a {c}-channel frame as an image").into()),
        };
        let img = image::RgbImage::from_raw(frame.width(), frame.height(), data)
            .ok_or("Failed to create image from frame data")?;

        img.save(path)?;
        Ok(())
    }
}
