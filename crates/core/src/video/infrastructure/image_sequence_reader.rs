use std::path::{Path, PathBuf};

use crate::shared::constants::IMAGE_EXTENSIONS;
use crate::shared::frame::Frame;
use crate::shared::video_metadata::{target_size, VideoMetadata};
use crate::video::domain::video_reader::VideoReader;

/// Replays a directory of still images as a frame stream.
///
/// Files are taken in name order. Every frame is resized to the session
/// resolution, or to the first image's size when none is forced, so the
/// pipeline always sees one fixed frame size.
pub struct ImageSequenceReader {
    paths: Vec<PathBuf>,
    size: Option<(u32, u32)>,
    output_size: Option<(u32, u32)>,
}

impl ImageSequenceReader {
    pub fn new() -> Self {
        Self {
            paths: Vec::new(),
            size: None,
            output_size: None,
        }
    }

    pub fn with_output_size(width: u32, height: u32) -> Self {
        Self {
            output_size: Some((width, height)),
            ..Self::new()
        }
    }
}

impl Default for ImageSequenceReader {
    fn default() -> Self {
        Self::new()
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Image files directly inside `dir`, sorted by file name. A single image
/// path yields itself.
pub fn list_images(path: &Path) -> Result<Vec<PathBuf>, Box<dyn std::error::Error>> {
    if path.is_file() {
        return if is_image(path) {
            Ok(vec![path.to_path_buf()])
        } else {
            Err(format!("Not a supported image: {}", path.display()).into())
        };
    }
    let mut paths: Vec<PathBuf> = std::fs::read_dir(path)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && is_image(p))
        .collect();
    paths.sort();
    Ok(paths)
}

fn load_frame(path: &Path, size: (u32, u32), index: usize) -> Result<Frame, Box<dyn std::error::Error>> {
    let img = image::open(path)?.to_rgb8();
    let img = if img.dimensions() == size {
        img
    } else {
        image::imageops::resize(&img, size.0, size.1, image::imageops::FilterType::Triangle)
    };
    Ok(Frame::new(img.into_raw(), size.0, size.1, 3, index))
}

impl VideoReader for ImageSequenceReader {
    fn open(&mut self, path: &Path) -> Result<VideoMetadata, Box<dyn std::error::Error>> {
        let paths = list_images(path)?;
        let first = paths
            .first()
            .ok_or_else(|| format!("No images found in {}", path.display()))?;
        let source = image::image_dimensions(first)?;
        let (width, height) = target_size(source, self.output_size);
        log::info!("Found {} image(s) in {}", paths.len(), path.display());

        self.size = Some((width, height));
        let total_frames = paths.len();
        self.paths = paths;
        Ok(VideoMetadata {
            width,
            height,
            source_width: source.0,
            source_height: source.1,
            fps: 0.0,
            total_frames,
            source_path: Some(path.to_path_buf()),
        })
    }

    fn frames(
        &mut self,
    ) -> Box<dyn Iterator<Item = Result<Frame, Box<dyn std::error::Error>>> + '_> {
        let Some(size) = self.size else {
            return Box::new(std::iter::once(Err("ImageSequenceReader: not opened".into())));
        };
        Box::new(
            self.paths
                .iter()
                .enumerate()
                .map(move |(i, path)| load_frame(path, size, i)),
        )
    }

    fn close(&mut self) {
        self.paths.clear();
        self.size = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_png(path: &Path, width: u32, height: u32, value: u8) {
        image::RgbImage::from_pixel(width, height, image::Rgb([value, value, value]))
            .save(path)
            .unwrap();
    }

    #[test]
    fn test_reads_images_in_name_order_and_skips_other_files() {
        let dir = tempfile::tempdir().unwrap();
        write_png(&dir.path().join("b.png"), 32, 24, 20);
        write_png(&dir.path().join("a.png"), 32, 24, 10);
        std::fs::write(dir.path().join("notes.txt"), "not an image").unwrap();

        let mut reader = ImageSequenceReader::new();
        let meta = reader.open(dir.path()).unwrap();
        assert_eq!(meta.total_frames, 2);
        assert_eq!((meta.width, meta.height), (32, 24));
        assert_eq!(meta.fps, 0.0);

        let frames: Vec<Frame> = reader.frames().map(|f| f.unwrap()).collect();
        assert_eq!(frames[0].data()[0], 10);
        assert_eq!(frames[1].data()[0], 20);
        assert_eq!(frames[1].index(), 1);
    }

    #[test]
    fn test_mixed_sizes_are_resized_to_first_image() {
        let dir = tempfile::tempdir().unwrap();
        write_png(&dir.path().join("0.png"), 40, 30, 0);
        write_png(&dir.path().join("1.png"), 80, 60, 0);

        let mut reader = ImageSequenceReader::new();
        reader.open(dir.path()).unwrap();
        for frame in reader.frames() {
            let frame = frame.unwrap();
            assert_eq!((frame.width(), frame.height()), (40, 30));
        }
    }

    #[test]
    fn test_output_size_forces_resolution() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("still.jpg");
        write_png(&path, 64, 64, 128);

        let mut reader = ImageSequenceReader::with_output_size(32, 16);
        let meta = reader.open(&path).unwrap();
        assert!(meta.is_rescaled());
        let frame = reader.frames().next().unwrap().unwrap();
        assert_eq!(frame.data().len(), 32 * 16 * 3);
    }

    #[test]
    fn test_empty_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ImageSequenceReader::new().open(dir.path()).is_err());
    }

    #[test]
    fn test_frames_before_open_returns_error() {
        let mut reader = ImageSequenceReader::new();
        assert!(reader.frames().next().unwrap().is_err());
    }
}
