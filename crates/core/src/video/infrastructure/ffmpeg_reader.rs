use std::path::Path;

use ffmpeg_next::format::context::Input;
use ffmpeg_next::util::frame::video::Video as Picture;

use crate::shared::frame::Frame;
use crate::shared::video_metadata::{target_size, VideoMetadata};
use crate::video::domain::video_reader::VideoReader;

type FrameResult = Result<Frame, Box<dyn std::error::Error>>;

/// Plays back a recorded camera session through ffmpeg-next.
///
/// Frames come out as RGB24, scaled to the session resolution when one is
/// set, so recordings from any camera feed a pipeline of fixed size.
pub struct FfmpegReader {
    input: Option<Input>,
    stream_index: usize,
    output_size: Option<(u32, u32)>,
}

// Safety: the input context is only touched by the thread that currently
// owns the reader; no ffmpeg pointer is shared.
unsafe impl Send for FfmpegReader {}

impl FfmpegReader {
    pub fn new() -> Self {
        Self {
            input: None,
            stream_index: 0,
            output_size: None,
        }
    }

    /// Scale every frame to `width` x `height`.
    pub fn with_output_size(width: u32, height: u32) -> Self {
        Self {
            output_size: Some((width, height)),
            ..Self::new()
        }
    }
}

impl Default for FfmpegReader {
    fn default() -> Self {
        Self::new()
    }
}

struct VideoStream {
    index: usize,
    decoder: ffmpeg_next::decoder::Video,
    fps: f64,
    total_frames: usize,
}

fn best_video_stream(input: &Input) -> Result<VideoStream, Box<dyn std::error::Error>> {
    let stream = input
        .streams()
        .best(ffmpeg_next::media::Type::Video)
        .ok_or("no video stream in input")?;
    let decoder = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())?
        .decoder()
        .video()?;
    let rate = stream.rate();
    let fps = match rate.denominator() {
        0 => 0.0,
        den => f64::from(rate.numerator()) / f64::from(den),
    };
    Ok(VideoStream {
        index: stream.index(),
        decoder,
        fps,
        total_frames: stream.frames().max(0) as usize,
    })
}

impl VideoReader for FfmpegReader {
    fn open(&mut self, path: &Path) -> Result<VideoMetadata, Box<dyn std::error::Error>> {
        ffmpeg_next::init()?;
        let input = ffmpeg_next::format::input(path)?;
        let stream = best_video_stream(&input)?;
        let source = (stream.decoder.width(), stream.decoder.height());
        let (width, height) = target_size(source, self.output_size);

        let metadata = VideoMetadata {
            width,
            height,
            source_width: source.0,
            source_height: source.1,
            fps: stream.fps,
            total_frames: stream.total_frames,
            source_path: Some(path.to_path_buf()),
        };
        if metadata.is_rescaled() {
            log::info!(
                "Rescaling {} from {}x{} to {width}x{height}",
                path.display(),
                source.0,
                source.1
            );
        }

        self.stream_index = stream.index;
        self.input = Some(input);
        Ok(metadata)
    }

    fn frames(&mut self) -> Box<dyn Iterator<Item = FrameResult> + '_> {
        let output_size = self.output_size;
        let stream_index = self.stream_index;
        let Some(input) = self.input.as_mut() else {
            return Box::new(std::iter::once(Err("video source is not open".into())));
        };
        let converter = best_video_stream(input).and_then(|s| RgbConverter::new(s.decoder, output_size));
        match converter {
            Ok(converter) => Box::new(DecodedFrames {
                input,
                stream_index,
                converter,
                next_index: 0,
                state: DecodeState::Reading,
            }),
            Err(e) => Box::new(std::iter::once(Err(e))),
        }
    }

    fn close(&mut self) {
        self.input = None;
    }
}

/// A decoder paired with the swscale pass that turns its pictures into
/// packed RGB24 at the session size.
struct RgbConverter {
    decoder: ffmpeg_next::decoder::Video,
    scaler: ffmpeg_next::software::scaling::Context,
    width: u32,
    height: u32,
}

impl RgbConverter {
    fn new(
        decoder: ffmpeg_next::decoder::Video,
        output_size: Option<(u32, u32)>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let (width, height) = target_size((decoder.width(), decoder.height()), output_size);
        let scaler = ffmpeg_next::software::scaling::Context::get(
            decoder.format(),
            decoder.width(),
            decoder.height(),
            ffmpeg_next::format::Pixel::RGB24,
            width,
            height,
            ffmpeg_next::software::scaling::Flags::BILINEAR,
        )?;
        Ok(Self {
            decoder,
            scaler,
            width,
            height,
        })
    }

    /// The next picture the decoder has ready, converted. `None` when the
    /// decoder needs more input.
    fn pull(&mut self, index: usize) -> Option<FrameResult> {
        let mut decoded = Picture::empty();
        self.decoder.receive_frame(&mut decoded).ok()?;
        let mut rgb = Picture::empty();
        if let Err(e) = self.scaler.run(&decoded, &mut rgb) {
            return Some(Err(Box::new(e)));
        }
        let pixels = packed_rgb(&rgb, self.width, self.height);
        Some(Ok(Frame::new(pixels, self.width, self.height, 3, index)))
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum DecodeState {
    Reading,
    /// End of input signalled; pictures still buffered in the decoder.
    Draining,
    Finished,
}

/// Decodes on demand, one packet at a time.
struct DecodedFrames<'a> {
    input: &'a mut Input,
    stream_index: usize,
    converter: RgbConverter,
    next_index: usize,
    state: DecodeState,
}

impl DecodedFrames<'_> {
    fn feed_packet(&mut self) {
        match self.input.packets().next() {
            Some((stream, packet)) => {
                if stream.index() != self.stream_index {
                    return;
                }
                if let Err(e) = self.converter.decoder.send_packet(&packet) {
                    log::debug!("Skipping undecodable packet before frame {}: {e}", self.next_index);
                }
            }
            None => {
                if let Err(e) = self.converter.decoder.send_eof() {
                    log::debug!("Decoder refused end of stream: {e}");
                }
                self.state = DecodeState::Draining;
            }
        }
    }
}

impl Iterator for DecodedFrames<'_> {
    type Item = FrameResult;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.state == DecodeState::Finished {
                return None;
            }
            if let Some(result) = self.converter.pull(self.next_index) {
                if result.is_ok() {
                    self.next_index += 1;
                }
                return Some(result);
            }
            match self.state {
                DecodeState::Reading => self.feed_packet(),
                _ => self.state = DecodeState::Finished,
            }
        }
    }
}

/// Row-by-row copy that drops the per-row stride padding.
fn packed_rgb(picture: &Picture, width: u32, height: u32) -> Vec<u8> {
    let row_bytes = width as usize * 3;
    picture
        .data(0)
        .chunks(picture.stride(0))
        .take(height as usize)
        .flat_map(|row| &row[..row_bytes])
        .copied()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    type Encoder = ffmpeg_next::encoder::video::Encoder;

    fn write_pending_packets(
        encoder: &mut Encoder,
        octx: &mut ffmpeg_next::format::context::Output,
        fps: i32,
        stream_time_base: ffmpeg_next::Rational,
    ) {
        let mut packet = ffmpeg_next::Packet::empty();
        while encoder.receive_packet(&mut packet).is_ok() {
            packet.set_stream(0);
            packet.rescale_ts(ffmpeg_next::Rational(1, fps), stream_time_base);
            packet.write_interleaved(octx).unwrap();
        }
    }

    /// Encodes `count` flat grey frames of increasing brightness.
    fn record_session(path: &Path, count: usize, width: u32, height: u32) {
        const FPS: i32 = 30;
        ffmpeg_next::init().unwrap();

        let mut octx = ffmpeg_next::format::output(path).unwrap();
        let needs_global_header = octx
            .format()
            .flags()
            .contains(ffmpeg_next::format::Flags::GLOBAL_HEADER);
        let codec = ffmpeg_next::encoder::find(ffmpeg_next::codec::Id::MPEG4).unwrap();
        let mut stream = octx.add_stream(Some(codec)).unwrap();

        let mut settings = ffmpeg_next::codec::context::Context::new_with_codec(codec)
            .encoder()
            .video()
            .unwrap();
        settings.set_width(width);
        settings.set_height(height);
        settings.set_format(ffmpeg_next::format::Pixel::YUV420P);
        settings.set_time_base(ffmpeg_next::Rational(1, FPS));
        settings.set_frame_rate(Some(ffmpeg_next::Rational(FPS, 1)));
        if needs_global_header {
            settings.set_flags(ffmpeg_next::codec::Flags::GLOBAL_HEADER);
        }
        let mut encoder = settings.open_with(ffmpeg_next::Dictionary::new()).unwrap();
        stream.set_parameters(&encoder);
        octx.write_header().unwrap();
        let time_base = octx.stream(0).unwrap().time_base();

        let mut to_yuv = ffmpeg_next::software::scaling::Context::get(
            ffmpeg_next::format::Pixel::RGB24,
            width,
            height,
            ffmpeg_next::format::Pixel::YUV420P,
            width,
            height,
            ffmpeg_next::software::scaling::Flags::BILINEAR,
        )
        .unwrap();

        for i in 0..count {
            let mut rgb = Picture::new(ffmpeg_next::format::Pixel::RGB24, width, height);
            rgb.data_mut(0).fill(((i * 40) % 256) as u8);
            let mut yuv = Picture::empty();
            to_yuv.run(&rgb, &mut yuv).unwrap();
            yuv.set_pts(Some(i as i64));
            encoder.send_frame(&yuv).unwrap();
            write_pending_packets(&mut encoder, &mut octx, FPS, time_base);
        }
        encoder.send_eof().unwrap();
        write_pending_packets(&mut encoder, &mut octx, FPS, time_base);
        octx.write_trailer().unwrap();
    }

    fn recorded_session(dir: &Path) -> PathBuf {
        let path = dir.join("session.mp4");
        record_session(&path, 5, 320, 240);
        path
    }

    #[test]
    fn test_open_reports_native_size_without_rescale() {
        let dir = tempfile::tempdir().unwrap();
        let path = recorded_session(dir.path());
        let mut reader = FfmpegReader::new();
        let meta = reader.open(&path).unwrap();
        assert_eq!((meta.width, meta.height), (320, 240));
        assert!(!meta.is_rescaled());
        assert!(meta.fps > 0.0);
        assert_eq!(meta.source_path, Some(path));
    }

    #[test]
    fn test_frames_are_rescaled_to_session_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = recorded_session(dir.path());
        let mut reader = FfmpegReader::with_output_size(160, 120);
        let meta = reader.open(&path).unwrap();
        assert_eq!((meta.source_width, meta.source_height), (320, 240));
        assert!(meta.is_rescaled());

        let frames: Vec<Frame> = reader.frames().map(|f| f.unwrap()).collect();
        assert_eq!(frames.len(), 5);
        for (i, frame) in frames.iter().enumerate() {
            assert_eq!(frame.index(), i);
            assert_eq!((frame.width(), frame.height(), frame.channels()), (160, 120, 3));
            assert_eq!(frame.data().len(), 160 * 120 * 3);
        }
    }

    #[test]
    fn test_open_nonexistent_fails() {
        let mut reader = FfmpegReader::new();
        assert!(reader.open(Path::new("/nonexistent/session.mp4")).is_err());
    }

    #[test]
    fn test_frames_without_open_returns_error() {
        let mut reader = FfmpegReader::new();
        assert!(reader.frames().next().unwrap().is_err());
    }

    #[test]
    fn test_frames_after_close_returns_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = recorded_session(dir.path());
        let mut reader = FfmpegReader::new();
        reader.open(&path).unwrap();
        reader.close();
        assert!(reader.frames().next().unwrap().is_err());
    }

    #[test]
    fn test_packed_rgb_drops_stride_padding() {
        let mut picture = Picture::new(ffmpeg_next::format::Pixel::RGB24, 3, 2);
        let stride = picture.stride(0);
        let data = picture.data_mut(0);
        data.fill(0);
        data[..9].fill(10);
        data[stride..stride + 9].fill(20);

        let packed = packed_rgb(&picture, 3, 2);
        assert_eq!(packed.len(), 18);
        assert!(packed[..9].iter().all(|&v| v == 10));
        assert!(packed[9..].iter().all(|&v| v == 20));
    }
}
