use std::path::{Path, PathBuf};
use std::process;

use clap::Parser;

use gesture_core::detection::domain::face_detector::FaceDetector;
use gesture_core::detection::domain::hand_detector::HandDetector;
use gesture_core::detection::infrastructure::onnx_face_detector::OnnxFaceDetector;
use gesture_core::detection::infrastructure::onnx_hand_detector::{OnnxHandDetector, DEFAULT_SCORE_THRESHOLD};
use gesture_core::pipeline::infrastructure::frame_feeder::FrameFeeder;
use gesture_core::pipeline::pipeline_config::PipelineConfig;
use gesture_core::pipeline::pipeline_logger::StdoutPipelineLogger;
use gesture_core::pipeline::recognition_pipeline::RecognitionPipeline;
use gesture_core::pipeline::recognition_service::RecognitionService;
use gesture_core::recognition::infrastructure::json_identity_store::JsonIdentityStore;
use gesture_core::recognition::infrastructure::lbph_recognizer::LbphFaceRecognizer;
use gesture_core::shared::constants::{
    DEFAULT_FRAME_HEIGHT, DEFAULT_FRAME_WIDTH, FACE_CONFIDENCE_THRESHOLD, FACE_MODEL_NAME, FACE_MODEL_URL,
    IMAGE_EXTENSIONS,
};
use gesture_core::shared::frame::Frame;
use gesture_core::shared::model_resolver::{resolve_source, ModelSource};
use gesture_core::tracking::domain::visual_tracker::VisualTracker;
use gesture_core::tracking::infrastructure::mosse_tracker::MosseTracker;
use gesture_core::video::domain::image_writer::ImageWriter;
use gesture_core::video::domain::video_reader::VideoReader;
use gesture_core::video::infrastructure::ffmpeg_reader::FfmpegReader;
use gesture_core::video::infrastructure::image_file_writer::ImageFileWriter;
use gesture_core::video::infrastructure::image_sequence_reader::ImageSequenceReader;

type FrameResult = Result<Frame, Box<dyn std::error::Error>>;

/// Face-gated hand gesture recognition on recorded camera input.
///
/// Prints one line per frame: frame index, recognized identity (or `-`)
/// and the gesture code `0`-`5`.
#[derive(Parser)]
#[command(name = "gesture-cam")]
struct Cli {
    /// Input video file, image, or directory of images.
    input: PathBuf,

    /// Directory for annotated frames (frame_000000.png, ...).
    output: Option<PathBuf>,

    /// Enroll the face seen in the first frames under this name.
    #[arg(long)]
    enroll: Option<String>,

    /// Identity name table.
    #[arg(long, default_value = "identities.json")]
    identity_store: PathBuf,

    /// Trained face recognizer model; created on first enrollment.
    #[arg(long, default_value = "recognizer.json")]
    recognizer_model: PathBuf,

    /// Face detection ONNX model (downloaded to the cache when omitted).
    #[arg(long)]
    face_model: Option<PathBuf>,

    /// Hand window classifier ONNX model.
    #[arg(long)]
    hand_model: PathBuf,

    /// Session frame width; input is rescaled to it.
    #[arg(long, default_value_t = DEFAULT_FRAME_WIDTH)]
    width: u32,

    /// Session frame height; input is rescaled to it.
    #[arg(long, default_value_t = DEFAULT_FRAME_HEIGHT)]
    height: u32,

    /// Pace input at its native frame rate and drop frames that arrive
    /// while the previous one is still being processed.
    #[arg(long)]
    realtime: bool,

    /// Face detection confidence threshold (0.0-1.0).
    #[arg(long, default_value_t = FACE_CONFIDENCE_THRESHOLD)]
    confidence: f64,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    validate(&cli)?;

    let service = build_service(&cli)?;
    let config = PipelineConfig {
        face_confidence: cli.confidence,
        ..PipelineConfig::default()
    };
    let mut pipeline = RecognitionPipeline::with_config(service.into_shared(), config)?
        .with_logger(Box::new(StdoutPipelineLogger::default()));
    log::info!("Starting in {} mode", pipeline.current_mode());
    if let Some(name) = &cli.enroll {
        pipeline.begin_enrollment(name)?;
    }

    let mut reader = open_reader(&cli.input, cli.width, cli.height);
    let metadata = reader.open(&cli.input)?;
    let total = metadata.total_frames;
    let writer = cli.output.as_ref().map(|dir| (dir.as_path(), ImageFileWriter::new()));

    if cli.realtime {
        let pacing = metadata.frame_interval();
        let feeder = FrameFeeder::with_default_capacity(reader, pacing);
        let frames = feeder.map(|f| f.map_err(|e| -> Box<dyn std::error::Error> { e }));
        run_session(&mut pipeline, frames, total, writer.as_ref())?;
    } else {
        let frames = reader.frames();
        run_session(&mut pipeline, frames, total, writer.as_ref())?;
        reader.close();
    }

    pipeline.logger().summary();
    Ok(())
}

fn run_session(
    pipeline: &mut RecognitionPipeline,
    frames: impl Iterator<Item = FrameResult>,
    total: usize,
    writer: Option<&(&Path, ImageFileWriter)>,
) -> Result<(), Box<dyn std::error::Error>> {
    for (processed, frame_result) in frames.enumerate() {
        let frame = frame_result?;
        let index = frame.index();
        let result = pipeline.process(frame, None)?;

        if result.registration_complete {
            log::info!(
                "Enrollment of {} complete",
                result.identity.as_deref().unwrap_or("unknown")
            );
        }
        println!("{index}\t{}\t{}", result.identity.as_deref().unwrap_or("-"), result.gesture);

        if let Some((dir, image_writer)) = writer {
            image_writer.write(&dir.join(format!("frame_{index:06}.png")), &result.frame)?;
        }
        pipeline.logger_mut().progress(processed + 1, total);
    }
    Ok(())
}

fn build_service(cli: &Cli) -> Result<RecognitionService, Box<dyn std::error::Error>> {
    let face_source = match &cli.face_model {
        Some(path) => ModelSource::Explicit(path),
        None => ModelSource::Named {
            name: FACE_MODEL_NAME,
            url: FACE_MODEL_URL,
        },
    };
    log::info!("Resolving face model");
    let face_model = resolve_source(face_source, Some(Box::new(download_progress)))?;
    let hand_model = resolve_source(ModelSource::Explicit(&cli.hand_model), None)?;

    let face_detector: Box<dyn FaceDetector> = Box::new(OnnxFaceDetector::new(&face_model, cli.confidence)?);
    let hand_detector: Box<dyn HandDetector> = Box::new(OnnxHandDetector::new(&hand_model, DEFAULT_SCORE_THRESHOLD)?);
    let recognizer = LbphFaceRecognizer::open(&cli.recognizer_model)?;
    let identities = JsonIdentityStore::open(&cli.identity_store)?;

    Ok(RecognitionService::new(
        face_detector,
        hand_detector,
        Box::new(recognizer),
        Box::new(identities),
        Box::new(|| -> Box<dyn VisualTracker> { Box::new(MosseTracker::new()) }),
    )
    .with_model_path(&cli.recognizer_model))
}

fn validate(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    if !cli.input.exists() {
        return Err(format!("Input not found: {}", cli.input.display()).into());
    }
    if !(0.0..=1.0).contains(&cli.confidence) {
        return Err(format!(
            "Confidence must be between 0.0 and 1.0, got {}",
            cli.confidence
        )
        .into());
    }
    if cli.width == 0 || cli.height == 0 {
        return Err(format!("Frame size must be positive, got {}x{}", cli.width, cli.height).into());
    }
    if let Some(name) = &cli.enroll {
        if name.trim().is_empty() {
            return Err("--enroll needs a non-empty name".into());
        }
    }
    if let Some(dir) = &cli.output {
        if dir.is_file() {
            return Err(format!("Output must be a directory: {}", dir.display()).into());
        }
    }
    Ok(())
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

fn open_reader(input: &Path, width: u32, height: u32) -> Box<dyn VideoReader> {
    if input.is_dir() || is_image(input) {
        Box::new(ImageSequenceReader::with_output_size(width, height))
    } else {
        Box::new(FfmpegReader::with_output_size(width, height))
    }
}

fn download_progress(downloaded: u64, total: u64) {
    if total > 0 {
        let pct = (downloaded as f64 / total as f64 * 100.0) as u32;
        eprint!("\rDownloading face detection model... {pct}%");
    } else {
        eprint!("\rDownloading face detection model... {downloaded} bytes");
    }
}
