use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;

use crate::detection::domain::face_detector::{accepted_faces, largest_face};
use crate::gesture::domain::background_model::BackgroundModel;
use crate::gesture::domain::gesture_code::GestureCode;
use crate::gesture::domain::hand_gesture_recognizer::HandGestureRecognizer;
use crate::imaging::histogram::equalize_hist;
use crate::imaging::pixel_ops::{abs_diff, threshold_binary};
use crate::recognition::domain::identity_store::IdentityKey;
use crate::shared::annotate::{
    draw_gesture_pips, draw_label_bar, draw_progress, draw_rect, HAND_CANDIDATE, KNOWN_FACE,
    UNKNOWN_FACE,
};
use crate::shared::frame::{Frame, FrameError, GrayFrame};
use crate::shared::rect::Rect;
use crate::tracking::domain::gesture_tracker::GestureTracker;

use super::pipeline_config::PipelineConfig;
use super::pipeline_logger::{NullPipelineLogger, PipelineLogger, Stage};
use super::recognition_service::RecognitionService;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("frame is {actual_width}x{actual_height} but the session started at {width}x{height}")]
    DimensionMismatch {
        width: u32,
        height: u32,
        actual_width: u32,
        actual_height: u32,
    },
    #[error("enrollment needs a non-empty identity hint")]
    EmptyIdentityHint,
    #[error("enrollment has {collected} of {required} face samples")]
    InsufficientSamples { collected: usize, required: usize },
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error("face recognizer failed: {0}")]
    Recognizer(Box<dyn std::error::Error>),
    #[error("identity store failed: {0}")]
    IdentityStore(Box<dyn std::error::Error>),
    #[error("invalid pipeline configuration: {0}")]
    Config(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PipelineMode {
    /// No trained model and no enrollment in progress: frames pass through.
    Idle,
    Enrolling,
    Recognizing,
    Tracking,
}

impl fmt::Display for PipelineMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineMode::Idle => "idle",
            PipelineMode::Enrolling => "enrolling",
            PipelineMode::Recognizing => "recognizing",
            PipelineMode::Tracking => "tracking",
        };
        f.write_str(name)
    }
}

/// What one `process` call produced.
#[derive(Debug)]
pub struct RecognitionResult {
    /// The mirrored, annotated frame.
    pub frame: Frame,
    /// Recognized (or enrolling) identity, if any.
    pub identity: Option<String>,
    pub gesture: GestureCode,
    /// Set on exactly the one result whose call finished an enrollment.
    pub registration_complete: bool,
}

/// A finished enrollment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Enrollment {
    pub key: IdentityKey,
    pub name: String,
}

#[derive(Default)]
struct Outcome {
    identity: Option<String>,
    gesture: GestureCode,
    registration_complete: bool,
}

/// Per-session state machine: enrolls faces, recognizes them, and once a
/// known face is in view, tracks a nearby hand long enough to count its
/// fingers.
///
/// One instance serves one session; `process` takes `&mut self`, so frames
/// are handled strictly one at a time. Sessions share models through the
/// [`RecognitionService`].
pub struct RecognitionPipeline {
    service: Arc<RecognitionService>,
    config: PipelineConfig,
    logger: Box<dyn PipelineLogger>,
    gestures: HandGestureRecognizer,
    mode: PipelineMode,
    dimensions: Option<(u32, u32)>,
    background: BackgroundModel,
    samples: Vec<GrayFrame>,
    enrollment_hint: Option<String>,
    tracker: Option<GestureTracker>,
    tracked_identity: Option<String>,
    last_gesture: GestureCode,
}

impl RecognitionPipeline {
    pub fn new(service: Arc<RecognitionService>) -> Self {
        let config = PipelineConfig::default();
        let mode = if service.recognizer().is_trained() {
            PipelineMode::Recognizing
        } else {
            PipelineMode::Idle
        };
        Self {
            service,
            gestures: HandGestureRecognizer::with_angle_cutoff(config.defect_angle_deg),
            background: BackgroundModel::with_window(config.calibration_frames, config.background_alpha),
            config,
            logger: Box::new(NullPipelineLogger),
            mode,
            dimensions: None,
            samples: Vec::new(),
            enrollment_hint: None,
            tracker: None,
            tracked_identity: None,
            last_gesture: GestureCode::NONE,
        }
    }

    pub fn with_config(service: Arc<RecognitionService>, config: PipelineConfig) -> Result<Self, PipelineError> {
        config.validate().map_err(PipelineError::Config)?;
        let mut pipeline = Self::new(service);
        pipeline.gestures = HandGestureRecognizer::with_angle_cutoff(config.defect_angle_deg);
        pipeline.background = BackgroundModel::with_window(config.calibration_frames, config.background_alpha);
        pipeline.config = config;
        Ok(pipeline)
    }

    pub fn with_logger(mut self, logger: Box<dyn PipelineLogger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn current_mode(&self) -> PipelineMode {
        self.mode
    }

    /// The most recent finger count, kept across frames until the next
    /// classification replaces it.
    pub fn last_gesture(&self) -> GestureCode {
        self.last_gesture
    }

    pub fn is_background_calibrated(&self) -> bool {
        self.background.is_calibrated()
    }

    pub fn samples_collected(&self) -> usize {
        self.samples.len()
    }

    pub fn logger(&self) -> &dyn PipelineLogger {
        self.logger.as_ref()
    }

    pub fn logger_mut(&mut self) -> &mut dyn PipelineLogger {
        self.logger.as_mut()
    }

    /// Start collecting face samples for `identity_hint`.
    ///
    /// Pre-empts whatever the session was doing: a running hand tracker is
    /// dropped and any partially collected samples are discarded.
    pub fn begin_enrollment(&mut self, identity_hint: &str) -> Result<(), PipelineError> {
        let hint = identity_hint.trim();
        if hint.is_empty() {
            return Err(PipelineError::EmptyIdentityHint);
        }
        if self.mode == PipelineMode::Tracking {
            log::debug!("Enrollment pre-empts hand tracking");
        }
        self.samples.clear();
        self.tracker = None;
        self.tracked_identity = None;
        self.enrollment_hint = Some(hint.to_string());
        self.mode = PipelineMode::Enrolling;
        self.logger.info(&format!("Enrolling {hint}"));
        Ok(())
    }

    /// Handle one camera frame.
    ///
    /// Per-frame failures (no face, detector errors, a lost hand) degrade
    /// to a result with no identity and gesture `"0"`. Only session-level
    /// problems are returned as errors.
    pub fn process(&mut self, mut frame: Frame, identity_hint: Option<&str>) -> Result<RecognitionResult, PipelineError> {
        self.check_dimensions(&frame)?;
        frame.mirror_horizontal();
        let gray = frame.to_gray()?;
        let luma = equalize_hist(&gray);

        let outcome = match self.mode {
            PipelineMode::Idle => Outcome::default(),
            PipelineMode::Enrolling => self.enroll_step(&mut frame, &luma, identity_hint)?,
            PipelineMode::Recognizing => {
                let outcome = self.recognize_step(&mut frame, &gray, &luma);
                draw_gesture_pips(&mut frame, self.last_gesture.count());
                outcome
            }
            PipelineMode::Tracking => {
                let outcome = self.track_step(&mut frame, &luma);
                draw_gesture_pips(&mut frame, self.last_gesture.count());
                outcome
            }
        };

        if !outcome.gesture.is_none() {
            self.logger.gesture(outcome.gesture.count());
        }
        Ok(RecognitionResult {
            frame,
            identity: outcome.identity,
            gesture: outcome.gesture,
            registration_complete: outcome.registration_complete,
        })
    }

    /// Train on the collected samples and switch to recognizing.
    ///
    /// `identity_hint` overrides the name given to [`begin_enrollment`]
    /// when it is non-empty. Called automatically once the sample quota is
    /// reached.
    ///
    /// [`begin_enrollment`]: Self::begin_enrollment
    pub fn finish_enrollment(&mut self, identity_hint: Option<&str>) -> Result<Enrollment, PipelineError> {
        let required = self.config.enrollment_samples;
        if self.mode != PipelineMode::Enrolling || self.samples.len() < required {
            return Err(PipelineError::InsufficientSamples {
                collected: self.samples.len(),
                required,
            });
        }
        let name = identity_hint
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .map(str::to_string)
            .or_else(|| self.enrollment_hint.clone())
            .ok_or(PipelineError::EmptyIdentityHint)?;

        let key = self
            .service
            .identities()
            .resolve_or_create(&name)
            .map_err(PipelineError::IdentityStore)?;
        {
            // The live model changes only after the trained copy is persisted.
            let mut recognizer = self.service.recognizer();
            let mut candidate = recognizer.snapshot();
            let trained = if candidate.is_trained() {
                candidate.update(&self.samples, key)
            } else {
                candidate.train(&self.samples, key)
            };
            trained.map_err(PipelineError::Recognizer)?;
            if let Some(path) = self.service.model_path() {
                candidate.save(path).map_err(PipelineError::Recognizer)?;
            }
            *recognizer = candidate;
        }

        self.logger
            .info(&format!("Enrolled {name} as {key} with {} samples", self.samples.len()));
        self.samples.clear();
        self.enrollment_hint = None;
        self.mode = PipelineMode::Recognizing;
        Ok(Enrollment { key, name })
    }

    fn check_dimensions(&mut self, frame: &Frame) -> Result<(), PipelineError> {
        let actual = (frame.width(), frame.height());
        match self.dimensions {
            None => {
                self.dimensions = Some(actual);
                Ok(())
            }
            Some(expected) if expected == actual => Ok(()),
            Some((width, height)) => Err(PipelineError::DimensionMismatch {
                width,
                height,
                actual_width: actual.0,
                actual_height: actual.1,
            }),
        }
    }

    fn enroll_step(
        &mut self,
        frame: &mut Frame,
        luma: &GrayFrame,
        identity_hint: Option<&str>,
    ) -> Result<Outcome, PipelineError> {
        let required = self.config.enrollment_samples;
        if self.samples.len() < required {
            let faces = self.detect_faces(frame);
            if let Some(face) = largest_face(&faces) {
                if let Some(crop) = luma.crop(&face) {
                    let side = self.config.face_crop_size;
                    self.samples.push(crop.resize(side, side));
                }
                draw_rect(frame, &face, KNOWN_FACE, 2);
            }
        }
        draw_progress(frame, self.samples.len() as f64 / required as f64);

        if self.samples.len() < required {
            return Ok(Outcome {
                identity: self.enrollment_hint.clone(),
                ..Outcome::default()
            });
        }
        let enrollment = self.finish_enrollment(identity_hint)?;
        Ok(Outcome {
            identity: Some(enrollment.name),
            registration_complete: true,
            ..Outcome::default()
        })
    }

    fn recognize_step(&mut self, frame: &mut Frame, gray: &GrayFrame, luma: &GrayFrame) -> Outcome {
        let faces = self.detect_faces(frame);

        // Faces are blacked out so the hand detector cannot fire on them.
        let mut masked = luma.clone();
        let mut identity = None;
        for face in &faces {
            let name = self.match_face(&masked, face);
            masked.fill_rect(face, 0);
            let color = if name.is_some() { KNOWN_FACE } else { UNKNOWN_FACE };
            draw_rect(frame, face, color, 2);
            draw_label_bar(frame, face, color);
            if name.is_some() {
                identity = name;
            }
        }

        if identity.is_some() {
            let hands = self.detect_hands(&masked);
            for (i, hand) in hands.iter().enumerate() {
                let region = hand.expand_for_open_hand();
                draw_rect(frame, &region, HAND_CANDIDATE, 2);
                if i == 0 && self.background.is_calibrated() {
                    self.start_tracking(luma, region, identity.clone());
                }
            }
        }

        if faces.is_empty() && !self.background.is_calibrated() {
            let started = Instant::now();
            if self.background.accumulate(gray) && self.background.is_calibrated() {
                self.logger.info("Background calibrated, hand tracking enabled");
            }
            self.logger.timing(Stage::Background, elapsed_ms(started));
        }

        Outcome {
            identity,
            ..Outcome::default()
        }
    }

    fn track_step(&mut self, frame: &mut Frame, luma: &GrayFrame) -> Outcome {
        let identity = self.tracked_identity.clone();
        let now = self.service.clock().now();
        let Some(tracker) = self.tracker.as_mut() else {
            self.mode = PipelineMode::Recognizing;
            return Outcome::default();
        };

        let started = Instant::now();
        let (timed_out, rect) = tracker.update(frame, luma, now);
        self.logger.timing(Stage::Track, elapsed_ms(started));

        if timed_out {
            log::debug!("Gesture window closed for {}", identity.as_deref().unwrap_or("unknown"));
            self.tracker = None;
            self.tracked_identity = None;
            self.mode = PipelineMode::Recognizing;
            return Outcome {
                identity,
                ..Outcome::default()
            };
        }

        let started = Instant::now();
        let classified = self.classify_region(luma, rect);
        self.logger.timing(Stage::Classify, elapsed_ms(started));

        let gesture = match classified {
            Ok((region, count, annotated)) => {
                frame.paste(&annotated, region.x, region.y);
                let code = GestureCode::from_count(count);
                self.last_gesture = code;
                code
            }
            Err(e) => {
                log::debug!("No gesture this frame: {e}");
                GestureCode::NONE
            }
        };
        Outcome {
            identity,
            gesture,
            registration_complete: false,
        }
    }

    /// Foreground silhouette inside `rect`, classified.
    fn classify_region(&self, luma: &GrayFrame, rect: Rect) -> Result<(Rect, u8, Frame), Box<dyn std::error::Error>> {
        let background = self
            .background
            .background()
            .ok_or("background model is not calibrated")?;
        let region = rect
            .clamp_to(luma.width(), luma.height())
            .ok_or("tracked region left the frame")?;
        let scene = background.crop(&region).ok_or("tracked region left the frame")?;
        let current = luma.crop(&region).ok_or("tracked region left the frame")?;
        let difference = abs_diff(&scene, &current).ok_or("background and frame regions differ in size")?;
        let silhouette = threshold_binary(&difference, self.config.foreground_threshold, 255);
        let (count, annotated) = self.gestures.recognize(&silhouette);
        Ok((region, count, annotated))
    }

    fn start_tracking(&mut self, luma: &GrayFrame, region: Rect, identity: Option<String>) {
        let tracker = self.service.trackers().create();
        let now = self.service.clock().now();
        match GestureTracker::start(luma, region, tracker, now) {
            Ok(tracker) => {
                log::debug!("Tracking hand at {region:?}");
                self.tracker = Some(tracker.with_timeout(self.config.gesture_timeout));
                self.tracked_identity = identity;
                self.mode = PipelineMode::Tracking;
            }
            Err(e) => log::debug!("Could not start hand tracker: {e}"),
        }
    }

    fn detect_faces(&mut self, frame: &Frame) -> Vec<Rect> {
        let started = Instant::now();
        let detections = self.service.face_detector().detect(frame);
        self.logger.timing(Stage::FaceDetect, elapsed_ms(started));
        match detections {
            Ok(detections) => {
                let faces = accepted_faces(&detections, self.config.face_confidence, frame.width(), frame.height());
                self.logger.metric("faces", faces.len() as f64);
                faces
            }
            Err(e) => {
                log::warn!("Face detection failed: {e}");
                Vec::new()
            }
        }
    }

    fn detect_hands(&mut self, masked: &GrayFrame) -> Vec<Rect> {
        let started = Instant::now();
        let hands = self
            .service
            .hand_detector()
            .detect_multi_scale(masked, &self.config.cascade);
        self.logger.timing(Stage::HandDetect, elapsed_ms(started));
        hands.unwrap_or_else(|e| {
            log::warn!("Hand detection failed: {e}");
            Vec::new()
        })
    }

    /// Name of the enrolled identity `face` matches, if close enough.
    fn match_face(&self, luma: &GrayFrame, face: &Rect) -> Option<String> {
        let side = self.config.face_crop_size;
        let crop = luma.crop(face)?.resize(side, side);
        let prediction = match self.service.recognizer().predict(&crop) {
            Ok(prediction) => prediction,
            Err(e) => {
                log::debug!("Face recognition failed: {e}");
                return None;
            }
        };
        if prediction.distance > self.config.max_match_distance {
            log::trace!("Closest identity {} at {:.2} is too far", prediction.key, prediction.distance);
            return None;
        }
        match self.service.identities().lookup(prediction.key) {
            Ok(Some(name)) => Some(name),
            Ok(None) => Some(prediction.key.to_string()),
            Err(e) => {
                log::warn!("Identity lookup for {} failed: {e}", prediction.key);
                Some(prediction.key.to_string())
            }
        }
    }
}

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}
