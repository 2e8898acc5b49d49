use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::detection::domain::face_detector::FaceDetector;
use crate::detection::domain::hand_detector::HandDetector;
use crate::recognition::domain::face_recognizer::FaceRecognizer;
use crate::recognition::domain::identity_store::IdentityStore;
use crate::tracking::domain::clock::{Clock, SystemClock};
use crate::tracking::domain::visual_tracker::TrackerFactory;

/// The heavyweight collaborators of a recognition session, loaded once per
/// process and shared by every pipeline through an `Arc`.
///
/// Each capability sits behind its own mutex so two pipelines can run
/// detection and recognition without a global lock.
pub struct RecognitionService {
    face_detector: Mutex<Box<dyn FaceDetector>>,
    hand_detector: Mutex<Box<dyn HandDetector>>,
    recognizer: Mutex<Box<dyn FaceRecognizer>>,
    identities: Mutex<Box<dyn IdentityStore>>,
    trackers: Box<dyn TrackerFactory>,
    clock: Arc<dyn Clock>,
    model_path: Option<PathBuf>,
}

impl RecognitionService {
    pub fn new(
        face_detector: Box<dyn FaceDetector>,
        hand_detector: Box<dyn HandDetector>,
        recognizer: Box<dyn FaceRecognizer>,
        identities: Box<dyn IdentityStore>,
        trackers: Box<dyn TrackerFactory>,
    ) -> Self {
        Self {
            face_detector: Mutex::new(face_detector),
            hand_detector: Mutex::new(hand_detector),
            recognizer: Mutex::new(recognizer),
            identities: Mutex::new(identities),
            trackers,
            clock: Arc::new(SystemClock),
            model_path: None,
        }
    }

    /// Persist the recognizer here after every enrollment.
    pub fn with_model_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.model_path = Some(path.into());
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn into_shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn face_detector(&self) -> MutexGuard<'_, Box<dyn FaceDetector>> {
        lock(&self.face_detector)
    }

    pub fn hand_detector(&self) -> MutexGuard<'_, Box<dyn HandDetector>> {
        lock(&self.hand_detector)
    }

    pub fn recognizer(&self) -> MutexGuard<'_, Box<dyn FaceRecognizer>> {
        lock(&self.recognizer)
    }

    pub fn identities(&self) -> MutexGuard<'_, Box<dyn IdentityStore>> {
        lock(&self.identities)
    }

    pub fn trackers(&self) -> &dyn TrackerFactory {
        self.trackers.as_ref()
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    pub fn model_path(&self) -> Option<&Path> {
        self.model_path.as_deref()
    }
}

/// Poisoned locks are recovered rather than propagated.
fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
