use std::collections::HashMap;
use std::fmt;
use std::time::Instant;

/// The timed steps of one `process` call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Stage {
    FaceDetect,
    HandDetect,
    Track,
    Classify,
    Background,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::FaceDetect => "face_detect",
            Stage::HandDetect => "hand_detect",
            Stage::Track => "track",
            Stage::Classify => "classify",
            Stage::Background => "background",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Observer for recognition-session events.
///
/// The pipeline reports stage timings and gesture outcomes here; what
/// happens to them (a summary on stdout, nothing at all) is the caller's
/// choice.
pub trait PipelineLogger: Send {
    /// Report how many frames have been processed so far. `total` is zero
    /// for open-ended sources.
    fn progress(&mut self, current: usize, total: usize);

    fn timing(&mut self, stage: Stage, duration_ms: f64);

    /// Record a point-in-time metric (faces per frame, queue drops).
    fn metric(&mut self, name: &str, value: f64);

    /// Record a non-zero gesture code emitted for a frame.
    fn gesture(&mut self, code: u8);

    fn info(&mut self, message: &str);

    /// Emit an end-of-session summary. Default: no-op.
    fn summary(&self) {}
}

/// Discards everything. Used by tests and embedders with their own
/// reporting.
pub struct NullPipelineLogger;

impl PipelineLogger for NullPipelineLogger {
    fn progress(&mut self, _current: usize, _total: usize) {}
    fn timing(&mut self, _stage: Stage, _duration_ms: f64) {}
    fn metric(&mut self, _name: &str, _value: f64) {}
    fn gesture(&mut self, _code: u8) {}
    fn info(&mut self, _message: &str) {}
}

/// CLI logger: keeps per-stage timings, metrics and a histogram of emitted
/// gesture codes, and prints a summary at the end of the session.
///
/// Progress output is throttled to every `throttle_frames` frames.
pub struct StdoutPipelineLogger {
    throttle_frames: usize,
    timings: HashMap<Stage, Vec<f64>>,
    metrics: HashMap<String, Vec<f64>>,
    gestures: [usize; 6],
    start_time: Instant,
    frames_seen: usize,
}

impl StdoutPipelineLogger {
    pub fn new(throttle_frames: usize) -> Self {
        Self {
            throttle_frames: throttle_frames.max(1),
            timings: HashMap::new(),
            metrics: HashMap::new(),
            gestures: [0; 6],
            start_time: Instant::now(),
            frames_seen: 0,
        }
    }

    /// Returns the formatted summary, or `None` if nothing was recorded.
    pub fn summary_string(&self) -> Option<String> {
        if self.timings.is_empty() && self.metrics.is_empty() && self.gesture_total() == 0 {
            return None;
        }

        let elapsed_ms = self.start_time.elapsed().as_secs_f64() * 1000.0;
        let frames = self.frames_seen;
        let mut lines = vec![format!(
            "Session summary ({frames} frames, {:.1}s total):",
            elapsed_ms / 1000.0
        )];

        let mut stages: Vec<_> = self.timings.keys().copied().collect();
        stages.sort();
        for stage in stages {
            let durations = &self.timings[&stage];
            let total_ms: f64 = durations.iter().sum();
            let avg_ms = total_ms / durations.len().max(1) as f64;
            lines.push(format!(
                "  {:12}: avg {avg_ms:6.1}ms  total {total_ms:7.0}ms  ({} calls)",
                stage.as_str(),
                durations.len()
            ));
        }

        let mut metric_names: Vec<_> = self.metrics.keys().collect();
        metric_names.sort();
        for name in metric_names {
            let values = &self.metrics[name];
            let avg = values.iter().sum::<f64>() / values.len().max(1) as f64;
            lines.push(format!("  {name}: avg {avg:.1}"));
        }

        if self.gesture_total() > 0 {
            let counts: Vec<String> = self
                .gestures
                .iter()
                .enumerate()
                .skip(1)
                .filter(|(_, &n)| n > 0)
                .map(|(code, n)| format!("{code}x{n}"))
                .collect();
            lines.push(format!("  Gestures: {}", counts.join(" ")));
        }

        if frames > 0 && elapsed_ms > 0.0 {
            let fps = frames as f64 / (elapsed_ms / 1000.0);
            lines.push(format!("  Throughput: {fps:.1} fps"));
        }

        Some(lines.join("\n"))
    }

    pub fn timings_for(&self, stage: Stage) -> Option<&[f64]> {
        self.timings.get(&stage).map(|v| v.as_slice())
    }

    pub fn metrics_for(&self, name: &str) -> Option<&[f64]> {
        self.metrics.get(name).map(|v| v.as_slice())
    }

    /// How many frames emitted `code`.
    pub fn gesture_count(&self, code: u8) -> usize {
        self.gestures.get(code as usize).copied().unwrap_or(0)
    }

    fn gesture_total(&self) -> usize {
        self.gestures.iter().skip(1).sum()
    }
}

impl Default for StdoutPipelineLogger {
    fn default() -> Self {
        Self::new(30)
    }
}

impl PipelineLogger for StdoutPipelineLogger {
    fn progress(&mut self, current: usize, total: usize) {
        self.frames_seen = current;
        if current % self.throttle_frames != 0 && current != total {
            return;
        }
        if total > 0 {
            let pct = current as f64 / total as f64 * 100.0;
            log::info!("Processed {current}/{total} frames ({pct:.1}%)");
        } else {
            log::info!("Processed {current} frames");
        }
    }

    fn timing(&mut self, stage: Stage, duration_ms: f64) {
        self.timings.entry(stage).or_default().push(duration_ms);
    }

    fn metric(&mut self, name: &str, value: f64) {
        self.metrics.entry(name.to_string()).or_default().push(value);
    }

    fn gesture(&mut self, code: u8) {
        if let Some(slot) = self.gestures.get_mut(code as usize) {
            *slot += 1;
        }
    }

    fn info(&mut self, message: &str) {
        log::info!("{message}");
    }

    fn summary(&self) {
        if let Some(text) = self.summary_string() {
            log::info!("\n\n{text}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_logger_all_methods_are_noop() {
        let mut logger = NullPipelineLogger;
        logger.progress(1, 10);
        logger.timing(Stage::FaceDetect, 5.0);
        logger.metric("faces", 1.0);
        logger.gesture(3);
        logger.info("hello");
        logger.summary();
    }

    #[test]
    fn test_timing_records_values_per_stage() {
        let mut logger = StdoutPipelineLogger::new(10);
        logger.timing(Stage::FaceDetect, 20.0);
        logger.timing(Stage::FaceDetect, 30.0);
        logger.timing(Stage::Classify, 5.0);

        assert_eq!(logger.timings_for(Stage::FaceDetect).unwrap(), &[20.0, 30.0]);
        assert_eq!(logger.timings_for(Stage::Classify).unwrap(), &[5.0]);
        assert!(logger.timings_for(Stage::Track).is_none());
    }

    #[test]
    fn test_summary_lists_stages_by_name() {
        let mut logger = StdoutPipelineLogger::new(10);
        logger.progress(10, 10);
        logger.timing(Stage::HandDetect, 12.0);
        logger.timing(Stage::Background, 1.0);

        let summary = logger.summary_string().unwrap();
        assert!(summary.contains("Session summary (10 frames"));
        assert!(summary.contains("hand_detect"));
        assert!(summary.contains("background"));
        assert!(summary.contains("fps"));
    }

    #[test]
    fn test_summary_includes_metric_average() {
        let mut logger = StdoutPipelineLogger::new(10);
        logger.metric("faces", 1.0);
        logger.metric("faces", 2.0);
        let summary = logger.summary_string().unwrap();
        assert!(summary.contains("faces: avg 1.5"));
    }

    #[test]
    fn test_gesture_histogram() {
        let mut logger = StdoutPipelineLogger::new(10);
        logger.gesture(2);
        logger.gesture(2);
        logger.gesture(5);
        logger.gesture(9);

        assert_eq!(logger.gesture_count(2), 2);
        assert_eq!(logger.gesture_count(5), 1);
        assert_eq!(logger.gesture_count(9), 0);
        assert!(logger.summary_string().unwrap().contains("Gestures: 2x2 5x1"));
    }

    #[test]
    fn test_empty_summary_returns_none() {
        assert!(StdoutPipelineLogger::new(10).summary_string().is_none());
    }

    #[test]
    fn test_progress_tracks_frames_seen() {
        let mut logger = StdoutPipelineLogger::new(10);
        for i in 1..=25 {
            logger.progress(i, 0);
        }
        assert_eq!(logger.frames_seen, 25);
    }

    #[test]
    fn test_stage_names() {
        assert_eq!(Stage::FaceDetect.to_string(), "face_detect");
        assert_eq!(Stage::Track.as_str(), "track");
    }
}
