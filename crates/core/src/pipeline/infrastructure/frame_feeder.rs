use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, TrySendError};

use crate::shared::frame::Frame;
use crate::video::domain::video_reader::VideoReader;

const DEFAULT_CAPACITY: usize = 2;

pub type FeedError = Box<dyn std::error::Error + Send + Sync>;

/// Decodes frames on a background thread and hands them over through a
/// small bounded queue.
///
/// When the consumer falls behind, the oldest queued frame is discarded to
/// make room, so the consumer always sees the freshest frames a live
/// camera would deliver. With a pacing interval the reader thread emits
/// frames no faster than that, imitating a camera's frame rate.
pub struct FrameFeeder {
    frames: Receiver<Result<Frame, FeedError>>,
    dropped: Arc<AtomicUsize>,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl FrameFeeder {
    /// Start feeding from an already opened `reader`.
    pub fn spawn(reader: Box<dyn VideoReader>, capacity: usize, pacing: Option<Duration>) -> Self {
        let (tx, rx) = crossbeam_channel::bounded(capacity.max(1));
        let drain = rx.clone();
        let dropped = Arc::new(AtomicUsize::new(0));
        let stop = Arc::new(AtomicBool::new(false));

        let handle = {
            let dropped = dropped.clone();
            let stop = stop.clone();
            std::thread::spawn(move || {
                let mut reader = reader;
                let mut next_due = Instant::now();
                for frame_result in reader.frames() {
                    if stop.load(Ordering::Relaxed) {
                        break;
                    }
                    if let Some(interval) = pacing {
                        let now = Instant::now();
                        if next_due > now {
                            std::thread::sleep(next_due - now);
                        }
                        next_due = next_due.max(now) + interval;
                    }

                    let mut item = frame_result.map_err(|e| -> FeedError { e.to_string().into() });
                    loop {
                        match tx.try_send(item) {
                            Ok(()) => break,
                            Err(TrySendError::Full(back)) => {
                                if let Ok(Ok(stale)) = drain.try_recv() {
                                    log::trace!("Dropping frame {} under backpressure", stale.index());
                                    dropped.fetch_add(1, Ordering::Relaxed);
                                }
                                item = back;
                            }
                            Err(TrySendError::Disconnected(_)) => return,
                        }
                    }
                }
                reader.close();
            })
        };

        Self {
            frames: rx,
            dropped,
            stop,
            handle: Some(handle),
        }
    }

    pub fn with_default_capacity(reader: Box<dyn VideoReader>, pacing: Option<Duration>) -> Self {
        Self::spawn(reader, DEFAULT_CAPACITY, pacing)
    }

    /// Frames discarded so far because the consumer was too slow.
    pub fn dropped(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl Iterator for FrameFeeder {
    type Item = Result<Frame, FeedError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.frames.recv().ok()
    }
}

impl Drop for FrameFeeder {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::warn!("Frame reader thread panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::video_metadata::VideoMetadata;
    use std::path::Path;

    /// Yields prepared frames and raises `exhausted` once it runs dry.
    struct StubReader {
        frames: Vec<Result<Frame, String>>,
        exhausted: Arc<AtomicBool>,
    }

    impl StubReader {
        fn boxed(count: usize) -> (Box<dyn VideoReader>, Arc<AtomicBool>) {
            let frames = (0..count).map(|i| Ok(Frame::filled(4, 4, [i as u8; 3], i))).collect();
            Self::boxed_from(frames)
        }

        fn boxed_from(frames: Vec<Result<Frame, String>>) -> (Box<dyn VideoReader>, Arc<AtomicBool>) {
            let exhausted = Arc::new(AtomicBool::new(false));
            let reader = StubReader {
                frames,
                exhausted: exhausted.clone(),
            };
            (Box::new(reader), exhausted)
        }
    }

    impl VideoReader for StubReader {
        fn open(&mut self, _path: &Path) -> Result<VideoMetadata, Box<dyn std::error::Error>> {
            Err("not used".into())
        }

        fn frames(&mut self) -> Box<dyn Iterator<Item = Result<Frame, Box<dyn std::error::Error>>> + '_> {
            let exhausted = self.exhausted.clone();
            let mut done = false;
            Box::new(
                self.frames
                    .drain(..)
                    .map(|f| f.map_err(Into::into))
                    .chain(std::iter::from_fn(move || {
                        if !done {
                            done = true;
                            exhausted.store(true, Ordering::SeqCst);
                        }
                        None
                    })),
            )
        }

        fn close(&mut self) {}
    }

    fn wait_for(flag: &AtomicBool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !flag.load(Ordering::SeqCst) {
            assert!(Instant::now() < deadline, "reader thread never finished");
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn test_delivers_all_frames_in_order_with_room() {
        let (reader, _) = StubReader::boxed(5);
        let feeder = FrameFeeder::spawn(reader, 16, None);
        let indices: Vec<usize> = feeder.map(|f| f.unwrap().index()).collect();
        assert_eq!(indices, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_slow_consumer_sees_only_freshest_frames() {
        let (reader, exhausted) = StubReader::boxed(10);
        let mut feeder = FrameFeeder::spawn(reader, 2, None);
        wait_for(&exhausted);

        assert_eq!(feeder.dropped(), 8);
        let indices: Vec<usize> = feeder.by_ref().map(|f| f.unwrap().index()).collect();
        assert_eq!(indices, vec![8, 9]);
    }

    #[test]
    fn test_reader_errors_are_forwarded() {
        let (reader, _) = StubReader::boxed_from(vec![
            Ok(Frame::filled(2, 2, [0; 3], 0)),
            Err("corrupt packet".to_string()),
        ]);
        let results: Vec<_> = FrameFeeder::spawn(reader, 4, None).collect();
        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert_eq!(results[1].as_ref().unwrap_err().to_string(), "corrupt packet");
    }

    #[test]
    fn test_pacing_spaces_frames_out() {
        let (reader, _) = StubReader::boxed(3);
        let started = Instant::now();
        let count = FrameFeeder::spawn(reader, 4, Some(Duration::from_millis(20))).count();
        assert_eq!(count, 3);
        assert!(started.elapsed() >= Duration::from_millis(40));
    }

    #[test]
    fn test_dropping_feeder_stops_reader_thread() {
        let (reader, _) = StubReader::boxed(1000);
        let mut feeder = FrameFeeder::spawn(reader, 1, Some(Duration::from_millis(1)));
        assert!(feeder.next().is_some());
        drop(feeder);
    }
}
