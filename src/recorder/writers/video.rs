//! Video writer
//!
//! Frames are handed from the sensor callback to a dedicated encoder thread
//! through a bounded queue. When the queue is full the backpressure policy
//! decides: `Block` waits for room, `Drop` rejects the frame so the caller can
//! skip it entirely. A blocked write can be woken through its
//! [`WriteInterrupt`] when the recording stops. Validation happens before a
//! frame is queued, so a frame that `write` accepts is never reordered or
//! rejected later for its size or timestamp.

use crate::capture::image::RgbaImage;
use crate::encoder::{EncoderFactory, EncoderSummary, VideoEncoder};
use crate::recorder::channel::{StreamWriter, WriterError};
use crate::recorder::config::{BackpressurePolicy, VideoSettings};
use crate::recorder::sync::MediaTime;
use crossbeam_channel::{self as channel, Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

struct VideoJob {
    image: Arc<RgbaImage>,
    presentation_time: MediaTime,
}

/// Counters updated by the encoder thread
#[derive(Debug, Default)]
pub struct EncoderStats {
    frames_encoded: AtomicU64,
    encode_failures: AtomicU64,
}

impl EncoderStats {
    pub fn frames_encoded(&self) -> u64 {
        self.frames_encoded.load(Ordering::Relaxed)
    }

    pub fn encode_failures(&self) -> u64 {
        self.encode_failures.load(Ordering::Relaxed)
    }
}

/// Finalization still running on the encoder thread
pub struct PendingFinalization {
    handle: JoinHandle<Result<EncoderSummary, WriterError>>,
}

impl PendingFinalization {
    /// Block until the encoder thread has drained its queue and closed the container
    pub fn wait(self) -> Result<EncoderSummary, WriterError> {
        self.handle
            .join()
            .map_err(|_| WriterError::Encoder("Encoder thread panicked".to_string()))?
    }
}

/// Wakes a video write that is blocked on a full queue
#[derive(Clone)]
pub struct WriteInterrupt {
    tx: Arc<Mutex<Option<Sender<()>>>>,
}

impl WriteInterrupt {
    /// Fail the blocked write, and any later one, with [`WriterError::Closed`]
    pub fn interrupt(&self) {
        // Disconnecting wakes every receiver
        self.tx.lock().take();
    }
}

fn encoder_stopped() -> WriterError {
    WriterError::Encoder("Encoder thread stopped".to_string())
}

pub struct VideoWriter {
    output: PathBuf,
    width: u32,
    height: u32,
    policy: BackpressurePolicy,
    queue: Option<Sender<VideoJob>>,
    interrupted: Receiver<()>,
    interrupt: WriteInterrupt,
    worker: Option<JoinHandle<Result<EncoderSummary, WriterError>>>,
    stats: Arc<EncoderStats>,
    last_presentation_time: Option<MediaTime>,
    frames_submitted: u64,
}

impl VideoWriter {
    /// Begin an encoder session at time zero and start its feeding thread
    pub fn open(
        output: &Path,
        settings: &VideoSettings,
        policy: BackpressurePolicy,
        queue_capacity: usize,
        factory: &dyn EncoderFactory,
    ) -> Result<Self, WriterError> {
        let encoder = factory.create(output, settings)?;
        let (tx, rx) = channel::bounded::<VideoJob>(queue_capacity.max(1));
        let (interrupt_tx, interrupted) = channel::bounded::<()>(0);
        let stats = Arc::new(EncoderStats::default());

        let worker_stats = stats.clone();
        let handle = std::thread::Builder::new()
            .name("video-encoder".to_string())
            .spawn(move || run_encoder(encoder, rx, worker_stats))?;

        tracing::info!(
            "Video writer opened: {:?} ({}x{}, queue {}, {:?} on backlog)",
            output,
            settings.width,
            settings.height,
            queue_capacity,
            policy
        );

        Ok(Self {
            output: output.to_path_buf(),
            width: settings.width,
            height: settings.height,
            policy,
            queue: Some(tx),
            interrupted,
            interrupt: WriteInterrupt {
                tx: Arc::new(Mutex::new(Some(interrupt_tx))),
            },
            worker: Some(handle),
            stats,
            last_presentation_time: None,
            frames_submitted: 0,
        })
    }

    pub fn stats(&self) -> Arc<EncoderStats> {
        self.stats.clone()
    }

    /// Handle that can wake a write blocked under [`BackpressurePolicy::Block`]
    pub fn interrupt_handle(&self) -> WriteInterrupt {
        self.interrupt.clone()
    }

    /// Hand over the encoder thread's finalization after [`StreamWriter::close`]
    pub fn take_finalization(&mut self) -> Option<PendingFinalization> {
        if self.queue.is_some() {
            return None;
        }
        self.worker
            .take()
            .map(|handle| PendingFinalization { handle })
    }

    fn check_frame(&self, image: &RgbaImage, presentation_time: MediaTime) -> Result<(), WriterError> {
        if image.dimensions() != (self.width, self.height) {
            return Err(WriterError::FrameSize {
                got_width: image.width(),
                got_height: image.height(),
                width: self.width,
                height: self.height,
            });
        }
        if presentation_time.is_negative() {
            return Err(WriterError::BeforeSessionStart(presentation_time));
        }
        if let Some(previous) = self.last_presentation_time {
            if presentation_time <= previous {
                return Err(WriterError::NonMonotonic {
                    previous,
                    current: presentation_time,
                });
            }
        }
        Ok(())
    }
}

impl StreamWriter for VideoWriter {
    type Payload = Arc<RgbaImage>;

    fn write(&mut self, image: &Arc<RgbaImage>, presentation_time: MediaTime) -> Result<(), WriterError> {
        self.check_frame(image, presentation_time)?;
        let queue = self.queue.as_ref().ok_or(WriterError::Closed)?;

        let job = VideoJob {
            image: image.clone(),
            presentation_time,
        };
        match self.policy {
            BackpressurePolicy::Block => channel::select! {
                send(queue, job) -> sent => sent.map_err(|_| encoder_stopped())?,
                recv(self.interrupted) -> _ => {
                    tracing::debug!("Blocked video write at {}s interrupted", presentation_time);
                    return Err(WriterError::Closed);
                }
            },
            BackpressurePolicy::Drop => queue.try_send(job).map_err(|e| match e {
                TrySendError::Full(_) => WriterError::Backlogged,
                TrySendError::Disconnected(_) => encoder_stopped(),
            })?,
        }

        self.last_presentation_time = Some(presentation_time);
        self.frames_submitted += 1;
        Ok(())
    }

    /// Mark the input finished. The encoder thread drains what is queued and
    /// finalizes the container without blocking the caller.
    fn close(&mut self) -> Result<(), WriterError> {
        if self.queue.take().is_none() {
            return Err(WriterError::Closed);
        }
        tracing::info!(
            "Video writer closed after {} frames, finalizing {:?}",
            self.frames_submitted,
            self.output
        );
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.queue.is_some()
    }

    fn records_written(&self) -> u64 {
        self.frames_submitted
    }
}

impl Drop for VideoWriter {
    fn drop(&mut self) {
        // Closing the queue lets a detached encoder thread finish on its own
        self.queue.take();
    }
}

fn run_encoder(
    mut encoder: Box<dyn VideoEncoder>,
    rx: Receiver<VideoJob>,
    stats: Arc<EncoderStats>,
) -> Result<EncoderSummary, WriterError> {
    for job in rx {
        match encoder.append(&job.image, job.presentation_time) {
            Ok(()) => {
                stats.frames_encoded.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                stats.encode_failures.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    "Failed to write video frame at {}s: {}",
                    job.presentation_time,
                    e
                );
            }
        }
    }

    match encoder.finish() {
        Ok(summary) => {
            tracing::info!(
                "Video finished: {} frames in {:?}",
                summary.frames_written,
                summary.output
            );
            Ok(summary)
        }
        Err(e) => {
            tracing::error!("Failed to finalize video: {}", e);
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recorder::sync::PREFERRED_TIMESCALE;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recorded {
        times: Mutex<Vec<MediaTime>>,
    }

    struct RecordingEncoder {
        recorded: Arc<Recorded>,
        output: PathBuf,
    }

    impl VideoEncoder for RecordingEncoder {
        fn append(&mut self, _image: &RgbaImage, presentation_time: MediaTime) -> Result<(), WriterError> {
            self.recorded.times.lock().push(presentation_time);
            Ok(())
        }

        fn finish(self: Box<Self>) -> Result<EncoderSummary, WriterError> {
            let times = self.recorded.times.lock();
            Ok(EncoderSummary {
                output: self.output.clone(),
                frames_written: times.len() as u64,
                last_presentation_time: times.last().copied(),
            })
        }
    }

    struct RecordingFactory {
        recorded: Arc<Recorded>,
    }

    impl EncoderFactory for RecordingFactory {
        fn create(&self, output: &Path, _settings: &VideoSettings) -> Result<Box<dyn VideoEncoder>, WriterError> {
            Ok(Box::new(RecordingEncoder {
                recorded: self.recorded.clone(),
                output: output.to_path_buf(),
            }))
        }
    }

    fn settings() -> VideoSettings {
        VideoSettings {
            width: 4,
            height: 2,
            ..VideoSettings::default()
        }
    }

    fn open_writer(recorded: &Arc<Recorded>) -> VideoWriter {
        let factory = RecordingFactory {
            recorded: recorded.clone(),
        };
        VideoWriter::open(
            Path::new("videoData.mov"),
            &settings(),
            BackpressurePolicy::Block,
            2,
            &factory,
        )
        .unwrap()
    }

    fn ms(value: i64) -> MediaTime {
        MediaTime::new(value, PREFERRED_TIMESCALE)
    }

    #[test]
    fn test_frames_reach_encoder_in_order() {
        let recorded = Arc::new(Recorded::default());
        let mut writer = open_writer(&recorded);
        let image = Arc::new(RgbaImage::filled(4, 2, [0, 0, 0, 255]));

        for t in [0, 33, 66, 100] {
            writer.write(&image, ms(t)).unwrap();
        }
        writer.close().unwrap();
        let summary = writer.take_finalization().unwrap().wait().unwrap();

        assert_eq!(summary.frames_written, 4);
        assert_eq!(*recorded.times.lock(), vec![ms(0), ms(33), ms(66), ms(100)]);
        assert_eq!(writer.stats().frames_encoded(), 4);
    }

    #[test]
    fn test_rejects_bad_frames_before_queueing() {
        let recorded = Arc::new(Recorded::default());
        let mut writer = open_writer(&recorded);
        let image = Arc::new(RgbaImage::filled(4, 2, [0, 0, 0, 255]));

        let wrong_size = Arc::new(RgbaImage::filled(2, 4, [0, 0, 0, 255]));
        assert!(matches!(
            writer.write(&wrong_size, ms(0)),
            Err(WriterError::FrameSize { .. })
        ));
        assert!(matches!(
            writer.write(&image, ms(-5)),
            Err(WriterError::BeforeSessionStart(_))
        ));

        writer.write(&image, ms(40)).unwrap();
        assert!(matches!(
            writer.write(&image, ms(40)),
            Err(WriterError::NonMonotonic { .. })
        ));
        assert_eq!(writer.records_written(), 1);

        writer.close().unwrap();
        writer.take_finalization().unwrap().wait().unwrap();
        assert_eq!(recorded.times.lock().len(), 1);
    }

    /// Encoder whose appends wait for a release signal
    struct StalledEncoder {
        entered: Sender<MediaTime>,
        release: Receiver<()>,
        frames: u64,
        output: PathBuf,
    }

    impl VideoEncoder for StalledEncoder {
        fn append(&mut self, _image: &RgbaImage, presentation_time: MediaTime) -> Result<(), WriterError> {
            let _ = self.entered.send(presentation_time);
            let _ = self.release.recv();
            self.frames += 1;
            Ok(())
        }

        fn finish(self: Box<Self>) -> Result<EncoderSummary, WriterError> {
            Ok(EncoderSummary {
                output: self.output,
                frames_written: self.frames,
                last_presentation_time: None,
            })
        }
    }

    struct StalledFactory {
        entered: Sender<MediaTime>,
        release: Receiver<()>,
    }

    impl EncoderFactory for StalledFactory {
        fn create(&self, output: &Path, _settings: &VideoSettings) -> Result<Box<dyn VideoEncoder>, WriterError> {
            Ok(Box::new(StalledEncoder {
                entered: self.entered.clone(),
                release: self.release.clone(),
                frames: 0,
                output: output.to_path_buf(),
            }))
        }
    }

    #[test]
    fn test_interrupt_wakes_blocked_write() {
        let (entered_tx, entered) = channel::unbounded();
        let (release, release_rx) = channel::unbounded::<()>();
        let factory = StalledFactory {
            entered: entered_tx,
            release: release_rx,
        };
        let mut writer = VideoWriter::open(
            Path::new("videoData.mov"),
            &settings(),
            BackpressurePolicy::Block,
            1,
            &factory,
        )
        .unwrap();
        let image = Arc::new(RgbaImage::filled(4, 2, [0, 0, 0, 255]));

        // First frame is held inside the encoder, second fills the queue
        writer.write(&image, ms(0)).unwrap();
        assert_eq!(entered.recv().unwrap(), ms(0));
        writer.write(&image, ms(33)).unwrap();

        let interrupt = writer.interrupt_handle();
        let waker = std::thread::spawn(move || {
            std::thread::sleep(std::time::Duration::from_millis(50));
            interrupt.interrupt();
        });
        assert!(matches!(writer.write(&image, ms(66)), Err(WriterError::Closed)));
        waker.join().unwrap();
        assert_eq!(writer.records_written(), 2);

        writer.close().unwrap();
        drop(release);
        let summary = writer.take_finalization().unwrap().wait().unwrap();
        assert_eq!(summary.frames_written, 2);
    }

    #[test]
    fn test_write_after_close_fails() {
        let recorded = Arc::new(Recorded::default());
        let mut writer = open_writer(&recorded);
        assert!(writer.take_finalization().is_none());

        writer.close().unwrap();
        let image = Arc::new(RgbaImage::filled(4, 2, [0, 0, 0, 255]));
        assert!(matches!(writer.write(&image, ms(0)), Err(WriterError::Closed)));
        assert!(matches!(writer.close(), Err(WriterError::Closed)));
        assert!(writer.take_finalization().is_some());
    }
}
