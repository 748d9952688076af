//! Recording session
//!
//! A session owns the time origin, the frame counters and the three stream
//! writers for one recording. It exists only between `start_recording` and
//! `end_recording`.

use super::channel::{RecordingResult, StreamWriter, WriterError};
use super::config::CaptureConfig;
use super::state::{FrameOutcome, SessionStats, SkipCounts, SkipReason};
use super::sync::{MediaTime, TimeSynchronizer, PREFERRED_TIMESCALE};
use super::writers::{DepthWriter, ImuWriter, PendingFinalization, VideoWriter, WriteInterrupt};
use crate::bundle::layout::DataLayout;
use crate::capture::traits::{FrameRecord, MotionProvider};
use crate::encoder::EncoderFactory;
use chrono::{DateTime, Utc};
use uuid::Uuid;

pub struct Session {
    id: Uuid,
    started_at: DateTime<Utc>,
    sync: TimeSynchronizer,
    video: VideoWriter,
    imu: ImuWriter,
    depth: DepthWriter,
    skipped: SkipCounts,
    write_failures: u64,
    last_relative: Option<MediaTime>,
    ended_at: Option<DateTime<Utc>>,
}

impl Session {
    /// Open fresh writers for a new session. The encoder session begins at time zero.
    pub fn start(
        layout: &DataLayout,
        config: &CaptureConfig,
        factory: &dyn EncoderFactory,
    ) -> RecordingResult<Self> {
        config.validate()?;

        let video = VideoWriter::open(
            &layout.video_path(),
            &config.video,
            config.backpressure,
            config.queue_capacity,
            factory,
        )?;

        Ok(Self {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            sync: TimeSynchronizer::new(),
            video,
            imu: ImuWriter::open(&layout.imu_path()),
            depth: DepthWriter::open(&layout.depth_dir()),
            skipped: SkipCounts::default(),
            write_failures: 0,
            last_relative: None,
            ended_at: None,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Wakes a frame blocked on the video queue, without taking this session's lock
    pub fn interrupt_handle(&self) -> WriteInterrupt {
        self.video.interrupt_handle()
    }

    /// Fan one frame out to the video, IMU and depth writers
    pub fn record_frame(&mut self, frame: &FrameRecord, motion: &dyn MotionProvider) -> FrameOutcome {
        // A frame that raced the stop command
        if self.ended_at.is_some() {
            return FrameOutcome::PreviewOnly;
        }
        match self.write_frame(frame, motion) {
            Ok(outcome) => outcome,
            Err(reason) => {
                self.skipped.record(reason);
                FrameOutcome::Skipped(reason)
            }
        }
    }

    fn write_frame(&mut self, frame: &FrameRecord, motion: &dyn MotionProvider) -> Result<FrameOutcome, SkipReason> {
        let depth = match &frame.depth {
            Some(depth) => depth,
            None => {
                tracing::warn!("Depth data unavailable for frame at {}s, skipping", frame.timestamp);
                return Err(SkipReason::MissingDepth);
            }
        };

        let timestamp = MediaTime::from_seconds(frame.timestamp, PREFERRED_TIMESCALE);
        let relative = self.sync.synchronize(timestamp);

        // Nearest-available sample, not time-matched
        let sample = match motion.latest_sample() {
            Some(sample) => sample,
            None => {
                tracing::warn!("No motion sample available for frame at {}s, skipping", relative);
                return Err(SkipReason::MissingMotion);
            }
        };
        tracing::debug!(
            "Frame {}s paired with motion sample {:.4}s older",
            relative,
            frame.timestamp - sample.timestamp
        );

        // Everything that can fail is prepared before the video takes the frame.
        // Staged output dropped on an early return is discarded.
        let staged_depth = self.depth.stage(depth, relative).map_err(|e| {
            tracing::warn!("Failed to stage depth buffer at {}s, skipping: {}", relative, e);
            SkipReason::PersistenceFailed
        })?;
        let staged_line = self.imu.stage(&sample, relative).map_err(|e| {
            tracing::warn!("Failed to open IMU file at {}s, skipping: {}", relative, e);
            SkipReason::PersistenceFailed
        })?;

        match self.video.write(&frame.image, relative) {
            Ok(()) => {}
            Err(WriterError::Backlogged) => {
                tracing::warn!("Encoder backlog full, dropping frame at {}s", relative);
                return Err(SkipReason::Backlogged);
            }
            Err(e) => {
                tracing::warn!("Failed to write video frame at {}s: {}", relative, e);
                return Err(SkipReason::VideoRejected);
            }
        }
        self.last_relative = Some(relative);

        let mut complete = true;
        if let Err(e) = self.depth.commit(staged_depth) {
            self.write_failures += 1;
            complete = false;
            tracing::error!("Failed to commit depth buffer at {}s: {}", relative, e);
        }
        if let Err(e) = self.imu.commit(staged_line) {
            self.write_failures += 1;
            complete = false;
            tracing::error!("Failed to append IMU line at {}s: {}", relative, e);
        }

        Ok(if complete {
            FrameOutcome::Recorded { relative }
        } else {
            FrameOutcome::Incomplete { relative }
        })
    }

    /// Snapshot of the session counters
    pub fn stats(&self) -> SessionStats {
        let encoder = self.video.stats();
        SessionStats {
            session_id: self.id,
            started_at: self.started_at,
            ended_at: self.ended_at,
            origin_seconds: self.sync.origin().map(|t| t.as_secs_f64()),
            video_frames: self.video.records_written(),
            depth_frames: self.depth.records_written(),
            imu_lines: self.imu.records_written(),
            skipped: self.skipped,
            write_failures: self.write_failures,
            frames_encoded: encoder.frames_encoded(),
            encode_failures: encoder.encode_failures(),
            last_relative_seconds: self.last_relative.map(|t| t.as_secs_f64()),
        }
    }

    /// Close every writer. Video finalization continues on the encoder thread.
    pub fn finish(&mut self) -> (SessionStats, Option<PendingFinalization>) {
        if self.ended_at.is_some() {
            return (self.stats(), None);
        }
        if let Err(e) = self.imu.close() {
            tracing::warn!("Failed to close IMU writer: {}", e);
        }
        if let Err(e) = self.depth.close() {
            tracing::warn!("Failed to close depth writer: {}", e);
        }
        if let Err(e) = self.video.close() {
            tracing::warn!("Failed to close video writer: {}", e);
        }
        let pending = self.video.take_finalization();

        self.ended_at = Some(Utc::now());
        let stats = self.stats();
        self.sync.reset();

        (stats, pending)
    }
}
