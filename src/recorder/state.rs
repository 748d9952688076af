//! Capture state management
//!
//! Defines the capture mode, per-frame outcomes and session statistics.

use super::sync::MediaTime;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// Current mode of the capture pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureMode {
    /// Frames only update the preview
    #[default]
    Idle,
    /// Frames are written to the session's video, IMU and depth streams
    Recording,
    /// Frames are available for one-shot still capture
    Calibrating,
}

/// Why a frame produced no recorded output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SkipReason {
    /// The sensor delivered no depth map
    MissingDepth,
    /// No inertial sample had arrived yet
    MissingMotion,
    /// The encoder queue was full under the drop policy
    Backlogged,
    /// The video writer refused the frame (size, timestamp order, closed encoder)
    VideoRejected,
    /// IMU or depth output could not be prepared before the video write
    PersistenceFailed,
}

/// Per-reason skipped frame counts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkipCounts {
    pub missing_depth: u64,
    pub missing_motion: u64,
    pub backlogged: u64,
    pub video_rejected: u64,
    pub persistence_failed: u64,
}

impl SkipCounts {
    pub fn record(&mut self, reason: SkipReason) {
        match reason {
            SkipReason::MissingDepth => self.missing_depth += 1,
            SkipReason::MissingMotion => self.missing_motion += 1,
            SkipReason::Backlogged => self.backlogged += 1,
            SkipReason::VideoRejected => self.video_rejected += 1,
            SkipReason::PersistenceFailed => self.persistence_failed += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.missing_depth
            + self.missing_motion
            + self.backlogged
            + self.video_rejected
            + self.persistence_failed
    }
}

/// What happened to one frame record
#[derive(Debug, Clone, PartialEq)]
pub enum FrameOutcome {
    /// Preview only (idle, or calibrating without a pending request)
    PreviewOnly,
    /// Video, IMU and depth were submitted at this session-relative time
    Recorded { relative: MediaTime },
    /// Nothing was written for this frame
    Skipped(SkipReason),
    /// The video accepted the frame but committing its IMU line or depth
    /// buffer failed afterwards
    Incomplete { relative: MediaTime },
    /// A calibration still was written
    CalibrationCaptured(PathBuf),
    /// A calibration request was consumed but the still could not be written
    CalibrationFailed,
}

/// Statistics of a recording session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStats {
    pub session_id: Uuid,

    /// Wall-clock time the session started
    pub started_at: DateTime<Utc>,

    /// Wall-clock time the session ended
    pub ended_at: Option<DateTime<Utc>>,

    /// Absolute sensor time of the first recorded frame, in seconds
    pub origin_seconds: Option<f64>,

    /// Frames accepted by the video writer
    pub video_frames: u64,

    /// Depth buffers written
    pub depth_frames: u64,

    /// IMU lines written
    pub imu_lines: u64,

    pub skipped: SkipCounts,

    /// IMU or depth commits that failed after the frame's video was accepted
    pub write_failures: u64,

    /// Frames the encoder thread has appended so far
    pub frames_encoded: u64,

    /// Frames the encoder refused after they were queued
    pub encode_failures: u64,

    /// Session-relative time of the last recorded frame, in seconds
    pub last_relative_seconds: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skip_counts() {
        let mut counts = SkipCounts::default();
        counts.record(SkipReason::MissingDepth);
        counts.record(SkipReason::MissingDepth);
        counts.record(SkipReason::Backlogged);
        counts.record(SkipReason::PersistenceFailed);
        assert_eq!(counts.missing_depth, 2);
        assert_eq!(counts.backlogged, 1);
        assert_eq!(counts.persistence_failed, 1);
        assert_eq!(counts.total(), 4);
    }

    #[test]
    fn test_mode_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&CaptureMode::Calibrating).unwrap(),
            "\"calibrating\""
        );
        assert_eq!(CaptureMode::default(), CaptureMode::Idle);
    }
}
