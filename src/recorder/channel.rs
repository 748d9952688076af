//! Stream writer abstraction
//!
//! Each recorded stream (video, IMU, depth) is persisted by one writer that owns
//! its output sink. Writers share a lifecycle: opened when a recording starts,
//! written once per accepted frame, closed when the recording ends.

use crate::capture::image::ImageError;
use crate::recorder::sync::MediaTime;
use thiserror::Error;

/// Errors raised by individual writers and encoders
#[derive(Error, Debug)]
pub enum WriterError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Writer closed")]
    Closed,

    #[error("Encoder error: {0}")]
    Encoder(String),

    #[error("Encoder backlog full, frame dropped")]
    Backlogged,

    #[error("Frame size mismatch: got {got_width}x{got_height}, encoder expects {width}x{height}")]
    FrameSize {
        got_width: u32,
        got_height: u32,
        width: u32,
        height: u32,
    },

    #[error("Presentation time {current}s does not follow {previous}s")]
    NonMonotonic {
        previous: MediaTime,
        current: MediaTime,
    },

    #[error("Presentation time {0}s precedes the encoder session start")]
    BeforeSessionStart(MediaTime),

    #[error("Image error: {0}")]
    Image(#[from] ImageError),
}

/// Errors raised by the capture session lifecycle
#[derive(Error, Debug)]
pub enum RecordingError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Already recording")]
    AlreadyRecording,

    #[error("Not recording")]
    NotRecording,

    #[error("Recording is unavailable while calibration mode is active")]
    CalibrationActive,

    #[error("Calibration mode is not active")]
    NotCalibrating,

    #[error("Writer error: {0}")]
    Writer(#[from] WriterError),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Frame source error: {0}")]
    Source(String),
}

pub type RecordingResult<T> = Result<T, RecordingError>;

/// A writer that persists one stream of session-relative payloads
pub trait StreamWriter: Send {
    /// Payload accepted by [`StreamWriter::write`]
    type Payload: ?Sized;

    /// Persist one payload stamped with its session-relative time
    fn write(&mut self, payload: &Self::Payload, relative: MediaTime) -> Result<(), WriterError>;

    /// Flush and release the sink. Further writes fail with [`WriterError::Closed`].
    fn close(&mut self) -> Result<(), WriterError>;

    /// Whether the writer still accepts payloads
    fn is_open(&self) -> bool;

    /// Number of payloads accepted so far
    fn records_written(&self) -> u64;
}
