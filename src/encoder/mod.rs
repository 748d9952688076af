//! Video encoder sessions
//!
//! The video writer feeds frames to an encoder session through this seam. The
//! shipped implementation pipes raw RGBA frames to an FFmpeg child process.

pub mod ffmpeg;

pub use ffmpeg::{FfmpegEncoder, FfmpegEncoderFactory};

use crate::capture::image::RgbaImage;
use crate::recorder::channel::WriterError;
use crate::recorder::config::VideoSettings;
use crate::recorder::sync::MediaTime;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Outcome of a finalized encoder session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncoderSummary {
    /// Container file written
    pub output: PathBuf,
    /// Frames accepted by the encoder
    pub frames_written: u64,
    /// Presentation time of the last frame
    pub last_presentation_time: Option<MediaTime>,
}

/// One open encoder session, started at presentation time zero
pub trait VideoEncoder: Send {
    /// Append one frame at its presentation time
    fn append(&mut self, image: &RgbaImage, presentation_time: MediaTime) -> Result<(), WriterError>;

    /// Flush, mark finished and close the container
    fn finish(self: Box<Self>) -> Result<EncoderSummary, WriterError>;
}

/// Opens encoder sessions for new recordings
pub trait EncoderFactory: Send + Sync {
    /// Begin a session writing to `output`. Failure here aborts the recording start.
    fn create(&self, output: &Path, settings: &VideoSettings) -> Result<Box<dyn VideoEncoder>, WriterError>;
}
