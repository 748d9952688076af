//! Recording system module
//!
//! This module implements the synchronized capture pipeline:
//! - TimeSynchronizer to turn sensor timestamps into session-relative times
//! - StreamWriter trait with video, IMU and depth writers
//! - CaptureSessionController to run the mode state machine and fan frames out

pub mod channel;
pub mod config;
pub mod coordinator;
pub mod session;
pub mod state;
pub mod sync;
pub mod writers;

pub use channel::{RecordingError, RecordingResult, StreamWriter, WriterError};
pub use config::{BackpressurePolicy, CaptureConfig, EncoderQuality, VideoContainer, VideoSettings};
pub use coordinator::{CaptureEvent, CaptureSessionController, PreviewImage};
pub use state::{CaptureMode, FrameOutcome, SessionStats, SkipCounts, SkipReason};
pub use sync::{MediaTime, SyncError, TimeSynchronizer, PREFERRED_TIMESCALE};
