//! Capture session controller
//!
//! Owns the capture mode and the active session, and runs the per-frame
//! pipeline on the frame source's callback thread: publish the preview, then
//! route the frame to the recording session or the calibration capture.
//!
//! The controller lock only guards mode transitions. A recording session sits
//! behind its own lock, so a frame waiting on a full video queue never keeps
//! mode queries or the stop command waiting.

use super::channel::{RecordingError, RecordingResult};
use super::config::CaptureConfig;
use super::session::Session;
use super::state::{CaptureMode, FrameOutcome, SessionStats};
use super::sync::{MediaTime, PREFERRED_TIMESCALE};
use super::writers::{PendingFinalization, WriteInterrupt};
use crate::bundle::layout::{calibration_file_name, DataLayout};
use crate::capture::image::RgbaImage;
use crate::capture::traits::{FrameRecord, FrameSink, FrameSource, MotionProvider};
use crate::encoder::{EncoderFactory, EncoderSummary};
use crate::recorder::channel::WriterError;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use uuid::Uuid;

/// Events emitted by the controller
#[derive(Debug, Clone)]
pub enum CaptureEvent {
    /// Recording started
    RecordingStarted(Uuid),
    /// Recording stopped
    RecordingStopped(SessionStats),
    /// Calibration mode entered or left
    CalibrationModeChanged(bool),
    /// Calibration still written
    CalibrationCaptured(PathBuf),
    /// Error occurred
    Error(String),
}

/// Latest display-oriented camera image
pub type PreviewImage = Option<Arc<RgbaImage>>;

/// A recording shared between the controller and the frame callback
struct ActiveRecording {
    session: Mutex<Session>,
    interrupt: WriteInterrupt,
    /// Counters as of the last processed frame
    stats: Mutex<SessionStats>,
}

/// Mode with the data that only exists inside it
enum ModeState {
    Idle,
    Recording {
        active: Arc<ActiveRecording>,
        /// Enter calibration once this recording ends
        calibration_armed: bool,
    },
    Calibrating {
        capture_requested: bool,
    },
}

impl ModeState {
    fn mode(&self) -> CaptureMode {
        match self {
            ModeState::Idle => CaptureMode::Idle,
            ModeState::Recording { .. } => CaptureMode::Recording,
            ModeState::Calibrating { .. } => CaptureMode::Calibrating,
        }
    }
}

/// Where one frame goes after the preview
enum FrameRoute {
    Record(Arc<ActiveRecording>),
    CaptureStill,
    PreviewOnly,
}

struct ControllerState {
    mode: ModeState,
    /// Video finalization of the previous session, if still outstanding
    pending_finalization: Option<PendingFinalization>,
}

pub struct CaptureSessionController {
    config: CaptureConfig,
    layout: DataLayout,
    encoder_factory: Arc<dyn EncoderFactory>,
    motion: Arc<dyn MotionProvider>,
    state: Mutex<ControllerState>,
    preview_tx: watch::Sender<PreviewImage>,
    event_tx: broadcast::Sender<CaptureEvent>,
}

impl CaptureSessionController {
    pub fn new(
        config: CaptureConfig,
        encoder_factory: Arc<dyn EncoderFactory>,
        motion: Arc<dyn MotionProvider>,
    ) -> Self {
        let layout = DataLayout::new(&config.data_root, config.video.container);
        let (preview_tx, _) = watch::channel(None);
        let (event_tx, _) = broadcast::channel(100);
        Self {
            config,
            layout,
            encoder_factory,
            motion,
            state: Mutex::new(ControllerState {
                mode: ModeState::Idle,
                pending_finalization: None,
            }),
            preview_tx,
            event_tx,
        }
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    pub fn layout(&self) -> &DataLayout {
        &self.layout
    }

    /// Get the current capture mode
    pub fn mode(&self) -> CaptureMode {
        self.state.lock().mode.mode()
    }

    /// Whether calibration starts once the current recording ends
    pub fn calibration_armed(&self) -> bool {
        matches!(
            self.state.lock().mode,
            ModeState::Recording {
                calibration_armed: true,
                ..
            }
        )
    }

    /// Subscribe to controller events
    pub fn subscribe(&self) -> broadcast::Receiver<CaptureEvent> {
        self.event_tx.subscribe()
    }

    /// Watch the live preview
    pub fn preview(&self) -> watch::Receiver<PreviewImage> {
        self.preview_tx.subscribe()
    }

    /// Most recently published preview image
    pub fn latest_preview(&self) -> PreviewImage {
        self.preview_tx.borrow().clone()
    }

    /// Statistics of the active recording session
    pub fn session_stats(&self) -> Option<SessionStats> {
        let active = match &self.state.lock().mode {
            ModeState::Recording { active, .. } => active.clone(),
            _ => return None,
        };
        let stats = active.stats.lock().clone();
        Some(stats)
    }

    /// Prepare the data root and start delivering frames from `source`
    pub async fn begin_capture(self: &Arc<Self>, source: &mut dyn FrameSource) -> RecordingResult<()> {
        self.layout.ensure_root()?;
        self.layout.reset_session_artifacts()?;
        self.layout.reset_calibration()?;

        let sink: Arc<dyn FrameSink> = self.clone();
        source.start(sink).await?;

        tracing::info!("Capture started from source {}", source.id());
        Ok(())
    }

    /// Stop `source`, ending any recording in progress
    pub async fn end_capture(&self, source: &mut dyn FrameSource) -> RecordingResult<()> {
        if self.mode() == CaptureMode::Recording {
            self.end_recording()?;
        }
        source.stop().await?;

        tracing::info!("Capture stopped from source {}", source.id());
        Ok(())
    }

    /// Start a recording session
    ///
    /// Deletes the previous session's video, IMU and depth artifacts before
    /// opening new writers. On failure the controller stays idle.
    pub fn start_recording(&self) -> RecordingResult<Uuid> {
        let mut state = loop {
            let mut state = self.state.lock();
            match state.mode {
                ModeState::Recording { .. } => return Err(RecordingError::AlreadyRecording),
                ModeState::Calibrating { .. } => return Err(RecordingError::CalibrationActive),
                ModeState::Idle => {}
            }
            // The previous encoder may still be writing the file we are about
            // to delete. Frames keep flowing while we wait for it.
            match state.pending_finalization.take() {
                Some(pending) => {
                    drop(state);
                    log_finalization(pending.wait());
                }
                None => break state,
            }
        };

        tracing::info!("Starting recording in {:?}", self.layout.root());

        let session = self
            .layout
            .ensure_root()
            .and_then(|_| self.layout.reset_session_artifacts())
            .map_err(RecordingError::from)
            .and_then(|_| Session::start(&self.layout, &self.config, self.encoder_factory.as_ref()));

        let session = match session {
            Ok(session) => session,
            Err(e) => {
                tracing::error!("Failed to start recording: {}", e);
                let _ = self.event_tx.send(CaptureEvent::Error(e.to_string()));
                return Err(e);
            }
        };

        let id = session.id();
        let active = ActiveRecording {
            interrupt: session.interrupt_handle(),
            stats: Mutex::new(session.stats()),
            session: Mutex::new(session),
        };
        state.mode = ModeState::Recording {
            active: Arc::new(active),
            calibration_armed: false,
        };
        let _ = self.event_tx.send(CaptureEvent::RecordingStarted(id));

        tracing::info!("Recording started: session {}", id);
        Ok(id)
    }

    /// Stop the recording session
    ///
    /// Writers are closed and the video is finalized in the background. The
    /// next `start_recording` waits for that finalization before deleting
    /// the previous artifacts. If calibration was armed during the recording,
    /// the controller moves on to `Calibrating`.
    pub fn end_recording(&self) -> RecordingResult<SessionStats> {
        let mut state = self.state.lock();
        let (active, calibration_armed) = match std::mem::replace(&mut state.mode, ModeState::Idle) {
            ModeState::Recording {
                active,
                calibration_armed,
            } => (active, calibration_armed),
            other => {
                state.mode = other;
                return Err(RecordingError::NotRecording);
            }
        };

        // A frame waiting on a full video queue holds the session lock
        active.interrupt.interrupt();
        let (stats, pending) = active.session.lock().finish();
        *active.stats.lock() = stats.clone();
        state.pending_finalization = pending;
        let _ = self.event_tx.send(CaptureEvent::RecordingStopped(stats.clone()));

        tracing::info!(
            "Recording stopped: session {}, {} video frames, {} depth frames, {} skipped",
            stats.session_id,
            stats.video_frames,
            stats.depth_frames,
            stats.skipped.total()
        );

        if calibration_armed {
            state.mode = ModeState::Calibrating {
                capture_requested: false,
            };
            let _ = self.event_tx.send(CaptureEvent::CalibrationModeChanged(true));
            tracing::info!("Calibration mode on");
        }
        Ok(stats)
    }

    /// Enter or leave calibration mode
    ///
    /// During a recording the toggle arms (or disarms) calibration instead:
    /// frames keep going to the recording, and calibration starts when it
    /// ends.
    pub fn toggle_calibration_mode(&self) -> RecordingResult<CaptureMode> {
        let mut state = self.state.lock();
        if let ModeState::Recording {
            calibration_armed, ..
        } = &mut state.mode
        {
            *calibration_armed = !*calibration_armed;
            tracing::info!(
                "Calibration {} until the recording ends",
                if *calibration_armed { "armed" } else { "disarmed" }
            );
            return Ok(CaptureMode::Recording);
        }

        let entering = matches!(state.mode, ModeState::Idle);
        state.mode = if entering {
            ModeState::Calibrating {
                capture_requested: false,
            }
        } else {
            ModeState::Idle
        };
        let _ = self.event_tx.send(CaptureEvent::CalibrationModeChanged(entering));

        tracing::info!("Calibration mode {}", if entering { "on" } else { "off" });
        Ok(state.mode.mode())
    }

    /// Ask for the next frame to be saved as a calibration still
    pub fn request_calibration_capture(&self) -> RecordingResult<()> {
        match &mut self.state.lock().mode {
            ModeState::Calibrating { capture_requested } => {
                *capture_requested = true;
                Ok(())
            }
            _ => Err(RecordingError::NotCalibrating),
        }
    }

    /// Wait for the previous session's video to finish finalizing
    pub fn wait_for_finalization(&self) -> Option<Result<EncoderSummary, WriterError>> {
        // Take it out first so frames are not blocked while we wait
        let pending = self.state.lock().pending_finalization.take()?;
        Some(pending.wait())
    }

    /// Run the per-frame pipeline for one frame record
    pub fn process_frame(&self, frame: FrameRecord) -> FrameOutcome {
        // The preview keeps updating no matter what happens to persistence
        let preview = Arc::new(frame.image.rotated_clockwise());
        self.preview_tx.send_replace(Some(preview));

        let route = match &mut self.state.lock().mode {
            ModeState::Recording { active, .. } => FrameRoute::Record(active.clone()),
            // One request, one still, even if the write fails
            ModeState::Calibrating { capture_requested } => {
                if std::mem::take(capture_requested) {
                    FrameRoute::CaptureStill
                } else {
                    FrameRoute::PreviewOnly
                }
            }
            ModeState::Idle => FrameRoute::PreviewOnly,
        };

        match route {
            FrameRoute::Record(active) => {
                let mut session = active.session.lock();
                let outcome = session.record_frame(&frame, self.motion.as_ref());
                *active.stats.lock() = session.stats();
                outcome
            }
            FrameRoute::CaptureStill => self.capture_calibration_still(&frame),
            FrameRoute::PreviewOnly => FrameOutcome::PreviewOnly,
        }
    }

    fn capture_calibration_still(&self, frame: &FrameRecord) -> FrameOutcome {
        let timestamp = MediaTime::from_seconds(frame.timestamp, PREFERRED_TIMESCALE);
        let dir = self.layout.calibration_dir();
        let path = dir.join(calibration_file_name(timestamp));

        // The preview rotated back to sensor orientation is the camera image itself
        let result = std::fs::create_dir_all(&dir)
            .map_err(WriterError::from)
            .and_then(|_| frame.image.write_png(&path).map_err(WriterError::from));

        match result {
            Ok(()) => {
                tracing::info!("Calibration image saved to {:?}", path);
                let _ = self.event_tx.send(CaptureEvent::CalibrationCaptured(path.clone()));
                FrameOutcome::CalibrationCaptured(path)
            }
            Err(e) => {
                tracing::warn!("Failed to save calibration image {:?}: {}", path, e);
                let _ = self.event_tx.send(CaptureEvent::Error(e.to_string()));
                FrameOutcome::CalibrationFailed
            }
        }
    }
}

impl FrameSink for CaptureSessionController {
    fn on_frame(&self, frame: FrameRecord) {
        self.process_frame(frame);
    }
}

fn log_finalization(result: Result<EncoderSummary, WriterError>) {
    match result {
        Ok(summary) => tracing::info!(
            "Previous video finalized: {} frames in {:?}",
            summary.frames_written,
            summary.output
        ),
        Err(e) => tracing::warn!("Previous video failed to finalize: {}", e),
    }
}
