//! Recording-related commands

use crate::bundle::RecordedSession;
use crate::capture::traits::MotionProvider;
use crate::encoder::{EncoderFactory, FfmpegEncoderFactory};
use crate::recorder::{CaptureConfig, CaptureMode, CaptureSessionController, SessionStats};
use crate::utils::error::{AppError, ErrorResponse};
use std::sync::Arc;

/// Application state for recording
pub struct RecorderState {
    pub controller: Arc<CaptureSessionController>,
}

impl RecorderState {
    pub fn new(
        config: CaptureConfig,
        encoder_factory: Arc<dyn EncoderFactory>,
        motion: Arc<dyn MotionProvider>,
    ) -> Self {
        Self {
            controller: Arc::new(CaptureSessionController::new(config, encoder_factory, motion)),
        }
    }

    /// State backed by the `ffmpeg` binary on `PATH`
    pub fn with_ffmpeg(config: CaptureConfig, motion: Arc<dyn MotionProvider>) -> Self {
        Self::new(config, Arc::new(FfmpegEncoderFactory::new()), motion)
    }
}

/// Run a controller call that touches the filesystem off the async runtime
async fn run_blocking<T, F>(state: &RecorderState, f: F) -> Result<T, ErrorResponse>
where
    T: Send + 'static,
    F: FnOnce(&CaptureSessionController) -> Result<T, AppError> + Send + 'static,
{
    let controller = state.controller.clone();
    tokio::task::spawn_blocking(move || f(&controller))
        .await
        .map_err(|e| ErrorResponse::from(AppError::Task(e.to_string())))?
        .map_err(ErrorResponse::from)
}

/// Check if the FFmpeg encoder can be used
pub async fn check_encoder_available() -> Result<bool, ErrorResponse> {
    tokio::task::spawn_blocking(|| FfmpegEncoderFactory::new().is_available())
        .await
        .map_err(|e| ErrorResponse::from(AppError::Task(e.to_string())))
}

/// Start recording. Returns the new session id.
pub async fn start_recording(state: &RecorderState) -> Result<String, ErrorResponse> {
    run_blocking(state, |controller| {
        let id = controller.start_recording()?;
        Ok(id.to_string())
    })
    .await
}

/// Stop recording
pub async fn end_recording(state: &RecorderState) -> Result<SessionStats, ErrorResponse> {
    run_blocking(state, |controller| Ok(controller.end_recording()?)).await
}

/// Enter or leave calibration mode
pub async fn toggle_calibration_mode(state: &RecorderState) -> Result<CaptureMode, ErrorResponse> {
    run_blocking(state, |controller| Ok(controller.toggle_calibration_mode()?)).await
}

/// Save the next frame as a calibration still
pub async fn request_calibration_capture(state: &RecorderState) -> Result<(), ErrorResponse> {
    state
        .controller
        .request_calibration_capture()
        .map_err(ErrorResponse::from)
}

/// Get current capture mode
pub async fn get_capture_mode(state: &RecorderState) -> Result<CaptureMode, ErrorResponse> {
    Ok(state.controller.mode())
}

/// Get statistics of the recording in progress
pub async fn get_session_stats(state: &RecorderState) -> Result<Option<SessionStats>, ErrorResponse> {
    Ok(state.controller.session_stats())
}

/// Load the artifacts of the last recording from the data root
pub async fn load_recorded_session(state: &RecorderState) -> Result<RecordedSession, ErrorResponse> {
    run_blocking(state, |controller| {
        // A finished session may still be writing its video
        if let Some(Err(e)) = controller.wait_for_finalization() {
            tracing::warn!("Video finalization failed: {}", e);
        }
        Ok(RecordedSession::load(controller.layout())?)
    })
    .await
}
