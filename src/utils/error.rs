//! Error types and handling
//!
//! Common error types used across the application.

use crate::bundle::BundleError;
use crate::recorder::channel::{RecordingError, WriterError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Recording(#[from] RecordingError),

    #[error("Bundle error: {0}")]
    Bundle(#[from] BundleError),

    #[error("Task failed: {0}")]
    Task(String),
}

/// Error response for frontend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl From<AppError> for ErrorResponse {
    fn from(error: AppError) -> Self {
        let code = match &error {
            AppError::Io(_) => "IO_ERROR",
            AppError::Recording(e) => match e {
                RecordingError::AlreadyRecording => "ALREADY_RECORDING",
                RecordingError::NotRecording => "NOT_RECORDING",
                RecordingError::CalibrationActive => "CALIBRATION_ACTIVE",
                RecordingError::NotCalibrating => "NOT_CALIBRATING",
                RecordingError::ConfigurationError(_) => "CONFIGURATION_ERROR",
                RecordingError::Writer(WriterError::Encoder(_)) => "ENCODER_ERROR",
                _ => "RECORDING_ERROR",
            },
            AppError::Bundle(_) => "BUNDLE_ERROR",
            AppError::Task(_) => "TASK_ERROR",
        };

        ErrorResponse {
            code: code.to_string(),
            message: error.to_string(),
        }
    }
}

impl From<RecordingError> for ErrorResponse {
    fn from(error: RecordingError) -> Self {
        AppError::from(error).into()
    }
}

impl From<BundleError> for ErrorResponse {
    fn from(error: BundleError) -> Self {
        AppError::from(error).into()
    }
}
