//! Capture configuration
//!
//! Loaded from a camelCase JSON file; every field has a default so a partial
//! file (or none at all) is valid.

use super::channel::RecordingError;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Video container for the recorded stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoContainer {
    Mov,
    Mp4,
}

impl VideoContainer {
    /// Get the file extension for this container
    pub fn extension(&self) -> &'static str {
        match self {
            VideoContainer::Mov => "mov",
            VideoContainer::Mp4 => "mp4",
        }
    }
}

/// Encoder quality levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncoderQuality {
    Low,
    Medium,
    High,
    Lossless,
}

impl EncoderQuality {
    /// Get the CRF value for H.264 encoding
    /// Lower values = higher quality, larger files
    pub fn crf(&self) -> u8 {
        match self {
            EncoderQuality::Low => 28,
            EncoderQuality::Medium => 23,
            EncoderQuality::High => 18,
            EncoderQuality::Lossless => 1,
        }
    }

    /// Get the x264 preset. Capture encodes in real time, so presets stay fast.
    pub fn h264_preset(&self) -> &'static str {
        match self {
            EncoderQuality::Low => "ultrafast",
            EncoderQuality::Medium => "superfast",
            EncoderQuality::High => "veryfast",
            EncoderQuality::Lossless => "faster",
        }
    }
}

/// What the frame callback does when the encoder queue is full
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackpressurePolicy {
    /// Wait for the encoder to make room (stalls the sensor callback)
    Block,
    /// Skip the whole frame (video, IMU and depth)
    Drop,
}

/// Video encoder settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VideoSettings {
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Nominal frame rate of the sensor
    pub fps: u32,
    pub container: VideoContainer,
    pub quality: EncoderQuality,
}

impl Default for VideoSettings {
    fn default() -> Self {
        // 4:3 at 1440 lines, the camera's native capture aspect
        Self {
            width: 1920,
            height: 1440,
            fps: 60,
            container: VideoContainer::Mov,
            quality: EncoderQuality::High,
        }
    }
}

/// Configuration for the capture pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CaptureConfig {
    /// Directory all session artifacts are written under
    pub data_root: PathBuf,

    pub video: VideoSettings,

    /// Frames the encoder queue holds before backpressure applies
    pub queue_capacity: usize,

    pub backpressure: BackpressurePolicy,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            data_root: PathBuf::from("Data"),
            video: VideoSettings::default(),
            queue_capacity: 8,
            backpressure: BackpressurePolicy::Block,
        }
    }
}

impl CaptureConfig {
    /// Config rooted at `data_root` with default settings
    pub fn with_data_root(data_root: impl Into<PathBuf>) -> Self {
        Self {
            data_root: data_root.into(),
            ..Self::default()
        }
    }

    /// Load and validate a JSON config file
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read capture config {:?}", path))?;
        let config: CaptureConfig = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse capture config {:?}", path))?;
        config.validate()?;

        tracing::info!("Loaded capture config from {:?}", path);
        Ok(config)
    }

    /// Check values the encoder and queue cannot work with
    pub fn validate(&self) -> Result<(), RecordingError> {
        if self.video.width == 0 || self.video.height == 0 {
            return Err(RecordingError::ConfigurationError(format!(
                "Invalid video size {}x{}",
                self.video.width, self.video.height
            )));
        }
        // yuv420p needs even dimensions
        if self.video.width % 2 != 0 || self.video.height % 2 != 0 {
            return Err(RecordingError::ConfigurationError(format!(
                "Video size {}x{} must be even",
                self.video.width, self.video.height
            )));
        }
        if self.video.fps == 0 {
            return Err(RecordingError::ConfigurationError(
                "Frame rate must be positive".to_string(),
            ));
        }
        if self.queue_capacity == 0 {
            return Err(RecordingError::ConfigurationError(
                "Queue capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: CaptureConfig =
            serde_json::from_str(r#"{"dataRoot": "/tmp/capture", "backpressure": "drop"}"#).unwrap();
        assert_eq!(config.data_root, PathBuf::from("/tmp/capture"));
        assert_eq!(config.backpressure, BackpressurePolicy::Drop);
        assert_eq!(config.video, VideoSettings::default());
        assert_eq!(config.queue_capacity, 8);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("capture.json");
        std::fs::write(
            &path,
            r#"{"video": {"width": 640, "height": 480, "container": "mp4"}, "queueCapacity": 2}"#,
        )
        .unwrap();

        let config = CaptureConfig::load(&path).unwrap();
        assert_eq!(config.video.width, 640);
        assert_eq!(config.video.fps, 60);
        assert_eq!(config.video.container.extension(), "mp4");
        assert_eq!(config.queue_capacity, 2);
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("capture.json");
        std::fs::write(&path, r#"{"video": {"width": 641}}"#).unwrap();
        assert!(CaptureConfig::load(&path).is_err());

        std::fs::write(&path, r#"{"queueCapacity": 0}"#).unwrap();
        assert!(CaptureConfig::load(&path).is_err());
    }

    #[test]
    fn test_missing_file_reports_path() {
        let err = CaptureConfig::load(Path::new("/nonexistent/capture.json")).unwrap_err();
        assert!(err.to_string().contains("capture.json"));
    }
}
