//! Record Video IMU - synchronized video, depth and motion capture.
//!
//! Frames from a depth camera are fanned out to three session-relative
//! streams on disk: an H.264 video, an IMU CSV and one raw depth buffer per
//! frame. A calibration mode saves single stills instead.

pub mod bundle;
pub mod capture;
pub mod commands;
pub mod encoder;
pub mod recorder;
pub mod utils;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing/logging
///
/// Honors `RUST_LOG`, defaulting to debug output for this crate. Calling it
/// again after a subscriber is installed does nothing.
pub fn init_logging() {
    let result = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "record_video_imu=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();

    if result.is_ok() {
        tracing::info!("Starting Record Video IMU v{}", env!("CARGO_PKG_VERSION"));
    }
}
