//! Synthetic frame source
//!
//! Generates camera images, depth maps and motion samples on a background
//! thread at a fixed rate. Used for running the pipeline without a depth
//! camera attached.

use crate::capture::image::RgbaImage;
use crate::capture::traits::{
    Attitude, DepthMap, FrameRecord, FrameSink, FrameSource, InertialSample, LatestMotion,
    MotionProvider, Vector3,
};
use crate::recorder::channel::{RecordingError, RecordingResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Synthetic source settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SyntheticConfig {
    pub width: u32,
    pub height: u32,
    pub depth_width: u32,
    pub depth_height: u32,
    pub fps: u32,
    /// Stop after this many frames (`None` runs until stopped)
    pub frame_count: Option<u64>,
    /// Device timestamp of the first frame, in seconds
    pub start_timestamp: f64,
    /// Sleep between frames to match `fps` in wall-clock time
    pub paced: bool,
    /// Drop the depth map of every n-th frame
    pub missing_depth_every: Option<u64>,
    /// Number of frames delivered before the first motion sample
    pub motion_warmup_frames: u64,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            depth_width: 320,
            depth_height: 240,
            fps: 30,
            frame_count: None,
            start_timestamp: 1000.0,
            paced: true,
            missing_depth_every: None,
            motion_warmup_frames: 0,
        }
    }
}

pub struct SyntheticFrameSource {
    id: String,
    config: SyntheticConfig,
    motion: Arc<LatestMotion>,
    is_running: Arc<AtomicBool>,
    capture_thread: Option<std::thread::JoinHandle<u64>>,
}

impl SyntheticFrameSource {
    pub fn new(config: SyntheticConfig) -> Self {
        Self {
            id: "synthetic".to_string(),
            config,
            motion: Arc::new(LatestMotion::new()),
            is_running: Arc::new(AtomicBool::new(false)),
            capture_thread: None,
        }
    }

    pub fn config(&self) -> &SyntheticConfig {
        &self.config
    }

    /// Block until a bounded source has delivered all of its frames.
    ///
    /// Returns the number of frames delivered.
    pub fn wait(&mut self) -> RecordingResult<u64> {
        let handle = self
            .capture_thread
            .take()
            .ok_or_else(|| RecordingError::Source("Synthetic source not started".to_string()))?;
        handle
            .join()
            .map_err(|_| RecordingError::Source("Synthetic capture thread panicked".to_string()))
    }
}

/// Camera image for frame `index`: a horizontal ramp that shifts every frame
pub fn synthetic_image(width: u32, height: u32, index: u64) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, y| {
        let shade = ((x as u64 + index) % 256) as u8;
        [shade, (y % 256) as u8, (index % 256) as u8, 255]
    })
}

/// Depth map for frame `index`: a tilted plane a little over a meter away
pub fn synthetic_depth(width: u32, height: u32, index: u64) -> DepthMap {
    DepthMap::from_fn(width, height, |x, y| {
        1.0 + 0.001 * (x + y) as f32 + 0.0001 * index as f32
    })
}

/// Motion sample for device time `timestamp`: a slow sway around the yaw axis
pub fn synthetic_motion(timestamp: f64) -> InertialSample {
    InertialSample {
        attitude: Attitude {
            roll: 0.01 * timestamp.sin(),
            pitch: 0.02,
            yaw: 0.1 * (timestamp * 0.5).sin(),
        },
        rotation_rate: Vector3 {
            x: 0.0,
            y: 0.0,
            z: 0.05 * (timestamp * 0.5).cos(),
        },
        user_acceleration: Vector3 {
            x: 0.001,
            y: -0.002,
            z: 0.0,
        },
        timestamp,
    }
}

#[async_trait]
impl FrameSource for SyntheticFrameSource {
    fn id(&self) -> &str {
        &self.id
    }

    async fn start(&mut self, sink: Arc<dyn FrameSink>) -> RecordingResult<()> {
        if self.is_running.load(Ordering::SeqCst) {
            return Err(RecordingError::Source("Synthetic source already running".to_string()));
        }
        if self.config.fps == 0 {
            return Err(RecordingError::ConfigurationError(
                "Synthetic source frame rate must be positive".to_string(),
            ));
        }

        self.is_running.store(true, Ordering::SeqCst);
        self.motion.clear();

        let config = self.config.clone();
        let motion = self.motion.clone();
        let is_running = self.is_running.clone();

        let handle = std::thread::Builder::new()
            .name("synthetic-capture".to_string())
            .spawn(move || {
                let period = 1.0 / config.fps as f64;
                let mut delivered = 0u64;

                while is_running.load(Ordering::SeqCst) {
                    if config.frame_count.is_some_and(|limit| delivered >= limit) {
                        break;
                    }

                    let timestamp = config.start_timestamp + delivered as f64 * period;
                    if delivered >= config.motion_warmup_frames {
                        // Motion runs slightly ahead of the camera pipeline
                        motion.publish(synthetic_motion(timestamp - period / 4.0));
                    }

                    let drop_depth = config
                        .missing_depth_every
                        .is_some_and(|n| n > 0 && (delivered + 1) % n == 0);
                    let depth = (!drop_depth)
                        .then(|| synthetic_depth(config.depth_width, config.depth_height, delivered));
                    let image = synthetic_image(config.width, config.height, delivered);

                    sink.on_frame(FrameRecord::new(image, depth, timestamp));
                    delivered += 1;

                    if config.paced {
                        std::thread::sleep(Duration::from_secs_f64(period));
                    }
                }

                is_running.store(false, Ordering::SeqCst);
                tracing::info!("Synthetic capture thread stopped after {} frames", delivered);
                delivered
            })?;

        self.capture_thread = Some(handle);

        tracing::info!(
            "Synthetic capture started ({}x{} @ {}fps)",
            self.config.width,
            self.config.height,
            self.config.fps
        );
        Ok(())
    }

    async fn stop(&mut self) -> RecordingResult<()> {
        self.is_running.store(false, Ordering::SeqCst);

        if let Some(handle) = self.capture_thread.take() {
            if handle.join().is_err() {
                tracing::error!("Synthetic capture thread panicked");
                return Err(RecordingError::Source(
                    "Synthetic capture thread panicked".to_string(),
                ));
            }
        }

        tracing::info!("Synthetic capture stopped");
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.is_running.load(Ordering::SeqCst)
    }

    fn motion(&self) -> Arc<dyn MotionProvider> {
        self.motion.clone()
    }
}
