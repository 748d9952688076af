//! Frame source contract
//!
//! The platform camera/depth/motion APIs live outside this crate. A frame source
//! pushes synchronized frame records into a [`FrameSink`] from its own callback
//! thread and exposes the latest inertial sample through a [`MotionProvider`].

use super::image::RgbaImage;
use crate::recorder::channel::RecordingResult;
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Frame payload errors
#[derive(Error, Debug, PartialEq, Eq)]
pub enum FrameError {
    #[error("Depth buffer too small: got {got} bytes, need {needed} ({bytes_per_row} x {height})")]
    DepthBufferSize {
        got: usize,
        needed: usize,
        bytes_per_row: usize,
        height: u32,
    },
}

/// Dense depth map as delivered by the sensor (row-major, possibly padded rows)
#[derive(Debug, Clone, PartialEq)]
pub struct DepthMap {
    width: u32,
    height: u32,
    bytes_per_row: usize,
    data: Vec<u8>,
}

impl DepthMap {
    pub fn new(width: u32, height: u32, bytes_per_row: usize, data: Vec<u8>) -> Result<Self, FrameError> {
        let needed = bytes_per_row * height as usize;
        if data.len() < needed {
            return Err(FrameError::DepthBufferSize {
                got: data.len(),
                needed,
                bytes_per_row,
                height,
            });
        }
        Ok(Self {
            width,
            height,
            bytes_per_row,
            data,
        })
    }

    /// Depth map of 32-bit float metres in native byte order
    pub fn from_f32(width: u32, height: u32, depths: &[f32]) -> Result<Self, FrameError> {
        let data = depths.iter().flat_map(|d| d.to_ne_bytes()).collect();
        Self::new(width, height, width as usize * 4, data)
    }

    /// Tightly packed float map whose depth at `(x, y)` is `depth(x, y)`
    pub fn from_fn(width: u32, height: u32, depth: impl Fn(u32, u32) -> f32) -> Self {
        let data = (0..height)
            .flat_map(|y| (0..width).map(move |x| (x, y)))
            .flat_map(|(x, y)| depth(x, y).to_ne_bytes())
            .collect();
        Self {
            width,
            height,
            bytes_per_row: width as usize * 4,
            data,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn bytes_per_row(&self) -> usize {
        self.bytes_per_row
    }

    /// The `bytes_per_row * height` bytes that make up the map
    pub fn raw_bytes(&self) -> &[u8] {
        &self.data[..self.bytes_per_row * self.height as usize]
    }
}

/// Device attitude in radians
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Attitude {
    pub roll: f64,
    pub pitch: f64,
    pub yaw: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vector3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// One device-motion sample
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InertialSample {
    pub attitude: Attitude,
    /// Rotation rate in rad/s
    pub rotation_rate: Vector3,
    /// Acceleration minus gravity, in g
    pub user_acceleration: Vector3,
    /// Absolute device timestamp in seconds
    pub timestamp: f64,
}

/// One synchronized camera image + depth map + timestamp unit
#[derive(Debug, Clone)]
pub struct FrameRecord {
    pub image: Arc<RgbaImage>,
    /// `None` when the sensor produced no depth for this frame
    pub depth: Option<DepthMap>,
    /// Absolute device timestamp in seconds
    pub timestamp: f64,
}

impl FrameRecord {
    pub fn new(image: RgbaImage, depth: Option<DepthMap>, timestamp: f64) -> Self {
        Self {
            image: Arc::new(image),
            depth,
            timestamp,
        }
    }
}

/// Pull access to the most recent inertial sample
pub trait MotionProvider: Send + Sync {
    /// Most recent sample, or `None` if no sample has arrived yet
    fn latest_sample(&self) -> Option<InertialSample>;
}

/// Receiver of frame records, invoked on the source's callback thread
pub trait FrameSink: Send + Sync {
    fn on_frame(&self, frame: FrameRecord);
}

/// Holds the latest published inertial sample
#[derive(Debug, Default)]
pub struct LatestMotion {
    latest: RwLock<Option<InertialSample>>,
}

impl LatestMotion {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the cached sample
    pub fn publish(&self, sample: InertialSample) {
        *self.latest.write() = Some(sample);
    }

    pub fn clear(&self) {
        *self.latest.write() = None;
    }
}

impl MotionProvider for LatestMotion {
    fn latest_sample(&self) -> Option<InertialSample> {
        *self.latest.read()
    }
}

/// A source of synchronized frames and motion samples
#[async_trait]
pub trait FrameSource: Send {
    /// Get the source ID
    fn id(&self) -> &str;

    /// Begin delivering frames to `sink`
    async fn start(&mut self, sink: Arc<dyn FrameSink>) -> RecordingResult<()>;

    /// Stop delivering frames. No callback runs after this returns.
    async fn stop(&mut self) -> RecordingResult<()>;

    /// Whether frames are currently being delivered
    fn is_running(&self) -> bool;

    /// Motion samples that accompany this source's frames
    fn motion(&self) -> Arc<dyn MotionProvider>;
}
