//! Frame capture
//!
//! Camera, depth and motion hardware live behind the [`FrameSource`] trait.
//! This module provides the frame payload types and a synthetic source.

pub mod image;
pub mod synthetic;
pub mod traits;

pub use image::{ImageError, RgbaImage};
pub use synthetic::{SyntheticConfig, SyntheticFrameSource};
pub use traits::{
    Attitude, DepthMap, FrameError, FrameRecord, FrameSink, FrameSource, InertialSample,
    LatestMotion, MotionProvider, Vector3,
};
