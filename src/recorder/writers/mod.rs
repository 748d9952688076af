//! Stream writers for one recording session

pub mod depth;
pub mod imu;
pub mod video;

pub use depth::{DepthWriter, StagedDepth};
pub use imu::{ImuWriter, StagedLine};
pub use video::{EncoderStats, PendingFinalization, VideoWriter, WriteInterrupt};
