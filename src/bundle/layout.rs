//! On-disk layout of a capture data root
//!
//! ```text
//! <root>/
//!   videoData.<ext>                       one video per session
//!   imuData.csv                           one line per recorded frame
//!   depthBuffer/<Δ>_depthBuffer.bin       raw depth map per recorded frame
//!   calibration/<T>_calibration.png       one still per capture request
//! ```

use crate::recorder::config::VideoContainer;
use crate::recorder::sync::MediaTime;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub const VIDEO_FILE_STEM: &str = "videoData";
pub const IMU_FILE_NAME: &str = "imuData.csv";
pub const DEPTH_DIR_NAME: &str = "depthBuffer";
pub const CALIBRATION_DIR_NAME: &str = "calibration";

pub const DEPTH_FILE_SUFFIX: &str = "_depthBuffer.bin";
pub const CALIBRATION_FILE_SUFFIX: &str = "_calibration.png";

/// Header line of the IMU CSV (the file itself carries no header)
pub const IMU_COLUMNS: &str = "relTimestamp,roll,pitch,yaw,rateX,rateY,rateZ,accelX,accelY,accelZ";

/// Paths of every artifact under one data root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataLayout {
    root: PathBuf,
    container: VideoContainer,
}

impl DataLayout {
    pub fn new(root: impl Into<PathBuf>, container: VideoContainer) -> Self {
        Self {
            root: root.into(),
            container,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn video_path(&self) -> PathBuf {
        self.root
            .join(format!("{}.{}", VIDEO_FILE_STEM, self.container.extension()))
    }

    pub fn imu_path(&self) -> PathBuf {
        self.root.join(IMU_FILE_NAME)
    }

    pub fn depth_dir(&self) -> PathBuf {
        self.root.join(DEPTH_DIR_NAME)
    }

    pub fn calibration_dir(&self) -> PathBuf {
        self.root.join(CALIBRATION_DIR_NAME)
    }

    /// Create the data root if needed
    pub fn ensure_root(&self) -> io::Result<()> {
        fs::create_dir_all(&self.root)
    }

    /// Delete the video, IMU and depth artifacts of a previous session
    pub fn reset_session_artifacts(&self) -> io::Result<()> {
        remove_if_exists(&self.video_path(), "video file")?;
        remove_if_exists(&self.imu_path(), "IMU file")?;
        remove_if_exists(&self.depth_dir(), "depth buffer directory")?;
        Ok(())
    }

    /// Replace the calibration directory with an empty one
    pub fn reset_calibration(&self) -> io::Result<()> {
        let dir = self.calibration_dir();
        remove_if_exists(&dir, "calibration directory")?;
        fs::create_dir_all(&dir)
    }
}

/// File name of the depth buffer recorded at session-relative time `relative`
pub fn depth_file_name(relative: MediaTime) -> String {
    format!("{}{}", relative, DEPTH_FILE_SUFFIX)
}

/// File name of the calibration still captured at absolute time `timestamp`
pub fn calibration_file_name(timestamp: MediaTime) -> String {
    format!("{}{}", timestamp, CALIBRATION_FILE_SUFFIX)
}

fn remove_if_exists(path: &Path, what: &str) -> io::Result<()> {
    let result = if path.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };

    match result {
        Ok(()) => {
            tracing::info!("Deleted {} {:?}", what, path);
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => {
            tracing::error!("Failed to delete {} {:?}: {}", what, path, e);
            Err(e)
        }
    }
}
