//! Recorded session reader
//!
//! Reads the artifacts of a data root back: the IMU CSV, the per-frame depth
//! buffers ordered by their session-relative time and the calibration stills.

use super::layout::{DataLayout, CALIBRATION_FILE_SUFFIX, DEPTH_FILE_SUFFIX};
use crate::capture::traits::{Attitude, Vector3};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Bundle-related errors
#[derive(Error, Debug)]
pub enum BundleError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid data root: {0}")]
    InvalidRoot(String),

    #[error("Malformed IMU line {line}: {reason}")]
    MalformedImuLine { line: usize, reason: String },

    #[error("Unrecognized file name: {0}")]
    UnrecognizedFileName(String),
}

/// One parsed line of `imuData.csv`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImuRow {
    /// Session-relative time of the frame, in seconds
    pub relative_seconds: f64,
    pub attitude: Attitude,
    pub rotation_rate: Vector3,
    pub user_acceleration: Vector3,
}

impl ImuRow {
    /// Parse one CSV line (`line_number` is only used in errors)
    pub fn parse(line: &str, line_number: usize) -> Result<Self, BundleError> {
        let fields = line
            .trim_end()
            .split(',')
            .map(|field| field.trim().parse::<f64>())
            .collect::<Result<Vec<f64>, _>>()
            .map_err(|e| BundleError::MalformedImuLine {
                line: line_number,
                reason: e.to_string(),
            })?;

        let &[t, roll, pitch, yaw, rx, ry, rz, ax, ay, az] = fields.as_slice() else {
            return Err(BundleError::MalformedImuLine {
                line: line_number,
                reason: format!("expected 10 fields, found {}", fields.len()),
            });
        };

        Ok(Self {
            relative_seconds: t,
            attitude: Attitude { roll, pitch, yaw },
            rotation_rate: Vector3 { x: rx, y: ry, z: rz },
            user_acceleration: Vector3 { x: ax, y: ay, z: az },
        })
    }
}

/// One depth buffer file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepthFrameFile {
    pub relative_seconds: f64,
    pub path: PathBuf,
    pub byte_len: u64,
}

/// One calibration still
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalibrationStill {
    /// Absolute device time of the captured frame, in seconds
    pub timestamp_seconds: f64,
    pub path: PathBuf,
}

/// Everything one data root holds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordedSession {
    pub root: PathBuf,
    pub video_path: Option<PathBuf>,
    pub imu_rows: Vec<ImuRow>,
    pub depth_frames: Vec<DepthFrameFile>,
    pub calibration_stills: Vec<CalibrationStill>,
}

impl RecordedSession {
    /// Read the artifacts under `layout`'s root. Missing artifacts read as empty.
    pub fn load(layout: &DataLayout) -> Result<Self, BundleError> {
        let root = layout.root();
        if !root.is_dir() {
            return Err(BundleError::InvalidRoot(format!(
                "{:?} is not a directory",
                root
            )));
        }

        let video_path = Some(layout.video_path()).filter(|path| path.is_file());
        let imu_rows = read_imu_rows(&layout.imu_path())?;

        let mut depth_frames = list_named(&layout.depth_dir(), DEPTH_FILE_SUFFIX)?
            .into_iter()
            .map(|(relative_seconds, path)| -> Result<DepthFrameFile, BundleError> {
                let byte_len = fs::metadata(&path)?.len();
                Ok(DepthFrameFile {
                    relative_seconds,
                    path,
                    byte_len,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        depth_frames.sort_by(|a, b| a.relative_seconds.total_cmp(&b.relative_seconds));

        let mut calibration_stills = list_named(&layout.calibration_dir(), CALIBRATION_FILE_SUFFIX)?
            .into_iter()
            .map(|(timestamp_seconds, path)| CalibrationStill {
                timestamp_seconds,
                path,
            })
            .collect::<Vec<_>>();
        calibration_stills.sort_by(|a, b| a.timestamp_seconds.total_cmp(&b.timestamp_seconds));

        tracing::debug!(
            "Loaded recorded session from {:?}: {} IMU rows, {} depth frames, {} calibration stills",
            root,
            imu_rows.len(),
            depth_frames.len(),
            calibration_stills.len()
        );

        Ok(Self {
            root: root.to_path_buf(),
            video_path,
            imu_rows,
            depth_frames,
            calibration_stills,
        })
    }

    /// Raw bytes of the `index`-th depth frame
    pub fn read_depth(&self, index: usize) -> Result<Vec<u8>, BundleError> {
        let frame = self.depth_frames.get(index).ok_or_else(|| {
            BundleError::InvalidRoot(format!("No depth frame at index {}", index))
        })?;
        Ok(fs::read(&frame.path)?)
    }
}

/// Check if a path holds at least one recorded artifact
pub fn is_valid_data_root(layout: &DataLayout) -> bool {
    layout.root().is_dir()
        && (layout.video_path().exists() || layout.imu_path().exists() || layout.depth_dir().is_dir())
}

fn read_imu_rows(path: &Path) -> Result<Vec<ImuRow>, BundleError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| ImuRow::parse(line, i + 1))
        .collect()
}

/// List `<seconds><suffix>` files in `dir`, skipping hidden files
fn list_named(dir: &Path, suffix: &str) -> Result<Vec<(f64, PathBuf)>, BundleError> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') {
            continue;
        }
        let Some(stem) = name.strip_suffix(suffix) else {
            tracing::debug!("Ignoring unexpected file {:?} in {:?}", name, dir);
            continue;
        };
        let seconds = stem
            .parse::<f64>()
            .map_err(|_| BundleError::UnrecognizedFileName(name.clone()))?;
        files.push((seconds, entry.path()));
    }
    Ok(files)
}
