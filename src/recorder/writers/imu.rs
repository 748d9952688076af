//! IMU writer
//!
//! Appends one comma-separated line per recorded frame to a single CSV file.
//! Each line goes out in one `write` call on an append-mode handle, so a crash
//! leaves at most a truncated final line.

use crate::capture::traits::InertialSample;
use crate::recorder::channel::{StreamWriter, WriterError};
use crate::recorder::sync::MediaTime;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// A formatted line whose file is already open for appending
pub struct StagedLine(String);

/// Format one IMU line: `relTimestamp,roll,pitch,yaw,rateX,rateY,rateZ,accelX,accelY,accelZ`
pub fn format_imu_line(relative: MediaTime, sample: &InertialSample) -> String {
    format!(
        "{},{},{},{},{},{},{},{},{},{}\n",
        relative,
        sample.attitude.roll,
        sample.attitude.pitch,
        sample.attitude.yaw,
        sample.rotation_rate.x,
        sample.rotation_rate.y,
        sample.rotation_rate.z,
        sample.user_acceleration.x,
        sample.user_acceleration.y,
        sample.user_acceleration.z,
    )
}

pub struct ImuWriter {
    path: PathBuf,
    /// Opened lazily on the first write
    file: Option<File>,
    lines_written: u64,
    closed: bool,
}

impl ImuWriter {
    pub fn open(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            file: None,
            lines_written: 0,
            closed: false,
        }
    }

    fn file(&mut self) -> Result<&mut File, WriterError> {
        let file = match self.file.take() {
            Some(file) => file,
            None => {
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&self.path)?;
                tracing::debug!("Created IMU file {:?}", self.path);
                file
            }
        };
        Ok(self.file.insert(file))
    }

    /// Open the file if needed and format the line, without writing it
    pub fn stage(&mut self, sample: &InertialSample, relative: MediaTime) -> Result<StagedLine, WriterError> {
        if self.closed {
            return Err(WriterError::Closed);
        }
        self.file()?;
        Ok(StagedLine(format_imu_line(relative, sample)))
    }

    /// Append a staged line
    pub fn commit(&mut self, line: StagedLine) -> Result<(), WriterError> {
        if self.closed {
            return Err(WriterError::Closed);
        }
        self.file()?.write_all(line.0.as_bytes())?;
        self.lines_written += 1;
        Ok(())
    }
}

impl StreamWriter for ImuWriter {
    type Payload = InertialSample;

    fn write(&mut self, sample: &InertialSample, relative: MediaTime) -> Result<(), WriterError> {
        let line = self.stage(sample, relative)?;
        self.commit(line)
    }

    fn close(&mut self) -> Result<(), WriterError> {
        if self.closed {
            return Err(WriterError::Closed);
        }
        self.closed = true;
        if let Some(file) = self.file.take() {
            file.sync_all()?;
        }
        tracing::info!("IMU writer closed: {} lines", self.lines_written);
        Ok(())
    }

    fn is_open(&self) -> bool {
        !self.closed
    }

    fn records_written(&self) -> u64 {
        self.lines_written
    }
}
