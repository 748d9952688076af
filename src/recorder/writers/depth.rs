//! Depth writer
//!
//! Each recorded frame's depth map goes to its own headerless binary file so
//! offline tools can open any frame directly. Files are written under a
//! temporary name and renamed into place, so a crash never leaves a
//! half-written `_depthBuffer.bin`.

use crate::bundle::layout::depth_file_name;
use crate::capture::traits::DepthMap;
use crate::recorder::channel::{StreamWriter, WriterError};
use crate::recorder::sync::MediaTime;
use std::fs;
use std::path::{Path, PathBuf};

/// A depth buffer written under its temporary name, not yet visible
///
/// Dropping it without [`DepthWriter::commit`] removes the temporary file.
pub struct StagedDepth {
    partial: PathBuf,
    path: PathBuf,
    committed: bool,
}

impl Drop for StagedDepth {
    fn drop(&mut self) {
        if !self.committed {
            let _ = fs::remove_file(&self.partial);
        }
    }
}

pub struct DepthWriter {
    dir: PathBuf,
    buffers_written: u64,
    dir_created: bool,
    closed: bool,
}

impl DepthWriter {
    pub fn open(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
            buffers_written: 0,
            dir_created: false,
            closed: false,
        }
    }

    /// Write the buffer's bytes under a hidden temporary name
    pub fn stage(&mut self, depth: &DepthMap, relative: MediaTime) -> Result<StagedDepth, WriterError> {
        if self.closed {
            return Err(WriterError::Closed);
        }
        if !self.dir_created {
            fs::create_dir_all(&self.dir)?;
            self.dir_created = true;
        }

        let name = depth_file_name(relative);
        let staged = StagedDepth {
            partial: self.dir.join(format!(".{}.partial", name)),
            path: self.dir.join(name),
            committed: false,
        };
        fs::write(&staged.partial, depth.raw_bytes())?;
        Ok(staged)
    }

    /// Rename a staged buffer into place
    pub fn commit(&mut self, mut staged: StagedDepth) -> Result<PathBuf, WriterError> {
        if self.closed {
            return Err(WriterError::Closed);
        }
        fs::rename(&staged.partial, &staged.path)?;
        staged.committed = true;
        self.buffers_written += 1;
        Ok(staged.path.clone())
    }
}

impl StreamWriter for DepthWriter {
    type Payload = DepthMap;

    fn write(&mut self, depth: &DepthMap, relative: MediaTime) -> Result<(), WriterError> {
        let staged = self.stage(depth, relative)?;
        self.commit(staged)?;
        Ok(())
    }

    fn close(&mut self) -> Result<(), WriterError> {
        if self.closed {
            return Err(WriterError::Closed);
        }
        self.closed = true;
        tracing::info!("Depth writer closed: {} buffers", self.buffers_written);
        Ok(())
    }

    fn is_open(&self) -> bool {
        !self.closed
    }

    fn records_written(&self) -> u64 {
        self.buffers_written
    }
}
