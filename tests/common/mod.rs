//! Shared fixtures for the capture pipeline tests

#![allow(dead_code)]

use parking_lot::{Condvar, Mutex};
use record_video_imu::capture::{DepthMap, FrameRecord, InertialSample, LatestMotion, RgbaImage};
use record_video_imu::encoder::{EncoderFactory, EncoderSummary, VideoEncoder};
use record_video_imu::recorder::{
    BackpressurePolicy, CaptureConfig, CaptureSessionController, MediaTime, VideoSettings,
    WriterError,
};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::sync::Arc;

pub const WIDTH: u32 = 4;
pub const HEIGHT: u32 = 2;

/// Presentation times received by every encoder a factory opened, per session
#[derive(Default)]
pub struct EncoderLog {
    sessions: Mutex<Vec<Vec<MediaTime>>>,
}

impl EncoderLog {
    pub fn sessions(&self) -> Vec<Vec<MediaTime>> {
        self.sessions.lock().clone()
    }

    pub fn last_session(&self) -> Vec<MediaTime> {
        self.sessions.lock().last().cloned().unwrap_or_default()
    }
}

/// Blocks encoder appends until opened
#[derive(Default)]
pub struct Gate {
    open: Mutex<bool>,
    cond: Condvar,
}

impl Gate {
    pub fn closed() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn open(&self) {
        *self.open.lock() = true;
        self.cond.notify_all();
    }

    fn wait(&self) {
        let mut open = self.open.lock();
        while !*open {
            self.cond.wait(&mut open);
        }
    }
}

struct LoggingEncoder {
    output: PathBuf,
    session: usize,
    log: Arc<EncoderLog>,
    gate: Option<Arc<Gate>>,
    entered: Option<mpsc::Sender<MediaTime>>,
}

impl VideoEncoder for LoggingEncoder {
    fn append(&mut self, _image: &RgbaImage, presentation_time: MediaTime) -> Result<(), WriterError> {
        if let Some(entered) = &self.entered {
            let _ = entered.send(presentation_time);
        }
        if let Some(gate) = &self.gate {
            gate.wait();
        }
        self.log.sessions.lock()[self.session].push(presentation_time);
        Ok(())
    }

    fn finish(self: Box<Self>) -> Result<EncoderSummary, WriterError> {
        let times = self.log.sessions.lock()[self.session].clone();
        let body: Vec<String> = times.iter().map(|t| t.to_string()).collect();
        std::fs::write(&self.output, body.join("\n"))?;
        Ok(EncoderSummary {
            output: self.output.clone(),
            frames_written: times.len() as u64,
            last_presentation_time: times.last().copied(),
        })
    }
}

/// Encoder factory that records presentation times instead of encoding
#[derive(Default)]
pub struct LoggingEncoderFactory {
    pub log: Arc<EncoderLog>,
    gate: Option<Arc<Gate>>,
    entered: Mutex<Option<mpsc::Sender<MediaTime>>>,
}

impl LoggingEncoderFactory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Encoders that report each append on the returned channel, then block on `gate`
    pub fn gated(gate: Arc<Gate>) -> (Arc<Self>, mpsc::Receiver<MediaTime>) {
        let (tx, rx) = mpsc::channel();
        let factory = Self {
            log: Arc::new(EncoderLog::default()),
            gate: Some(gate),
            entered: Mutex::new(Some(tx)),
        };
        (Arc::new(factory), rx)
    }
}

impl EncoderFactory for LoggingEncoderFactory {
    fn create(&self, output: &Path, _settings: &VideoSettings) -> Result<Box<dyn VideoEncoder>, WriterError> {
        std::fs::write(output, b"")?;
        let session = {
            let mut sessions = self.log.sessions.lock();
            sessions.push(Vec::new());
            sessions.len() - 1
        };
        Ok(Box::new(LoggingEncoder {
            output: output.to_path_buf(),
            session,
            log: self.log.clone(),
            gate: self.gate.clone(),
            entered: self.entered.lock().clone(),
        }))
    }
}

/// Encoder factory whose sessions never open
pub struct FailingEncoderFactory;

impl EncoderFactory for FailingEncoderFactory {
    fn create(&self, _output: &Path, _settings: &VideoSettings) -> Result<Box<dyn VideoEncoder>, WriterError> {
        Err(WriterError::Encoder("encoder unavailable".to_string()))
    }
}

pub fn config(root: &Path) -> CaptureConfig {
    let mut config = CaptureConfig::with_data_root(root);
    config.video.width = WIDTH;
    config.video.height = HEIGHT;
    config
}

pub fn controller(
    config: CaptureConfig,
    factory: Arc<dyn EncoderFactory>,
) -> (Arc<CaptureSessionController>, Arc<LatestMotion>) {
    let motion = Arc::new(LatestMotion::new());
    let controller = Arc::new(CaptureSessionController::new(config, factory, motion.clone()));
    (controller, motion)
}

pub fn drop_policy(mut config: CaptureConfig, capacity: usize) -> CaptureConfig {
    config.backpressure = BackpressurePolicy::Drop;
    config.queue_capacity = capacity;
    config
}

pub fn sample(timestamp: f64) -> InertialSample {
    let mut sample = InertialSample::default();
    sample.attitude.yaw = 0.5;
    sample.user_acceleration.z = -1.0;
    sample.timestamp = timestamp;
    sample
}

pub fn frame(timestamp: f64) -> FrameRecord {
    let depth = DepthMap::from_f32(2, 2, &[1.0, 1.25, 1.5, 1.75]).ok();
    FrameRecord::new(RgbaImage::filled(WIDTH, HEIGHT, [200, 100, 50, 255]), depth, timestamp)
}

pub fn frame_without_depth(timestamp: f64) -> FrameRecord {
    FrameRecord::new(RgbaImage::filled(WIDTH, HEIGHT, [200, 100, 50, 255]), None, timestamp)
}

/// Sorted file names in `dir` (empty when it does not exist)
pub fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|entry| entry.ok())
                .map(|entry| entry.file_name().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}

pub fn imu_lines(path: &Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .map(|content| content.lines().map(str::to_string).collect())
        .unwrap_or_default()
}
