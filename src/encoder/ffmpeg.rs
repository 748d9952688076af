//! FFmpeg encoder for captured video
//!
//! Raw RGBA frames are written to FFmpeg's stdin and encoded to H.264.
//! The rawvideo pipe has no per-frame timestamps: FFmpeg reads frame k at
//! k / fps. Each frame is therefore written at slot `round(t * fps)` of its
//! presentation time t, and the previous image is repeated across skipped
//! slots so the container timeline follows the session clock.

use super::{EncoderFactory, EncoderSummary, VideoEncoder};
use crate::capture::image::RgbaImage;
use crate::recorder::channel::WriterError;
use crate::recorder::config::{VideoContainer, VideoSettings};
use crate::recorder::sync::MediaTime;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};

/// Build the FFmpeg argument list for a capture session
pub fn build_encoder_args(settings: &VideoSettings, output: &Path) -> Vec<String> {
    // stderr is only read after exit, so keep it quiet enough not to fill the pipe
    let mut args = vec![
        "-hide_banner".to_string(),
        "-loglevel".to_string(),
        "error".to_string(),
        "-nostats".to_string(),
        "-y".to_string(),
        "-f".to_string(),
        "rawvideo".to_string(),
        "-pix_fmt".to_string(),
        "rgba".to_string(),
        "-s".to_string(),
        format!("{}x{}", settings.width, settings.height),
        "-r".to_string(),
        settings.fps.to_string(),
        "-i".to_string(),
        "-".to_string(), // stdin for video frames
        "-c:v".to_string(),
        "libx264".to_string(),
        "-preset".to_string(),
        settings.quality.h264_preset().to_string(),
        "-crf".to_string(),
        settings.quality.crf().to_string(),
        "-pix_fmt".to_string(),
        "yuv420p".to_string(),
    ];

    // Both containers are ISO-BMFF; keep the index up front for random access
    match settings.container {
        VideoContainer::Mov | VideoContainer::Mp4 => {
            args.extend(["-movflags".to_string(), "+faststart".to_string()]);
        }
    }

    args.push(output.to_string_lossy().to_string());
    args
}

/// Lays timed frames onto the constant-rate grid FFmpeg reads from the pipe
///
/// A frame occupies the slot nearest its presentation time and is held until
/// the next frame's slot. When two frames land on the same slot the later
/// image wins.
struct FramePacer {
    fps: u32,
    slots_written: u64,
    pending: Option<(u64, RgbaImage)>,
}

impl FramePacer {
    fn new(fps: u32) -> Self {
        Self {
            fps: fps.max(1),
            slots_written: 0,
            pending: None,
        }
    }

    fn push<W: Write>(&mut self, out: &mut W, image: &RgbaImage, presentation_time: MediaTime) -> io::Result<()> {
        let slot = presentation_time.frame_index(self.fps).max(0) as u64;
        if let Some((pending_slot, pending)) = self.pending.take() {
            if slot > pending_slot {
                self.fill(out, &pending, slot)?;
            }
        }
        self.pending = Some((slot, image.clone()));
        Ok(())
    }

    /// Write the held frame into its slot
    fn finish<W: Write>(&mut self, out: &mut W) -> io::Result<()> {
        if let Some((slot, image)) = self.pending.take() {
            self.fill(out, &image, slot + 1)?;
        }
        out.flush()
    }

    /// Repeat `image` up to (not including) slot `until`
    fn fill<W: Write>(&mut self, out: &mut W, image: &RgbaImage, until: u64) -> io::Result<()> {
        while self.slots_written < until {
            out.write_all(image.as_bytes())?;
            self.slots_written += 1;
        }
        Ok(())
    }
}

/// Encoder session backed by an FFmpeg child process
pub struct FfmpegEncoder {
    process: Child,
    stdin: ChildStdin,
    output: PathBuf,
    width: u32,
    height: u32,
    pacer: FramePacer,
    frame_count: u64,
    last_presentation_time: Option<MediaTime>,
}

impl FfmpegEncoder {
    /// Spawn FFmpeg writing to `output`
    pub fn spawn(ffmpeg: &str, output: &Path, settings: &VideoSettings) -> Result<Self, WriterError> {
        let args = build_encoder_args(settings, output);
        tracing::info!("Starting FFmpeg encoder: {:?}", args);

        let mut process = Command::new(ffmpeg)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| WriterError::Encoder(format!("Failed to start FFmpeg encoder: {}", e)))?;

        let stdin = process
            .stdin
            .take()
            .ok_or_else(|| WriterError::Encoder("Failed to capture FFmpeg stdin".to_string()))?;

        Ok(Self {
            process,
            stdin,
            output: output.to_path_buf(),
            width: settings.width,
            height: settings.height,
            pacer: FramePacer::new(settings.fps),
            frame_count: 0,
            last_presentation_time: None,
        })
    }
}

impl VideoEncoder for FfmpegEncoder {
    fn append(&mut self, image: &RgbaImage, presentation_time: MediaTime) -> Result<(), WriterError> {
        if image.dimensions() != (self.width, self.height) {
            return Err(WriterError::FrameSize {
                got_width: image.width(),
                got_height: image.height(),
                width: self.width,
                height: self.height,
            });
        }
        if let Some(previous) = self.last_presentation_time {
            if presentation_time <= previous {
                return Err(WriterError::NonMonotonic {
                    previous,
                    current: presentation_time,
                });
            }
        }

        self.pacer
            .push(&mut self.stdin, image, presentation_time)
            .map_err(|e| WriterError::Encoder(format!("Failed to write frame: {}", e)))?;
        self.frame_count += 1;
        self.last_presentation_time = Some(presentation_time);
        Ok(())
    }

    fn finish(self: Box<Self>) -> Result<EncoderSummary, WriterError> {
        let FfmpegEncoder {
            process,
            mut stdin,
            output,
            mut pacer,
            frame_count,
            last_presentation_time,
            ..
        } = *self;

        let flushed = pacer.finish(&mut stdin);
        // Close stdin to signal EOF to FFmpeg
        drop(stdin);

        let result = process
            .wait_with_output()
            .map_err(|e| WriterError::Encoder(format!("Failed to wait for FFmpeg: {}", e)))?;
        flushed.map_err(|e| WriterError::Encoder(format!("Failed to write final frame: {}", e)))?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(WriterError::Encoder(format!(
                "FFmpeg exited with {}: {}",
                result.status, stderr
            )));
        }

        tracing::info!(
            "FFmpeg encoder finished: {} frames over {} slots written to {:?}",
            frame_count,
            pacer.slots_written,
            output
        );

        Ok(EncoderSummary {
            output,
            frames_written: frame_count,
            last_presentation_time,
        })
    }
}

/// Opens FFmpeg encoder sessions
#[derive(Debug, Clone)]
pub struct FfmpegEncoderFactory {
    ffmpeg: String,
}

impl FfmpegEncoderFactory {
    /// Use the `ffmpeg` binary found on `PATH`
    pub fn new() -> Self {
        Self::with_binary("ffmpeg")
    }

    /// Use a specific FFmpeg binary
    pub fn with_binary(ffmpeg: impl Into<String>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
        }
    }

    /// Check that the FFmpeg binary can be run
    pub fn is_available(&self) -> bool {
        Command::new(&self.ffmpeg)
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|status| status.success())
            .unwrap_or(false)
    }
}

impl Default for FfmpegEncoderFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl EncoderFactory for FfmpegEncoderFactory {
    fn create(&self, output: &Path, settings: &VideoSettings) -> Result<Box<dyn VideoEncoder>, WriterError> {
        if !self.is_available() {
            return Err(WriterError::Encoder(format!(
                "FFmpeg not found ({}). Please install FFmpeg.",
                self.ffmpeg
            )));
        }
        let encoder = FfmpegEncoder::spawn(&self.ffmpeg, output, settings)?;
        Ok(Box::new(encoder))
    }
}
