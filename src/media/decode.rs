//! Narration audio buffers and the streaming video frame decoder.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::io::AsyncReadExt;
use tokio::process::{Child, ChildStdout};
use tracing::{debug, warn};

use super::commands::MediaCommand;
use super::FrameSource;
use crate::error::{JimakuError, Result};
use crate::render::Frame;

/// Sample rate narration is decoded to before muxing.
pub const NARRATION_SAMPLE_RATE: u32 = 48_000;
pub const NARRATION_CHANNELS: u16 = 2;

/// Decoded PCM audio, interleaved.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
    /// WAV file the samples were read from, reusable for muxing.
    pub source: Option<PathBuf>,
}

impl AudioBuffer {
    pub fn new(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Self {
        Self {
            samples,
            sample_rate,
            channels,
            source: None,
        }
    }

    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels.max(1) as usize
    }

    pub fn duration_ms(&self) -> u64 {
        if self.sample_rate == 0 {
            return 0;
        }
        (self.frames() as f64 * 1000.0 / self.sample_rate as f64).round() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Load a 16- or 32-bit integer or 32-bit float WAV file.
    pub fn from_wav(path: &Path) -> Result<Self> {
        let reader = hound::WavReader::open(path)
            .map_err(|e| JimakuError::Decode(format!("Failed to open WAV file: {}", e)))?;
        let spec = reader.spec();

        let samples: Vec<f32> = match (spec.sample_format, spec.bits_per_sample) {
            (hound::SampleFormat::Int, 16) => reader
                .into_samples::<i16>()
                .map(|s| s.map(|v| v as f32 / 32768.0))
                .collect::<std::result::Result<Vec<f32>, _>>(),
            (hound::SampleFormat::Int, 32) => reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / 2147483648.0))
                .collect::<std::result::Result<Vec<f32>, _>>(),
            (hound::SampleFormat::Float, 32) => reader
                .into_samples::<f32>()
                .collect::<std::result::Result<Vec<f32>, _>>(),
            (format, bits) => {
                return Err(JimakuError::Decode(format!(
                    "Unsupported WAV layout: {:?} {}-bit",
                    format, bits
                )));
            }
        }
        .map_err(|e| JimakuError::Decode(format!("Corrupt WAV data: {}", e)))?;

        Ok(Self {
            samples,
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            source: Some(path.to_path_buf()),
        })
    }

    /// Write as 16-bit PCM WAV.
    pub fn write_wav(&self, path: &Path) -> Result<()> {
        let spec = hound::WavSpec {
            channels: self.channels.max(1),
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let to_io = |e: hound::Error| JimakuError::Decode(format!("Failed to write WAV: {}", e));
        let mut writer = hound::WavWriter::create(path, spec).map_err(to_io)?;
        for sample in &self.samples {
            let value = (sample.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16;
            writer.write_sample(value).map_err(to_io)?;
        }
        writer.finalize().map_err(to_io)
    }

    /// The WAV path to hand to an encoder, writing one into `work_dir` if needed.
    pub fn wav_path(&self, work_dir: &Path) -> Result<PathBuf> {
        match &self.source {
            Some(path) if path.exists() => Ok(path.clone()),
            _ => {
                let path = work_dir.join("narration.wav");
                self.write_wav(&path)?;
                Ok(path)
            }
        }
    }
}

/// Streams RGBA frames from an ffmpeg decoder at a fixed rate.
pub struct FfmpegFrameSource {
    child: Child,
    stdout: ChildStdout,
    width: u32,
    height: u32,
    fps: u32,
    next_index: u64,
    frames_read: u64,
    eof: bool,
    /// Last complete frame.
    buffer: Vec<u8>,
    scratch: Vec<u8>,
}

impl FfmpegFrameSource {
    pub fn spawn(command: &MediaCommand, width: u32, height: u32, fps: u32) -> Result<Self> {
        let mut child = command
            .spawn(false, true)
            .map_err(|e| JimakuError::Decode(e.to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| JimakuError::Decode("Frame decoder has no stdout".to_string()))?;

        Ok(Self {
            child,
            stdout,
            width,
            height,
            fps: fps.max(1),
            next_index: 0,
            frames_read: 0,
            eof: false,
            buffer: vec![0; Frame::byte_len(width, height)],
            scratch: vec![0; Frame::byte_len(width, height)],
        })
    }

    async fn read_next(&mut self) -> Result<bool> {
        match self.stdout.read_exact(&mut self.scratch).await {
            Ok(_) => {
                std::mem::swap(&mut self.buffer, &mut self.scratch);
                self.next_index += 1;
                self.frames_read += 1;
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                self.eof = true;
                let status = self.child.wait().await?;
                if !status.success() && self.frames_read == 0 {
                    let mut stderr = String::new();
                    if let Some(mut pipe) = self.child.stderr.take() {
                        let _ = pipe.read_to_string(&mut stderr).await;
                    }
                    return Err(JimakuError::Decode(format!(
                        "Video decoder failed: {}",
                        stderr.trim()
                    )));
                }
                debug!("Frame decoder reached end after {} frames", self.frames_read);
                Ok(false)
            }
            Err(e) => Err(JimakuError::Decode(format!("Frame read failed: {}", e))),
        }
    }
}

#[async_trait]
impl FrameSource for FfmpegFrameSource {
    async fn frame_at(&mut self, time_ms: f64) -> Result<Option<Frame>> {
        let target = (time_ms.max(0.0) * self.fps as f64 / 1000.0 + 1e-6).floor() as u64;
        let mut advanced = false;
        while !self.eof && self.next_index <= target {
            if !self.read_next().await? {
                break;
            }
            advanced = true;
        }
        if advanced {
            Frame::from_rgba(self.width, self.height, self.buffer.clone()).map(Some)
        } else {
            Ok(None)
        }
    }

    async fn close(&mut self) {
        if self.eof {
            return;
        }
        if let Err(e) = self.child.start_kill() {
            warn!("Failed to stop frame decoder: {}", e);
        }
        let _ = self.child.wait().await;
    }
}
