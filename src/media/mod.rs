// Media processing seam
//
// Everything that touches ffmpeg/ffprobe sits behind `MediaToolkit`, so the
// compile orchestrator and tempo reconciler can run against fakes in tests:
// - Commands: command builders and process execution
// - Probe: ffprobe JSON interpretation
// - Decode: narration buffers and the streaming frame decoder
// - Sink: the encoder capture sink
// - Processor: the ffmpeg-backed toolkit

pub mod commands;
pub mod decode;
pub mod probe;
pub mod processor;
pub mod sink;

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub use commands::*;
pub use decode::{AudioBuffer, FfmpegFrameSource};
pub use probe::VideoInfo;
pub use processor::*;
pub use sink::FfmpegCaptureSink;

use crate::config::MediaConfig;
use crate::error::Result;
use crate::render::Frame;

/// Source video frames addressed by presentation time.
#[async_trait]
pub trait FrameSource: Send {
    /// The newest frame at or before `time_ms`, or `None` when no new frame
    /// is ready and the previous one should be shown again.
    async fn frame_at(&mut self, time_ms: f64) -> Result<Option<Frame>>;

    async fn close(&mut self);
}

/// Destination for rendered frames; muxes them with the narration track.
#[async_trait]
pub trait CaptureSink: Send {
    async fn write_frame(&mut self, frame: &Frame) -> Result<()>;

    /// Flush and finalize the output file.
    async fn finish(&mut self) -> Result<()>;

    /// Stop without producing output.
    async fn abort(&mut self);
}

/// Where and how a capture run writes its output.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureRequest {
    pub encode: EncodeSettings,
    pub output: PathBuf,
    pub work_dir: PathBuf,
}

/// Main trait for media processing operations
#[async_trait]
pub trait MediaToolkit: Send + Sync {
    /// Check if the media tools are installed
    fn check_availability(&self) -> Result<()>;

    async fn get_version_info(&self) -> Result<String>;

    async fn probe_video(&self, path: &Path) -> Result<VideoInfo>;

    /// Audio duration in seconds
    async fn probe_audio_duration(&self, path: &Path) -> Result<f64>;

    /// Decode narration into a PCM buffer, using `work_dir` for scratch files
    async fn decode_narration(&self, path: &Path, work_dir: &Path) -> Result<AudioBuffer>;

    async fn open_frame_source(
        &self,
        path: &Path,
        width: u32,
        height: u32,
        fps: u32,
    ) -> Result<Box<dyn FrameSource>>;

    /// Fails with a capture error when the requested codecs are unavailable
    async fn open_capture_sink(
        &self,
        request: &CaptureRequest,
        audio: &AudioBuffer,
    ) -> Result<Box<dyn CaptureSink>>;

    /// Apply an audio filter graph, writing a file in the output's container
    async fn filter_audio(&self, input: &Path, output: &Path, filter: &str) -> Result<()>;
}

/// Factory for creating media toolkit instances
pub struct MediaToolkitFactory;

impl MediaToolkitFactory {
    /// Create the default toolkit (FFmpeg-based)
    pub fn create_toolkit(config: MediaConfig) -> Arc<dyn MediaToolkit> {
        Arc::new(processor::FfmpegToolkit::new(config))
    }
}
