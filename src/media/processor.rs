use async_trait::async_trait;
use std::path::Path;
use std::process::Command;
use tracing::{debug, info};

use super::decode::{AudioBuffer, FfmpegFrameSource, NARRATION_CHANNELS, NARRATION_SAMPLE_RATE};
use super::probe::{parse_audio_duration, parse_video_info, VideoInfo};
use super::sink::{parse_encoder_list, FfmpegCaptureSink};
use super::{CaptureRequest, CaptureSink, FrameSource, MediaCommandBuilder, MediaToolkit};
use crate::config::MediaConfig;
use crate::error::{JimakuError, Result};

/// Concrete media toolkit backed by the ffmpeg and ffprobe binaries
pub struct FfmpegToolkit {
    config: MediaConfig,
    command_builder: MediaCommandBuilder,
}

impl FfmpegToolkit {
    pub fn new(config: MediaConfig) -> Self {
        let command_builder = MediaCommandBuilder::new(&config.ffmpeg_path, &config.ffprobe_path);

        Self {
            config,
            command_builder,
        }
    }

    fn require_file(path: &Path) -> Result<()> {
        if path.is_file() {
            Ok(())
        } else {
            Err(JimakuError::FileNotFound(path.display().to_string()))
        }
    }

    async fn ensure_encoders(&self, codecs: &[&str]) -> Result<()> {
        let stdout = self
            .command_builder
            .list_encoders()
            .execute_capture()
            .await
            .map_err(|e| JimakuError::Capture(e.to_string()))?;
        let available = parse_encoder_list(&String::from_utf8_lossy(&stdout));

        for codec in codecs {
            if *codec != "copy" && !available.contains(*codec) {
                return Err(JimakuError::Capture(format!(
                    "Encoder '{}' is not available in {}",
                    codec, self.config.ffmpeg_path
                )));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl MediaToolkit for FfmpegToolkit {
    fn check_availability(&self) -> Result<()> {
        for binary in [&self.config.ffmpeg_path, &self.config.ffprobe_path] {
            let output = Command::new(binary)
                .arg("-version")
                .output()
                .map_err(|e| JimakuError::Media(format!("{} not found: {}", binary, e)))?;

            if !output.status.success() {
                return Err(JimakuError::Media(format!("{} version check failed", binary)));
            }
        }
        info!("Media tools are available");
        Ok(())
    }

    async fn get_version_info(&self) -> Result<String> {
        debug!("Getting media processor version information");

        let stdout = self.command_builder.version_check().execute_capture().await?;
        let version_info = String::from_utf8_lossy(&stdout);
        // First line carries the version
        Ok(version_info
            .lines()
            .next()
            .unwrap_or("Unknown version")
            .to_string())
    }

    async fn probe_video(&self, path: &Path) -> Result<VideoInfo> {
        Self::require_file(path)?;
        let stdout = self
            .command_builder
            .probe(path)
            .execute_capture()
            .await
            .map_err(|e| JimakuError::Decode(e.to_string()))?;
        let info = parse_video_info(&stdout)?;
        debug!(
            "Probed {}: {}x{} {:.2}fps {}ms",
            path.display(),
            info.width,
            info.height,
            info.fps,
            info.duration_ms
        );
        Ok(info)
    }

    async fn probe_audio_duration(&self, path: &Path) -> Result<f64> {
        Self::require_file(path)?;
        let stdout = self
            .command_builder
            .probe(path)
            .execute_capture()
            .await
            .map_err(|e| JimakuError::Decode(e.to_string()))?;
        parse_audio_duration(&stdout)
    }

    async fn decode_narration(&self, path: &Path, work_dir: &Path) -> Result<AudioBuffer> {
        Self::require_file(path)?;
        info!("Decoding narration {}", path.display());

        let wav_path = work_dir.join("narration.wav");
        self.command_builder
            .decode_audio(path, wav_path.as_path(), NARRATION_SAMPLE_RATE, NARRATION_CHANNELS)
            .execute()
            .await
            .map_err(|e| JimakuError::Decode(e.to_string()))?;

        let buffer = AudioBuffer::from_wav(&wav_path)?;
        if buffer.is_empty() {
            return Err(JimakuError::Decode(format!(
                "Narration {} contains no audio",
                path.display()
            )));
        }
        debug!("Narration decoded: {}ms", buffer.duration_ms());
        Ok(buffer)
    }

    async fn open_frame_source(
        &self,
        path: &Path,
        width: u32,
        height: u32,
        fps: u32,
    ) -> Result<Box<dyn FrameSource>> {
        Self::require_file(path)?;
        let command = self.command_builder.decode_frames(path, width, height, fps);
        Ok(Box::new(FfmpegFrameSource::spawn(&command, width, height, fps)?))
    }

    async fn open_capture_sink(
        &self,
        request: &CaptureRequest,
        audio: &AudioBuffer,
    ) -> Result<Box<dyn CaptureSink>> {
        self.ensure_encoders(&[request.encode.video_codec.as_str(), request.encode.audio_codec.as_str()])
            .await?;

        let audio_path = audio.wav_path(&request.work_dir)?;
        let command = self
            .command_builder
            .capture(&request.encode, audio_path.as_path(), request.output.as_path());
        info!("Capturing to {}", request.output.display());
        Ok(Box::new(FfmpegCaptureSink::spawn(&command)?))
    }

    async fn filter_audio(&self, input: &Path, output: &Path, filter: &str) -> Result<()> {
        self.command_builder
            .filter_audio(input, output, filter)
            .execute()
            .await
            .map_err(|e| JimakuError::Retime(e.to_string()))
    }
}
