//! Playback/capture orchestration.
//!
//! A compile run probes the source video, decodes the narration, then steps a
//! render clock across the source duration. Each tick composes one frame
//! (source frame plus active captions) and hands it to the capture sink,
//! which muxes the frames with the narration track.

pub mod cancel;
pub mod clock;
pub mod session;

use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub use cancel::CancellationToken;
pub use clock::RenderClock;
pub use session::CompileSession;

use crate::config::{CompileConfig, FontConfig};
use crate::error::{JimakuError, Result};
use crate::media::{CaptureRequest, EncodeSettings, MediaToolkit, VideoInfo};
use crate::render::{FontBook, RasterSurface};
use crate::segmenter::CaptionSegment;
use crate::style::StyleDescriptor;

#[derive(Debug, Clone, PartialEq)]
pub struct CompileOptions {
    pub fps: u32,
    pub audio_lead_ms: u64,
    pub grace_ms: u64,
    pub video_codec: String,
    pub audio_codec: String,
    pub pixel_format: String,
    pub encoder_options: Vec<String>,
    pub seed: Option<u64>,
}

impl From<&CompileConfig> for CompileOptions {
    fn from(config: &CompileConfig) -> Self {
        Self {
            fps: config.fps,
            audio_lead_ms: config.audio_lead_ms,
            grace_ms: config.grace_ms,
            video_codec: config.video_codec.clone(),
            audio_codec: config.audio_codec.clone(),
            pixel_format: config.pixel_format.clone(),
            encoder_options: config.encoder_options.clone(),
            seed: config.seed,
        }
    }
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self::from(&CompileConfig::default())
    }
}

/// Inputs for one compile run.
#[derive(Debug, Clone)]
pub struct CompileRequest {
    pub video: PathBuf,
    pub narration: PathBuf,
    pub segments: Vec<CaptionSegment>,
    pub style: StyleDescriptor,
    pub output: PathBuf,
}

/// Description of a finished output file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MuxedOutput {
    pub id: Uuid,
    pub path: PathBuf,
    pub container: String,
    pub video_codec: String,
    pub audio_codec: String,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    /// Source duration + grace.
    pub duration_ms: u64,
    pub source_duration_ms: u64,
    pub frames_rendered: u64,
    pub grace_frames: u64,
    /// How far the narration runs ahead of the first frame.
    pub audio_lead_ms: u64,
    /// Frames that repeated the previous source frame.
    pub reused_frames: u64,
    /// Media time of the last rendered frame with an active caption.
    pub last_captioned_ms: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompileProgress {
    pub elapsed_ms: f64,
    pub total_ms: u64,
    pub frames: u64,
}

impl CompileProgress {
    pub fn fraction(&self) -> f64 {
        if self.total_ms == 0 {
            1.0
        } else {
            (self.elapsed_ms / self.total_ms as f64).clamp(0.0, 1.0)
        }
    }
}

#[derive(Debug, Default)]
struct RunStats {
    frames_rendered: u64,
    grace_frames: u64,
    reused_frames: u64,
    last_captioned_ms: Option<f64>,
}

pub struct Compiler {
    toolkit: Arc<dyn MediaToolkit>,
    options: CompileOptions,
    fonts: FontConfig,
}

impl Compiler {
    pub fn new(toolkit: Arc<dyn MediaToolkit>, options: CompileOptions, fonts: FontConfig) -> Self {
        Self {
            toolkit,
            options,
            fonts,
        }
    }

    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    /// Burn `request.segments` into the source video and mux the narration.
    ///
    /// Cleanup runs on success, failure and cancellation alike. Errors before
    /// the first frame (bad media, missing encoder) leave no output behind.
    pub async fn compile<P>(
        &self,
        request: &CompileRequest,
        cancel: &CancellationToken,
        mut progress: P,
    ) -> Result<MuxedOutput>
    where
        P: FnMut(CompileProgress) + Send,
    {
        cancel.checkpoint()?;
        let style = request.style.sanitized();

        let info = self.toolkit.probe_video(&request.video).await?;
        if info.duration_ms == 0 {
            return Err(JimakuError::Input(format!(
                "Source video {} has zero duration",
                request.video.display()
            )));
        }
        if info.width == 0 || info.height == 0 {
            return Err(JimakuError::Input(format!(
                "Source video {} has no picture ({}x{})",
                request.video.display(),
                info.width,
                info.height
            )));
        }
        if let Some(parent) = request.output.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let seed = self.options.seed.unwrap_or_else(rand::random);
        let mut session = CompileSession::new(seed)?;
        info!(
            "Compile {} started: {} captions over {}ms of {}",
            session.id(),
            request.segments.len(),
            info.duration_ms,
            request.video.display()
        );

        let result = self
            .run(&mut session, request, &info, &style, cancel, &mut progress)
            .await;
        let id = session.id();
        session.release().await;

        match result {
            Ok(stats) => {
                let output = self.describe(id, request, &info, stats);
                info!(
                    "Compile {} finished: {} ({}ms, {} frames)",
                    id,
                    output.path.display(),
                    output.duration_ms,
                    output.frames_rendered + output.grace_frames
                );
                Ok(output)
            }
            Err(JimakuError::Cancelled) => {
                warn!("Compile {} cancelled", id);
                remove_partial(&request.output).await;
                Err(JimakuError::Cancelled)
            }
            Err(e) => {
                warn!("Compile {} failed: {}", id, e);
                remove_partial(&request.output).await;
                Err(e)
            }
        }
    }

    async fn run<P>(
        &self,
        session: &mut CompileSession,
        request: &CompileRequest,
        info: &VideoInfo,
        style: &StyleDescriptor,
        cancel: &CancellationToken,
        progress: &mut P,
    ) -> Result<RunStats>
    where
        P: FnMut(CompileProgress) + Send,
    {
        let audio = self
            .toolkit
            .decode_narration(&request.narration, session.work_dir())
            .await?;
        cancel.checkpoint()?;

        let mut clock = RenderClock::new(self.options.fps);
        let fps = clock.fps();
        let source = self
            .toolkit
            .open_frame_source(&request.video, info.width, info.height, fps)
            .await?;
        session.attach_source(source);

        let total_ms = info.duration_ms;
        let capture = CaptureRequest {
            encode: EncodeSettings {
                width: info.width,
                height: info.height,
                fps,
                video_codec: self.options.video_codec.clone(),
                audio_codec: self.options.audio_codec.clone(),
                pixel_format: self.options.pixel_format.clone(),
                extra_options: self.options.encoder_options.clone(),
                duration_ms: total_ms + self.options.grace_ms,
                audio_lead_ms: self.options.audio_lead_ms,
            },
            output: request.output.clone(),
            work_dir: session.work_dir().to_path_buf(),
        };
        let sink = self.toolkit.open_capture_sink(&capture, &audio).await?;
        session.attach_sink(sink);

        let fonts = FontBook::new(self.fonts.dirs.clone(), self.fonts.default_family.clone());
        let mut surface = RasterSurface::new(info.width, info.height, fonts);
        let mut stats = RunStats::default();
        let total = total_ms as f64;

        loop {
            cancel.checkpoint()?;

            let elapsed = clock.elapsed_ms();
            let time_ms = elapsed.min(total);
            let frame = session.source_frame(time_ms).await?;
            let frame_stats = session.render(&mut surface, frame, time_ms, &request.segments, style);

            if frame_stats.reused_last_frame {
                stats.reused_frames += 1;
            }
            if frame_stats.active_segments > 0 {
                stats.last_captioned_ms = Some(time_ms);
            }

            session.write(surface.frame()).await?;
            stats.frames_rendered += 1;
            progress(CompileProgress {
                elapsed_ms: time_ms,
                total_ms,
                frames: stats.frames_rendered,
            });

            if elapsed >= total {
                break;
            }
            clock.tick();
            tokio::task::yield_now().await;
        }

        stats.grace_frames = clock.frames_for(self.options.grace_ms);
        for _ in 0..stats.grace_frames {
            cancel.checkpoint()?;
            session.write(surface.frame()).await?;
        }

        debug!(
            "Rendered {} frames ({} grace, narration {}ms ahead) at {:.2}x realtime",
            stats.frames_rendered,
            stats.grace_frames,
            self.options.audio_lead_ms,
            clock.speed()
        );

        session.finish().await?;
        Ok(stats)
    }

    fn describe(&self, id: Uuid, request: &CompileRequest, info: &VideoInfo, stats: RunStats) -> MuxedOutput {
        MuxedOutput {
            id,
            path: request.output.clone(),
            container: container_of(&request.output),
            video_codec: self.options.video_codec.clone(),
            audio_codec: self.options.audio_codec.clone(),
            width: info.width,
            height: info.height,
            fps: self.options.fps.max(1),
            duration_ms: info.duration_ms + self.options.grace_ms,
            source_duration_ms: info.duration_ms,
            frames_rendered: stats.frames_rendered,
            grace_frames: stats.grace_frames,
            audio_lead_ms: self.options.audio_lead_ms,
            reused_frames: stats.reused_frames,
            last_captioned_ms: stats.last_captioned_ms,
        }
    }
}

fn container_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_else(|| "mp4".to_string())
}

async fn remove_partial(path: &Path) {
    if tokio::fs::metadata(path).await.is_ok() {
        if let Err(e) = tokio::fs::remove_file(path).await {
            warn!("Failed to remove partial output {}: {}", path.display(), e);
        }
    }
}
