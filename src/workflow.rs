use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::{info, warn};

use crate::cli::{CaptionArgs, StyleArgs};
use crate::compile::{CancellationToken, CompileOptions, CompileRequest, Compiler, MuxedOutput};
use crate::config::Config;
use crate::error::{JimakuError, Result};
use crate::media::{MediaToolkit, MediaToolkitFactory};
use crate::retime::{RetimeOutcome, TempoReconciler};
use crate::segmenter::{CaptionSegment, SegmentConstraints, segment};
use crate::style::{StyleDescriptor, StylePatch};
use crate::subtitle::{SubtitleFormat, read_subtitles, write_subtitles};
use crate::timing::{TimingDocument, words_from_text};

/// Drives the command-line operations against one configuration.
pub struct Workflow {
    config: Config,
    media: Arc<dyn MediaToolkit>,
}

impl Workflow {
    pub fn new(config: Config) -> Self {
        let media = MediaToolkitFactory::create_toolkit(config.media.clone());
        Self { config, media }
    }

    pub fn with_toolkit(config: Config, media: Arc<dyn MediaToolkit>) -> Self {
        Self { config, media }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Report the ffmpeg version, failing when the media tools are missing.
    pub async fn check_media(&self) -> Result<String> {
        self.media.check_availability()?;
        self.media.get_version_info().await
    }

    /// Preset (or default) style with the optional JSON patch file on top.
    pub async fn resolve_style(&self, args: &StyleArgs) -> Result<StyleDescriptor> {
        let base = match &args.preset {
            Some(name) => StyleDescriptor::preset(name)?,
            None => StyleDescriptor::default(),
        };

        let style = match &args.style {
            Some(path) => {
                let content = read_input(path).await?;
                let patch: StylePatch = serde_json::from_str(&content).map_err(|e| {
                    JimakuError::Style(format!("Failed to parse style {}: {}", path.display(), e))
                })?;
                base.merge(&patch)
            }
            None => base,
        };

        style.validate()?;
        Ok(style)
    }

    /// Caption segments from a caption file, a timing document or plain text.
    pub async fn load_captions(
        &self,
        args: &CaptionArgs,
        style: &StyleDescriptor,
    ) -> Result<Vec<CaptionSegment>> {
        if let Some(path) = &args.captions {
            info!("Loading captions from {}", path.display());
            let segments = read_subtitles(path).await?;
            validate_segments(&segments)?;
            return Ok(segments);
        }

        let words = if let Some(path) = &args.timing {
            info!("Loading word timing from {}", path.display());
            TimingDocument::from_json(&read_input(path).await?)?.into_words()?
        } else if let Some(text) = &args.text {
            warn!("No timing supplied; spacing words evenly");
            words_from_text(text)
        } else {
            return Err(JimakuError::Input(
                "One of --timing, --text or --captions is required".to_string(),
            ));
        };

        let constraints =
            SegmentConstraints::from_style(style, self.config.segmenter.min_duration_ms);
        let segments = segment(&words, &constraints);
        info!("Grouped {} words into {} captions", words.len(), segments.len());
        Ok(segments)
    }

    pub async fn segment_to_file(
        &self,
        source: &CaptionArgs,
        style: &StyleArgs,
        output: &Path,
        format: Option<&str>,
    ) -> Result<Vec<CaptionSegment>> {
        let style = self.resolve_style(style).await?;
        let segments = self.load_captions(source, &style).await?;
        let format = match format {
            Some(name) => name.parse()?,
            None => SubtitleFormat::from_path(output)?,
        };
        write_subtitles(&segments, format, output).await?;
        Ok(segments)
    }

    /// Compile with a progress bar; Ctrl-C cancels the run and removes any
    /// partial output.
    pub async fn compile(
        &self,
        request: &CompileRequest,
        fps: Option<u32>,
    ) -> Result<MuxedOutput> {
        self.media.check_availability()?;

        let mut options = CompileOptions::from(&self.config.compile);
        if let Some(fps) = fps {
            if fps == 0 {
                return Err(JimakuError::Config("fps must be at least 1".to_string()));
            }
            options.fps = fps;
        }
        let compiler = Compiler::new(self.media.clone(), options, self.config.fonts.clone());

        let cancel = CancellationToken::new();
        let interrupt = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("Interrupt received, cancelling compile");
                    cancel.cancel();
                }
            })
        };

        let pb = ProgressBar::new(1000);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {percent}% {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );

        let bar = pb.clone();
        let result = compiler
            .compile(request, &cancel, move |p| {
                bar.set_position((p.fraction() * 1000.0) as u64);
                bar.set_message(format!("{} frames", p.frames));
            })
            .await;
        interrupt.abort();

        match &result {
            Ok(_) => pb.finish_with_message("done"),
            Err(_) => pb.abandon(),
        }
        result
    }

    pub async fn retime_file(
        &self,
        input: &Path,
        target_secs: f64,
        output: &Path,
        as_base64: bool,
    ) -> Result<RetimeOutcome> {
        let audio = fs::read(input)
            .await
            .map_err(|_| JimakuError::FileNotFound(input.display().to_string()))?;

        let reconciler = TempoReconciler::new(self.media.clone(), self.config.retime.tolerance);
        let outcome = reconciler.retime(&audio, target_secs).await;

        if as_base64 {
            fs::write(output, outcome.to_base64()).await?;
        } else {
            fs::write(output, &outcome.audio).await?;
        }
        info!(
            "Wrote {} audio to {} ({})",
            outcome.container,
            output.display(),
            if outcome.changed { "retimed" } else { "unchanged" }
        );
        Ok(outcome)
    }

    pub async fn write_style(&self, style: &StyleDescriptor, output: &Path) -> Result<()> {
        fs::write(output, serde_json::to_string_pretty(style)?).await?;
        info!("Style written to {}", output.display());
        Ok(())
    }
}

/// Captions sidecar path for a compiled output, e.g. `out.mp4` -> `out.srt`.
pub fn sidecar_path(output: &Path, format: SubtitleFormat) -> PathBuf {
    output.with_extension(format.extension())
}

async fn read_input(path: &Path) -> Result<String> {
    fs::read_to_string(path)
        .await
        .map_err(|_| JimakuError::FileNotFound(path.display().to_string()))
}

fn validate_segments(segments: &[CaptionSegment]) -> Result<()> {
    for pair in segments.windows(2) {
        if pair[1].start_ms < pair[0].start_ms {
            return Err(JimakuError::Subtitle(format!(
                "Captions out of order: '{}' starts before '{}'",
                pair[1].text, pair[0].text
            )));
        }
    }
    if let Some(bad) = segments.iter().find(|s| s.end_ms < s.start_ms) {
        return Err(JimakuError::Subtitle(format!(
            "Caption '{}' ends before it starts",
            bad.text
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::style::EffectKind;

    fn workflow() -> Workflow {
        Workflow::new(Config::default())
    }

    #[tokio::test]
    async fn test_resolve_style_layers_patch_over_preset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("style.json");
        std::fs::write(&path, r##"{"fontSize": 48, "textColor": "#FF0000"}"##).unwrap();

        let style = workflow()
            .resolve_style(&StyleArgs {
                preset: Some("neon".to_string()),
                style: Some(path),
            })
            .await
            .unwrap();
        assert_eq!(style.effect, EffectKind::Neon);
        assert_eq!(style.font_size, 48.0);
    }

    #[tokio::test]
    async fn test_unknown_preset_rejected() {
        let result = workflow()
            .resolve_style(&StyleArgs {
                preset: Some("sparkles".to_string()),
                style: None,
            })
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_segment_text_to_srt() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.srt");
        let source = CaptionArgs {
            text: Some("one two three four five".to_string()),
            ..Default::default()
        };

        let segments = workflow()
            .segment_to_file(&source, &StyleArgs::default(), &output, None)
            .await
            .unwrap();
        assert!(!segments.is_empty());
        let written = std::fs::read_to_string(&output).unwrap();
        assert!(written.starts_with("1\n00:00:00,000 --> "));
    }

    #[tokio::test]
    async fn test_missing_caption_source() {
        let result = workflow()
            .load_captions(&CaptionArgs::default(), &StyleDescriptor::default())
            .await;
        assert!(matches!(result, Err(JimakuError::Input(_))));
    }

    #[tokio::test]
    async fn test_caption_file_out_of_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("c.srt");
        std::fs::write(
            &path,
            "1\n00:00:02,000 --> 00:00:03,000\nb\n\n2\n00:00:01,000 --> 00:00:02,000\na\n",
        )
        .unwrap();
        let source = CaptionArgs {
            captions: Some(path),
            ..Default::default()
        };
        let result = workflow()
            .load_captions(&source, &StyleDescriptor::default())
            .await;
        assert!(matches!(result, Err(JimakuError::Subtitle(_))));
    }

    #[test]
    fn test_sidecar_path() {
        assert_eq!(
            sidecar_path(Path::new("out/video.mp4"), SubtitleFormat::Vtt),
            PathBuf::from("out/video.vtt")
        );
    }
}
