//! Tempo reconciliation: stretch or compress narration to a target duration.
//!
//! The work is best-effort. Any probe or processing failure yields the input
//! audio unchanged, because mismatched narration is still better than none.

use base64::{engine::general_purpose, Engine as _};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::{JimakuError, Result};
use crate::media::MediaToolkit;

pub const DEFAULT_TOLERANCE: f64 = 0.015;

/// Bounds of a single tempo stage.
pub const MIN_STAGE: f64 = 0.5;
pub const MAX_STAGE: f64 = 2.0;
/// A leftover stage this close to 1 is not worth a filter pass.
pub const STAGE_EPSILON: f64 = 1e-3;

/// Audio container, detected from leading magic bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioContainer {
    Wav,
    Mp3,
    Ogg,
    Flac,
    M4a,
}

impl AudioContainer {
    /// Unknown data is treated as MP3, the common narration format.
    pub fn sniff(bytes: &[u8]) -> Self {
        if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WAVE" {
            AudioContainer::Wav
        } else if bytes.starts_with(b"OggS") {
            AudioContainer::Ogg
        } else if bytes.starts_with(b"fLaC") {
            AudioContainer::Flac
        } else if bytes.len() >= 8 && &bytes[4..8] == b"ftyp" {
            AudioContainer::M4a
        } else {
            AudioContainer::Mp3
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            AudioContainer::Wav => "wav",
            AudioContainer::Mp3 => "mp3",
            AudioContainer::Ogg => "ogg",
            AudioContainer::Flac => "flac",
            AudioContainer::M4a => "m4a",
        }
    }
}

impl fmt::Display for AudioContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Split a duration ratio into stretch stages within `[MIN_STAGE, MAX_STAGE]`
/// whose product equals the ratio. A ratio above 1 lengthens the audio.
pub fn plan_tempo_chain(ratio: f64) -> Vec<f64> {
    if !ratio.is_finite() || ratio <= 0.0 {
        return Vec::new();
    }

    let mut stages = Vec::new();
    let mut remaining = ratio;
    while remaining > MAX_STAGE {
        stages.push(MAX_STAGE);
        remaining /= MAX_STAGE;
    }
    while remaining < MIN_STAGE {
        stages.push(MIN_STAGE);
        remaining /= MIN_STAGE;
    }
    if (remaining - 1.0).abs() > STAGE_EPSILON {
        stages.push(remaining);
    }
    stages
}

/// ffmpeg filter graph for a stretch chain. `atempo` takes a speed factor,
/// the reciprocal of the stretch.
pub fn atempo_filter(chain: &[f64]) -> String {
    chain
        .iter()
        .map(|stage| format!("atempo={:.6}", 1.0 / stage))
        .collect::<Vec<_>>()
        .join(",")
}

/// How a clip will be adjusted.
#[derive(Debug, Clone, PartialEq)]
pub struct TempoPlan {
    pub current_secs: f64,
    pub target_secs: f64,
    pub ratio: f64,
    /// Empty when the ratio is within tolerance.
    pub chain: Vec<f64>,
}

impl TempoPlan {
    pub fn new(current_secs: f64, target_secs: f64, tolerance: f64) -> Result<Self> {
        if !current_secs.is_finite() || current_secs <= 0.0 {
            return Err(JimakuError::Retime(format!(
                "Audio duration {} is not measurable",
                current_secs
            )));
        }
        if !target_secs.is_finite() || target_secs <= 0.0 {
            return Err(JimakuError::Retime(format!(
                "Target duration {} must be positive",
                target_secs
            )));
        }

        let ratio = target_secs / current_secs;
        let chain = if (ratio - 1.0).abs() <= tolerance {
            Vec::new()
        } else {
            plan_tempo_chain(ratio)
        };
        Ok(Self {
            current_secs,
            target_secs,
            ratio,
            chain,
        })
    }

    pub fn needs_change(&self) -> bool {
        !self.chain.is_empty()
    }

    pub fn filter(&self) -> String {
        atempo_filter(&self.chain)
    }
}

/// Result of a retime request. `audio` is always playable.
#[derive(Debug, Clone, PartialEq)]
pub struct RetimeOutcome {
    pub audio: Vec<u8>,
    pub container: AudioContainer,
    pub plan: Option<TempoPlan>,
    pub changed: bool,
    /// Why the input was returned unchanged, if a failure caused it.
    pub fallback_reason: Option<String>,
}

impl RetimeOutcome {
    fn unchanged(audio: &[u8], plan: Option<TempoPlan>, reason: Option<String>) -> Self {
        Self {
            audio: audio.to_vec(),
            container: AudioContainer::sniff(audio),
            plan,
            changed: false,
            fallback_reason: reason,
        }
    }

    pub fn to_base64(&self) -> String {
        general_purpose::STANDARD.encode(&self.audio)
    }
}

pub fn decode_base64_audio(encoded: &str) -> Result<Vec<u8>> {
    general_purpose::STANDARD
        .decode(encoded.trim())
        .map_err(|e| JimakuError::Input(format!("Audio is not valid base64: {}", e)))
}

pub struct TempoReconciler {
    toolkit: Arc<dyn MediaToolkit>,
    tolerance: f64,
}

impl TempoReconciler {
    pub fn new(toolkit: Arc<dyn MediaToolkit>, tolerance: f64) -> Self {
        Self {
            toolkit,
            tolerance: tolerance.max(0.0),
        }
    }

    /// Stretch `audio` to last `target_secs`. Never fails: on any error the
    /// input bytes come back with `changed == false`.
    pub async fn retime(&self, audio: &[u8], target_secs: f64) -> RetimeOutcome {
        match self.try_retime(audio, target_secs).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("Retime skipped, keeping original audio: {}", e);
                RetimeOutcome::unchanged(audio, None, Some(e.to_string()))
            }
        }
    }

    pub async fn try_retime(&self, audio: &[u8], target_secs: f64) -> Result<RetimeOutcome> {
        if audio.is_empty() {
            return Err(JimakuError::Retime("Audio is empty".to_string()));
        }

        let container = AudioContainer::sniff(audio);
        let work_dir = tempfile::Builder::new().prefix("jimaku-retime-").tempdir()?;
        let input = work_dir.path().join(format!("input.{}", container.extension()));
        tokio::fs::write(&input, audio).await?;

        let current = self
            .toolkit
            .probe_audio_duration(&input)
            .await
            .map_err(|e| JimakuError::Retime(e.to_string()))?;
        let plan = TempoPlan::new(current, target_secs, self.tolerance)?;
        debug!(
            "Retime plan: {:.3}s -> {:.3}s (ratio {:.4}, stages {:?})",
            plan.current_secs, plan.target_secs, plan.ratio, plan.chain
        );

        if !plan.needs_change() {
            return Ok(RetimeOutcome::unchanged(audio, Some(plan), None));
        }

        let output = work_dir.path().join(format!("output.{}", container.extension()));
        self.process(&input, &output, &plan).await?;
        let retimed = tokio::fs::read(&output).await?;
        if retimed.is_empty() {
            return Err(JimakuError::Retime("Tempo filter produced no audio".to_string()));
        }

        info!(
            "Retimed {} audio {:.2}s -> {:.2}s in {} stage(s)",
            container,
            plan.current_secs,
            plan.target_secs,
            plan.chain.len()
        );
        Ok(RetimeOutcome {
            audio: retimed,
            container,
            plan: Some(plan),
            changed: true,
            fallback_reason: None,
        })
    }

    async fn process(&self, input: &Path, output: &Path, plan: &TempoPlan) -> Result<()> {
        self.toolkit
            .filter_audio(input, output, &plan.filter())
            .await
            .map_err(|e| match e {
                JimakuError::Retime(_) => e,
                other => JimakuError::Retime(other.to_string()),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::{AudioBuffer, CaptureRequest, CaptureSink, FrameSource, VideoInfo};
    use async_trait::async_trait;
    use std::sync::Mutex;

    fn product(chain: &[f64]) -> f64 {
        chain.iter().product()
    }

    #[test]
    fn test_chain_for_large_stretch() {
        let chain = plan_tempo_chain(3.0);
        assert_eq!(chain.len(), 2);
        assert_eq!(chain[0], 2.0);
        assert!((chain[1] - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_chain_for_large_compression() {
        let chain = plan_tempo_chain(0.2);
        assert_eq!(chain.len(), 3);
        assert_eq!(&chain[..2], &[0.5, 0.5]);
        assert!((chain[2] - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_negligible_remainder_dropped() {
        assert_eq!(plan_tempo_chain(4.0005), vec![2.0, 2.0]);
        assert_eq!(plan_tempo_chain(0.2499), vec![0.5, 0.5]);
        let chain = plan_tempo_chain(2.004);
        assert_eq!(chain.len(), 2);
        assert!((chain[1] - 1.002).abs() < 1e-9);
    }

    #[test]
    fn test_chain_properties() {
        for ratio in [0.05, 0.2, 0.5, 0.73, 1.2, 2.0, 2.5, 4.0, 9.7, 30.0] {
            let chain = plan_tempo_chain(ratio);
            assert!(!chain.is_empty(), "{}", ratio);
            assert!((product(&chain) - ratio).abs() < 1e-9 * ratio.max(1.0), "{}", ratio);
            for stage in &chain {
                assert!((MIN_STAGE..=MAX_STAGE).contains(stage), "{} -> {:?}", ratio, chain);
            }
        }
        assert_eq!(plan_tempo_chain(2.5).len(), 2);
        assert!(plan_tempo_chain(1.0).is_empty());
        assert!(plan_tempo_chain(0.0).is_empty());
        assert!(plan_tempo_chain(f64::NAN).is_empty());
    }

    #[test]
    fn test_atempo_filter_uses_speed() {
        assert_eq!(atempo_filter(&[2.0, 1.25]), "atempo=0.500000,atempo=0.800000");
    }

    #[test]
    fn test_plan_tolerance() {
        assert!(!TempoPlan::new(10.0, 10.05, DEFAULT_TOLERANCE).unwrap().needs_change());
        assert!(TempoPlan::new(10.0, 10.2, DEFAULT_TOLERANCE).unwrap().needs_change());
        assert!(TempoPlan::new(0.0, 1.0, DEFAULT_TOLERANCE).is_err());
        assert!(TempoPlan::new(1.0, -1.0, DEFAULT_TOLERANCE).is_err());
    }

    #[test]
    fn test_sniff_containers() {
        assert_eq!(AudioContainer::sniff(b"RIFF\0\0\0\0WAVEfmt "), AudioContainer::Wav);
        assert_eq!(AudioContainer::sniff(b"OggS\0\0"), AudioContainer::Ogg);
        assert_eq!(AudioContainer::sniff(b"fLaC\0\0"), AudioContainer::Flac);
        assert_eq!(AudioContainer::sniff(b"\0\0\0\x20ftypM4A "), AudioContainer::M4a);
        assert_eq!(AudioContainer::sniff(b"ID3\x04"), AudioContainer::Mp3);
        assert_eq!(AudioContainer::sniff(b""), AudioContainer::Mp3);
    }

    #[test]
    fn test_base64_round_trip() {
        let outcome = RetimeOutcome::unchanged(b"abc", None, None);
        assert_eq!(decode_base64_audio(&outcome.to_base64()).unwrap(), b"abc");
        assert!(decode_base64_audio("@@@").is_err());
    }

    struct FakeAudio {
        duration: Option<f64>,
        filter_fails: bool,
        filters: Mutex<Vec<String>>,
    }

    impl FakeAudio {
        fn new(duration: Option<f64>) -> Self {
            Self {
                duration,
                filter_fails: false,
                filters: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl MediaToolkit for FakeAudio {
        fn check_availability(&self) -> Result<()> {
            Ok(())
        }

        async fn get_version_info(&self) -> Result<String> {
            Ok("fake".to_string())
        }

        async fn probe_video(&self, _path: &Path) -> Result<VideoInfo> {
            Err(JimakuError::Media("not a video".to_string()))
        }

        async fn probe_audio_duration(&self, path: &Path) -> Result<f64> {
            assert!(path.exists());
            self.duration
                .ok_or_else(|| JimakuError::Decode("unreadable".to_string()))
        }

        async fn decode_narration(&self, _path: &Path, _work_dir: &Path) -> Result<AudioBuffer> {
            Err(JimakuError::Media("unused".to_string()))
        }

        async fn open_frame_source(
            &self,
            _path: &Path,
            _width: u32,
            _height: u32,
            _fps: u32,
        ) -> Result<Box<dyn FrameSource>> {
            Err(JimakuError::Media("unused".to_string()))
        }

        async fn open_capture_sink(
            &self,
            _request: &CaptureRequest,
            _audio: &AudioBuffer,
        ) -> Result<Box<dyn CaptureSink>> {
            Err(JimakuError::Media("unused".to_string()))
        }

        async fn filter_audio(&self, input: &Path, output: &Path, filter: &str) -> Result<()> {
            assert_eq!(input.extension(), output.extension());
            self.filters.lock().unwrap().push(filter.to_string());
            if self.filter_fails {
                return Err(JimakuError::Retime("atempo failed".to_string()));
            }
            std::fs::write(output, b"RIFF\0\0\0\0WAVEretimed")?;
            Ok(())
        }
    }

    const WAV: &[u8] = b"RIFF\0\0\0\0WAVEoriginal";

    #[tokio::test]
    async fn test_identity_ratio_returns_input() {
        let toolkit = Arc::new(FakeAudio::new(Some(4.0)));
        let reconciler = TempoReconciler::new(toolkit.clone(), DEFAULT_TOLERANCE);
        let outcome = reconciler.retime(WAV, 4.0).await;
        assert_eq!(outcome.audio, WAV);
        assert!(!outcome.changed);
        assert!(outcome.fallback_reason.is_none());
        assert!(toolkit.filters.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_within_tolerance_is_untouched() {
        let toolkit = Arc::new(FakeAudio::new(Some(10.0)));
        let reconciler = TempoReconciler::new(toolkit.clone(), DEFAULT_TOLERANCE);
        let outcome = reconciler.retime(WAV, 10.05).await;
        assert_eq!(outcome.audio, WAV);
        assert!(!outcome.changed);
    }

    #[tokio::test]
    async fn test_stretch_runs_chained_filter() {
        let toolkit = Arc::new(FakeAudio::new(Some(2.0)));
        let reconciler = TempoReconciler::new(toolkit.clone(), DEFAULT_TOLERANCE);
        let outcome = reconciler.retime(WAV, 5.0).await;
        assert!(outcome.changed);
        assert_eq!(outcome.container, AudioContainer::Wav);
        assert_eq!(outcome.audio, b"RIFF\0\0\0\0WAVEretimed");
        assert_eq!(outcome.plan.unwrap().chain.len(), 2);
        assert_eq!(
            toolkit.filters.lock().unwrap().as_slice(),
            &["atempo=0.500000,atempo=0.800000".to_string()]
        );
    }

    #[tokio::test]
    async fn test_failures_fall_back_to_original() {
        let unreadable = TempoReconciler::new(Arc::new(FakeAudio::new(None)), DEFAULT_TOLERANCE);
        let outcome = unreadable.retime(WAV, 3.0).await;
        assert_eq!(outcome.audio, WAV);
        assert!(!outcome.changed);
        assert!(outcome.fallback_reason.is_some());

        let mut failing = FakeAudio::new(Some(1.0));
        failing.filter_fails = true;
        let reconciler = TempoReconciler::new(Arc::new(failing), DEFAULT_TOLERANCE);
        let outcome = reconciler.retime(WAV, 3.0).await;
        assert_eq!(outcome.audio, WAV);
        assert!(!outcome.changed);

        let bad_target = TempoReconciler::new(Arc::new(FakeAudio::new(Some(1.0))), DEFAULT_TOLERANCE);
        assert!(matches!(
            bad_target.try_retime(WAV, 0.0).await,
            Err(JimakuError::Retime(_))
        ));
    }
}
