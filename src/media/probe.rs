//! ffprobe-backed media inspection.

use serde::{Deserialize, Serialize};

use crate::error::{JimakuError, Result};

/// Dimensions and timing of a source video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoInfo {
    pub duration_ms: u64,
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub codec: String,
    pub has_audio: bool,
}

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: FfprobeFormat,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
    format_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: String,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    duration: Option<String>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
}

fn parse_json(stdout: &[u8]) -> Result<FfprobeOutput> {
    serde_json::from_slice(stdout)
        .map_err(|e| JimakuError::Decode(format!("Unreadable probe output: {}", e)))
}

fn seconds(value: Option<&String>) -> Option<f64> {
    value
        .and_then(|d| d.parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d > 0.0)
}

/// Interpret ffprobe JSON for a video file.
pub fn parse_video_info(stdout: &[u8]) -> Result<VideoInfo> {
    let probe = parse_json(stdout)?;

    let video = probe
        .streams
        .iter()
        .find(|s| s.codec_type == "video")
        .ok_or_else(|| JimakuError::Input("No video stream found".to_string()))?;

    let duration = seconds(probe.format.duration.as_ref())
        .or_else(|| seconds(video.duration.as_ref()))
        .unwrap_or(0.0);

    let fps = video
        .avg_frame_rate
        .as_ref()
        .and_then(|r| parse_frame_rate(r))
        .or_else(|| video.r_frame_rate.as_ref().and_then(|r| parse_frame_rate(r)))
        .unwrap_or(30.0);

    Ok(VideoInfo {
        duration_ms: (duration * 1000.0).round() as u64,
        width: video.width.unwrap_or(0),
        height: video.height.unwrap_or(0),
        fps,
        codec: video.codec_name.clone().unwrap_or_default(),
        has_audio: probe.streams.iter().any(|s| s.codec_type == "audio"),
    })
}

/// Duration in seconds of the first audio stream (or the container).
pub fn parse_audio_duration(stdout: &[u8]) -> Result<f64> {
    let probe = parse_json(stdout)?;
    let audio = probe.streams.iter().find(|s| s.codec_type == "audio");
    if audio.is_none() {
        return Err(JimakuError::Decode(format!(
            "No audio stream in {} input",
            probe.format.format_name.unwrap_or_else(|| "unknown".to_string())
        )));
    }

    seconds(probe.format.duration.as_ref())
        .or_else(|| audio.and_then(|a| seconds(a.duration.as_ref())))
        .ok_or_else(|| JimakuError::Decode("Audio has no measurable duration".to_string()))
}

/// Parse frame rate string (e.g., "30/1" or "29.97").
fn parse_frame_rate(s: &str) -> Option<f64> {
    if let Some((num, den)) = s.split_once('/') {
        let num: f64 = num.parse().ok()?;
        let den: f64 = den.parse().ok()?;
        if den > 0.0 && num > 0.0 {
            return Some(num / den);
        }
        return None;
    }
    s.parse().ok().filter(|v: &f64| *v > 0.0)
}
