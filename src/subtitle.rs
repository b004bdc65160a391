use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tokio::fs;
use tracing::info;

use crate::error::{JimakuError, Result};
use crate::segmenter::CaptionSegment;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubtitleFormat {
    Srt,
    Vtt,
    Json,
}

impl SubtitleFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            SubtitleFormat::Srt => "srt",
            SubtitleFormat::Vtt => "vtt",
            SubtitleFormat::Json => "json",
        }
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        path.extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| {
                JimakuError::UnsupportedFormat(format!("No extension on {}", path.display()))
            })?
            .parse()
    }

    pub fn render(&self, segments: &[CaptionSegment]) -> Result<String> {
        match self {
            SubtitleFormat::Srt => Ok(to_srt(segments)),
            SubtitleFormat::Vtt => Ok(to_vtt(segments)),
            SubtitleFormat::Json => Ok(serde_json::to_string_pretty(segments)?),
        }
    }

    pub fn parse(&self, content: &str) -> Result<Vec<CaptionSegment>> {
        match self {
            SubtitleFormat::Srt | SubtitleFormat::Vtt => parse_cues(content),
            SubtitleFormat::Json => serde_json::from_str(content)
                .map_err(|e| JimakuError::Subtitle(format!("Invalid caption JSON: {}", e))),
        }
    }
}

impl fmt::Display for SubtitleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for SubtitleFormat {
    type Err = JimakuError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "srt" => Ok(SubtitleFormat::Srt),
            "vtt" | "webvtt" => Ok(SubtitleFormat::Vtt),
            "json" => Ok(SubtitleFormat::Json),
            other => Err(JimakuError::UnsupportedFormat(format!(
                "Unknown subtitle format '{}'",
                other
            ))),
        }
    }
}

/// Export captions as SubRip: 1-indexed cues separated by blank lines.
pub fn to_srt(segments: &[CaptionSegment]) -> String {
    let mut srt_content = String::new();

    for (index, segment) in segments.iter().enumerate() {
        srt_content.push_str(&format!(
            "{}\n{} --> {}\n{}\n\n",
            index + 1,
            format_srt_time(segment.start_ms),
            format_srt_time(segment.end_ms),
            segment.text.trim()
        ));
    }

    srt_content
}

pub fn to_vtt(segments: &[CaptionSegment]) -> String {
    let mut vtt_content = String::from("WEBVTT\n\n");

    for (index, segment) in segments.iter().enumerate() {
        vtt_content.push_str(&format!(
            "{}\n{} --> {}\n{}\n\n",
            index + 1,
            format_vtt_time(segment.start_ms),
            format_vtt_time(segment.end_ms),
            segment.text.trim()
        ));
    }

    vtt_content
}

/// Write captions to `output_path` in `format`.
pub async fn write_subtitles<P: AsRef<Path>>(
    segments: &[CaptionSegment],
    format: SubtitleFormat,
    output_path: P,
) -> Result<()> {
    let output_path = output_path.as_ref();
    info!("Generating {} file: {}", format, output_path.display());

    fs::write(output_path, format.render(segments)?).await?;

    info!("{} captions written", segments.len());
    Ok(())
}

/// Load captions, picking the format from the file extension.
pub async fn read_subtitles<P: AsRef<Path>>(path: P) -> Result<Vec<CaptionSegment>> {
    let path = path.as_ref();
    let format = SubtitleFormat::from_path(path)?;
    let content = fs::read_to_string(path)
        .await
        .map_err(|_| JimakuError::FileNotFound(path.display().to_string()))?;
    format.parse(&content)
}

/// Format milliseconds as SRT time (HH:MM:SS,mmm)
pub fn format_srt_time(ms: u64) -> String {
    let (hours, minutes, secs, millis) = split_ms(ms);
    format!("{:02}:{:02}:{:02},{:03}", hours, minutes, secs, millis)
}

/// Format milliseconds as WebVTT time (HH:MM:SS.mmm)
pub fn format_vtt_time(ms: u64) -> String {
    let (hours, minutes, secs, millis) = split_ms(ms);
    format!("{:02}:{:02}:{:02}.{:03}", hours, minutes, secs, millis)
}

fn split_ms(ms: u64) -> (u64, u64, u64, u64) {
    (
        ms / 3_600_000,
        (ms % 3_600_000) / 60_000,
        (ms % 60_000) / 1_000,
        ms % 1_000,
    )
}

/// Parse `HH:MM:SS,mmm`, `HH:MM:SS.mmm` or `MM:SS.mmm` into milliseconds.
pub fn parse_timestamp(value: &str) -> Result<u64> {
    let bad = || JimakuError::Subtitle(format!("Invalid timestamp '{}'", value));
    let value_trimmed = value.trim();
    let (clock, millis) = value_trimmed
        .rsplit_once([',', '.'])
        .ok_or_else(bad)?;
    if millis.len() != 3 {
        return Err(bad());
    }
    let millis: u64 = millis.parse().map_err(|_| bad())?;

    let parts = clock
        .split(':')
        .map(|p| p.parse::<u64>().map_err(|_| bad()))
        .collect::<Result<Vec<u64>>>()?;
    let (hours, minutes, secs) = match parts.as_slice() {
        [h, m, s] => (*h, *m, *s),
        [m, s] => (0, *m, *s),
        _ => return Err(bad()),
    };
    if minutes >= 60 || secs >= 60 {
        return Err(bad());
    }

    Ok(hours * 3_600_000 + minutes * 60_000 + secs * 1_000 + millis)
}

/// Parse SRT or WebVTT cue blocks. Cue identifiers, the WEBVTT header, NOTE
/// blocks and cue settings are skipped.
fn parse_cues(content: &str) -> Result<Vec<CaptionSegment>> {
    let normalized = content.replace("\r\n", "\n");
    let mut segments = Vec::new();

    for block in normalized.split("\n\n") {
        let lines: Vec<&str> = block
            .lines()
            .map(str::trim_end)
            .filter(|l| !l.is_empty())
            .collect();
        let Some(timing_idx) = lines.iter().position(|l| l.contains("-->")) else {
            continue;
        };

        let (start, rest) = lines[timing_idx]
            .split_once("-->")
            .ok_or_else(|| JimakuError::Subtitle(format!("Malformed cue: {}", block)))?;
        let end = rest.split_whitespace().next().unwrap_or("");
        let start_ms = parse_timestamp(start)?;
        let end_ms = parse_timestamp(end)?;
        if end_ms < start_ms {
            return Err(JimakuError::Subtitle(format!(
                "Cue ends before it starts: {}",
                lines[timing_idx]
            )));
        }

        let text = lines[timing_idx + 1..].join(" ");
        if !text.trim().is_empty() {
            segments.push(CaptionSegment::new(text.trim(), start_ms, end_ms));
        }
    }

    Ok(segments)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_srt_time() {
        assert_eq!(format_srt_time(0), "00:00:00,000");
        assert_eq!(format_srt_time(65_123), "00:01:05,123");
        assert_eq!(format_srt_time(3_661_500), "01:01:01,500");
        assert_eq!(format_vtt_time(3_661_500), "01:01:01.500");
    }

    #[test]
    fn test_parse_timestamp() {
        assert_eq!(parse_timestamp("01:01:01,500").unwrap(), 3_661_500);
        assert_eq!(parse_timestamp("00:00:02.250").unwrap(), 2_250);
        assert_eq!(parse_timestamp("01:05.123").unwrap(), 65_123);
        assert!(parse_timestamp("1:5").is_err());
        assert!(parse_timestamp("00:61:00,000").is_err());
        assert!(parse_timestamp("00:00:00,5").is_err());
    }

    #[test]
    fn test_timestamp_formatting_is_invertible() {
        for ms in [0, 1, 999, 1_000, 59_999, 60_000, 3_599_999, 3_600_000, 86_399_999] {
            assert_eq!(parse_timestamp(&format_srt_time(ms)).unwrap(), ms);
            assert_eq!(parse_timestamp(&format_vtt_time(ms)).unwrap(), ms);
        }
    }

    #[test]
    fn test_srt_layout() {
        let segments = vec![
            CaptionSegment::new("Hi there", 0, 700),
            CaptionSegment::new("friend ", 700, 1500),
        ];
        assert_eq!(
            to_srt(&segments),
            "1\n00:00:00,000 --> 00:00:00,700\nHi there\n\n2\n00:00:00,700 --> 00:00:01,500\nfriend\n\n"
        );
        assert!(to_vtt(&segments).starts_with("WEBVTT\n\n1\n00:00:00.000 --> 00:00:00.700\n"));
    }

    #[test]
    fn test_parse_exported_cues() {
        let segments = vec![
            CaptionSegment::new("one", 0, 500),
            CaptionSegment::new("two words", 500, 1250),
        ];
        for format in [SubtitleFormat::Srt, SubtitleFormat::Vtt, SubtitleFormat::Json] {
            let text = format.render(&segments).unwrap();
            assert_eq!(format.parse(&text).unwrap(), segments, "{}", format);
        }
    }

    #[test]
    fn test_parse_vtt_with_settings_and_notes() {
        let vtt = "WEBVTT\r\n\r\nNOTE made by hand\r\n\r\nintro\r\n00:01.000 --> 00:02.500 line:90% align:center\r\nHello\r\nworld\r\n";
        let segments = SubtitleFormat::Vtt.parse(vtt).unwrap();
        assert_eq!(segments, vec![CaptionSegment::new("Hello world", 1000, 2500)]);
    }

    #[test]
    fn test_reversed_cue_rejected() {
        let srt = "1\n00:00:02,000 --> 00:00:01,000\nbad\n";
        assert!(matches!(
            SubtitleFormat::Srt.parse(srt),
            Err(JimakuError::Subtitle(_))
        ));
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(SubtitleFormat::from_path("a/b.SRT").unwrap(), SubtitleFormat::Srt);
        assert_eq!(SubtitleFormat::from_path("b.vtt").unwrap(), SubtitleFormat::Vtt);
        assert!(SubtitleFormat::from_path("b.txt").is_err());
        assert!(SubtitleFormat::from_path("noext").is_err());
    }

    #[tokio::test]
    async fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("captions.srt");
        let segments = vec![CaptionSegment::new("Hello", 100, 900)];
        write_subtitles(&segments, SubtitleFormat::Srt, &path).await.unwrap();
        assert_eq!(read_subtitles(&path).await.unwrap(), segments);
    }
}
