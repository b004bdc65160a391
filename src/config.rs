use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use crate::error::{JimakuError, Result};

/// Config file looked up in the working directory when none is given
pub const DEFAULT_CONFIG_FILE: &str = "jimaku.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub media: MediaConfig,
    pub segmenter: SegmenterConfig,
    pub compile: CompileConfig,
    pub retime: RetimeConfig,
    pub fonts: FontConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    /// Path to ffmpeg binary
    pub ffmpeg_path: String,
    /// Path to ffprobe binary
    pub ffprobe_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmenterConfig {
    /// A caption break is deferred until the caption lasts this long
    pub min_duration_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompileConfig {
    /// Render clock rate
    pub fps: u32,
    /// Narration starts this long before the first caption frame
    pub audio_lead_ms: u64,
    /// Final frame is held this long after the source ends
    pub grace_ms: u64,
    pub video_codec: String,
    pub audio_codec: String,
    pub pixel_format: String,
    /// Extra encoder arguments, e.g. ["-preset", "medium", "-crf", "23"]
    pub encoder_options: Vec<String>,
    /// Seed for randomized animation jitter; random per run when unset
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetimeConfig {
    /// Ratios within this distance of 1.0 are left untouched
    pub tolerance: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FontConfig {
    /// Directories searched recursively for .ttf/.otf faces
    pub dirs: Vec<PathBuf>,
    /// Used when a style names a family that cannot be found
    pub default_family: String,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: "ffmpeg".to_string(),
            ffprobe_path: "ffprobe".to_string(),
        }
    }
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self { min_duration_ms: 400 }
    }
}

impl Default for CompileConfig {
    fn default() -> Self {
        Self {
            fps: 30,
            audio_lead_ms: 100,
            grace_ms: 300,
            video_codec: "libx264".to_string(),
            audio_codec: "aac".to_string(),
            pixel_format: "yuv420p".to_string(),
            encoder_options: vec![
                // Example encoding options users can customize:
                // "-preset".to_string(), "medium".to_string(),
                // "-crf".to_string(), "23".to_string(),
            ],
            seed: None,
        }
    }
}

impl Default for RetimeConfig {
    fn default() -> Self {
        Self { tolerance: 0.015 }
    }
}

impl Default for FontConfig {
    fn default() -> Self {
        Self {
            dirs: vec![
                PathBuf::from("fonts"),
                PathBuf::from("/usr/share/fonts"),
                PathBuf::from("/usr/local/share/fonts"),
                PathBuf::from("/Library/Fonts"),
                PathBuf::from("C:\\Windows\\Fonts"),
            ],
            default_family: "Inter".to_string(),
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| JimakuError::Config(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| JimakuError::Config(format!("Failed to parse config file: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Explicit path, else `./jimaku.toml` when present, else defaults
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None if Path::new(DEFAULT_CONFIG_FILE).is_file() => Self::from_file(DEFAULT_CONFIG_FILE),
            None => Ok(Self::default()),
        }
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| JimakuError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| JimakuError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.compile.fps == 0 || self.compile.fps > 240 {
            return Err(JimakuError::Config(format!(
                "compile.fps must be between 1 and 240, got {}",
                self.compile.fps
            )));
        }
        if !(0.0..0.5).contains(&self.retime.tolerance) {
            return Err(JimakuError::Config(format!(
                "retime.tolerance must be in [0, 0.5), got {}",
                self.retime.tolerance
            )));
        }
        if self.compile.video_codec.trim().is_empty() || self.compile.audio_codec.trim().is_empty() {
            return Err(JimakuError::Config("compile codecs must not be empty".to_string()));
        }
        Ok(())
    }
}
