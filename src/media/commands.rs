use std::path::Path;
use std::process::Stdio;
use tokio::process::{Child, Command};
use tracing::debug;

use crate::error::{JimakuError, Result};

/// Abstract media processing command representation
#[derive(Debug, Clone)]
pub struct MediaCommand {
    pub binary_path: String,
    pub args: Vec<String>,
    pub description: String,
}

impl MediaCommand {
    /// Create a new media processing command
    pub fn new<S1: Into<String>, S2: Into<String>>(binary_path: S1, description: S2) -> Self {
        Self {
            binary_path: binary_path.into(),
            args: Vec::new(),
            description: description.into(),
        }
    }

    /// Add an argument
    pub fn arg<S: Into<String>>(mut self, arg: S) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add multiple arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(|s| s.into()));
        self
    }

    /// Add input file
    pub fn input<P: AsRef<Path>>(self, path: P) -> Self {
        self.arg("-i").arg(path.as_ref().to_string_lossy().to_string())
    }

    /// Add output file
    pub fn output<P: AsRef<Path>>(self, path: P) -> Self {
        self.arg(path.as_ref().to_string_lossy().to_string())
    }

    /// Force overwrite output
    pub fn overwrite(self) -> Self {
        self.arg("-y")
    }

    /// Only report errors on stderr
    pub fn quiet(self) -> Self {
        self.args(["-hide_banner", "-loglevel", "error"])
    }

    pub fn video_codec<S: Into<String>>(self, codec: S) -> Self {
        self.arg("-c:v").arg(codec)
    }

    pub fn audio_codec<S: Into<String>>(self, codec: S) -> Self {
        self.arg("-c:a").arg(codec)
    }

    pub fn no_video(self) -> Self {
        self.arg("-vn")
    }

    pub fn no_audio(self) -> Self {
        self.arg("-an")
    }

    pub fn audio_sample_rate(self, rate: u32) -> Self {
        self.arg("-ar").arg(rate.to_string())
    }

    pub fn audio_channels(self, channels: u16) -> Self {
        self.arg("-ac").arg(channels.to_string())
    }

    pub fn video_filter<S: Into<String>>(self, filter: S) -> Self {
        self.arg("-vf").arg(filter)
    }

    pub fn audio_filter<S: Into<String>>(self, filter: S) -> Self {
        self.arg("-af").arg(filter)
    }

    /// Raw RGBA frames of the given size
    pub fn raw_rgba(self, width: u32, height: u32) -> Self {
        self.args(["-f", "rawvideo", "-pix_fmt", "rgba"])
            .arg("-s")
            .arg(format!("{}x{}", width, height))
    }

    /// Limit output duration
    pub fn duration_ms(self, ms: u64) -> Self {
        self.arg("-t").arg(format!("{:.3}", ms as f64 / 1000.0))
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.binary_path);
        cmd.args(&self.args).kill_on_drop(true);
        cmd
    }

    /// Run to completion, discarding output
    pub async fn execute(&self) -> Result<()> {
        self.execute_capture().await.map(|_| ())
    }

    /// Run to completion and return stdout
    pub async fn execute_capture(&self) -> Result<Vec<u8>> {
        debug!("Executing media processing command: {} {:?}", self.binary_path, self.args);
        debug!("Description: {}", self.description);

        let output = self
            .command()
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| JimakuError::Media(format!("Failed to execute {}: {}", self.binary_path, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(JimakuError::Media(format!(
                "{} failed: {}",
                self.description,
                stderr.trim()
            )));
        }

        Ok(output.stdout)
    }

    /// Spawn with piped stdin and/or stdout for streaming frames
    pub fn spawn(&self, pipe_stdin: bool, pipe_stdout: bool) -> Result<Child> {
        debug!("Spawning media processing command: {} {:?}", self.binary_path, self.args);

        let pipe = |on: bool| if on { Stdio::piped() } else { Stdio::null() };
        self.command()
            .stdin(pipe(pipe_stdin))
            .stdout(pipe(pipe_stdout))
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| JimakuError::Media(format!("Failed to start {}: {}", self.binary_path, e)))
    }
}

/// Capture encoder parameters
#[derive(Debug, Clone, PartialEq)]
pub struct EncodeSettings {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub video_codec: String,
    pub audio_codec: String,
    pub pixel_format: String,
    pub extra_options: Vec<String>,
    pub duration_ms: u64,
    /// Narration is read this far in, so it plays ahead of frame 0
    pub audio_lead_ms: u64,
}

/// Builder for common media processing operations
pub struct MediaCommandBuilder {
    ffmpeg_path: String,
    ffprobe_path: String,
}

impl MediaCommandBuilder {
    pub fn new<S1: Into<String>, S2: Into<String>>(ffmpeg_path: S1, ffprobe_path: S2) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            ffprobe_path: ffprobe_path.into(),
        }
    }

    /// ffprobe JSON dump of format and streams
    pub fn probe<P: AsRef<Path>>(&self, path: P) -> MediaCommand {
        MediaCommand::new(&self.ffprobe_path, "Media probe")
            .args(["-v", "quiet", "-print_format", "json", "-show_format", "-show_streams"])
            .output(path)
    }

    /// Decode any audio (or the audio track of a video) to PCM WAV
    pub fn decode_audio<P: AsRef<Path>>(
        &self,
        input_path: P,
        wav_path: P,
        sample_rate: u32,
        channels: u16,
    ) -> MediaCommand {
        MediaCommand::new(&self.ffmpeg_path, "Narration decode")
            .quiet()
            .overwrite()
            .input(input_path)
            .no_video()
            .audio_codec("pcm_s16le")
            .audio_sample_rate(sample_rate)
            .audio_channels(channels)
            .output(wav_path)
    }

    /// Decode video frames as raw RGBA on stdout, resampled to `fps`
    pub fn decode_frames<P: AsRef<Path>>(&self, input_path: P, width: u32, height: u32, fps: u32) -> MediaCommand {
        MediaCommand::new(&self.ffmpeg_path, "Frame decode")
            .quiet()
            .input(input_path)
            .no_audio()
            .video_filter(format!("fps={},scale={}:{}", fps, width, height))
            .raw_rgba(width, height)
            .arg("-")
    }

    /// Encode raw RGBA frames from stdin, muxed with `audio_path`
    pub fn capture<P: AsRef<Path>>(&self, settings: &EncodeSettings, audio_path: P, output_path: P) -> MediaCommand {
        let mut cmd = MediaCommand::new(&self.ffmpeg_path, "Frame capture")
            .quiet()
            .overwrite()
            .raw_rgba(settings.width, settings.height)
            .arg("-r")
            .arg(settings.fps.to_string())
            .arg("-i")
            .arg("-");
        if settings.audio_lead_ms > 0 {
            cmd = cmd
                .arg("-ss")
                .arg(format!("{:.3}", settings.audio_lead_ms as f64 / 1000.0));
        }
        cmd = cmd
            .input(audio_path)
            .args(["-map", "0:v:0", "-map", "1:a:0"])
            .video_codec(&settings.video_codec)
            .arg("-pix_fmt")
            .arg(&settings.pixel_format)
            .audio_codec(&settings.audio_codec)
            .audio_filter("apad");

        for option in &settings.extra_options {
            cmd = cmd.arg(option);
        }

        cmd.duration_ms(settings.duration_ms).output(output_path)
    }

    /// Apply an audio filter chain, container inferred from the output extension
    pub fn filter_audio<P: AsRef<Path>>(&self, input_path: P, output_path: P, filter: &str) -> MediaCommand {
        MediaCommand::new(&self.ffmpeg_path, "Audio tempo adjustment")
            .quiet()
            .overwrite()
            .input(input_path)
            .audio_filter(filter)
            .output(output_path)
    }

    pub fn list_encoders(&self) -> MediaCommand {
        MediaCommand::new(&self.ffmpeg_path, "Encoder listing").args(["-hide_banner", "-encoders"])
    }

    pub fn version_check(&self) -> MediaCommand {
        MediaCommand::new(&self.ffmpeg_path, "Version check").arg("-version")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> EncodeSettings {
        EncodeSettings {
            width: 1280,
            height: 720,
            fps: 30,
            video_codec: "libx264".to_string(),
            audio_codec: "aac".to_string(),
            pixel_format: "yuv420p".to_string(),
            extra_options: vec!["-crf".to_string(), "20".to_string()],
            duration_ms: 3300,
            audio_lead_ms: 100,
        }
    }

    #[test]
    fn test_capture_command_layout() {
        let builder = MediaCommandBuilder::new("ffmpeg", "ffprobe");
        let cmd = builder.capture(&settings(), "narration.wav", "out.mp4");
        let args = cmd.args.join(" ");
        assert!(args.contains("-f rawvideo -pix_fmt rgba -s 1280x720 -r 30 -i -"));
        assert!(args.contains("-ss 0.100 -i narration.wav"));
        assert!(args.contains("-c:v libx264"));
        assert!(args.contains("-crf 20"));
        assert!(args.ends_with("-t 3.300 out.mp4"));
    }

    #[test]
    fn test_capture_without_lead_reads_narration_from_start() {
        let builder = MediaCommandBuilder::new("ffmpeg", "ffprobe");
        let no_lead = EncodeSettings {
            audio_lead_ms: 0,
            ..settings()
        };
        let args = builder.capture(&no_lead, "narration.wav", "out.mp4").args;
        assert!(!args.contains(&"-ss".to_string()));
    }

    #[test]
    fn test_probe_uses_ffprobe() {
        let builder = MediaCommandBuilder::new("/opt/ffmpeg", "/opt/ffprobe");
        let cmd = builder.probe("clip.mp4");
        assert_eq!(cmd.binary_path, "/opt/ffprobe");
        assert_eq!(cmd.args.last().map(String::as_str), Some("clip.mp4"));
    }

    #[test]
    fn test_decode_frames_writes_to_stdout() {
        let builder = MediaCommandBuilder::new("ffmpeg", "ffprobe");
        let cmd = builder.decode_frames("in.mp4", 640, 360, 25);
        assert!(cmd.args.contains(&"fps=25,scale=640:360".to_string()));
        assert_eq!(cmd.args.last().map(String::as_str), Some("-"));
    }

    #[tokio::test]
    async fn test_missing_binary_is_media_error() {
        let cmd = MediaCommand::new("/nonexistent/jimaku-ffmpeg", "Probe").arg("-version");
        assert!(matches!(cmd.execute().await, Err(JimakuError::Media(_))));
    }
}
