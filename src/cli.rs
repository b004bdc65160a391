use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Where caption styling comes from. A preset is applied first, then the
/// style file on top of it.
#[derive(ClapArgs, Debug, Clone, Default)]
pub struct StyleArgs {
    /// Style preset name (classic, bold-pop, neon, karaoke, cinematic)
    #[arg(long)]
    pub preset: Option<String>,

    /// JSON style file; fields not present keep the preset/default value
    #[arg(long)]
    pub style: Option<PathBuf>,
}

/// Where caption timing comes from.
#[derive(ClapArgs, Debug, Clone, Default)]
pub struct CaptionArgs {
    /// Word or character timing JSON
    #[arg(long, conflicts_with_all = ["text", "captions"])]
    pub timing: Option<PathBuf>,

    /// Plain text without timing; words get evenly spaced fallback timing
    #[arg(long, conflicts_with = "captions")]
    pub text: Option<String>,

    /// Ready-made caption file (.srt, .vtt or .json)
    #[arg(long)]
    pub captions: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Group timed words into caption segments
    Segment {
        #[command(flatten)]
        source: CaptionArgs,

        #[command(flatten)]
        style: StyleArgs,

        /// Output caption file; format follows the extension
        #[arg(short, long)]
        output: PathBuf,

        /// Override the output format (srt, vtt, json)
        #[arg(long)]
        format: Option<String>,
    },

    /// Burn captions into a video and mux the narration track
    Compile {
        /// Source video file
        #[arg(long)]
        video: PathBuf,

        /// Narration audio file
        #[arg(long)]
        narration: PathBuf,

        #[command(flatten)]
        source: CaptionArgs,

        #[command(flatten)]
        style: StyleArgs,

        /// Output video file
        #[arg(short, long)]
        output: PathBuf,

        /// Override the render clock rate
        #[arg(long)]
        fps: Option<u32>,

        /// Also write the caption segments next to the output in this format
        #[arg(long)]
        export: Option<String>,

        /// Print the output description as JSON
        #[arg(long)]
        json: bool,
    },

    /// Stretch narration audio to a target duration
    Retime {
        /// Input audio file
        #[arg(short, long)]
        input: PathBuf,

        /// Target duration in seconds
        #[arg(short, long)]
        target: f64,

        /// Output audio file
        #[arg(short, long)]
        output: PathBuf,

        /// Write the audio as base64 text instead of raw bytes
        #[arg(long)]
        base64: bool,
    },

    /// Resolve a style from a preset and a patch and print or save it
    Style {
        #[command(flatten)]
        style: StyleArgs,

        /// Write the resolved style here instead of printing it
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List available style presets
    Presets,

    /// Check that ffmpeg and ffprobe can be run
    Check,

    /// Write a configuration file with default values
    InitConfig {
        /// Destination path
        #[arg(short, long, default_value = "jimaku.toml")]
        output: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_args() {
        let args = Args::try_parse_from([
            "jimaku", "compile", "--video", "in.mp4", "--narration", "voice.mp3", "--timing",
            "words.json", "--preset", "neon", "-o", "out.mp4",
        ])
        .unwrap();
        match args.command {
            Commands::Compile { source, style, output, fps, .. } => {
                assert_eq!(source.timing, Some(PathBuf::from("words.json")));
                assert_eq!(style.preset.as_deref(), Some("neon"));
                assert_eq!(output, PathBuf::from("out.mp4"));
                assert_eq!(fps, None);
            }
            _ => panic!("expected compile"),
        }
    }

    #[test]
    fn test_timing_and_captions_conflict() {
        let result = Args::try_parse_from([
            "jimaku", "segment", "--timing", "a.json", "--captions", "b.srt", "-o", "c.srt",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_retime_args() {
        let args = Args::try_parse_from([
            "jimaku", "-v", "retime", "-i", "a.mp3", "-t", "12.5", "-o", "b.mp3",
        ])
        .unwrap();
        assert!(args.verbose);
        match args.command {
            Commands::Retime { target, base64, .. } => {
                assert_eq!(target, 12.5);
                assert!(!base64);
            }
            _ => panic!("expected retime"),
        }
    }
}
