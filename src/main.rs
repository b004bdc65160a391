//! Jimaku - Timed Caption Compositing
//!
//! Command-line entry point: segments timed words into captions, burns styled
//! captions into a video over a narration track and retimes narration audio.

use anyhow::Result;
use clap::Parser;
use tracing::{info, Level};
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use jimaku::cli::{Args, Commands};
use jimaku::compile::CompileRequest;
use jimaku::config::Config;
use jimaku::style::StylePreset;
use jimaku::subtitle::{write_subtitles, SubtitleFormat};
use jimaku::workflow::{sidecar_path, Workflow};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Setup logging to both console and file
    setup_logging(args.verbose)?;

    let config = Config::load(args.config.as_deref())?;
    let workflow = Workflow::new(config);

    match args.command {
        Commands::Segment { source, style, output, format } => {
            info!("Segmenting captions into {}", output.display());
            let segments = workflow
                .segment_to_file(&source, &style, &output, format.as_deref())
                .await?;
            println!("Wrote {} captions to {}", segments.len(), output.display());
        }
        Commands::Compile { video, narration, source, style, output, fps, export, json } => {
            info!("Compiling {} with narration {}", video.display(), narration.display());

            let style = workflow.resolve_style(&style).await?;
            let segments = workflow.load_captions(&source, &style).await?;
            if let Some(format) = export {
                let format: SubtitleFormat = format.parse()?;
                write_subtitles(&segments, format, sidecar_path(&output, format)).await?;
            }

            let request = CompileRequest {
                video,
                narration,
                segments,
                style,
                output,
            };
            let muxed = workflow.compile(&request, fps).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&muxed)?);
            } else {
                println!(
                    "{} ({}x{}, {} fps, {:.2}s)",
                    muxed.path.display(),
                    muxed.width,
                    muxed.height,
                    muxed.fps,
                    muxed.duration_ms as f64 / 1000.0
                );
            }
        }
        Commands::Retime { input, target, output, base64 } => {
            info!("Retiming {} to {:.3}s", input.display(), target);
            let outcome = workflow.retime_file(&input, target, &output, base64).await?;
            match (&outcome.plan, &outcome.fallback_reason) {
                (_, Some(reason)) => println!("Kept original audio: {}", reason),
                (Some(plan), None) if outcome.changed => println!(
                    "Retimed {:.2}s -> {:.2}s ({})",
                    plan.current_secs,
                    plan.target_secs,
                    plan.filter()
                ),
                _ => println!("Duration already within tolerance; audio unchanged"),
            }
        }
        Commands::Style { style, output } => {
            let resolved = workflow.resolve_style(&style).await?;
            match output {
                Some(path) => workflow.write_style(&resolved, &path).await?,
                None => println!("{}", serde_json::to_string_pretty(&resolved)?),
            }
        }
        Commands::Presets => {
            println!("{:<12} {:<14} {:<12}", "Preset", "Effect", "Animation");
            println!("{}", "-".repeat(40));
            for preset in StylePreset::ALL {
                let style = preset.descriptor();
                println!("{:<12} {:<14} {:<12}", preset, style.effect, style.animation);
            }
        }
        Commands::Check => {
            let version = workflow.check_media().await?;
            println!("{}", version);
        }
        Commands::InitConfig { output, force } => {
            if output.exists() && !force {
                anyhow::bail!("{} already exists (use --force to overwrite)", output.display());
            }
            workflow.config().save_to_file(&output)?;
            println!("Configuration written to {}", output.display());
        }
    }

    info!("Jimaku completed successfully");
    Ok(())
}

/// Setup logging to both console and file
fn setup_logging(verbose: bool) -> Result<()> {
    let log_dir = std::env::current_dir()?.join(".jimaku").join("log");
    std::fs::create_dir_all(&log_dir)?;

    // Set up file appender with daily rotation
    let file_appender = rolling::daily(&log_dir, "jimaku.log");
    let (non_blocking_file, guard) = non_blocking(file_appender);
    // Keep the guard alive for the duration of the program
    std::mem::forget(guard);

    let log_level = if verbose { Level::DEBUG } else { Level::INFO };

    // Progress bars own stdout; console logs go to stderr
    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_file(verbose)
        .with_line_number(verbose);

    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!(
        "Logging initialized - console: {}, file: {}",
        log_level,
        log_dir.join("jimaku.log").display()
    );

    Ok(())
}
