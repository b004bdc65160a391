//! Encoder sink that muxes rendered frames with narration.

use async_trait::async_trait;
use std::collections::HashSet;
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, ChildStdin};
use tracing::{debug, warn};

use super::commands::MediaCommand;
use super::CaptureSink;
use crate::error::{JimakuError, Result};
use crate::render::Frame;

/// Encoder names from `ffmpeg -encoders` output.
pub fn parse_encoder_list(stdout: &str) -> HashSet<String> {
    stdout
        .lines()
        .skip_while(|line| !line.trim_start().starts_with("------"))
        .skip(1)
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            let flags = parts.next()?;
            if flags.len() != 6 {
                return None;
            }
            parts.next().map(str::to_string)
        })
        .collect()
}

pub struct FfmpegCaptureSink {
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    frames: u64,
}

impl FfmpegCaptureSink {
    pub fn spawn(command: &MediaCommand) -> Result<Self> {
        let mut child = command
            .spawn(true, false)
            .map_err(|e| JimakuError::Capture(e.to_string()))?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| JimakuError::Capture("Encoder has no stdin".to_string()))?;
        Ok(Self {
            child: Some(child),
            stdin: Some(stdin),
            frames: 0,
        })
    }
}

#[async_trait]
impl CaptureSink for FfmpegCaptureSink {
    async fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| JimakuError::Capture("Encoder input already closed".to_string()))?;
        stdin
            .write_all(frame.as_bytes())
            .await
            .map_err(|e| JimakuError::Capture(format!("Encoder rejected frame {}: {}", self.frames, e)))?;
        self.frames += 1;
        Ok(())
    }

    async fn finish(&mut self) -> Result<()> {
        if let Some(mut stdin) = self.stdin.take() {
            stdin.flush().await?;
        }
        let child = self
            .child
            .take()
            .ok_or_else(|| JimakuError::Capture("Encoder already finished".to_string()))?;
        let output = child.wait_with_output().await?;
        if !output.status.success() {
            return Err(JimakuError::Capture(format!(
                "Encoder exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        debug!("Encoder finished after {} frames", self.frames);
        Ok(())
    }

    async fn abort(&mut self) {
        self.stdin.take();
        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.start_kill() {
                warn!("Failed to stop encoder: {}", e);
            }
            let _ = child.wait().await;
        }
    }
}
