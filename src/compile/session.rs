use std::path::Path;
use tempfile::TempDir;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{JimakuError, Result};
use crate::media::{CaptureSink, FrameSource};
use crate::render::{Frame, FrameRenderer, FrameStats, Surface};
use crate::segmenter::CaptionSegment;
use crate::style::StyleDescriptor;

/// Resources held by a single compile run.
///
/// Owns the scratch directory, the frame decoder, the encoder sink and the
/// renderer state. `release` tears all of them down and is called on every
/// exit path; dropping a session without releasing it still removes the
/// scratch directory and kills child processes.
pub struct CompileSession {
    id: Uuid,
    work_dir: TempDir,
    source: Option<Box<dyn FrameSource>>,
    sink: Option<Box<dyn CaptureSink>>,
    renderer: FrameRenderer,
    frames_written: u64,
}

impl CompileSession {
    pub fn new(seed: u64) -> Result<Self> {
        let id = Uuid::new_v4();
        let work_dir = tempfile::Builder::new()
            .prefix(&format!("jimaku-{}-", id.simple()))
            .tempdir()?;
        debug!("Compile session {} using {}", id, work_dir.path().display());

        Ok(Self {
            id,
            work_dir,
            source: None,
            sink: None,
            renderer: FrameRenderer::new(seed),
            frames_written: 0,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn work_dir(&self) -> &Path {
        self.work_dir.path()
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    pub fn attach_source(&mut self, source: Box<dyn FrameSource>) {
        self.source = Some(source);
    }

    pub fn attach_sink(&mut self, sink: Box<dyn CaptureSink>) {
        self.sink = Some(sink);
    }

    pub async fn source_frame(&mut self, time_ms: f64) -> Result<Option<Frame>> {
        match self.source.as_mut() {
            Some(source) => source.frame_at(time_ms).await,
            None => Ok(None),
        }
    }

    pub fn render<S: Surface + ?Sized>(
        &mut self,
        surface: &mut S,
        source: Option<Frame>,
        time_ms: f64,
        segments: &[CaptionSegment],
        style: &StyleDescriptor,
    ) -> FrameStats {
        self.renderer.render_frame(surface, source, time_ms, segments, style)
    }

    pub async fn write(&mut self, frame: &Frame) -> Result<()> {
        let sink = self
            .sink
            .as_mut()
            .ok_or_else(|| JimakuError::Capture("No capture sink attached".to_string()))?;
        sink.write_frame(frame).await?;
        self.frames_written += 1;
        Ok(())
    }

    /// Finalize the output. The sink is detached first so a failed finish is
    /// not followed by an abort.
    pub async fn finish(&mut self) -> Result<()> {
        let mut sink = self
            .sink
            .take()
            .ok_or_else(|| JimakuError::Capture("No capture sink attached".to_string()))?;
        sink.finish().await
    }

    pub async fn release(mut self) {
        if let Some(mut source) = self.source.take() {
            source.close().await;
        }
        if let Some(mut sink) = self.sink.take() {
            warn!("Aborting unfinished capture for session {}", self.id);
            sink.abort().await;
        }
        let path = self.work_dir.path().to_path_buf();
        if let Err(e) = self.work_dir.close() {
            warn!("Failed to remove {}: {}", path.display(), e);
        }
        debug!("Compile session {} released", self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::testing::RecordingSurface;

    #[test]
    fn test_release_removes_work_dir() {
        let session = CompileSession::new(1).unwrap();
        let dir = session.work_dir().to_path_buf();
        assert!(dir.is_dir());
        tokio_test::block_on(session.release());
        assert!(!dir.exists());
    }

    #[test]
    fn test_write_without_sink_fails() {
        let mut session = CompileSession::new(1).unwrap();
        let frame = Frame::new(4, 4);
        let result = tokio_test::block_on(session.write(&frame));
        assert!(matches!(result, Err(JimakuError::Capture(_))));
        assert_eq!(session.frames_written(), 0);
        assert!(tokio_test::block_on(session.source_frame(0.0)).unwrap().is_none());

        let mut surface = RecordingSurface::new(4, 4);
        let stats = session.render(&mut surface, None, 0.0, &[], &StyleDescriptor::default());
        assert_eq!(stats.active_segments, 0);
        tokio_test::block_on(session.release());
    }
}
