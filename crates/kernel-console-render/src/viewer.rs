//! External viewer renderer.
//!
//! Each media item is written to a temp file that lives only for the
//! duration of one render call, then handed to the viewer command. All temp
//! files are created inside a directory owned by the renderer, which is
//! removed when the renderer is dropped.

use std::io::Write;
use std::path::PathBuf;

use async_trait::async_trait;
use kernel_console_core::{MediaSink, RenderableMedia};
use tempfile::TempDir;
use thiserror::Error;
use tokio::process::Command;

use crate::command::ViewerCommand;

/// Render error.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Viewer command cannot be parsed: {0}")]
    InvalidCommand(String),
    #[error("Viewer command is empty")]
    EmptyCommand,
    #[error("Viewer executable not found: {0}")]
    ExecutableNotFound(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Viewer exited with {0}")]
    ViewerFailed(std::process::ExitStatus),
}

/// Something that can display one media item.
#[async_trait]
pub trait MediaRenderer: Send + Sync {
    /// Display a media item.
    async fn render(&self, media: &RenderableMedia) -> Result<(), RenderError>;
}

/// Renderer that invokes an external viewer on a temp file.
#[derive(Debug)]
pub struct ViewerRenderer {
    program: PathBuf,
    args: Vec<String>,
    scratch: TempDir,
}

impl ViewerRenderer {
    /// Create a renderer for a viewer command line.
    ///
    /// # Errors
    /// Returns error if the command is invalid, the executable cannot be
    /// found, or the scratch directory cannot be created.
    pub async fn new(command_line: &str) -> Result<Self, RenderError> {
        let command = ViewerCommand::parse(command_line)?;
        let program = command.resolve().await?;
        let scratch = tempfile::Builder::new()
            .prefix("kernel-console-")
            .tempdir()?;

        tracing::debug!(
            program = %program.display(),
            scratch = %scratch.path().display(),
            "Viewer ready"
        );

        Ok(Self {
            program,
            args: command.args,
            scratch,
        })
    }
}

#[async_trait]
impl MediaRenderer for ViewerRenderer {
    async fn render(&self, media: &RenderableMedia) -> Result<(), RenderError> {
        let mut file = tempfile::Builder::new()
            .prefix("media-")
            .suffix(&format!(".{}", media.kind.extension()))
            .tempfile_in(self.scratch.path())?;
        file.write_all(media.data.as_bytes())?;
        file.flush()?;

        tracing::debug!(
            mime = media.kind.mime(),
            bytes = media.data.len(),
            path = %file.path().display(),
            "Rendering media"
        );

        let status = Command::new(&self.program)
            .args(&self.args)
            .arg(file.path())
            .status()
            .await?;

        // `file` is removed here on every path out of this call.
        if status.success() {
            Ok(())
        } else {
            Err(RenderError::ViewerFailed(status))
        }
    }
}

/// Sink used when no viewer is available.
#[derive(Debug, Default)]
pub struct DiscardMedia;

impl MediaSink for DiscardMedia {
    fn render(&mut self, media: RenderableMedia) {
        tracing::debug!(mime = media.kind.mime(), "No viewer configured; media skipped");
    }
}

#[cfg(all(test, unix))]
mod tests {
    use kernel_console_core::{MediaData, MimeKind};

    use super::*;

    fn png(bytes: &'static [u8]) -> RenderableMedia {
        RenderableMedia {
            kind: MimeKind::Png,
            data: MediaData::Binary(bytes.into()),
        }
    }

    fn scratch_entries(renderer: &ViewerRenderer) -> usize {
        std::fs::read_dir(renderer.scratch.path()).unwrap().count()
    }

    #[tokio::test]
    async fn test_viewer_receives_media_file() {
        let out = tempfile::tempdir().unwrap();
        let target = out.path().join("copy.png");
        let command = format!("sh -c 'cp \"$0\" {}'", target.display());

        let renderer = ViewerRenderer::new(&command).await.unwrap();
        renderer.render(&png(b"\x89PNG data")).await.unwrap();

        assert_eq!(std::fs::read(&target).unwrap(), b"\x89PNG data");
        assert_eq!(scratch_entries(&renderer), 0);
    }

    #[tokio::test]
    async fn test_viewer_failure_still_removes_file() {
        let renderer = ViewerRenderer::new("false").await.unwrap();
        let result = renderer.render(&png(b"img")).await;

        assert!(matches!(result, Err(RenderError::ViewerFailed(_))));
        assert_eq!(scratch_entries(&renderer), 0);
    }

    #[tokio::test]
    async fn test_scratch_dir_removed_on_drop() {
        let renderer = ViewerRenderer::new("true").await.unwrap();
        let path = renderer.scratch.path().to_path_buf();
        assert!(path.exists());

        drop(renderer);
        assert!(!path.exists());
    }
}
