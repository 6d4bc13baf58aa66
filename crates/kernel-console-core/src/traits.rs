//! Collaborator traits for the transport, the line editor and media output.

use async_trait::async_trait;
use thiserror::Error;

use crate::media::RenderableMedia;
use crate::message::{Channel, CorrelationId, KernelRequest};

/// Transport error.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Channel closed: {0}")]
    Closed(Channel),
    #[error("Connection error: {0}")]
    Connection(String),
    #[error("Encode error: {0}")]
    Encode(String),
}

/// Client half of a kernel connection.
///
/// Replies and broadcasts are delivered separately through the channel
/// receivers handed out by the transport alongside the client.
#[async_trait]
pub trait KernelClient: Send {
    /// Send a request and return the correlation id assigned to it.
    async fn send(&mut self, request: KernelRequest) -> Result<CorrelationId, TransportError>;

    /// Ask the kernel to interrupt the running execution.
    async fn interrupt(&mut self) -> Result<(), TransportError> {
        self.send(KernelRequest::Interrupt).await.map(|_| ())
    }

    /// Whether the kernel is still reachable.
    fn is_alive(&self) -> bool;

    /// Release the connection.
    async fn close(&mut self);
}

/// Receiver of decoded rich media.
///
/// Implementations must not block: rendering happens off the polling path.
pub trait MediaSink: Send {
    /// Hand a media item over for rendering.
    fn render(&mut self, media: RenderableMedia);
}

/// Line editor error.
#[derive(Debug, Error)]
pub enum EditorError {
    #[error("Interrupted")]
    Interrupted,
    #[error("End of input")]
    EndOfInput,
    #[error("Editor failed: {0}")]
    Failed(String),
}

/// Interactive line source.
#[async_trait]
pub trait LineEditor: Send {
    /// Read one line of code.
    ///
    /// `continuation` selects the continuation prompt; `indent` pre-fills
    /// the line.
    async fn prompt(&mut self, continuation: bool, indent: &str) -> Result<String, EditorError>;

    /// Read one line in answer to a kernel input request.
    async fn prompt_with_message(
        &mut self,
        message: &str,
        password: bool,
    ) -> Result<String, EditorError>;
}
