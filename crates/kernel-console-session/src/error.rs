//! Session error type.

use std::time::Duration;

use kernel_console_core::{EditorError, TransportError};
use thiserror::Error;

/// Session error.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("An execution is already in progress")]
    Busy,
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("Kernel did not answer kernel_info within {0:?}")]
    HandshakeTimeout(Duration),
    #[error("Editor error: {0}")]
    Editor(#[from] EditorError),
}
