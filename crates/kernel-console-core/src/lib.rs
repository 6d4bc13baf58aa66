//! Core abstractions for the kernel console.
//!
//! This crate provides the vocabulary shared by every other crate:
//! - `KernelMessage` - Closed sum type over the kernel message kinds
//! - `KernelRequest` - Requests the console issues to the kernel
//! - `MimeBundle` / `RenderableMedia` - Rich-media payload handling
//! - `InterruptFlag` - Cancellation token shared with the signal handler
//! - Collaborator traits (`KernelClient`, `LineEditor`, `MediaSink`)

pub mod interrupt;
pub mod media;
pub mod message;
pub mod traits;

pub use interrupt::InterruptFlag;
pub use media::{MediaData, MediaPayload, MimeBundle, MimeKind, RenderableMedia};
pub use message::{
    Channel, CompletenessStatus, CorrelationId, KernelInfo, KernelMessage, KernelRequest,
    KernelStatus, MessageContent, MessageError, ReplyStatus, StreamName,
};
pub use traits::{EditorError, KernelClient, LineEditor, MediaSink, TransportError};
