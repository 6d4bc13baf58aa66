//! In-process transport.
//!
//! [`pair`] connects a [`MemoryClient`] to a [`KernelSide`] handle through
//! plain channels. The kernel side sees every request with the correlation
//! id the client assigned to it and publishes replies, broadcasts and input
//! requests back, which makes it a scriptable stand-in for a real kernel.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use async_trait::async_trait;
use kernel_console_core::{
    Channel, CorrelationId, KernelClient, KernelMessage, KernelRequest, KernelStatus,
    MessageContent, TransportError,
};
use tokio::sync::mpsc;

use crate::channels::{ChannelSenders, ChannelSet};

/// Create a connected client, channel set and kernel handle.
#[must_use]
pub fn pair() -> (MemoryClient, ChannelSet, KernelSide) {
    let (senders, channels) = ChannelSet::new();
    let (request_tx, request_rx) = mpsc::unbounded_channel();
    let alive = Arc::new(AtomicBool::new(true));

    let client = MemoryClient {
        requests: request_tx,
        alive: Arc::clone(&alive),
        closed: false,
    };

    let kernel = KernelSide {
        requests: request_rx,
        senders,
        alive,
    };

    (client, channels, kernel)
}

/// Client half of the in-process transport.
#[derive(Debug)]
pub struct MemoryClient {
    requests: mpsc::UnboundedSender<(CorrelationId, KernelRequest)>,
    alive: Arc<AtomicBool>,
    closed: bool,
}

#[async_trait]
impl KernelClient for MemoryClient {
    async fn send(&mut self, request: KernelRequest) -> Result<CorrelationId, TransportError> {
        if self.closed {
            return Err(TransportError::Closed(request.channel()));
        }

        let id = CorrelationId::generate();
        let channel = request.channel();
        tracing::debug!(msg_id = %id, msg_type = request.msg_type(), "Sending request");
        self.requests
            .send((id.clone(), request))
            .map_err(|_| TransportError::Closed(channel))?;
        Ok(id)
    }

    fn is_alive(&self) -> bool {
        !self.closed && self.alive.load(Ordering::Acquire)
    }

    async fn close(&mut self) {
        self.closed = true;
    }
}

/// Kernel half of the in-process transport.
#[derive(Debug)]
pub struct KernelSide {
    requests: mpsc::UnboundedReceiver<(CorrelationId, KernelRequest)>,
    senders: ChannelSenders,
    alive: Arc<AtomicBool>,
}

impl KernelSide {
    /// Wait for the next request; `None` once the client is gone.
    pub async fn next_request(&mut self) -> Option<(CorrelationId, KernelRequest)> {
        self.requests.recv().await
    }

    /// Take a request if one is queued.
    pub fn try_next_request(&mut self) -> Option<(CorrelationId, KernelRequest)> {
        self.requests.try_recv().ok()
    }

    /// Deliver an arbitrary message, e.g. one with a foreign parent.
    pub fn send(&self, message: KernelMessage) {
        if self.senders.deliver(message).is_err() {
            tracing::debug!("Console side dropped; message lost");
        }
    }

    /// Answer a request on the control channel.
    pub fn reply(&self, parent: &CorrelationId, content: MessageContent) {
        self.send(KernelMessage::new(
            Channel::Control,
            Some(parent.clone()),
            content,
        ));
    }

    /// Publish a broadcast attributed to `parent`.
    pub fn publish(&self, parent: &CorrelationId, content: MessageContent) {
        self.send(KernelMessage::new(
            Channel::Broadcast,
            Some(parent.clone()),
            content,
        ));
    }

    /// Publish a status broadcast.
    pub fn status(&self, parent: &CorrelationId, state: KernelStatus) {
        self.publish(parent, MessageContent::Status { state });
    }

    /// Ask the console for a line of input.
    pub fn request_input(&self, parent: &CorrelationId, prompt: &str, password: bool) {
        self.send(KernelMessage::new(
            Channel::Stdin,
            Some(parent.clone()),
            MessageContent::InputRequest {
                prompt: prompt.to_string(),
                password,
            },
        ));
    }

    /// Mark the kernel dead; the client reports it at its next liveness check.
    pub fn kill(&self) {
        self.alive.store(false, Ordering::Release);
    }
}
