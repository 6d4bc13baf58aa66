//! The three kernel channels as independent single-consumer queues.

use std::time::Duration;

use kernel_console_core::{Channel, KernelMessage, TransportError};
use tokio::sync::mpsc;

/// Producer side of a [`ChannelSet`], held by the transport reader tasks.
#[derive(Debug, Clone)]
pub struct ChannelSenders {
    control: mpsc::UnboundedSender<KernelMessage>,
    broadcast: mpsc::UnboundedSender<KernelMessage>,
    stdin: mpsc::UnboundedSender<KernelMessage>,
}

impl ChannelSenders {
    /// Route a message to the queue of its channel.
    ///
    /// # Errors
    /// Returns error if the consumer side was dropped.
    pub fn deliver(&self, message: KernelMessage) -> Result<(), TransportError> {
        let channel = message.channel;
        let tx = match channel {
            Channel::Control => &self.control,
            Channel::Broadcast => &self.broadcast,
            Channel::Stdin => &self.stdin,
        };
        tx.send(message).map_err(|_| TransportError::Closed(channel))
    }
}

/// Consumer side of the kernel channels.
///
/// Each queue has exactly one reader: the execution engine, which decides
/// which channel to read based on its current phase.
#[derive(Debug)]
pub struct ChannelSet {
    control: mpsc::UnboundedReceiver<KernelMessage>,
    broadcast: mpsc::UnboundedReceiver<KernelMessage>,
    stdin: mpsc::UnboundedReceiver<KernelMessage>,
}

impl ChannelSet {
    /// Create a connected channel set and its producer handle.
    #[must_use]
    pub fn new() -> (ChannelSenders, Self) {
        let (control_tx, control) = mpsc::unbounded_channel();
        let (broadcast_tx, broadcast) = mpsc::unbounded_channel();
        let (stdin_tx, stdin) = mpsc::unbounded_channel();

        let senders = ChannelSenders {
            control: control_tx,
            broadcast: broadcast_tx,
            stdin: stdin_tx,
        };

        let set = Self {
            control,
            broadcast,
            stdin,
        };

        (senders, set)
    }

    /// Wait up to `timeout` for a control-channel message.
    ///
    /// Returns `Ok(None)` on timeout.
    ///
    /// # Errors
    /// Returns error if the channel is closed.
    pub async fn poll_control(
        &mut self,
        timeout: Duration,
    ) -> Result<Option<KernelMessage>, TransportError> {
        poll(&mut self.control, Channel::Control, timeout).await
    }

    /// Wait up to `timeout` for a broadcast message.
    ///
    /// # Errors
    /// Returns error if the channel is closed.
    pub async fn poll_broadcast(
        &mut self,
        timeout: Duration,
    ) -> Result<Option<KernelMessage>, TransportError> {
        poll(&mut self.broadcast, Channel::Broadcast, timeout).await
    }

    /// Wait up to `timeout` for an input request.
    ///
    /// # Errors
    /// Returns error if the channel is closed.
    pub async fn poll_stdin(
        &mut self,
        timeout: Duration,
    ) -> Result<Option<KernelMessage>, TransportError> {
        poll(&mut self.stdin, Channel::Stdin, timeout).await
    }

    /// Take one control message if available.
    ///
    /// # Errors
    /// Returns error if the channel is closed and empty.
    pub fn try_control(&mut self) -> Result<Option<KernelMessage>, TransportError> {
        try_take(&mut self.control, Channel::Control)
    }

    /// Take one broadcast message if available.
    ///
    /// # Errors
    /// Returns error if the channel is closed and empty.
    pub fn try_broadcast(&mut self) -> Result<Option<KernelMessage>, TransportError> {
        try_take(&mut self.broadcast, Channel::Broadcast)
    }

    /// Whether a control message is waiting.
    #[must_use]
    pub fn control_ready(&self) -> bool {
        !self.control.is_empty()
    }

    /// Whether an input request is waiting.
    #[must_use]
    pub fn stdin_ready(&self) -> bool {
        !self.stdin.is_empty()
    }

    /// Discard every control message currently queued.
    ///
    /// Returns the number of discarded messages.
    pub fn drain_control(&mut self) -> usize {
        let mut discarded = 0;
        while let Ok(message) = self.control.try_recv() {
            tracing::debug!(
                msg_type = message.msg_type(),
                parent = ?message.parent,
                "Discarding stale control message"
            );
            discarded += 1;
        }
        discarded
    }
}

async fn poll(
    rx: &mut mpsc::UnboundedReceiver<KernelMessage>,
    channel: Channel,
    timeout: Duration,
) -> Result<Option<KernelMessage>, TransportError> {
    match tokio::time::timeout(timeout, rx.recv()).await {
        Ok(Some(message)) => Ok(Some(message)),
        Ok(None) => Err(TransportError::Closed(channel)),
        Err(_) => Ok(None),
    }
}

fn try_take(
    rx: &mut mpsc::UnboundedReceiver<KernelMessage>,
    channel: Channel,
) -> Result<Option<KernelMessage>, TransportError> {
    match rx.try_recv() {
        Ok(message) => Ok(Some(message)),
        Err(mpsc::error::TryRecvError::Empty) => Ok(None),
        Err(mpsc::error::TryRecvError::Disconnected) => Err(TransportError::Closed(channel)),
    }
}
