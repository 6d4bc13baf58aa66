//! ZeroMQ transport for Jupyter-protocol kernels.
//!
//! One reader task per inbound socket converts wire messages into
//! [`KernelMessage`]s and feeds the matching queue of the [`ChannelSet`].
//! A heartbeat task pings the kernel; a missed heartbeat or a reader that
//! stops marks the kernel dead.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::time::Duration;

use async_trait::async_trait;
use jupyter_protocol::{ConnectionInfo, JupyterMessage, JupyterMessageContent};
use kernel_console_core::{
    Channel, CorrelationId, KernelClient, KernelMessage, KernelRequest, TransportError,
};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::channels::{ChannelSenders, ChannelSet};
use crate::descriptor::ConnectionDescriptor;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(1);
const HEARTBEAT_TIMEOUT: Duration = Duration::from_secs(10);

fn connection_error(e: impl std::fmt::Display) -> TransportError {
    TransportError::Connection(e.to_string())
}

impl ConnectionDescriptor {
    fn connection_info(&self) -> ConnectionInfo {
        let transport = if self.transport == "ipc" {
            jupyter_protocol::connection_info::Transport::IPC
        } else {
            jupyter_protocol::connection_info::Transport::TCP
        };

        ConnectionInfo {
            transport,
            ip: self.ip.clone(),
            stdin_port: self.stdin_port,
            control_port: self.control_port,
            hb_port: self.hb_port,
            shell_port: self.shell_port,
            iopub_port: self.iopub_port,
            signature_scheme: self.signature_scheme.clone(),
            key: self.key.clone(),
            kernel_name: self.kernel_name.clone(),
        }
    }
}

/// Connect to a running kernel.
///
/// # Errors
/// Returns error if any of the kernel sockets cannot be connected.
pub async fn connect(
    descriptor: &ConnectionDescriptor,
) -> Result<(ZmqClient, ChannelSet), TransportError> {
    let info = descriptor.connection_info();
    let session_id = Uuid::new_v4().to_string();
    let (senders, channels) = ChannelSet::new();
    let alive = Arc::new(AtomicBool::new(true));

    tracing::debug!(
        kernel = descriptor.display_name(),
        shell = %descriptor.endpoint(descriptor.shell_port),
        session_id = %session_id,
        "Connecting to kernel"
    );

    let iopub = runtimelib::create_client_iopub_connection(&info, "", &session_id)
        .await
        .map_err(connection_error)?;

    let identity = runtimelib::peer_identity_for_session(&session_id).map_err(connection_error)?;
    let shell = runtimelib::create_client_shell_connection_with_identity(
        &info,
        &session_id,
        identity.clone(),
    )
    .await
    .map_err(connection_error)?;
    let stdin =
        runtimelib::create_client_stdin_connection_with_identity(&info, &session_id, identity)
            .await
            .map_err(connection_error)?;
    let control = runtimelib::create_client_control_connection(&info, &session_id)
        .await
        .map_err(connection_error)?;
    let heartbeat = runtimelib::create_client_heartbeat_connection(&info)
        .await
        .map_err(connection_error)?;

    let (shell_writer, mut shell_reader) = shell.split();
    let (stdin_writer, mut stdin_reader) = stdin.split();
    let (control_writer, mut control_reader) = control.split();
    let mut iopub = iopub;
    let mut heartbeat = heartbeat;

    let mut tasks = Vec::with_capacity(5);

    let tx = senders.clone();
    let flag = Arc::clone(&alive);
    tasks.push(tokio::spawn(async move {
        loop {
            match shell_reader.read().await {
                Ok(message) => {
                    if !forward(&tx, Channel::Control, &message) {
                        break;
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Shell socket read failed");
                    flag.store(false, Ordering::Release);
                    break;
                }
            }
        }
    }));

    let tx = senders.clone();
    let flag = Arc::clone(&alive);
    tasks.push(tokio::spawn(async move {
        loop {
            match iopub.read().await {
                Ok(message) => {
                    if !forward(&tx, Channel::Broadcast, &message) {
                        break;
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "IOPub socket read failed");
                    flag.store(false, Ordering::Release);
                    break;
                }
            }
        }
    }));

    let tx = senders;
    let flag = Arc::clone(&alive);
    tasks.push(tokio::spawn(async move {
        loop {
            match stdin_reader.read().await {
                Ok(message) => {
                    if !forward(&tx, Channel::Stdin, &message) {
                        break;
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Stdin socket read failed");
                    flag.store(false, Ordering::Release);
                    break;
                }
            }
        }
    }));

    // Replies to interrupt/shutdown carry nothing the console acts on.
    tasks.push(tokio::spawn(async move {
        while let Ok(message) = control_reader.read().await {
            tracing::debug!(msg_type = %message.header.msg_type, "Control socket reply");
        }
    }));

    let flag = Arc::clone(&alive);
    tasks.push(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(HEARTBEAT_INTERVAL);
        loop {
            ticker.tick().await;
            match tokio::time::timeout(HEARTBEAT_TIMEOUT, heartbeat.single_heartbeat()).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::warn!(error = %e, "Heartbeat failed");
                    flag.store(false, Ordering::Release);
                    break;
                }
                Err(_) => {
                    tracing::warn!("Heartbeat timed out");
                    flag.store(false, Ordering::Release);
                    break;
                }
            }
        }
    }));

    let client = ZmqClient {
        shell: shell_writer,
        stdin: stdin_writer,
        control: control_writer,
        alive,
        tasks,
    };

    Ok((client, channels))
}

/// Decode a wire message and queue it. Returns false once the consumer is gone.
fn forward(tx: &ChannelSenders, channel: Channel, message: &JupyterMessage) -> bool {
    match decode(channel, message) {
        Some(decoded) => tx.deliver(decoded).is_ok(),
        None => true,
    }
}

fn decode(channel: Channel, message: &JupyterMessage) -> Option<KernelMessage> {
    let msg_type = message.header.msg_type.as_str();
    let parent = message
        .parent_header
        .as_ref()
        .map(|header| CorrelationId::new(header.msg_id.clone()));

    let content = match serde_json::to_value(&message.content) {
        Ok(value) => value,
        Err(e) => {
            tracing::debug!(msg_type, error = %e, "Cannot serialize message content");
            return None;
        }
    };

    match KernelMessage::from_wire(channel, msg_type, parent, content) {
        Ok(decoded) => Some(decoded),
        Err(e) => {
            tracing::debug!(msg_type, error = %e, "Dropping malformed message");
            None
        }
    }
}

fn encode(request: &KernelRequest) -> Result<JupyterMessage, TransportError> {
    let content = JupyterMessageContent::from_type_and_content(request.msg_type(), request.content())
        .map_err(|e| TransportError::Encode(e.to_string()))?;
    Ok(JupyterMessage::new(content, None))
}

/// Client half of the ZeroMQ transport.
pub struct ZmqClient {
    shell: runtimelib::DealerSendConnection,
    stdin: runtimelib::DealerSendConnection,
    control: runtimelib::DealerSendConnection,
    alive: Arc<AtomicBool>,
    tasks: Vec<JoinHandle<()>>,
}

#[async_trait]
impl KernelClient for ZmqClient {
    async fn send(&mut self, request: KernelRequest) -> Result<CorrelationId, TransportError> {
        let message = encode(&request)?;
        let id = CorrelationId::new(message.header.msg_id.clone());
        let channel = request.channel();

        let socket = if request.is_out_of_band() {
            &mut self.control
        } else if channel == Channel::Stdin {
            &mut self.stdin
        } else {
            &mut self.shell
        };

        tracing::debug!(msg_id = %id, msg_type = request.msg_type(), "Sending request");
        socket.send(message).await.map_err(|e| {
            tracing::warn!(error = %e, %channel, "Send failed");
            TransportError::Closed(channel)
        })?;
        Ok(id)
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    async fn close(&mut self) {
        self.alive.store(false, Ordering::Release);
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

impl Drop for ZmqClient {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}
