//! Execution state machine.
//!
//! One execution at a time moves through `Idle -> Submitted -> Busy ->
//! Draining -> Idle`. An execution is finished only once the kernel has both
//! reported `idle` on the broadcast channel and sent the correlated
//! `execute_reply` on the control channel; the reply may arrive before or
//! after trailing output.

mod input_bridge;
mod oracle;

use std::sync::Arc;

use kernel_console_core::{
    CorrelationId, InterruptFlag, KernelClient, KernelInfo, KernelRequest, KernelStatus,
    LineEditor, MessageContent, TransportError,
};
use kernel_console_transport::ChannelSet;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::time::Instant;

use crate::config::EngineConfig;
use crate::error::SessionError;
use crate::renderer::OutputRenderer;

const CODE_SUMMARY_CHARS: usize = 60;

/// Phase of the current execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Submitted,
    Busy,
    Draining,
}

/// Terminal outcome of one execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionOutcome {
    /// The kernel replied with status `ok`.
    Ok,
    /// The kernel replied with any other status.
    Error,
    /// The user interrupted; the kernel's eventual reply is ignored.
    Cancelled,
    /// The kernel stopped responding.
    KernelDead,
}

/// Correlation record of the in-flight execution.
#[derive(Debug, Clone)]
struct ExecutionRequest {
    id: CorrelationId,
    code: String,
    created_at: Instant,
}

impl ExecutionRequest {
    /// First line of the code, shortened for log records.
    fn summary(&self) -> String {
        let first = self.code.lines().next().unwrap_or_default();
        let mut summary: String = first.chars().take(CODE_SUMMARY_CHARS).collect();
        if summary.len() < first.len() || self.code.lines().nth(1).is_some() {
            summary.push_str("...");
        }
        summary
    }
}

/// Drives executions over one kernel connection.
pub struct ExecutionEngine<C: KernelClient> {
    client: C,
    channels: ChannelSet,
    renderer: OutputRenderer,
    interrupt: InterruptFlag,
    config: EngineConfig,
    gate: Arc<Mutex<()>>,
    phase: Phase,
    active: Option<ExecutionRequest>,
}

impl<C: KernelClient> ExecutionEngine<C> {
    /// Create an engine.
    #[must_use]
    pub fn new(
        client: C,
        channels: ChannelSet,
        renderer: OutputRenderer,
        interrupt: InterruptFlag,
        config: EngineConfig,
    ) -> Self {
        Self {
            client,
            channels,
            renderer,
            interrupt,
            config,
            gate: Arc::new(Mutex::new(())),
            phase: Phase::Idle,
            active: None,
        }
    }

    /// Current phase.
    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.phase
    }

    /// Kernel state last reported for the active execution.
    #[must_use]
    pub const fn observed_state(&self) -> KernelStatus {
        self.renderer.observed_state()
    }

    /// The flag the signal handler raises.
    #[must_use]
    pub const fn interrupt_flag(&self) -> &InterruptFlag {
        &self.interrupt
    }

    /// Whether the kernel is still reachable.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.client.is_alive()
    }

    /// Renderer used for console output.
    pub const fn renderer_mut(&mut self) -> &mut OutputRenderer {
        &mut self.renderer
    }

    /// Claim the engine for one request/reply exchange.
    fn acquire(&self) -> Result<OwnedMutexGuard<()>, SessionError> {
        Arc::clone(&self.gate)
            .try_lock_owned()
            .map_err(|_| SessionError::Busy)
    }

    /// Execute `code` and wait for it to finish.
    ///
    /// Input requests from the kernel are answered through `editor`.
    ///
    /// # Errors
    /// Returns [`SessionError::Busy`] if another execution holds the engine,
    /// or a transport error if a request cannot be sent.
    pub async fn execute(
        &mut self,
        code: &str,
        editor: &mut dyn LineEditor,
    ) -> Result<ExecutionOutcome, SessionError> {
        let _gate = self.acquire()?;
        let result = self.run_execution(code, editor).await;

        if let Some(request) = self.active.take() {
            tracing::debug!(
                msg_id = %request.id,
                code = %request.summary(),
                elapsed_ms = request.created_at.elapsed().as_millis(),
                outcome = ?result.as_ref().ok(),
                "Execution finished"
            );
        }
        self.renderer.finish();
        self.phase = Phase::Idle;
        result
    }

    async fn run_execution(
        &mut self,
        code: &str,
        editor: &mut dyn LineEditor,
    ) -> Result<ExecutionOutcome, SessionError> {
        if !self.client.is_alive() {
            return Ok(ExecutionOutcome::KernelDead);
        }

        self.interrupt.clear();
        self.channels.drain_control();
        self.phase = Phase::Submitted;

        let id = self.client.send(KernelRequest::execute(code)).await?;
        self.active = Some(ExecutionRequest {
            id: id.clone(),
            code: code.to_string(),
            created_at: Instant::now(),
        });
        self.renderer.begin(id.clone());
        self.phase = Phase::Busy;

        if let Some(outcome) = self.wait_until_idle(&id, editor).await? {
            return Ok(outcome);
        }

        self.phase = Phase::Draining;
        self.wait_for_reply(&id).await
    }

    /// Busy phase: answer input requests and render output until the kernel
    /// reports idle. Returns an outcome if the execution ended early.
    async fn wait_until_idle(
        &mut self,
        id: &CorrelationId,
        editor: &mut dyn LineEditor,
    ) -> Result<Option<ExecutionOutcome>, SessionError> {
        loop {
            if let Some(outcome) = self.check_abort().await {
                return Ok(Some(outcome));
            }

            let polled = tokio::select! {
                biased;
                () = self.interrupt.raised() => continue,
                polled = self.channels.poll_stdin(self.config.poll_timeout) => polled,
            };

            match polled {
                Ok(Some(request)) => {
                    // Output queued before the prompt must reach the terminal first.
                    if let Err(e) = self.drain_broadcast() {
                        return Ok(Some(Self::lost(&e)));
                    }
                    self.answer_input_request(request, editor).await?;
                    continue;
                }
                Ok(None) => {}
                Err(e) => return Ok(Some(Self::lost(&e))),
            }

            if let Err(e) = self.drain_broadcast() {
                return Ok(Some(Self::lost(&e)));
            }
            if self.renderer.observed_state() == KernelStatus::Idle {
                tracing::debug!(msg_id = %id, "Kernel idle");
                return Ok(None);
            }

            tokio::select! {
                biased;
                () = self.interrupt.raised() => {}
                () = tokio::time::sleep(self.config.tick) => {}
            }
        }
    }

    /// Draining phase: wait for the correlated `execute_reply`.
    async fn wait_for_reply(&mut self, id: &CorrelationId) -> Result<ExecutionOutcome, SessionError> {
        loop {
            if let Some(outcome) = self.check_abort().await {
                return Ok(outcome);
            }

            let polled = tokio::select! {
                biased;
                () = self.interrupt.raised() => continue,
                polled = self.channels.poll_control(self.config.poll_timeout) => polled,
            };

            let message = match polled {
                Ok(Some(message)) => message,
                Ok(None) => continue,
                Err(e) => return Ok(Self::lost(&e)),
            };

            if !message.is_child_of(id) {
                tracing::debug!(
                    msg_type = message.msg_type(),
                    parent = ?message.parent,
                    "Discarding stale control message"
                );
                continue;
            }

            match message.content {
                MessageContent::ExecuteReply { status, .. } => {
                    // Output can race the reply.
                    if let Err(e) = self.drain_broadcast() {
                        return Ok(Self::lost(&e));
                    }
                    return Ok(if status.is_ok() {
                        ExecutionOutcome::Ok
                    } else {
                        ExecutionOutcome::Error
                    });
                }
                _ => {
                    tracing::debug!(msg_type = message.msg_type(), "Ignoring control message");
                }
            }
        }
    }

    /// Check the interrupt flag and kernel liveness.
    async fn check_abort(&mut self) -> Option<ExecutionOutcome> {
        if self.interrupt.take() {
            self.cancel().await;
            return Some(ExecutionOutcome::Cancelled);
        }
        if !self.client.is_alive() {
            tracing::warn!("Kernel is not alive");
            return Some(ExecutionOutcome::KernelDead);
        }
        None
    }

    async fn cancel(&mut self) {
        let delivered =
            tokio::time::timeout(self.config.poll_timeout, self.client.interrupt()).await;
        let failure = match delivered {
            Ok(Ok(())) => return,
            Ok(Err(e)) => e.to_string(),
            Err(_) => "timed out".to_string(),
        };
        tracing::warn!(error = %failure, "Interrupt delivery failed");
        self.renderer
            .notice(&format!("Failed to interrupt kernel: {failure}"));
    }

    fn lost(error: &TransportError) -> ExecutionOutcome {
        tracing::warn!(error = %error, "Kernel connection lost");
        ExecutionOutcome::KernelDead
    }

    /// Dispatch every queued broadcast message.
    fn drain_broadcast(&mut self) -> Result<(), TransportError> {
        while let Some(message) = self.channels.try_broadcast()? {
            self.renderer.dispatch(&message);
        }
        Ok(())
    }

    /// Startup handshake: ask the kernel who it is.
    ///
    /// # Errors
    /// Returns error if the request cannot be sent or no reply arrives within
    /// the handshake timeout.
    pub async fn kernel_info(&mut self) -> Result<KernelInfo, SessionError> {
        let _gate = self.acquire()?;
        let timeout = self.config.kernel_info_timeout;

        self.channels.drain_control();
        let id = self.client.send(KernelRequest::KernelInfo).await?;
        let deadline = Instant::now() + timeout;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(SessionError::HandshakeTimeout(timeout));
            }

            let Some(message) = self.channels.poll_control(remaining).await? else {
                return Err(SessionError::HandshakeTimeout(timeout));
            };

            match message.content {
                MessageContent::KernelInfoReply(info) if message.parent.as_ref() == Some(&id) => {
                    tracing::debug!(
                        implementation = %info.implementation,
                        language = ?info.language,
                        "Kernel handshake complete"
                    );
                    return Ok(info);
                }
                _ => tracing::debug!(parent = ?message.parent, "Discarding stale control message"),
            }
        }
    }

    /// Ask the kernel to shut down and release the connection.
    ///
    /// Waits up to the grace period for the kernel to report itself dead.
    /// Every step is best-effort.
    pub async fn shutdown(&mut self) {
        match self.client.send(KernelRequest::Shutdown { restart: false }).await {
            Ok(_) => self.await_dead_status().await,
            Err(e) => tracing::debug!(error = %e, "Shutdown request not delivered"),
        }
        self.client.close().await;
    }

    async fn await_dead_status(&mut self) {
        let deadline = Instant::now() + self.config.shutdown_grace;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return;
            }
            match self.channels.poll_broadcast(remaining).await {
                Ok(Some(message)) => {
                    if matches!(
                        message.content,
                        MessageContent::Status {
                            state: KernelStatus::Dead
                        }
                    ) {
                        tracing::debug!("Kernel reported dead");
                        return;
                    }
                }
                Ok(None) | Err(_) => return,
            }
        }
    }
}
