//! Completeness oracle.

use kernel_console_core::{CompletenessStatus, KernelClient, KernelRequest, MessageContent};
use tokio::time::Instant;

use super::ExecutionEngine;

impl<C: KernelClient> ExecutionEngine<C> {
    /// Ask the kernel whether `code` is a complete unit.
    ///
    /// Returns the status and the indentation hint for the next line. Any
    /// failure or a missing reply yields `Unknown` with an empty hint; this
    /// never waits longer than the completeness timeout.
    pub async fn classify(&mut self, code: &str) -> (CompletenessStatus, String) {
        let unknown = (CompletenessStatus::Unknown, String::new());

        let Ok(_gate) = self.acquire() else {
            return unknown;
        };
        if !self.client.is_alive() {
            return unknown;
        }

        // The next correlated reply must answer this query, not a leftover.
        self.channels.drain_control();

        let request = KernelRequest::IsComplete {
            code: code.to_string(),
        };
        let id = match self.client.send(request).await {
            Ok(id) => id,
            Err(e) => {
                tracing::debug!(error = %e, "Completeness query not sent");
                return unknown;
            }
        };

        let deadline = Instant::now() + self.config.completeness_timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let message = match self.channels.poll_control(remaining).await {
                Ok(Some(message)) => message,
                Ok(None) => {
                    tracing::debug!(msg_id = %id, "Completeness query timed out");
                    return unknown;
                }
                Err(e) => {
                    tracing::debug!(error = %e, "Completeness query failed");
                    return unknown;
                }
            };

            if !message.is_child_of(&id) {
                tracing::debug!(parent = ?message.parent, "Discarding stale control message");
                continue;
            }

            if let MessageContent::IsCompleteReply { status, indent } = message.content {
                return (status, indent);
            }
        }
    }
}
