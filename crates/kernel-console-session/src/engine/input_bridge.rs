//! Input-request bridge.

use kernel_console_core::{
    EditorError, KernelClient, KernelMessage, KernelRequest, LineEditor, MessageContent,
};

use super::ExecutionEngine;
use crate::error::SessionError;

impl<C: KernelClient> ExecutionEngine<C> {
    /// Answer a kernel `input_request` through the line editor.
    ///
    /// Requests for other executions are discarded. The answer is dropped if
    /// a newer stdin or control message became ready while the user typed,
    /// so a newer request wins over an older one. Interrupt or end-of-input
    /// at the sub-prompt abandons the request.
    ///
    /// # Errors
    /// Returns error if the reply cannot be sent.
    pub async fn answer_input_request(
        &mut self,
        message: KernelMessage,
        editor: &mut dyn LineEditor,
    ) -> Result<(), SessionError> {
        let correlated = self
            .active
            .as_ref()
            .is_some_and(|request| message.is_child_of(&request.id));
        if !correlated {
            tracing::debug!(parent = ?message.parent, "Discarding input request of another request");
            return Ok(());
        }

        let MessageContent::InputRequest { prompt, password } = message.content else {
            tracing::debug!(msg_type = message.msg_type(), "Ignoring stdin message");
            return Ok(());
        };

        tracing::debug!(password, "Kernel requested input");
        let value = match editor.prompt_with_message(&prompt, password).await {
            Ok(value) => value,
            Err(EditorError::Interrupted | EditorError::EndOfInput) => {
                tracing::debug!("Input request abandoned");
                self.renderer.notice("");
                return Ok(());
            }
            Err(e) => {
                tracing::warn!(error = %e, "Input request abandoned");
                return Ok(());
            }
        };

        if self.channels.stdin_ready() || self.channels.control_ready() {
            tracing::debug!("Newer kernel message pending; discarding stale input");
            return Ok(());
        }

        self.client.send(KernelRequest::InputReply { value }).await?;
        Ok(())
    }
}
