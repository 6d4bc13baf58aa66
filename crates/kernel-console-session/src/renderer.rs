//! Output renderer.
//!
//! Turns broadcast messages of the active execution into console side
//! effects. Messages attributed to any other request are dropped here, so a
//! stale broadcast can never reach the terminal.

use kernel_console_core::{
    CorrelationId, KernelMessage, KernelStatus, MediaSink, MessageContent, MimeBundle, StreamName,
};

use crate::output::ConsoleOutput;

/// Stateful sink for classified broadcast messages.
pub struct OutputRenderer {
    output: Box<dyn ConsoleOutput>,
    media: Box<dyn MediaSink>,
    active: Option<CorrelationId>,
    pending_clear: bool,
    observed_state: KernelStatus,
}

impl OutputRenderer {
    /// Create a renderer writing text to `output` and media to `media`.
    #[must_use]
    pub fn new(output: impl ConsoleOutput + 'static, media: impl MediaSink + 'static) -> Self {
        Self {
            output: Box::new(output),
            media: Box::new(media),
            active: None,
            pending_clear: false,
            observed_state: KernelStatus::Idle,
        }
    }

    /// Attribute subsequent messages to `id`; the kernel is assumed busy
    /// until a status broadcast says otherwise.
    pub fn begin(&mut self, id: CorrelationId) {
        self.active = Some(id);
        self.observed_state = KernelStatus::Busy;
    }

    /// Stop accepting messages for the finished execution.
    pub fn finish(&mut self) {
        self.active = None;
    }

    /// Whether the next write erases the current line first.
    #[must_use]
    pub const fn pending_clear(&self) -> bool {
        self.pending_clear
    }

    /// Execution state last reported by the kernel for the active request.
    #[must_use]
    pub const fn observed_state(&self) -> KernelStatus {
        self.observed_state
    }

    /// Print a console notice.
    pub fn notice(&mut self, text: &str) {
        self.output.notice(text);
    }

    /// Apply one message.
    pub fn dispatch(&mut self, message: &KernelMessage) {
        let correlated = self
            .active
            .as_ref()
            .is_some_and(|id| message.is_child_of(id));
        if !correlated {
            tracing::debug!(
                msg_type = message.msg_type(),
                parent = ?message.parent,
                "Discarding message of another request"
            );
            return;
        }

        match &message.content {
            MessageContent::Status { state } => self.observed_state = *state,
            MessageContent::Stream { name, text } => {
                self.take_pending_clear();
                self.output.write(*name, text);
            }
            MessageContent::ExecuteResult { data, .. } | MessageContent::DisplayData { data } => {
                self.take_pending_clear();
                self.render_bundle(data);
            }
            MessageContent::Error { traceback, .. } => {
                self.take_pending_clear();
                for frame in traceback {
                    self.output.write(StreamName::Stderr, frame);
                    self.output.write(StreamName::Stderr, "\n");
                }
            }
            MessageContent::ClearOutput { wait: true } => self.pending_clear = true,
            MessageContent::ClearOutput { wait: false } => {
                self.pending_clear = false;
                self.output.erase_line();
            }
            MessageContent::InputRequest { .. }
            | MessageContent::IsCompleteReply { .. }
            | MessageContent::ExecuteReply { .. }
            | MessageContent::KernelInfoReply(_)
            | MessageContent::Other { .. } => {
                tracing::debug!(msg_type = message.msg_type(), "Ignoring message");
            }
        }
    }

    fn take_pending_clear(&mut self) {
        if std::mem::take(&mut self.pending_clear) {
            self.output.erase_line();
        }
    }

    fn render_bundle(&mut self, data: &MimeBundle) {
        if let Some(media) = data.renderable() {
            self.media.render(media);
            return;
        }

        if let Some(text) = data.plain_text() {
            self.output.write(StreamName::Stdout, &text);
            if !text.ends_with('\n') {
                self.output.write(StreamName::Stdout, "\n");
            }
        }
    }
}
