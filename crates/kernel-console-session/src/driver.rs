//! Session driver: the read-eval-print loop.
//!
//! Lines are accumulated until the completeness oracle no longer reports
//! them as incomplete, then the whole buffer is executed as one unit.

use kernel_console_core::{CompletenessStatus, EditorError, KernelClient, KernelInfo, LineEditor};

use crate::engine::{ExecutionEngine, ExecutionOutcome};
use crate::error::SessionError;

const EXIT_KEYWORDS: [&str; 2] = ["exit", "quit"];

/// Display settings of a session.
#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    /// Kernel name from the connection descriptor.
    pub display_name: String,
    /// Language hint from the command line.
    pub language_hint: Option<String>,
    /// Pre-fill continuation lines with the kernel's indent hint.
    pub auto_indent: bool,
}

/// What the loop does after a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Continue,
    Exit,
}

/// One console session over one kernel connection.
pub struct Session<C: KernelClient, E: LineEditor> {
    engine: ExecutionEngine<C>,
    editor: E,
    options: SessionOptions,
    kernel: KernelInfo,
    buffer: Vec<String>,
    indent: String,
}

impl<C: KernelClient, E: LineEditor> Session<C, E> {
    /// Handshake with the kernel and create the session.
    ///
    /// # Errors
    /// Returns error if the kernel does not answer `kernel_info`.
    pub async fn connect(
        mut engine: ExecutionEngine<C>,
        editor: E,
        options: SessionOptions,
    ) -> Result<Self, SessionError> {
        let kernel = engine.kernel_info().await?;
        Ok(Self {
            engine,
            editor,
            options,
            kernel,
            buffer: Vec::new(),
            indent: String::new(),
        })
    }

    /// Identity reported by the kernel.
    #[must_use]
    pub const fn kernel_info(&self) -> &KernelInfo {
        &self.kernel
    }

    /// The engine driving executions.
    pub const fn engine_mut(&mut self) -> &mut ExecutionEngine<C> {
        &mut self.engine
    }

    /// Lines waiting for a complete unit.
    #[must_use]
    pub fn buffer(&self) -> &[String] {
        &self.buffer
    }

    /// Welcome line shown before the first prompt.
    #[must_use]
    pub fn banner(&self) -> String {
        let name = if self.kernel.implementation.is_empty() {
            self.options.display_name.as_str()
        } else {
            self.kernel.implementation.as_str()
        };
        let language = self
            .kernel
            .language
            .as_deref()
            .or(self.options.language_hint.as_deref());

        match language {
            Some(language) => format!("Kernel {name} ({language}) initialized"),
            None => format!("Kernel {name} initialized"),
        }
    }

    /// Feed one line typed at the code prompt.
    pub async fn step(&mut self, line: &str) -> Step {
        let trimmed = line.trim();
        // Inside a block the keywords are ordinary code.
        if self.buffer.is_empty() && EXIT_KEYWORDS.contains(&trimmed) {
            return Step::Exit;
        }
        if trimmed.is_empty() && self.buffer.is_empty() {
            return Step::Continue;
        }

        let candidate = if self.buffer.is_empty() {
            line.to_string()
        } else {
            let mut lines = self.buffer.clone();
            lines.push(line.to_string());
            lines.join("\n")
        };

        let (status, indent) = self.engine.classify(&candidate).await;
        if status == CompletenessStatus::Incomplete {
            self.buffer.push(line.to_string());
            self.indent = indent;
            return Step::Continue;
        }

        self.buffer.clear();
        self.indent.clear();
        self.submit(&candidate).await;
        Step::Continue
    }

    async fn submit(&mut self, code: &str) {
        let outcome = self.engine.execute(code, &mut self.editor).await;
        let notice = match outcome {
            Ok(ExecutionOutcome::Ok | ExecutionOutcome::Error) => return,
            Ok(ExecutionOutcome::Cancelled) => "KeyboardInterrupt".to_string(),
            Ok(ExecutionOutcome::KernelDead) => "Kernel is not responding".to_string(),
            Err(e) => {
                tracing::warn!(error = %e, "Execution failed");
                format!("Execution failed: {e}")
            }
        };
        self.engine.renderer_mut().notice(&notice);
    }

    /// Run the loop until an exit keyword or end of input.
    ///
    /// # Errors
    /// Returns error if the line editor fails.
    pub async fn run(&mut self) -> Result<(), SessionError> {
        let banner = self.banner();
        self.engine.renderer_mut().notice(&banner);

        loop {
            let continuation = !self.buffer.is_empty();
            let prefill = if continuation && self.options.auto_indent {
                self.indent.clone()
            } else {
                String::new()
            };

            match self.editor.prompt(continuation, &prefill).await {
                Ok(line) => {
                    if self.step(&line).await == Step::Exit {
                        self.engine.renderer_mut().notice("Shutting down kernel...");
                        break;
                    }
                }
                Err(EditorError::Interrupted) => {
                    self.engine.renderer_mut().notice("KeyboardInterrupt");
                    self.buffer.clear();
                    self.indent.clear();
                }
                Err(EditorError::EndOfInput) => break,
                Err(e) => return Err(e.into()),
            }
        }

        Ok(())
    }

    /// Shut the kernel down, best-effort.
    pub async fn shutdown(&mut self) {
        self.engine.shutdown().await;
    }
}
