//! Test doubles for driving the engine without a terminal.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use kernel_console_core::{EditorError, LineEditor, MediaSink, RenderableMedia, StreamName};

use crate::output::ConsoleOutput;

/// One recorded console side effect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputEvent {
    Write(StreamName, String),
    Erase,
    Notice(String),
}

/// Console output that records every side effect. Clones share the log.
#[derive(Debug, Clone, Default)]
pub struct RecordingOutput {
    events: Arc<Mutex<Vec<OutputEvent>>>,
}

impl RecordingOutput {
    fn push(&self, event: OutputEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }

    /// All recorded events in order.
    #[must_use]
    pub fn events(&self) -> Vec<OutputEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn stream(&self, wanted: StreamName) -> String {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                OutputEvent::Write(stream, text) if stream == wanted => Some(text),
                _ => None,
            })
            .collect()
    }

    /// Everything written to stdout.
    #[must_use]
    pub fn stdout(&self) -> String {
        self.stream(StreamName::Stdout)
    }

    /// Everything written to stderr.
    #[must_use]
    pub fn stderr(&self) -> String {
        self.stream(StreamName::Stderr)
    }

    /// Number of line erasures.
    #[must_use]
    pub fn erase_count(&self) -> usize {
        self.events()
            .iter()
            .filter(|event| matches!(event, OutputEvent::Erase))
            .count()
    }

    /// Recorded notices.
    #[must_use]
    pub fn notices(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                OutputEvent::Notice(text) => Some(text),
                _ => None,
            })
            .collect()
    }
}

impl ConsoleOutput for RecordingOutput {
    fn write(&mut self, stream: StreamName, text: &str) {
        self.push(OutputEvent::Write(stream, text.to_string()));
    }

    fn erase_line(&mut self) {
        self.push(OutputEvent::Erase);
    }

    fn notice(&mut self, text: &str) {
        self.push(OutputEvent::Notice(text.to_string()));
    }
}

/// Media sink that keeps every item. Clones share the log.
#[derive(Debug, Clone, Default)]
pub struct RecordingMedia {
    items: Arc<Mutex<Vec<RenderableMedia>>>,
}

impl RecordingMedia {
    /// Items received so far.
    #[must_use]
    pub fn items(&self) -> Vec<RenderableMedia> {
        self.items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl MediaSink for RecordingMedia {
    fn render(&mut self, media: RenderableMedia) {
        self.items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(media);
    }
}

/// A prompt the scripted editor was asked to show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptRecord {
    Code { continuation: bool, indent: String },
    Input { message: String, password: bool },
}

/// Line editor fed from prepared scripts.
///
/// Code prompts and input-request prompts consume separate scripts; an
/// exhausted script answers with [`EditorError::EndOfInput`].
#[derive(Debug, Clone, Default)]
pub struct ScriptedEditor {
    lines: Arc<Mutex<VecDeque<Result<String, EditorError>>>>,
    answers: Arc<Mutex<VecDeque<Result<String, EditorError>>>>,
    prompts: Arc<Mutex<Vec<PromptRecord>>>,
}

impl ScriptedEditor {
    /// Editor that types `lines` at the code prompt.
    #[must_use]
    pub fn with_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let editor = Self::default();
        for line in lines {
            editor.push_line(Ok(line.into()));
        }
        editor
    }

    /// Queue a code-prompt result.
    pub fn push_line(&self, line: Result<String, EditorError>) {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(line);
    }

    /// Queue an input-request answer.
    pub fn push_answer(&self, answer: Result<String, EditorError>) {
        self.answers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(answer);
    }

    /// Prompts shown so far.
    #[must_use]
    pub fn prompts(&self) -> Vec<PromptRecord> {
        self.prompts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn record(&self, prompt: PromptRecord) {
        self.prompts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(prompt);
    }
}

fn next(script: &Mutex<VecDeque<Result<String, EditorError>>>) -> Result<String, EditorError> {
    script
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .pop_front()
        .unwrap_or(Err(EditorError::EndOfInput))
}

#[async_trait]
impl LineEditor for ScriptedEditor {
    async fn prompt(&mut self, continuation: bool, indent: &str) -> Result<String, EditorError> {
        self.record(PromptRecord::Code {
            continuation,
            indent: indent.to_string(),
        });
        next(&self.lines)
    }

    async fn prompt_with_message(
        &mut self,
        message: &str,
        password: bool,
    ) -> Result<String, EditorError> {
        self.record(PromptRecord::Input {
            message: message.to_string(),
            password,
        });
        next(&self.answers)
    }
}
