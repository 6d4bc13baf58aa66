//! Terminal line editor.
//!
//! rustyline blocks the calling thread, so it runs on a dedicated OS thread
//! and the async side exchanges prompts and answers with it over channels.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc as std_mpsc;

use async_trait::async_trait;
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::terminal;
use kernel_console_core::{EditorError, LineEditor};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tokio::sync::{mpsc, oneshot};

const PROMPT: &str = ">> ";
const CONTINUATION_PROMPT: &str = ".. ";

enum Prompt {
    Code { continuation: bool, indent: String },
    Input { message: String, password: bool },
}

struct PromptRequest {
    prompt: Prompt,
    reply: oneshot::Sender<Result<String, EditorError>>,
}

/// rustyline-backed [`LineEditor`] with persistent history.
pub struct ConsoleEditor {
    requests: mpsc::UnboundedSender<PromptRequest>,
}

impl ConsoleEditor {
    /// Start the editor thread.
    ///
    /// # Errors
    /// Returns error if the thread cannot be started or the terminal editor
    /// cannot be created.
    pub fn spawn(history: Option<PathBuf>) -> Result<Self, EditorError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let (ready_tx, ready_rx) = std_mpsc::sync_channel(1);

        std::thread::Builder::new()
            .name("kconsole-readline".into())
            .spawn(move || serve(rx, history, &ready_tx))
            .map_err(|e| EditorError::Failed(e.to_string()))?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Self { requests: tx }),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(thread_gone()),
        }
    }

    async fn ask(&self, prompt: Prompt) -> Result<String, EditorError> {
        let (reply, answer) = oneshot::channel();
        self.requests
            .send(PromptRequest { prompt, reply })
            .map_err(|_| thread_gone())?;
        answer.await.map_err(|_| thread_gone())?
    }
}

fn thread_gone() -> EditorError {
    EditorError::Failed("line editor thread exited".into())
}

#[async_trait]
impl LineEditor for ConsoleEditor {
    async fn prompt(&mut self, continuation: bool, indent: &str) -> Result<String, EditorError> {
        self.ask(Prompt::Code {
            continuation,
            indent: indent.to_string(),
        })
        .await
    }

    async fn prompt_with_message(
        &mut self,
        message: &str,
        password: bool,
    ) -> Result<String, EditorError> {
        self.ask(Prompt::Input {
            message: message.to_string(),
            password,
        })
        .await
    }
}

fn serve(
    mut requests: mpsc::UnboundedReceiver<PromptRequest>,
    history: Option<PathBuf>,
    ready: &std_mpsc::SyncSender<Result<(), EditorError>>,
) {
    let mut rl = match DefaultEditor::new() {
        Ok(editor) => editor,
        Err(e) => {
            let _ = ready.send(Err(EditorError::Failed(e.to_string())));
            return;
        }
    };

    if let Some(path) = &history {
        if let Some(dir) = path.parent() {
            if let Err(e) = std::fs::create_dir_all(dir) {
                tracing::debug!(error = %e, dir = %dir.display(), "Cannot create history dir");
            }
        }
        // Missing on first run.
        if let Err(e) = rl.load_history(path) {
            tracing::debug!(error = %e, "History not loaded");
        }
    }
    let _ = ready.send(Ok(()));

    while let Some(request) = requests.blocking_recv() {
        let answer = match request.prompt {
            Prompt::Code {
                continuation,
                indent,
            } => read_code(&mut rl, continuation, &indent, history.as_deref()),
            Prompt::Input {
                message,
                password: false,
            } => rl.readline(&message).map_err(editor_error),
            Prompt::Input {
                message,
                password: true,
            } => read_password(&message),
        };

        if request.reply.send(answer).is_err() {
            tracing::debug!("Prompt answer dropped");
        }
    }
    tracing::debug!("Line editor exiting");
}

fn read_code(
    rl: &mut DefaultEditor,
    continuation: bool,
    indent: &str,
    history: Option<&Path>,
) -> Result<String, EditorError> {
    let prompt = if continuation {
        CONTINUATION_PROMPT
    } else {
        PROMPT
    };
    let line = rl
        .readline_with_initial(prompt, (indent, ""))
        .map_err(editor_error)?;

    if !line.trim().is_empty() {
        if let Err(e) = rl.add_history_entry(line.as_str()) {
            tracing::debug!(error = %e, "History entry not added");
        }
        if let Some(path) = history {
            if let Err(e) = rl.save_history(path) {
                tracing::debug!(error = %e, path = %path.display(), "History not saved");
            }
        }
    }
    Ok(line)
}

fn editor_error(error: ReadlineError) -> EditorError {
    match error {
        ReadlineError::Interrupted => EditorError::Interrupted,
        ReadlineError::Eof => EditorError::EndOfInput,
        other => EditorError::Failed(other.to_string()),
    }
}

fn failed(error: io::Error) -> EditorError {
    EditorError::Failed(error.to_string())
}

/// Read a line without echo. The value never reaches history or logs.
fn read_password(message: &str) -> Result<String, EditorError> {
    let mut out = io::stdout();
    write!(out, "{message}").and_then(|()| out.flush()).map_err(failed)?;

    terminal::enable_raw_mode().map_err(failed)?;
    let value = read_hidden();
    let restored = terminal::disable_raw_mode();

    write!(out, "\r\n").and_then(|()| out.flush()).map_err(failed)?;
    restored.map_err(failed)?;
    value
}

fn read_hidden() -> Result<String, EditorError> {
    let mut value = String::new();
    loop {
        let Event::Key(key) = event::read().map_err(failed)? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }

        let control = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Enter => return Ok(value),
            KeyCode::Char('c') if control => return Err(EditorError::Interrupted),
            KeyCode::Char('d') if control && value.is_empty() => {
                return Err(EditorError::EndOfInput);
            }
            KeyCode::Backspace => {
                value.pop();
            }
            KeyCode::Char(c) if !control => value.push(c),
            _ => {}
        }
    }
}
