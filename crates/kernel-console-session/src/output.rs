//! Terminal side effects of the console.

use std::io::{self, Write};

use crossterm::{
    QueueableCommand,
    style::{Color, Print, ResetColor, SetForegroundColor},
    terminal::{Clear, ClearType},
};
use kernel_console_core::StreamName;

/// Destination for console text.
pub trait ConsoleOutput: Send {
    /// Write kernel output to stdout or stderr.
    fn write(&mut self, stream: StreamName, text: &str);

    /// Return to the start of the current line and erase it.
    fn erase_line(&mut self);

    /// Print a console notice (banner, `KeyboardInterrupt`, failures).
    fn notice(&mut self, text: &str);
}

/// Writes to the process stdout/stderr.
#[derive(Debug, Default)]
pub struct TerminalOutput;

fn report(result: io::Result<()>) {
    if let Err(e) = result {
        tracing::debug!(error = %e, "Terminal write failed");
    }
}

fn write_to(mut out: impl Write, text: &str) -> io::Result<()> {
    out.write_all(text.as_bytes())?;
    out.flush()
}

fn erase(mut out: impl Write) -> io::Result<()> {
    out.queue(Print("\r"))?;
    out.queue(Clear(ClearType::CurrentLine))?;
    out.flush()
}

fn colored_line(mut out: impl Write, text: &str) -> io::Result<()> {
    out.queue(SetForegroundColor(Color::DarkYellow))?;
    out.queue(Print(text))?;
    out.queue(ResetColor)?;
    out.queue(Print("\n"))?;
    out.flush()
}

impl ConsoleOutput for TerminalOutput {
    fn write(&mut self, stream: StreamName, text: &str) {
        report(match stream {
            StreamName::Stdout => write_to(io::stdout().lock(), text),
            StreamName::Stderr => write_to(io::stderr().lock(), text),
        });
    }

    fn erase_line(&mut self) {
        report(erase(io::stdout().lock()));
    }

    fn notice(&mut self, text: &str) {
        report(colored_line(io::stdout().lock(), text));
    }
}
