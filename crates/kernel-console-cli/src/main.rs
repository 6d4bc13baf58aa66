//! `kconsole`: interactive console for a running kernel.
//!
//! # Configuration
//!
//! Settings are layered, highest priority first:
//!
//! 1. Command-line flags
//! 2. `--config <path>`, or `<config_dir>/kernel-console/config.toml`
//! 3. Built-in defaults
//!
//! # Logging
//!
//! Logs go to stderr. `--debug` selects `debug`, otherwise `RUST_LOG`,
//! otherwise `warn`. `--image-debug` adds debug logs of media rendering.

mod config;
mod editor;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use kernel_console_core::InterruptFlag;
use kernel_console_render::{DiscardMedia, RenderWorker, ViewerRenderer};
use kernel_console_session::{
    ExecutionEngine, OutputRenderer, Session, SessionOptions, TerminalOutput,
};
use kernel_console_transport::{ConnectionDescriptor, zmq};
use tokio::task::JoinHandle;
use tracing_subscriber::EnvFilter;

use crate::config::ConsoleConfig;
use crate::editor::ConsoleEditor;

/// Interactive console for a running kernel
#[derive(Parser, Debug)]
#[command(name = "kconsole")]
#[command(version, about, long_about = None)]
struct Args {
    /// Connection file of the running kernel
    #[arg(long, value_name = "FILE")]
    existing: PathBuf,

    /// Language of the kernel; names the history file and labels the banner
    #[arg(long)]
    filetype: Option<String>,

    /// Configuration file
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Viewer command line for images
    #[arg(long)]
    viewer: Option<String>,

    /// Pre-fill continuation lines with the kernel's indentation
    #[arg(long)]
    auto_indent: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Log media rendering
    #[arg(long)]
    image_debug: bool,
}

impl Args {
    /// Flags override file values.
    fn apply(&self, config: &mut ConsoleConfig) {
        if let Some(viewer) = &self.viewer {
            config.viewer.clone_from(viewer);
        }
        config.auto_indent |= self.auto_indent;
        config.image_debug |= self.image_debug;
    }
}

fn log_filter(debug: bool, image_debug: bool) -> EnvFilter {
    let mut directives = if debug {
        "debug,rustyline=warn".to_string()
    } else {
        std::env::var(EnvFilter::DEFAULT_ENV).unwrap_or_else(|_| "warn".to_string())
    };
    if image_debug {
        directives.push_str(",kernel_console_render=debug");
    }
    EnvFilter::try_new(&directives).unwrap_or_else(|_| EnvFilter::new("warn"))
}

/// Spawn the media pipeline, falling back to discarding media when the
/// viewer is unusable.
async fn media_pipeline(config: &ConsoleConfig) -> (OutputRenderer, Option<RenderWorker>) {
    match ViewerRenderer::new(&config.viewer).await {
        Ok(viewer) => {
            let (queue, worker) = RenderWorker::spawn(viewer, config.render_queue);
            (OutputRenderer::new(TerminalOutput, queue), Some(worker))
        }
        Err(e) => {
            tracing::warn!(error = %e, viewer = %config.viewer, "Images disabled");
            (OutputRenderer::new(TerminalOutput, DiscardMedia), None)
        }
    }
}

/// Raise the interrupt flag on every Ctrl-C delivered as a signal.
fn watch_interrupts(flag: InterruptFlag) -> JoinHandle<()> {
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            tracing::debug!("Interrupt signal");
            flag.raise();
        }
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = ConsoleConfig::load(args.config.as_deref())?;
    args.apply(&mut config);

    tracing_subscriber::fmt()
        .with_env_filter(log_filter(args.debug, config.image_debug))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let descriptor = ConnectionDescriptor::from_file(&args.existing)
        .with_context(|| format!("Cannot use connection file {}", args.existing.display()))?;
    let (client, channels) = zmq::connect(&descriptor)
        .await
        .context("Failed to connect to kernel")?;

    let (renderer, worker) = media_pipeline(&config).await;
    let interrupt = InterruptFlag::new();
    let engine = ExecutionEngine::new(
        client,
        channels,
        renderer,
        interrupt.clone(),
        config.engine_config(),
    );

    let editor = ConsoleEditor::spawn(config.history_path(args.filetype.as_deref()))?;
    let options = SessionOptions {
        display_name: descriptor.display_name().to_string(),
        language_hint: args.filetype.clone(),
        auto_indent: config.auto_indent,
    };
    let mut session = Session::connect(engine, editor, options)
        .await
        .context("Kernel did not answer")?;

    let signals = watch_interrupts(interrupt);
    let result = session.run().await;

    session.shutdown().await;
    signals.abort();
    if let Some(worker) = worker {
        worker.stop().await;
    }

    result.context("Console failed")
}
