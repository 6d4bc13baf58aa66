//! Media rendering for the kernel console.
//!
//! Provides:
//! - `RenderWorker` / `RenderQueue` - bounded queue in front of a single worker
//! - `ViewerRenderer` - hands media to an external viewer command via temp files
//! - `ViewerCommand` - viewer command line parsing and executable resolution

pub mod command;
pub mod viewer;
pub mod worker;

pub use command::ViewerCommand;
pub use viewer::{DiscardMedia, MediaRenderer, RenderError, ViewerRenderer};
pub use worker::{RenderJob, RenderQueue, RenderWorker};
