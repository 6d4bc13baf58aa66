//! Session engine for the kernel console.
//!
//! Provides:
//! - `ExecutionEngine` - Execution state machine, completeness oracle and
//!   input-request bridge over one kernel connection
//! - `OutputRenderer` - Turns broadcast messages into console side effects
//! - `Session` - The read-eval-print loop
//! - Test doubles for driving the engine without a terminal (`testing`)

pub mod config;
pub mod driver;
pub mod engine;
pub mod error;
pub mod output;
pub mod renderer;
pub mod testing;

pub use config::EngineConfig;
pub use driver::{Session, SessionOptions, Step};
pub use engine::{ExecutionEngine, ExecutionOutcome, Phase};
pub use error::SessionError;
pub use output::{ConsoleOutput, TerminalOutput};
pub use renderer::OutputRenderer;
