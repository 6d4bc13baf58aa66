//! Viewer command line handling.

use std::path::{Path, PathBuf};

use crate::viewer::RenderError;

/// A parsed viewer command: program plus leading arguments.
///
/// The media file path is appended as the last argument at render time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewerCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl ViewerCommand {
    /// Parse a shell-style command line such as `timg -p q`.
    ///
    /// # Errors
    /// Returns error if the line cannot be split or is empty.
    pub fn parse(line: &str) -> Result<Self, RenderError> {
        let mut parts =
            shlex::split(line).ok_or_else(|| RenderError::InvalidCommand(line.to_string()))?;
        if parts.is_empty() {
            return Err(RenderError::EmptyCommand);
        }

        let program = parts.remove(0);
        Ok(Self {
            program,
            args: parts,
        })
    }

    /// Resolve the program to an executable path.
    ///
    /// # Errors
    /// Returns error if the executable cannot be found.
    pub async fn resolve(&self) -> Result<PathBuf, RenderError> {
        resolve_executable_path(&self.program)
            .await
            .ok_or_else(|| RenderError::ExecutableNotFound(self.program.clone()))
    }
}

/// Find an executable by absolute path or on `PATH`.
pub async fn resolve_executable_path(executable: &str) -> Option<PathBuf> {
    if executable.trim().is_empty() {
        return None;
    }

    let path = Path::new(executable);
    if path.is_absolute() && path.is_file() {
        return Some(path.to_path_buf());
    }

    let executable = executable.to_string();
    tokio::task::spawn_blocking(move || which::which(executable))
        .await
        .ok()?
        .ok()
}
