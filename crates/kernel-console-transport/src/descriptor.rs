//! Kernel connection descriptor.
//!
//! A descriptor is the JSON connection file a running kernel writes on
//! startup: addressing for the five sockets, the message signing key and an
//! optional kernel name used for display.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Descriptor loading error.
#[derive(Debug, Error)]
pub enum DescriptorError {
    #[error("Cannot read connection file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid connection file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Unsupported transport: {0}")]
    UnsupportedTransport(String),
    #[error("Missing port for {0} channel")]
    MissingPort(&'static str),
}

fn default_transport() -> String {
    "tcp".to_string()
}

fn default_signature_scheme() -> String {
    "hmac-sha256".to_string()
}

/// How to reach a running kernel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionDescriptor {
    /// Socket transport (`tcp` or `ipc`).
    #[serde(default = "default_transport")]
    pub transport: String,
    /// Host address or IPC path prefix.
    pub ip: String,
    pub shell_port: u16,
    pub iopub_port: u16,
    pub stdin_port: u16,
    pub control_port: u16,
    pub hb_port: u16,
    /// HMAC signing key; empty disables signing.
    #[serde(default)]
    pub key: String,
    #[serde(default = "default_signature_scheme")]
    pub signature_scheme: String,
    /// Kernel name, for display only.
    #[serde(default)]
    pub kernel_name: Option<String>,
}

impl ConnectionDescriptor {
    /// Load a descriptor from a connection file.
    ///
    /// # Errors
    /// Returns error if the file cannot be read or is not a valid descriptor.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, DescriptorError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| DescriptorError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "Loaded connection file");
        Self::from_json(&text)
    }

    /// Parse a descriptor from JSON text.
    ///
    /// # Errors
    /// Returns error if the JSON is malformed or describes an unusable
    /// connection.
    pub fn from_json(text: &str) -> Result<Self, DescriptorError> {
        let descriptor: Self = serde_json::from_str(text)?;
        descriptor.validate()?;
        Ok(descriptor)
    }

    fn validate(&self) -> Result<(), DescriptorError> {
        if !matches!(self.transport.as_str(), "tcp" | "ipc") {
            return Err(DescriptorError::UnsupportedTransport(self.transport.clone()));
        }

        let ports = [
            ("shell", self.shell_port),
            ("iopub", self.iopub_port),
            ("stdin", self.stdin_port),
            ("control", self.control_port),
            ("heartbeat", self.hb_port),
        ];
        match ports.iter().find(|(_, port)| *port == 0) {
            Some((name, _)) => Err(DescriptorError::MissingPort(name)),
            None => Ok(()),
        }
    }

    /// Human-readable kernel identity.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.kernel_name.as_deref().unwrap_or("kernel")
    }

    /// Endpoint address of a port, e.g. `tcp://127.0.0.1:5555`.
    #[must_use]
    pub fn endpoint(&self, port: u16) -> String {
        if self.transport == "ipc" {
            format!("ipc://{}-{port}", self.ip)
        } else {
            format!("{}://{}:{port}", self.transport, self.ip)
        }
    }
}
