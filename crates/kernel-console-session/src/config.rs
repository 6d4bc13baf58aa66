//! Engine timing configuration.

use std::time::Duration;

/// Timeouts and polling granularity of the execution engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Bound on each blocking channel read; also bounds cancellation latency.
    pub poll_timeout: Duration,
    /// Cooperative pause between polling rounds.
    pub tick: Duration,
    /// How long the completeness oracle waits for its reply.
    pub completeness_timeout: Duration,
    /// How long the startup handshake waits for `kernel_info`.
    pub kernel_info_timeout: Duration,
    /// How long shutdown waits for the kernel to report itself dead.
    pub shutdown_grace: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_timeout: Duration::from_millis(50),
            tick: Duration::from_millis(50),
            completeness_timeout: Duration::from_millis(500),
            kernel_info_timeout: Duration::from_secs(10),
            shutdown_grace: Duration::from_millis(200),
        }
    }
}
