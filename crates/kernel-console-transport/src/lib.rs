//! Transport layer between the console and a kernel.
//!
//! Provides:
//! - `ChannelSet` - three independent message queues (control, broadcast, stdin)
//! - `ConnectionDescriptor` - kernel connection file loader
//! - In-process transport for stub kernels (`memory`)
//! - ZeroMQ transport (feature: zmq)

pub mod channels;
pub mod descriptor;
pub mod memory;

#[cfg(feature = "zmq")]
pub mod zmq;

pub use channels::{ChannelSenders, ChannelSet};
pub use descriptor::{ConnectionDescriptor, DescriptorError};
